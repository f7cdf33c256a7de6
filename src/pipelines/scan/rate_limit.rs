// SPDX-License-Identifier: GPL-3.0-only

//! Minimum spacing between decode attempts

use std::time::{Duration, Instant};

/// Tracks when the last decode attempt completed
///
/// The next decode may start no earlier than `last_completed + interval`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_completed: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_completed: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_completed(&self) -> Option<Instant> {
        self.last_completed
    }

    /// Earliest start of the next decode, `None` before the first one
    pub fn next_allowed(&self) -> Option<Instant> {
        self.last_completed.map(|at| at + self.interval)
    }

    /// Time left until the next decode may start
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_allowed()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn record_completion(&mut self, at: Instant) {
        self.last_completed = Some(at);
    }
}
