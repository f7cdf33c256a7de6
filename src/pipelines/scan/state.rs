// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline activity state

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Whether the pipeline accepts frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipelineState {
    /// Created, never activated
    Idle = 0,
    /// Bound to a live lifecycle, accepting frames
    Active = 1,
    /// Owner inactive; frames are released unanalysed
    Suspended = 2,
    /// Terminated; nothing is accepted ever again
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Idle,
            1 => PipelineState::Active,
            2 => PipelineState::Suspended,
            _ => PipelineState::Stopped,
        }
    }

    pub fn accepts_frames(&self) -> bool {
        matches!(self, PipelineState::Active)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Active => "active",
            PipelineState::Suspended => "suspended",
            PipelineState::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// State shared between the session (writer) and the pipeline (reader)
///
/// Frame sources read it on their own threads, so a rejected frame can be
/// released without a round trip through the analysis worker.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PipelineState::Idle as u8)))
    }

    pub fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store `state`, returning the previous one
    pub fn set(&self, state: PipelineState) -> PipelineState {
        PipelineState::from_u8(self.0.swap(state as u8, Ordering::SeqCst))
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
