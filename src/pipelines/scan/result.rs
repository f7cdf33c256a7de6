// SPDX-License-Identifier: GPL-3.0-only

//! Scan results and where they go

use serde::{Deserialize, Serialize};

/// Externally observable outcome of analysing a frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum ScanResult {
    /// One decoded payload
    Success(String),
    /// Frame could not be analysed
    Error(String),
}

impl ScanResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanResult::Success(_))
    }

    /// Payload or error message
    pub fn value(&self) -> &str {
        match self {
            ScanResult::Success(value) | ScanResult::Error(value) => value,
        }
    }
}

/// Consumer of scan results
///
/// Called from the analysis worker, zero or more times per frame: any number
/// of successes, or a single error.
pub trait ResultSink: Send + Sync {
    fn on_result(&self, result: ScanResult);
}

impl<F> ResultSink for F
where
    F: Fn(ScanResult) + Send + Sync,
{
    fn on_result(&self, result: ScanResult) {
        self(result)
    }
}

impl ResultSink for std::sync::mpsc::Sender<ScanResult> {
    fn on_result(&self, result: ScanResult) {
        // Receiver gone means nobody is listening anymore
        let _ = self.send(result);
    }
}

impl ResultSink for tokio::sync::mpsc::UnboundedSender<ScanResult> {
    fn on_result(&self, result: ScanResult) {
        let _ = self.send(result);
    }
}
