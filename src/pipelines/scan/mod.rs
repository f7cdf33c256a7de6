// SPDX-License-Identifier: GPL-3.0-only

//! QR scanning pipeline
//!
//! A [`ScanSession`] owns one [`AnalysisExecutor`] and one
//! [`FrameAnalysisPipeline`]. The frame source pushes frames into the
//! pipeline, the pipeline decodes them one at a time on the executor and
//! reports [`ScanResult`]s to the sink.

pub mod decoder;
pub mod executor;
pub mod pipeline;
pub mod rate_limit;
pub mod result;
pub mod session;
pub mod state;

pub use decoder::{DecodeOutcome, Decoder};
pub use executor::{AnalysisExecutor, ExecutorHandle};
pub use pipeline::{FrameAnalysisPipeline, PipelineStats};
pub use rate_limit::RateLimiter;
pub use result::{ResultSink, ScanResult};
pub use session::{ScanSession, ScanSessionBuilder};
pub use state::{PipelineState, SharedState};
