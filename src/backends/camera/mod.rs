// SPDX-License-Identifier: GPL-3.0-only

//! Frame source abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │     ScanSession     │  ← Lifecycle, subscribe/unsubscribe
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  FrameSource Trait  │  ← Pushes frames into the pipeline
//! └──────────┬──────────┘
//!            │
//!            ▼
//!    ┌───────────────┐
//!    │ImageFileSource│  ← Replays still images
//!    └───────────────┘
//! ```

pub mod file_source;
pub mod types;

pub use file_source::ImageFileSource;
pub use types::*;

use crate::constants::LensFacing;
use crate::errors::SourceError;
use crate::pipelines::scan::FrameAnalysisPipeline;
use std::sync::Arc;

/// Something that produces frames at its own cadence
///
/// While subscribed, a source hands every frame to
/// [`FrameAnalysisPipeline::submit`]. Each frame must come back through its
/// [`FrameReleaser`] before the source reuses the underlying buffer.
pub trait FrameSource: Send {
    /// Camera this source reads from, fixed at construction
    fn lens_facing(&self) -> LensFacing;

    /// Start delivering frames to `pipeline`
    fn subscribe(&mut self, pipeline: Arc<FrameAnalysisPipeline>) -> Result<(), SourceError>;

    /// Stop delivering frames. Calling this while unsubscribed does nothing.
    fn unsubscribe(&mut self);

    /// Switch the auxiliary light on or off
    fn set_torch(&mut self, _on: bool) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("torch".to_string()))
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn lens_facing(&self) -> LensFacing {
        (**self).lens_facing()
    }

    fn subscribe(&mut self, pipeline: Arc<FrameAnalysisPipeline>) -> Result<(), SourceError> {
        (**self).subscribe(pipeline)
    }

    fn unsubscribe(&mut self) {
        (**self).unsubscribe()
    }

    fn set_torch(&mut self, on: bool) -> Result<(), SourceError> {
        (**self).set_torch(on)
    }
}
