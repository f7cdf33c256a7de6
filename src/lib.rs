// SPDX-License-Identifier: GPL-3.0-only

//! qr-scan - rate-limited camera frame analysis for QR scanning
//!
//! Frames pushed by a [`FrameSource`](backends::camera::FrameSource) are
//! analysed one at a time on a single background worker, mapped onto
//! [`ScanResult`]s and handed to a [`ResultSink`]. A [`ScanSession`] ties the
//! whole thing to an external lifecycle.
//!
//! # Architecture
//!
//! - [`backends`]: frame source contract, frame types, image-file source
//! - [`frame_processor`]: QR decoder and payload classification
//! - [`pipelines`]: the analysis pipeline, its worker and the session
//! - [`config`]: scanner tuning persisted as JSON
//!
//! # Example
//!
//! ```no_run
//! use qr_scan::{ImageFileSource, LensFacing, QrDecoder, ScanResult, ScanSession};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = ImageFileSource::open(&[PathBuf::from("code.png")], LensFacing::Back)?;
//! let (tx, rx) = std::sync::mpsc::channel::<ScanResult>();
//! let mut session = ScanSession::builder()
//!     .source(source)
//!     .decoder(QrDecoder::new())
//!     .sink(tx)
//!     .build();
//! session.on_active()?;
//! println!("{:?}", rx.recv()?);
//! session.on_terminated();
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame_processor;
pub mod pipelines;

// Re-export commonly used types
pub use backends::camera::{Frame, FrameImage, FrameSource, ImageFileSource, PixelFormat};
pub use config::ScannerConfig;
pub use constants::LensFacing;
pub use errors::{AppError, AppResult, DecodeError, SessionError, SourceError};
pub use frame_processor::{PayloadKind, QrDecoder};
pub use pipelines::scan::{
    Decoder, FrameAnalysisPipeline, PipelineState, ResultSink, ScanResult, ScanSession,
};
