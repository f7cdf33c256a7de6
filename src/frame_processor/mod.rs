// SPDX-License-Identifier: MPL-2.0

//! Concrete frame analysis
//!
//! The pipeline only knows the [`Decoder`](crate::pipelines::scan::Decoder)
//! trait. This module provides the QR implementation and a classifier for
//! the strings it produces.

pub mod tasks;
pub mod types;

pub use tasks::qr_detector;
pub use tasks::QrDecoder;
pub use types::{PayloadKind, WifiSecurity};
