// SPDX-License-Identifier: GPL-3.0-only

//! Decoder contract

use crate::backends::camera::FrameImage;
use crate::errors::DecodeError;
use futures::future::BoxFuture;

/// Result of one decode attempt
///
/// An empty list means nothing was found, which is not an error.
pub type DecodeOutcome = Result<Vec<String>, DecodeError>;

/// Extracts payloads from one frame's pixels
///
/// The returned future may complete on any thread. Implementations must not
/// keep the image around after the future resolves.
pub trait Decoder: Send + Sync {
    fn decode<'a>(&'a self, image: &'a FrameImage) -> BoxFuture<'a, DecodeOutcome>;
}

impl<T: Decoder + ?Sized> Decoder for std::sync::Arc<T> {
    fn decode<'a>(&'a self, image: &'a FrameImage) -> BoxFuture<'a, DecodeOutcome> {
        (**self).decode(image)
    }
}
