// SPDX-License-Identifier: GPL-3.0-only
// Shared types for frame sources

//! Frame types shared by sources, the analysis pipeline and decoders

use crate::errors::ReleaseError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{trace, warn};

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to the device.
/// This is common on mobile devices where sensors are rotated 90° or 270° relative
/// to the display orientation. Decoders may use it as an orientation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Pixel layout of frame data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGBA, 4 bytes per pixel
    #[default]
    RGBA,
    /// 8-bit BGRA, 4 bytes per pixel
    BGRA,
    /// 8-bit RGB, 3 bytes per pixel
    RGB24,
    /// 8-bit luma only (e.g. the Y plane of NV12)
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::RGBA | PixelFormat::BGRA => 4,
            PixelFormat::RGB24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Luma of one pixel starting at `px` (BT.601 integer weights)
    pub fn luma(&self, px: &[u8]) -> u8 {
        let (r, g, b) = match self {
            PixelFormat::RGBA | PixelFormat::RGB24 => (px[0], px[1], px[2]),
            PixelFormat::BGRA => (px[2], px[1], px[0]),
            PixelFormat::Gray8 => return px[0],
        };
        ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
    }
}

/// Pixel buffer of one captured image
#[derive(Clone)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes
    pub stride: u32,
    pub format: PixelFormat,
    pub data: Arc<[u8]>,
}

impl FrameImage {
    /// Create an image with a tightly packed stride
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel() as u32,
            format,
            data: data.into(),
        }
    }

    /// True if there are no pixels to look at
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }
}

impl std::fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// Hands a frame back to the source it came from
pub trait FrameReleaser: Send + Sync {
    fn release(&self, frame_id: u64) -> Result<(), ReleaseError>;
}

impl<F> FrameReleaser for F
where
    F: Fn(u64) -> Result<(), ReleaseError> + Send + Sync,
{
    fn release(&self, frame_id: u64) -> Result<(), ReleaseError> {
        self(frame_id)
    }
}

/// One captured frame
///
/// A frame is owned by whoever analyses it and goes back to its source exactly
/// once: [`Frame::release`] consumes the releaser, and dropping an unreleased
/// frame releases it.
pub struct Frame {
    id: u64,
    image: Option<FrameImage>,
    rotation: SensorRotation,
    captured_at: Instant,
    releaser: Option<Arc<dyn FrameReleaser>>,
}

impl Frame {
    pub fn new(id: u64, image: Option<FrameImage>, releaser: Arc<dyn FrameReleaser>) -> Self {
        Self {
            id,
            image,
            rotation: SensorRotation::None,
            captured_at: Instant::now(),
            releaser: Some(releaser),
        }
    }

    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pixel buffer, `None` if the frame has no extractable image
    pub fn image(&self) -> Option<&FrameImage> {
        self.image.as_ref().filter(|image| !image.is_empty())
    }

    pub fn rotation(&self) -> SensorRotation {
        self.rotation
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn is_released(&self) -> bool {
        self.releaser.is_none()
    }

    /// Return the frame to its source
    ///
    /// Calling this more than once does nothing. Release failures are logged,
    /// never propagated.
    pub fn release(&mut self) {
        let Some(releaser) = self.releaser.take() else {
            return;
        };
        match releaser.release(self.id) {
            Ok(()) => trace!(frame_id = self.id, "Frame released"),
            Err(e) => warn!(frame_id = self.id, error = %e, "Frame release failed"),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("image", &self.image)
            .field("rotation", &self.rotation)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_releaser() -> (Arc<AtomicU32>, Arc<dyn FrameReleaser>) {
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        let releaser: Arc<dyn FrameReleaser> = Arc::new(move |_id: u64| -> Result<(), ReleaseError> {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, releaser)
    }

    #[test]
    fn test_release_is_idempotent() {
        let (count, releaser) = counting_releaser();
        let mut frame = Frame::new(1, None, releaser);

        frame.release();
        frame.release();
        drop(frame);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let (count, releaser) = counting_releaser();
        drop(Frame::new(7, None, releaser));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_release_is_swallowed() {
        let releaser: Arc<dyn FrameReleaser> =
            Arc::new(|id: u64| -> Result<(), ReleaseError> { Err(ReleaseError::InvalidHandle(id)) });
        let mut frame = Frame::new(3, None, releaser);
        frame.release();
        assert!(frame.is_released());
    }

    #[test]
    fn test_empty_image_is_not_extractable() {
        let (_count, releaser) = counting_releaser();
        let empty = FrameImage::packed(0, 0, PixelFormat::RGBA, Vec::new());
        let frame = Frame::new(1, Some(empty), releaser);
        assert!(frame.image().is_none());
    }

    #[test]
    fn test_luma() {
        assert_eq!(PixelFormat::RGBA.luma(&[255, 255, 255, 255]), 255);
        assert_eq!(PixelFormat::BGRA.luma(&[0, 0, 0, 255]), 0);
        assert_eq!(PixelFormat::Gray8.luma(&[42]), 42);
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(SensorRotation::from_degrees_int(-90), SensorRotation::Rotate270);
        assert!(SensorRotation::from_degrees_int(90).swaps_dimensions());
        assert_eq!(SensorRotation::from_degrees_int(45), SensorRotation::None);
    }
}
