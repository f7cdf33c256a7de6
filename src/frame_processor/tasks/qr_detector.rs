// SPDX-License-Identifier: GPL-3.0-only

//! QR code decoder
//!
//! Converts frames to a luma plane, downscales large frames and hands the
//! result to `rqrr` for grid detection and decoding.

use crate::backends::camera::FrameImage;
use crate::constants::scanner;
use crate::errors::DecodeError;
use crate::pipelines::scan::{DecodeOutcome, Decoder};
use futures::future::BoxFuture;
use std::time::Instant;
use tracing::{debug, trace};

/// QR code decoder backed by `rqrr`
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDecoder {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self {
            max_dimension: scanner::DEFAULT_MAX_DIMENSION,
        }
    }

    /// Create a decoder with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}

impl Decoder for QrDecoder {
    fn decode<'a>(&'a self, image: &'a FrameImage) -> BoxFuture<'a, DecodeOutcome> {
        let image = image.clone();
        let max_dim = self.max_dimension;

        Box::pin(async move {
            // CPU-bound; keep it off the analysis worker's event loop
            tokio::task::spawn_blocking(move || decode_image(&image, max_dim))
                .await
                .unwrap_or_else(|e| Err(DecodeError::new(format!("QR detection task failed: {}", e))))
        })
    }
}

/// Synchronous QR decoding
///
/// Returns every payload that decoded. A frame where grids were found but
/// none could be read is a failure; a frame without grids is simply empty.
pub fn decode_image(image: &FrameImage, max_dimension: u32) -> DecodeOutcome {
    let start = Instant::now();

    if image.is_empty() {
        trace!(
            width = image.width,
            height = image.height,
            "Nothing to decode in an empty image"
        );
        return Ok(Vec::new());
    }

    let (luma, width, height) = if image.width > max_dimension || image.height > max_dimension {
        let scale = (image.width as f32 / max_dimension as f32)
            .max(image.height as f32 / max_dimension as f32);
        let new_width = ((image.width as f32 / scale) as u32).max(1);
        let new_height = ((image.height as f32 / scale) as u32).max(1);
        (downscale_luma(image, new_width, new_height), new_width, new_height)
    } else {
        (luma_plane(image), image.width, image.height)
    };

    trace!(
        width,
        height,
        conversion_ms = start.elapsed().as_millis(),
        "Prepared luma plane"
    );

    let row = width as usize;
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            luma[y * row + x]
        });
    let grids = prepared.detect_grids();

    let mut payloads = Vec::with_capacity(grids.len());
    let mut first_error = None;
    for grid in &grids {
        match grid.decode() {
            Ok((meta, content)) => {
                debug!(version = meta.version.0, content = %content, "Decoded QR code");
                payloads.push(content);
            }
            Err(e) => {
                debug!(error = ?e, "Failed to decode QR grid");
                first_error.get_or_insert_with(|| format!("{:?}", e));
            }
        }
    }

    debug!(
        grids = grids.len(),
        payloads = payloads.len(),
        total_ms = start.elapsed().as_millis(),
        "QR decode complete"
    );

    match first_error {
        Some(err) if payloads.is_empty() => Err(DecodeError::new(format!(
            "QR code found but could not be read: {}",
            err
        ))),
        _ => Ok(payloads),
    }
}

/// Luma plane without stride padding
fn luma_plane(image: &FrameImage) -> Vec<u8> {
    let width = image.width as usize;
    let height = image.height as usize;
    let stride = image.stride as usize;
    let bpp = image.format.bytes_per_pixel();

    let mut result = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let offset = y * stride + x * bpp;
            let value = image
                .data
                .get(offset..offset + bpp)
                .map(|px| image.format.luma(px))
                .unwrap_or(0);
            result.push(value);
        }
    }
    result
}

/// Downscale to a luma plane using bilinear interpolation
fn downscale_luma(image: &FrameImage, dst_width: u32, dst_height: u32) -> Vec<u8> {
    let src_width = image.width as usize;
    let src_height = image.height as usize;
    let stride = image.stride as usize;
    let bpp = image.format.bytes_per_pixel();

    let sample = |px: usize, py: usize| -> f32 {
        let offset = py * stride + px * bpp;
        image
            .data
            .get(offset..offset + bpp)
            .map(|p| image.format.luma(p) as f32)
            .unwrap_or(0.0)
    };

    let x_ratio = src_width as f32 / dst_width as f32;
    let y_ratio = src_height as f32 / dst_height as f32;
    let mut result = Vec::with_capacity((dst_width * dst_height) as usize);

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = src_x as usize;
            let y0 = src_y as usize;
            let x1 = (x0 + 1).min(src_width - 1);
            let y1 = (y0 + 1).min(src_height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let value = sample(x0, y0) * (1.0 - x_frac) * (1.0 - y_frac)
                + sample(x1, y0) * x_frac * (1.0 - y_frac)
                + sample(x0, y1) * (1.0 - x_frac) * y_frac
                + sample(x1, y1) * x_frac * y_frac;

            result.push(value as u8);
        }
    }

    result
}
