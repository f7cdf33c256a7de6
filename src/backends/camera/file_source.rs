// SPDX-License-Identifier: GPL-3.0-only

//! Image file frame source
//!
//! Replays still images as if they came from a camera. Only one frame is
//! outstanding at a time: the next image is delivered once the previous frame
//! came back through its releaser, so the analysis cool-down paces delivery
//! the same way it paces a real camera's analysis stream.

use super::types::{Frame, FrameImage, FrameReleaser, PixelFormat, SensorRotation};
use super::FrameSource;
use crate::constants::{LensFacing, file_formats, scanner, timing};
use crate::errors::{ReleaseError, SourceError};
use crate::pipelines::scan::FrameAnalysisPipeline;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Load an image file as a frame buffer
pub fn load_image(path: &Path) -> Result<FrameImage, SourceError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !file_formats::is_image_extension(&extension) {
        return Err(SourceError::Unsupported(format!(
            "file format '{}' ({})",
            extension,
            path.display()
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        SourceError::Decode(format!("failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    debug!(width, height, "Image loaded");
    Ok(FrameImage::packed(
        width,
        height,
        PixelFormat::RGBA,
        rgba.into_raw(),
    ))
}

/// Replays a fixed list of images as frames
pub struct ImageFileSource {
    images: Arc<Vec<FrameImage>>,
    lens_facing: LensFacing,
    rotation: SensorRotation,
    frame_interval: Option<Duration>,
    repeat: bool,
    cursor: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
    release_tx: Sender<u64>,
    release_rx: Arc<Mutex<Receiver<u64>>>,
    delivery: Option<Delivery>,
}

struct Delivery {
    stop_signal: Arc<AtomicBool>,
    thread_handle: JoinHandle<()>,
}

impl ImageFileSource {
    /// Load every path up front
    pub fn open(paths: &[PathBuf], lens_facing: LensFacing) -> Result<Self, SourceError> {
        if paths.is_empty() {
            return Err(SourceError::NoFrames);
        }
        let images = paths
            .iter()
            .map(|path| load_image(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_images(images, lens_facing))
    }

    pub fn from_images(images: Vec<FrameImage>, lens_facing: LensFacing) -> Self {
        let (release_tx, release_rx) = mpsc::channel();
        Self {
            images: Arc::new(images),
            lens_facing,
            rotation: SensorRotation::None,
            frame_interval: None,
            repeat: false,
            cursor: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicU64::new(1)),
            exhausted: Arc::new(AtomicBool::new(false)),
            release_tx,
            release_rx: Arc::new(Mutex::new(release_rx)),
            delivery: None,
        }
    }

    /// Minimum time between two deliveries
    pub fn with_frame_interval(mut self, interval: Option<Duration>) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Start over after the last image instead of stopping
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_rotation(mut self, rotation: SensorRotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// True once every image was delivered and came back
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// Shared flag that flips when the source runs out of images
    pub fn exhausted_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exhausted)
    }

    /// Number of frames handed out so far
    pub fn frames_delivered(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    fn releaser(&self) -> Arc<dyn FrameReleaser> {
        let tx = self.release_tx.clone();
        Arc::new(move |frame_id: u64| -> Result<(), ReleaseError> {
            tx.send(frame_id).map_err(|_| ReleaseError::SourceClosed)
        })
    }
}

impl FrameSource for ImageFileSource {
    fn lens_facing(&self) -> LensFacing {
        self.lens_facing
    }

    fn subscribe(&mut self, pipeline: Arc<FrameAnalysisPipeline>) -> Result<(), SourceError> {
        if self.delivery.is_some() {
            return Err(SourceError::AlreadySubscribed);
        }
        if self.images.is_empty() {
            return Err(SourceError::NoFrames);
        }

        let stop_signal = Arc::new(AtomicBool::new(false));
        let loop_state = DeliveryLoop {
            images: Arc::clone(&self.images),
            rotation: self.rotation,
            frame_interval: self.frame_interval,
            repeat: self.repeat,
            cursor: Arc::clone(&self.cursor),
            next_id: Arc::clone(&self.next_id),
            exhausted: Arc::clone(&self.exhausted),
            release_rx: Arc::clone(&self.release_rx),
            releaser: self.releaser(),
            stop_signal: Arc::clone(&stop_signal),
        };

        let thread_handle = thread::Builder::new()
            .name(scanner::SOURCE_THREAD_NAME.to_string())
            .spawn(move || loop_state.run(pipeline))
            .map_err(|e| SourceError::Io(format!("failed to spawn delivery thread: {}", e)))?;

        info!(images = self.images.len(), lens = %self.lens_facing, "Image file source started");
        self.delivery = Some(Delivery {
            stop_signal,
            thread_handle,
        });
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let Some(delivery) = self.delivery.take() else {
            return;
        };

        debug!("Stopping image file source");
        delivery.stop_signal.store(true, Ordering::SeqCst);
        if let Err(e) = delivery.thread_handle.join() {
            warn!("Image file source thread panicked: {:?}", e);
        }
    }
}

impl Drop for ImageFileSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Everything the delivery thread needs
struct DeliveryLoop {
    images: Arc<Vec<FrameImage>>,
    rotation: SensorRotation,
    frame_interval: Option<Duration>,
    repeat: bool,
    cursor: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
    exhausted: Arc<AtomicBool>,
    release_rx: Arc<Mutex<Receiver<u64>>>,
    releaser: Arc<dyn FrameReleaser>,
    stop_signal: Arc<AtomicBool>,
}

impl DeliveryLoop {
    fn run(self, pipeline: Arc<FrameAnalysisPipeline>) {
        debug!("Image file source thread started");
        let mut last_delivery: Option<Instant> = None;

        while !self.stopped() {
            let mut index = self.cursor.load(Ordering::SeqCst);
            if index >= self.images.len() {
                if !self.repeat {
                    self.exhausted.store(true, Ordering::SeqCst);
                    info!("Image file source exhausted");
                    break;
                }
                index = 0;
            }

            if let (Some(interval), Some(last)) = (self.frame_interval, last_delivery) {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }

            let frame_id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let frame = Frame::new(
                frame_id,
                Some(self.images[index].clone()),
                Arc::clone(&self.releaser),
            )
            .with_rotation(self.rotation);

            self.cursor.store(index + 1, Ordering::SeqCst);
            last_delivery = Some(Instant::now());

            if frame_id % timing::FRAME_LOG_INTERVAL == 0 {
                debug!(frame_id, index, "Delivering frame");
            }
            pipeline.submit(frame);

            if !self.wait_for_release(frame_id) {
                break;
            }
        }

        debug!("Image file source thread exiting");
    }

    /// Block until `frame_id` comes back; `false` if asked to stop first
    fn wait_for_release(&self, frame_id: u64) -> bool {
        let rx = self.release_rx.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.stopped() {
                return false;
            }
            match rx.recv_timeout(timing::RELEASE_POLL_INTERVAL) {
                Ok(id) if id == frame_id => return true,
                // Stale release from an earlier subscription
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn stopped(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_unknown_extension() {
        let err = load_image(Path::new("clip.mp4")).unwrap_err();
        assert!(matches!(err, SourceError::Unsupported(_)));
    }

    #[test]
    fn test_open_missing_file() {
        let err = load_image(Path::new("/nonexistent/qr.png")).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn test_open_without_paths() {
        let err = ImageFileSource::open(&[], LensFacing::Back).err();
        assert_eq!(err, Some(SourceError::NoFrames));
    }

    #[test]
    fn test_load_png_round_trip() {
        let dir = std::env::temp_dir().join(format!("qr-scan-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("white.png");
        image::RgbaImage::from_pixel(4, 3, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();

        let frame = load_image(&path).unwrap();
        assert_eq!((frame.width, frame.height, frame.stride), (4, 3, 16));
        assert_eq!(frame.data.len(), 48);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_torch_unsupported() {
        let mut source = ImageFileSource::from_images(Vec::new(), LensFacing::Back);
        assert!(matches!(
            source.set_torch(true),
            Err(SourceError::Unsupported(_))
        ));
    }
}
