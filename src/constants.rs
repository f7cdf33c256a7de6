// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which physical camera supplies frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// User-facing camera
    Front,
    /// World-facing camera (default for scanning)
    #[default]
    Back,
}

impl LensFacing {
    /// Get display name for the lens
    pub fn display_name(&self) -> &'static str {
        match self {
            LensFacing::Front => "Front",
            LensFacing::Back => "Back",
        }
    }

    /// Whether a torch is expected next to this lens
    ///
    /// Front cameras don't carry a flash LED.
    pub fn has_torch(&self) -> bool {
        matches!(self, LensFacing::Back)
    }
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Cool-down between decode completion and frame release
    pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(300);

    /// Default frame rate for replayed sources
    pub const DEFAULT_FRAME_RATE: u32 = 30;

    /// How long the file source waits for a release before re-checking its stop signal
    pub const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Scanner tuning constants
pub mod scanner {
    /// Frames are downscaled to this maximum dimension before QR detection
    pub const DEFAULT_MAX_DIMENSION: u32 = 640;

    /// Name of the background analysis thread
    pub const WORKER_THREAD_NAME: &str = "qr-scan-analysis";

    /// Name of the file source delivery thread
    pub const SOURCE_THREAD_NAME: &str = "qr-scan-file-source";
}

/// Supported file formats for the image file source
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("PNG"));
        assert!(file_formats::is_image_extension("jpeg"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
