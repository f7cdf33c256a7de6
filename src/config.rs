// SPDX-License-Identifier: GPL-3.0-only

//! Scanner configuration
//!
//! Stored as JSON under the user's config directory. Every field has a
//! default, so a missing file or a partial file both load cleanly.

use crate::constants::{LensFacing, scanner, timing};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "qr-scan";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Delay between decode completion and frame release, in milliseconds
    pub cooldown_ms: u64,
    /// Camera to scan with
    pub lens_facing: LensFacing,
    /// Delivery rate of replayed sources
    pub frame_rate: u32,
    /// Frames larger than this are downscaled before detection
    pub max_dimension: u32,
    /// Replay file sources forever instead of stopping after the last file
    pub loop_source: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: timing::DEFAULT_COOLDOWN.as_millis() as u64,
            lens_facing: LensFacing::default(),
            frame_rate: timing::DEFAULT_FRAME_RATE,
            max_dimension: scanner::DEFAULT_MAX_DIMENSION,
            loop_source: false,
        }
    }
}

impl ScannerConfig {
    /// Cool-down as a duration
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Interval between replayed frames, `None` means as fast as released
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.frame_rate > 0).then(|| Duration::from_secs_f64(1.0 / self.frame_rate as f64))
    }

    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::Io("no config directory on this platform".to_string())
        })?;
        self.save_to(&path)
    }

    /// Load from a file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded scanner config");
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), "Saved scanner config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cooldown() {
        let config = ScannerConfig::default();
        assert_eq!(config.cooldown(), Duration::from_millis(300));
        assert_eq!(config.lens_facing, LensFacing::Back);
    }

    #[test]
    fn test_frame_interval() {
        let mut config = ScannerConfig {
            frame_rate: 10,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Some(Duration::from_millis(100)));

        config.frame_rate = 0;
        assert_eq!(config.frame_interval(), None);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{"cooldown_ms": 120, "lens_facing": "front"}"#).unwrap();
        assert_eq!(config.cooldown_ms, 120);
        assert_eq!(config.lens_facing, LensFacing::Front);
        assert_eq!(config.max_dimension, scanner::DEFAULT_MAX_DIMENSION);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let config: ScannerConfig =
            serde_json::from_str(r#"{"locale": "de", "frame_rate": 5}"#).unwrap();
        assert_eq!(config.frame_rate, 5);
    }
}
