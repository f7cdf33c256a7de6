// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Scanning image files through a full scan session
//! - Decoding a single image directly
//! - Showing the scanner configuration

use chrono::Local;
use qr_scan::backends::camera::file_source::load_image;
use qr_scan::errors::{AppError, AppResult};
use qr_scan::frame_processor::qr_detector::decode_image;
use qr_scan::{
    ImageFileSource, LensFacing, PayloadKind, QrDecoder, ScanResult, ScanSession, ScannerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{info, warn};

/// How often the result loop checks for Ctrl+C and source exhaustion
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Flags of the `scan` subcommand
pub struct ScanOptions {
    pub cooldown_ms: Option<u64>,
    pub fps: Option<u32>,
    pub front: bool,
    pub repeat: bool,
    pub json: bool,
    pub open: bool,
    pub once: bool,
}

impl ScanOptions {
    /// Layer the command-line flags over the stored config
    fn apply(&self, config: &mut ScannerConfig) {
        if let Some(cooldown_ms) = self.cooldown_ms {
            config.cooldown_ms = cooldown_ms;
        }
        if let Some(fps) = self.fps {
            config.frame_rate = fps;
        }
        if self.front {
            config.lens_facing = LensFacing::Front;
        }
        if self.repeat {
            config.loop_source = true;
        }
    }
}

/// Run a scan session over image files until they run out or Ctrl+C
pub fn scan(files: Vec<PathBuf>, options: ScanOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config();
    options.apply(&mut config);

    let source = ImageFileSource::open(&files, config.lens_facing)?
        .with_frame_interval(config.frame_interval())
        .with_repeat(config.loop_source);
    let exhausted = source.exhausted_signal();

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    let (sender, receiver) = mpsc::channel::<ScanResult>();
    let mut session = ScanSession::builder()
        .source(source)
        .decoder(QrDecoder::with_max_dimension(config.max_dimension))
        .sink(sender)
        .config(config)
        .build();

    eprintln!(
        "Scanning {} file(s), cool-down {} ms (Ctrl+C to stop)",
        files.len(),
        session.config().cooldown_ms
    );
    session.on_active()?;

    let mut opened = !options.open;
    loop {
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(result) => {
                report(&result, options.json)?;
                if result.is_success() {
                    if !opened {
                        opened = open_link(result.value());
                    }
                    if options.once {
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if interrupted.load(Ordering::SeqCst) {
                    eprintln!("Interrupted");
                    break;
                }
                if exhausted.load(Ordering::SeqCst) {
                    // Results of the last frame are emitted before it is released
                    for result in receiver.try_iter() {
                        report(&result, options.json)?;
                    }
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.on_terminated();
    let stats = session.stats();
    eprintln!(
        "Frames: {} submitted, {} analysed, {} ignored; results: {} found, {} errors",
        stats.submitted, stats.analysed, stats.ignored, stats.successes, stats.errors
    );

    Ok(())
}

/// Decode one image directly, bypassing the session
pub fn decode(file: PathBuf, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();
    let image = load_image(&file)?;
    let payloads = decode_image(&image, config.max_dimension)?;

    if payloads.is_empty() {
        eprintln!("No QR code found in {}", file.display());
        return Ok(());
    }

    for payload in payloads {
        report(&ScanResult::Success(payload), json)?;
    }
    Ok(())
}

/// Print the config file location and its effective values
pub fn show_config(reset: bool) -> AppResult<()> {
    let path = ScannerConfig::default_path();

    let config = if reset {
        let config = ScannerConfig::default();
        config.save()?;
        println!("Config reset to defaults");
        config
    } else {
        load_config()
    };

    match path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| AppError::Other(format!("failed to format config: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn load_config() -> ScannerConfig {
    ScannerConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ScannerConfig::default()
    })
}

/// Print one result as a line of text or JSON
fn report(result: &ScanResult, json: bool) -> Result<(), serde_json::Error> {
    let timestamp = Local::now();
    let kind = result
        .is_success()
        .then(|| PayloadKind::parse(result.value()));

    if json {
        let line = serde_json::json!({
            "timestamp": timestamp.to_rfc3339(),
            "result": result,
            "payload": kind,
        });
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    let time = timestamp.format("%H:%M:%S%.3f");
    match (result, kind) {
        (ScanResult::Success(value), Some(kind)) => {
            println!("[{}] {}: {}", time, kind.label(), value)
        }
        (ScanResult::Success(value), None) => println!("[{}] {}", time, value),
        (ScanResult::Error(message), _) => println!("[{}] error: {}", time, message),
    }
    Ok(())
}

/// Hand a payload to the desktop, returns whether something was opened
fn open_link(payload: &str) -> bool {
    let Some(link) = PayloadKind::parse(payload).openable_link() else {
        return false;
    };

    match open::that_detached(&link) {
        Ok(()) => {
            info!(link = %link, "Opened scanned link");
            true
        }
        Err(e) => {
            warn!(link = %link, error = %e, "Failed to open link");
            false
        }
    }
}
