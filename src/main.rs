// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qr-scan")]
#[command(about = "Scan QR codes from image files through the camera analysis pipeline")]
#[command(version = env!("QR_SCAN_BUILD_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay images as camera frames and report every QR code found
    Scan {
        /// Image files, delivered in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Cool-down between decodes in milliseconds
        #[arg(long)]
        cooldown_ms: Option<u64>,

        /// Frame delivery rate (0 = as fast as frames are released)
        #[arg(long)]
        fps: Option<u32>,

        /// Pretend the frames come from the front camera
        #[arg(long)]
        front: bool,

        /// Start over after the last file until interrupted
        #[arg(long = "loop")]
        repeat: bool,

        /// Print one JSON object per result
        #[arg(long)]
        json: bool,

        /// Open the first link found with the desktop handler
        #[arg(long)]
        open: bool,

        /// Stop after the first successful scan
        #[arg(long)]
        once: bool,
    },

    /// Decode a single image without the pipeline
    Decode {
        /// Image file
        file: PathBuf,

        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the defaults to the config file
        #[arg(long)]
        reset: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qr_scan=trace, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            files,
            cooldown_ms,
            fps,
            front,
            repeat,
            json,
            open,
            once,
        } => cli::scan(
            files,
            cli::ScanOptions {
                cooldown_ms,
                fps,
                front,
                repeat,
                json,
                open,
                once,
            },
        ),
        Commands::Decode { file, json } => cli::decode(file, json),
        Commands::Config { reset } => Ok(cli::show_config(reset)?),
    }
}
