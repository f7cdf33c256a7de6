// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=QR_SCAN_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("QR_SCAN_VERSION").unwrap_or_else(|_| build_version());
    println!("cargo::rustc-env=QR_SCAN_BUILD_VERSION={}", version);
}

/// Crate version, with the short commit hash when built from a checkout
fn build_version() -> String {
    let package = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    match commit_hash() {
        Some(hash) => format!("{}-{}", package, hash),
        None => package,
    }
}

fn commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|hash| !hash.is_empty())
}
