// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────────┐     ┌──────────────┐
//! │ Frame Source │ ──▶ │  Scan Pipeline        │ ──▶ │ Result Sink  │
//! │ (camera or   │     │  - Rate limited decode│     │ (Success /   │
//! │  image files)│     │  - Delayed release    │     │  Error)      │
//! └──────────────┘     └───────────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`scan`]: Lifecycle-bound QR scanning over a single analysis worker

pub mod scan;
