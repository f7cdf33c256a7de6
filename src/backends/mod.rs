// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for frame capture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             Scan Pipeline                    │
//! └────────────────────▲────────────────────────┘
//!                      │ Frame (released exactly once)
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │ FrameSource trait│  │ ImageFileSource │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Frame types, the source contract and the image-file source

pub mod camera;
