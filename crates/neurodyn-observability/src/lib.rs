// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurodyn-observability
//!
//! Logging bootstrap shared by every neurodyn binary and test harness, with
//! per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: daily-rolling log file next to the console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

// Re-export commonly used items
pub use cli::*;
pub use init::*;

/// Known neurodyn crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "neurodyn",
    "neurodyn-config",
    "neurodyn-npu-neural",
    "neurodyn-npu-plasticity",
];
