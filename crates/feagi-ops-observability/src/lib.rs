// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # feagi-ops-observability
//!
//! Logging setup shared by binaries and tests that embed the native-operator
//! runtime, with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: JSON log files in timestamped run folders

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Crate names accepted by `--debug-<crate>` and `FEAGI_OPS_DEBUG`
pub const KNOWN_CRATES: &[&str] = &[
    "feagi-ops",
    "feagi-ops-core",
    "feagi-ops-config",
    "feagi-ops-runtime",
    "feagi-ops-accel",
    "feagi-ops-operators",
];
