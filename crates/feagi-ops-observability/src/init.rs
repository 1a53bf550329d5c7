// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console logging is always available. With the `file-logging` feature,
//! [`init_file_logging`] also writes a JSON log into a timestamped run folder.

use anyhow::{anyhow, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Build the filter from `RUST_LOG` if set, otherwise from the debug flags
pub fn build_filter(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var("RUST_LOG") {
        if !directives.trim().is_empty() {
            return EnvFilter::try_new(directives).map_err(|e| anyhow!("invalid RUST_LOG: {}", e));
        }
    }
    let filter = debug_flags.to_filter_string(default_level);
    EnvFilter::try_new(&filter).map_err(|e| anyhow!("invalid log filter \"{}\": {}", filter, e))
}

/// Initialize console logging
///
/// Returns an error if a global subscriber is already installed, so callers
/// that may initialize twice (tests, embedding hosts) can ignore it.
pub fn init_logging(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<()> {
    let env_filter = build_filter(debug_flags, default_level)?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter);

    Registry::default()
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}

#[cfg(feature = "file-logging")]
pub use file::{init_file_logging, LoggingGuard};

#[cfg(feature = "file-logging")]
mod file {
    use super::*;
    use anyhow::Context;
    use chrono::Utc;
    use std::path::{Path, PathBuf};
    use tracing_appender::rolling;

    /// Keeps the non-blocking writer alive; logs are flushed on drop
    pub struct LoggingGuard {
        _file_guard: tracing_appender::non_blocking::WorkerGuard,
        log_dir: PathBuf,
    }

    impl LoggingGuard {
        pub fn log_dir(&self) -> &Path {
            &self.log_dir
        }
    }

    /// Initialize console logging plus a combined JSON log file
    ///
    /// ```text
    /// ./logs/
    ///   └── run_20250101_120000/
    ///       └── feagi-ops.log
    /// ```
    pub fn init_file_logging(
        debug_flags: &CrateDebugFlags,
        default_level: &str,
        log_dir: Option<PathBuf>,
    ) -> Result<LoggingGuard> {
        let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let run_folder = base_log_dir.join(format!("run_{}", timestamp));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(build_filter(debug_flags, default_level)?)
            .boxed();

        let appender = rolling::never(&run_folder, "feagi-ops.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(build_filter(debug_flags, default_level)?)
            .boxed();

        Registry::default()
            .with(vec![console_layer, file_layer])
            .try_init()
            .map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))?;

        Ok(LoggingGuard {
            _file_guard: guard,
            log_dir: run_folder,
        })
    }
}
