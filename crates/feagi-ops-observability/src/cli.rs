// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-feagi-ops-runtime` to raise one crate to
//! `debug` while the rest stay at the configured level.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Crates raised to `debug`, kept sorted
///
/// # Example
/// ```rust
/// use feagi_ops_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-ops-runtime".to_string()]);
/// assert!(flags.is_enabled("feagi-ops-runtime"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    enabled: BTreeSet<&'static str>,
}

impl CrateDebugFlags {
    /// Collect `--debug-<crate>` and `--debug-all`; other arguments are ignored
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = Self::default();
        for arg in args {
            match arg.strip_prefix("--debug-") {
                Some("all") => flags.enable_all(),
                Some(name) => {
                    flags.enable(name);
                }
                None => {}
            }
        }
        flags
    }

    /// Enable one crate; returns `false` for names outside [`KNOWN_CRATES`]
    pub fn enable(&mut self, crate_name: &str) -> bool {
        match KNOWN_CRATES.iter().find(|&&known| known == crate_name) {
            Some(&known) => {
                self.enabled.insert(known);
                true
            }
            None => false,
        }
    }

    pub fn enable_all(&mut self) {
        self.enabled.extend(KNOWN_CRATES.iter().copied());
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled.contains(crate_name)
    }

    pub fn enabled_crates(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.enabled.iter().copied()
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled.is_empty()
    }

    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// `EnvFilter` directives, e.g. `"feagi-ops-runtime=debug,info"`.
    ///
    /// Every crate logs with an explicit `target:` equal to its crate name.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        self.enabled
            .iter()
            .map(|name| format!("{}=debug", name))
            .chain(std::iter::once(default_level.to_lowercase()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Debug flags from the process arguments plus `FEAGI_OPS_DEBUG`
/// (comma-separated crate names, or `all`)
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var("FEAGI_OPS_DEBUG") {
        apply_debug_env(&mut flags, &value);
    }
    flags
}

fn apply_debug_env(flags: &mut CrateDebugFlags, value: &str) {
    for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if name == "all" {
            flags.enable_all();
        } else {
            flags.enable(name);
        }
    }
}

/// Usage text for `--help` output of binaries embedding the runtime
pub fn debug_flags_help() -> String {
    let mut help = String::from("Debug flags:\n  --debug-all\n");
    for name in KNOWN_CRATES {
        help.push_str(&format!("  --debug-{}\n", name));
    }
    help.push_str(
        "\nEnvironment:\n  FEAGI_OPS_DEBUG=<crate>[,<crate>] | all\n  FEAGI_OPS_TRACE_KERNELS=1   log every compiled kernel call\n",
    );
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-ops-runtime".to_string()]);
        assert!(flags.is_enabled("feagi-ops-runtime"));
        assert!(!flags.is_enabled("feagi-ops-operators"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_filter_string_uses_crate_targets() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-ops-runtime".to_string()]);
        assert_eq!(flags.to_filter_string("WARN"), "feagi-ops-runtime=debug,warn");
        assert_eq!(CrateDebugFlags::default().to_filter_string("info"), "info");
    }

    #[test]
    fn test_env_value_parsing() {
        let mut flags = CrateDebugFlags::default();
        apply_debug_env(&mut flags, " feagi-ops-core , ,feagi-ops-accel");
        assert!(flags.is_enabled("feagi-ops-core"));
        assert!(flags.is_enabled("feagi-ops-accel"));
        assert_eq!(flags.enabled_crates().count(), 2);
    }

    #[test]
    fn test_unknown_crates_are_ignored() {
        let mut flags = CrateDebugFlags::from_args(vec!["--debug-feagi-bdu".to_string(), "--verbose".to_string()]);
        assert!(!flags.any_enabled());
        assert!(!flags.enable("tokio"));
        assert!(debug_flags_help().contains("--debug-feagi-ops-operators"));
    }

    #[test]
    fn test_log_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-feagi-ops-core".to_string()]);
        assert_eq!(flags.log_level("feagi-ops-core"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("feagi-ops-runtime"), tracing::Level::INFO);
    }
}
