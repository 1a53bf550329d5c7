// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration data structures
//!
//! Mirror the sections of `feagi_ops.toml`. Every section implements
//! `Default`, and `#[serde(default)]` lets a file specify only what it
//! changes.

use crate::ConfigError;
use feagi_ops_core::Platform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub runtime: RuntimeSection,
    pub extensions: ExtensionsSection,
    pub logging: LoggingSection,
}

/// `[runtime]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Platform used when a caller does not name one
    pub default_platform: Platform,
    /// What event-driven operators do when the acceleration extension is missing
    pub event_fallback: EventFallback,
    /// Whether extensions compiled into the binary are offered to the loader
    pub link_builtin_extensions: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            default_platform: Platform::Cpu,
            event_fallback: EventFallback::Error,
            link_builtin_extensions: true,
        }
    }
}

/// Degradation policy for operators that need a native extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFallback {
    /// Fail with a capability error
    #[default]
    Error,
    /// Compute the same result with the pure graph implementation
    Graph,
}

impl fmt::Display for EventFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventFallback::Error => f.write_str("error"),
            EventFallback::Graph => f.write_str("graph"),
        }
    }
}

impl FromStr for EventFallback {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(EventFallback::Error),
            "graph" => Ok(EventFallback::Graph),
            other => Err(ConfigError::InvalidValue(format!(
                "event_fallback must be \"error\" or \"graph\", got \"{}\"",
                other
            ))),
        }
    }
}

/// `[extensions]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionsSection {
    /// Directories probed for extension shared libraries, in order
    pub search_paths: Vec<PathBuf>,
    /// Extensions the runtime knows how to gate (added to the built-in list)
    pub required: Vec<ExtensionRequirement>,
}

/// `[[extensions.required]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequirement {
    pub name: String,
    pub min_version: String,
    #[serde(default)]
    pub install_hint: String,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// trace | debug | info | warn | error
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: OpsConfig = toml::from_str(
            r#"
            [runtime]
            event_fallback = "graph"
            "#,
        )
        .unwrap();
        assert_eq!(config.runtime.event_fallback, EventFallback::Graph);
        assert_eq!(config.runtime.default_platform, Platform::Cpu);
        assert!(config.runtime.link_builtin_extensions);
        assert_eq!(config.logging.level, "info");
        assert!(config.extensions.required.is_empty());
    }

    #[test]
    fn test_required_extensions_table() {
        let config: OpsConfig = toml::from_str(
            r#"
            [extensions]
            search_paths = ["./target/release"]

            [[extensions.required]]
            name = "feagi_ops_accel"
            min_version = "0.1.0"
            install_hint = "cargo build -p feagi-ops-accel --release"
            "#,
        )
        .unwrap();
        assert_eq!(config.extensions.search_paths, vec![PathBuf::from("./target/release")]);
        assert_eq!(config.extensions.required[0].name, "feagi_ops_accel");
    }

    #[test]
    fn test_event_fallback_parse() {
        assert_eq!("GRAPH".parse::<EventFallback>().unwrap(), EventFallback::Graph);
        assert!("retry".parse::<EventFallback>().is_err());
    }

    #[test]
    fn test_json_roundtrip_of_platform() {
        let json = serde_json::to_string(&RuntimeSection::default()).unwrap();
        assert!(json.contains("\"cpu\""));
    }
}
