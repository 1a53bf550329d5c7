// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures extension requirements are well-formed and the logging level is
//! one `tracing` understands.

use crate::{ConfigError, ConfigResult, OpsConfig};
use feagi_ops_core::ExtensionVersion;
use std::collections::HashSet;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    Duplicate { field: String, value: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::Duplicate { field, value } => {
                write!(f, "Duplicate value \"{}\" in {}", value, field)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &OpsConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_extensions(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_extensions(config: &OpsConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();
    for (i, requirement) in config.extensions.required.iter().enumerate() {
        let field = format!("extensions.required[{}]", i);
        if requirement.name.trim().is_empty() {
            errors.push(ConfigValidationError::MissingRequired {
                field: format!("{}.name", field),
            });
            continue;
        }
        if !seen.insert(requirement.name.as_str()) {
            errors.push(ConfigValidationError::Duplicate {
                field: "extensions.required".to_string(),
                value: requirement.name.clone(),
            });
        }
        if let Err(e) = requirement.min_version.parse::<ExtensionVersion>() {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("{}.min_version", field),
                reason: e.to_string(),
            });
        }
    }
}

fn validate_logging(config: &OpsConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("\"{}\" is not one of {:?}", config.logging.level, LOG_LEVELS),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtensionRequirement;

    fn requirement(name: &str, version: &str) -> ExtensionRequirement {
        ExtensionRequirement {
            name: name.to_string(),
            min_version: version.to_string(),
            install_hint: String::new(),
        }
    }

    #[test]
    fn test_rejects_unparsable_version() {
        let mut config = OpsConfig::default();
        config.extensions.required.push(requirement("ext", "one.two"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("min_version"));
    }

    #[test]
    fn test_rejects_duplicate_and_empty_names() {
        let mut config = OpsConfig::default();
        config.extensions.required.push(requirement("ext", "0.1.0"));
        config.extensions.required.push(requirement("ext", "0.2.0"));
        config.extensions.required.push(requirement(" ", "0.1.0"));
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("Duplicate"));
        assert!(msg.contains("Missing required"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let mut config = OpsConfig::default();
        config.logging.level = "loud".to_string();
        assert!(validate_config(&config).is_err());
        config.logging.level = "DEBUG".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
