// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, EventFallback, OpsConfig};
use feagi_ops_core::Platform;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for when no explicit path is given
pub const CONFIG_FILE_NAME: &str = "feagi_ops.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `FEAGI_OPS_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("FEAGI_OPS_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        } else {
            return Err(ConfigError::FileNotFound(format!(
                "Config file specified by FEAGI_OPS_CONFIG_PATH not found: {}",
                path.display()
            )));
        }
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet FEAGI_OPS_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file, apply overrides, validate
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<OpsConfig> {
    let config_file = if let Some(path) = config_path {
        path.to_path_buf()
    } else {
        find_config_file()?
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: OpsConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    validate_config(&config)?;
    Ok(config)
}

/// Like [`load_config`], but falls back to defaults when no file is found.
///
/// Environment and CLI overrides still apply to the defaults.
pub fn load_config_or_default(cli_args: Option<&HashMap<String, String>>) -> ConfigResult<OpsConfig> {
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) if env::var("FEAGI_OPS_CONFIG_PATH").is_err() => {
            let mut config = OpsConfig::default();
            apply_environment_overrides(&mut config)?;
            if let Some(cli) = cli_args {
                apply_cli_overrides(&mut config, cli)?;
            }
            validate_config(&config)?;
            Ok(config)
        }
        Err(e) => Err(e),
    }
}

fn parse_platform(value: &str) -> ConfigResult<Platform> {
    value
        .parse::<Platform>()
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))
}

fn prepend_search_paths(config: &mut OpsConfig, value: &str) {
    let mut paths: Vec<PathBuf> = env::split_paths(value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect();
    paths.append(&mut config.extensions.search_paths);
    config.extensions.search_paths = paths;
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `FEAGI_OPS_PLATFORM` -> `runtime.default_platform`
/// - `FEAGI_OPS_EVENT_FALLBACK` -> `runtime.event_fallback`
/// - `FEAGI_OPS_EXTENSION_PATH` -> prepended to `extensions.search_paths`
/// - `FEAGI_OPS_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut OpsConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("FEAGI_OPS_PLATFORM") {
        config.runtime.default_platform = parse_platform(&value)?;
    }
    if let Ok(value) = env::var("FEAGI_OPS_EVENT_FALLBACK") {
        config.runtime.event_fallback = value.parse::<EventFallback>()?;
    }
    if let Ok(value) = env::var("FEAGI_OPS_EXTENSION_PATH") {
        prepend_search_paths(config, &value);
    }
    if let Ok(value) = env::var("FEAGI_OPS_LOG_LEVEL") {
        config.logging.level = value;
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - e.g. `{"platform": "cpu", "event_fallback": "graph", "log_level": "debug"}`
pub fn apply_cli_overrides(
    config: &mut OpsConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("platform") {
        config.runtime.default_platform = parse_platform(value)?;
    }
    if let Some(value) = cli_args.get("event_fallback") {
        config.runtime.event_fallback = value.parse::<EventFallback>()?;
    }
    if let Some(value) = cli_args.get("extension_path") {
        prepend_search_paths(config, value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 4] = [
        "FEAGI_OPS_PLATFORM",
        "FEAGI_OPS_EVENT_FALLBACK",
        "FEAGI_OPS_EXTENSION_PATH",
        "FEAGI_OPS_LOG_LEVEL",
    ];

    fn clear_overrides() {
        for var in OVERRIDE_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_ops.toml");
        File::create(&config_path).unwrap();

        env::set_var("FEAGI_OPS_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("FEAGI_OPS_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_an_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("FEAGI_OPS_CONFIG_PATH", "/definitely/not/here/feagi_ops.toml");
        let result = load_config_or_default(None);
        env::remove_var("FEAGI_OPS_CONFIG_PATH");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
[runtime]
default_platform = "cpu"
event_fallback = "graph"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = load_config(Some(&config_path), None).unwrap();
        assert_eq!(config.runtime.event_fallback, EventFallback::Graph);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_toml_reports_parse_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[runtime\nbroken").unwrap();
        assert!(matches!(
            load_config(Some(&config_path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let mut config = OpsConfig::default();
        config.extensions.search_paths = vec![PathBuf::from("/opt/base")];

        env::set_var("FEAGI_OPS_EVENT_FALLBACK", "graph");
        env::set_var("FEAGI_OPS_EXTENSION_PATH", "/opt/first");
        env::set_var("FEAGI_OPS_LOG_LEVEL", "warn");
        let result = apply_environment_overrides(&mut config);
        clear_overrides();

        result.unwrap();
        assert_eq!(config.runtime.event_fallback, EventFallback::Graph);
        assert_eq!(
            config.extensions.search_paths,
            vec![PathBuf::from("/opt/first"), PathBuf::from("/opt/base")]
        );
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_bad_platform_override_is_rejected() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        env::set_var("FEAGI_OPS_PLATFORM", "tpu");
        let mut config = OpsConfig::default();
        let result = apply_environment_overrides(&mut config);
        clear_overrides();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_overrides();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[logging]\nlevel = \"info\"\n").unwrap();

        env::set_var("FEAGI_OPS_LOG_LEVEL", "warn");
        let mut cli = HashMap::new();
        cli.insert("log_level".to_string(), "debug".to_string());
        let config = load_config(Some(&config_path), Some(&cli));
        clear_overrides();

        assert_eq!(config.unwrap().logging.level, "debug");
    }
}
