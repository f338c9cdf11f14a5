// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Loading is layered:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, PhoneSensorConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "phone_sensor.toml";

/// Find the configuration file
///
/// Search order:
/// 1. `PHONE_SENSOR_CONFIG_PATH` environment variable
/// 2. Current working directory: `./phone_sensor.toml`
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("PHONE_SENSOR_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by PHONE_SENSOR_CONFIG_PATH not found: {}",
            path.display()
        )));
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
        "'{}' not found in any of these locations:\n{}\n\nSet PHONE_SENSOR_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<PhoneSensorConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: PhoneSensorConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `PHONE_SENSOR_CONTROLLER_URL` -> `controller.url`
/// - `PHONE_SENSOR_SERVER_HOST` -> `server.host`
/// - `PHONE_SENSOR_SERVER_PORT` -> `server.port`
/// - `PHONE_SENSOR_KEEP_LAST_SECS` -> `sensors.keep_last_secs`
/// - `PHONE_SENSOR_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut PhoneSensorConfig) {
    if let Ok(value) = env::var("PHONE_SENSOR_CONTROLLER_URL") {
        config.controller.url = value;
    }
    if let Ok(value) = env::var("PHONE_SENSOR_SERVER_HOST") {
        config.server.host = value;
    }
    if let Ok(value) = env::var("PHONE_SENSOR_SERVER_PORT") {
        if let Ok(port) = value.parse::<u16>() {
            config.server.port = port;
        }
    }
    if let Ok(value) = env::var("PHONE_SENSOR_KEEP_LAST_SECS") {
        if let Ok(secs) = value.parse::<f64>() {
            config.sensors.keep_last_secs = secs;
        }
    }
    if let Ok(value) = env::var("PHONE_SENSOR_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// `cli_args` maps option names to raw values, e.g.
/// `{"controller_url": "ws://10.0.0.2:8765/ws", "server_port": "9000"}`.
pub fn apply_cli_overrides(config: &mut PhoneSensorConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("controller_url") {
        config.controller.url = value.clone();
    }
    if let Some(value) = cli_args.get("server_host") {
        config.server.host = value.clone();
    }
    if let Some(value) = cli_args.get("server_port") {
        if let Ok(port) = value.parse::<u16>() {
            config.server.port = port;
        }
    }
    if let Some(value) = cli_args.get("keep_last_secs") {
        if let Ok(secs) = value.parse::<f64>() {
            config.sensors.keep_last_secs = secs;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var("PHONE_SENSOR_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("PHONE_SENSOR_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing_file() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("PHONE_SENSOR_CONFIG_PATH", "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var("PHONE_SENSOR_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::remove_var("PHONE_SENSOR_SERVER_PORT");
        env::remove_var("PHONE_SENSOR_KEEP_LAST_SECS");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "port = 9001").unwrap();
        writeln!(file, "[sensors]").unwrap();
        writeln!(file, "keep_last_secs = 2.5").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.server.port, 9001);
        assert_eq!(config.sensors.keep_last_secs, 2.5);
        // untouched sections keep their defaults
        assert_eq!(config.capture.resolution, [640, 480]);
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = PhoneSensorConfig::default();

        env::set_var("PHONE_SENSOR_CONTROLLER_URL", "ws://192.168.1.10:8765/ws");
        env::set_var("PHONE_SENSOR_SERVER_PORT", "9999");
        env::set_var("PHONE_SENSOR_KEEP_LAST_SECS", "not-a-number");

        apply_environment_overrides(&mut config);

        env::remove_var("PHONE_SENSOR_CONTROLLER_URL");
        env::remove_var("PHONE_SENSOR_SERVER_PORT");
        env::remove_var("PHONE_SENSOR_KEEP_LAST_SECS");

        assert_eq!(config.controller.url, "ws://192.168.1.10:8765/ws");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.sensors.keep_last_secs, 10.0);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = PhoneSensorConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("server_host".to_string(), "10.0.0.1".to_string());
        cli_args.insert("log_level".to_string(), "debug".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[server]").unwrap();
        writeln!(file, "host = \"file-host\"").unwrap();
        writeln!(file, "port = 8000").unwrap();

        env::set_var("PHONE_SENSOR_SERVER_HOST", "env-host");
        env::set_var("PHONE_SENSOR_SERVER_PORT", "9000");

        let mut cli_args = HashMap::new();
        cli_args.insert("server_host".to_string(), "cli-host".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();

        env::remove_var("PHONE_SENSOR_SERVER_HOST");
        env::remove_var("PHONE_SENSOR_SERVER_PORT");

        // CLI wins for host, env wins for port (no CLI override)
        assert_eq!(config.server.host, "cli-host");
        assert_eq!(config.server.port, 9000);
    }
}
