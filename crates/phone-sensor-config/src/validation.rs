// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! All problems are collected and reported together rather than failing on
//! the first one.

use crate::{ConfigError, ConfigResult, PhoneSensorConfig, KNOWN_ENCODINGS, KNOWN_LOG_LEVELS};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
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
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed check
pub fn validate_config(config: &PhoneSensorConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_required_fields(config, &mut errors);
    validate_controller(config, &mut errors);
    validate_value_ranges(config, &mut errors);

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

fn validate_required_fields(config: &PhoneSensorConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.controller.url.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "controller.url".to_string(),
        });
    }
    if config.server.host.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "server.host".to_string(),
        });
    }
}

fn validate_controller(config: &PhoneSensorConfig, errors: &mut Vec<ConfigValidationError>) {
    let url = &config.controller.url;
    if !url.is_empty() && !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "controller.url".to_string(),
            reason: "must start with ws:// or wss://".to_string(),
        });
    }
    if config.controller.connect_timeout_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "controller.connect_timeout_ms".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if config.server.tls_cert_path.is_some() != config.server.tls_key_path.is_some() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "server.tls_cert_path".to_string(),
            reason: "tls_cert_path and tls_key_path must be set together".to_string(),
        });
    }
    if !config.server.path.starts_with('/') {
        errors.push(ConfigValidationError::InvalidValue {
            field: "server.path".to_string(),
            reason: "must start with '/'".to_string(),
        });
    }
}

fn validate_value_ranges(config: &PhoneSensorConfig, errors: &mut Vec<ConfigValidationError>) {
    // NaN fails this check as well
    if !(config.sensors.keep_last_secs > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sensors.keep_last_secs".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if config.sensors.sample_rate_hz == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sensors.sample_rate_hz".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if config.capture.quality > 100 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "capture.quality".to_string(),
            reason: "must be within 0..=100".to_string(),
        });
    }
    if config.capture.resolution.contains(&0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "capture.resolution".to_string(),
            reason: "width and height must be non-zero".to_string(),
        });
    }
    if !KNOWN_ENCODINGS.contains(&config.capture.encoding.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "capture.encoding".to_string(),
            reason: format!("must be one of {}", KNOWN_ENCODINGS.join(", ")),
        });
    }
    if config.server.max_message_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "server.max_message_size".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    if !KNOWN_LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of {}", KNOWN_LOG_LEVELS.join(", ")),
        });
    }
    if config.logging.format != "text" && config.logging.format != "json" {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.format".to_string(),
            reason: "must be 'text' or 'json'".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PhoneSensorConfig::default();
        let result = validate_config(&config);
        if let Err(e) = &result {
            eprintln!("Validation error: {}", e);
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_non_websocket_url_rejected() {
        let mut config = PhoneSensorConfig::default();
        config.controller.url = "http://127.0.0.1:8765".to_string();

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("controller.url"));
                assert!(msg.contains("ws://"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_tls_cert_without_key_rejected() {
        let mut config = PhoneSensorConfig::default();
        config.server.tls_cert_path = Some("cert.pem".into());

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("tls_key_path")),
            other => panic!("expected validation error, got {:?}", other),
        }

        config.server.tls_key_path = Some("key.pem".into());
        config.controller.url = "wss://controller.local:8765/ws".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_failures_are_reported_together() {
        let mut config = PhoneSensorConfig::default();
        config.sensors.keep_last_secs = 0.0;
        config.capture.quality = 101;
        config.capture.encoding = "gif".to_string();

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("sensors.keep_last_secs"));
                assert!(msg.contains("capture.quality"));
                assert!(msg.contains("capture.encoding"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_nan_keep_window_rejected() {
        let mut config = PhoneSensorConfig::default();
        config.sensors.keep_last_secs = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let mut config = PhoneSensorConfig::default();
        config.server.host = String::new();

        match validate_config(&config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("server.host")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
