// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to a section in `phone_sensor.toml`. Every section is
//! `#[serde(default)]` so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PhoneSensorConfig {
    pub controller: ControllerConfig,
    pub server: ServerConfig,
    pub sensors: SensorsConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

/// Where the device connects to reach its controller
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub url: String,
    pub connect_timeout_ms: u64,
    /// PEM certificate to trust for a `wss://` url, typically the
    /// controller's self-signed one
    pub ca_cert_path: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765/ws".to_string(),
            connect_timeout_ms: 5000,
            ca_cert_path: None,
        }
    }
}

/// Controller-side WebSocket server
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Photos can be large; the controller accepts up to this many bytes per message.
    pub max_message_size: usize,
    /// Serve `wss://` when both are set
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
            path: "/ws".to_string(),
            max_message_size: 100_000_000,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` suitable for binding a listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Orientation / motion sampling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Seconds of samples retained in the sensor window
    pub keep_last_secs: f64,
    /// Sampling rate used by the synthetic IMU
    pub sample_rate_hz: u32,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            keep_last_secs: 10.0,
            sample_rate_hz: 60,
        }
    }
}

/// Default capture parameters used by the controller when a grab omits them
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub resolution: [u32; 2],
    pub encoding: String,
    pub quality: u8,
    pub front_facing: bool,
    /// Simulated stream negotiation time after a configuration change
    pub negotiation_delay_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: [640, 480],
            encoding: "webp".to_string(),
            quality: 90,
            front_facing: false,
            negotiation_delay_ms: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// `text` or `json`
    pub format: String,
    /// Base directory for rotated log files (file-logging builds only)
    pub log_dir: Option<PathBuf>,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            log_dir: None,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

/// Encodings the device knows how to produce
pub const KNOWN_ENCODINGS: &[&str] = &["jpeg", "png", "webp", "bmp"];

/// Levels accepted by `logging.level`
pub const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
