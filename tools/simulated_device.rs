// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simulated phone
//!
//! Connects to a controller and serves it with a synthetic camera and IMU
//! until the session ends.
//!
//! Usage:
//!   cargo run --features simulator --bin simulated_device -- [--config <path>] [--url <ws-url>] [--debug-<crate>]
//!
//! Exit codes: 0 when the session closed normally, 1 when the controller was
//! unavailable, 2 when another device took the session over, 64 for bad
//! arguments.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use phone_sensor::agent::simulator::{SyntheticCamera, SyntheticImu};
use phone_sensor::agent::{DeviceState, SessionEngine, SessionError, SessionSettings};
use phone_sensor::config::{
    apply_cli_overrides, apply_environment_overrides, find_config_file, load_config,
    validate_config, PhoneSensorConfig,
};
use phone_sensor::observability::{
    debug_flags_help, init_logging, parse_debug_flags, LogFormat, ObservabilityConfig,
};
use phone_sensor::transports::ClientConfig;
use tracing::{info, warn};

const EXIT_UNAVAILABLE: i32 = 1;
const EXIT_SUPERSEDED: i32 = 2;
const EXIT_USAGE: i32 = 64;

struct Args {
    config: Option<PathBuf>,
    overrides: HashMap<String, String>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: simulated_device [--config <path>] [--url <ws-url>]\n\n{}",
        debug_flags_help()
    );
    process::exit(EXIT_USAGE);
}

fn parse_args() -> Args {
    let mut parsed = Args {
        config: None,
        overrides: HashMap::new(),
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                parsed.config = Some(PathBuf::from(v));
            }
            "--url" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                parsed.overrides.insert("controller_url".to_string(), v);
            }
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    parsed
}

fn resolve_config(args: &Args) -> Result<PhoneSensorConfig> {
    let config = match &args.config {
        Some(path) => load_config(Some(path), Some(&args.overrides))
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match find_config_file() {
            Ok(path) => load_config(Some(&path), Some(&args.overrides))
                .with_context(|| format!("Failed to load {}", path.display()))?,
            Err(_) => {
                let mut config = PhoneSensorConfig::default();
                apply_environment_overrides(&mut config);
                apply_cli_overrides(&mut config, &args.overrides);
                config
            }
        },
    };
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

fn observability_config(config: &PhoneSensorConfig) -> Result<ObservabilityConfig> {
    let format: LogFormat = config.logging.format.parse()?;
    Ok(ObservabilityConfig {
        level: config.logging.level.clone(),
        format,
        log_dir: config.logging.log_dir.clone(),
        retention_days: config.logging.retention_days,
        retention_runs: config.logging.retention_runs,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let config = resolve_config(&args)?;

    let debug_flags = parse_debug_flags();
    let _logging = init_logging(&debug_flags, &observability_config(&config)?)?;

    let settings = SessionSettings::from_config(&config)?;
    let state = DeviceState::new(&settings);
    let _camera = SyntheticCamera::spawn(
        &state,
        Duration::from_millis(config.capture.negotiation_delay_ms),
    );
    let _imu = SyntheticImu::spawn(state.sensors.clone(), config.sensors.sample_rate_hz);

    let mut client = ClientConfig::new(config.controller.url.clone())
        .with_connect_timeout(Duration::from_millis(config.controller.connect_timeout_ms));
    if let Some(ca_cert) = &config.controller.ca_cert_path {
        client = client.with_ca_cert(ca_cert.clone());
    }
    let engine = SessionEngine::new(state.clone());

    info!("🦀 [SIM] Simulated device starting");
    let session = engine.connect(client);
    tokio::pin!(session);
    let finished = tokio::select! {
        result = &mut session => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            info!("[SIM] Interrupted; closing session");
            if state.disconnect() {
                session.await
            } else {
                Ok(())
            }
        }
    };

    match result {
        Ok(()) => {
            info!("[SIM] Session finished");
            Ok(())
        }
        Err(SessionError::Superseded) => {
            warn!("[SIM] Another device took over the controller");
            process::exit(EXIT_SUPERSEDED);
        }
        Err(e) if e.is_unavailable() => {
            println!("{}", state.phase.read());
            warn!("[SIM] {}", e);
            process::exit(EXIT_UNAVAILABLE);
        }
        Err(e) => {
            info!("[SIM] Session ended: {}", e);
            Ok(())
        }
    }
}
