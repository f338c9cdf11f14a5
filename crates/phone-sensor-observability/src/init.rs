// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Console output is always installed. With the `file-logging` feature and a
//! configured `log_dir`, each run also writes JSON logs into its own folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── phone-sensor-agent.log
//!       ├── phone-sensor-transports.log
//!       └── combined.log
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::{LogFormat, ObservabilityConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps background log writers alive; flushes on drop
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving file logs, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level and debug flags.
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    config: &ObservabilityConfig,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with_base(&config.level);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&filter))
        .with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer: BoxedLayer = match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed(),
    };
    layers.push(console_layer.with_filter(env_filter).boxed());

    #[cfg(feature = "file-logging")]
    {
        if let Some(base_log_dir) = &config.log_dir {
            let (file_layers, guards, run_folder) =
                file_logging::build_layers(debug_flags, config, base_log_dir)?;
            layers.extend(file_layers);

            Registry::default()
                .with(layers)
                .try_init()
                .context("Global tracing subscriber already installed")?;

            return Ok(LoggingGuard {
                _file_guards: guards,
                log_dir: Some(run_folder),
            });
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already installed")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: Vec::new(),
        log_dir: None,
    })
}

/// Initialize logging with default settings
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &ObservabilityConfig::default())
}

/// Best-effort subscriber for tests; output goes through the test harness capture
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(feature = "file-logging")]
mod file_logging {
    use super::BoxedLayer;
    use crate::cli::CrateDebugFlags;
    use crate::config::ObservabilityConfig;
    use crate::{crate_target, KNOWN_CRATES};
    use anyhow::{Context, Result};
    use chrono::{DateTime, NaiveDateTime, Utc};
    use std::path::{Path, PathBuf};
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling;
    use tracing_subscriber::{EnvFilter, Layer};

    pub(super) fn build_layers(
        debug_flags: &CrateDebugFlags,
        config: &ObservabilityConfig,
        base_log_dir: &Path,
    ) -> Result<(Vec<BoxedLayer>, Vec<WorkerGuard>, PathBuf)> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let run_folder = base_log_dir.join(format!("run_{}", timestamp));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

        cleanup_old_logs(base_log_dir, config.retention_days, config.retention_runs)?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guards = Vec::new();

        for crate_name in KNOWN_CRATES {
            let appender = rolling::daily(&run_folder, format!("{}.log", crate_name));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let directive = format!("{}=debug", crate_target(crate_name));
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(EnvFilter::new(directive))
                    .boxed(),
            );
        }

        let combined = rolling::daily(&run_folder, "combined.log");
        let (writer, guard) = tracing_appender::non_blocking(combined);
        guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .json()
                .with_filter(EnvFilter::new(
                    debug_flags.to_filter_string_with_base(&config.level),
                ))
                .boxed(),
        );

        Ok((layers, guards, run_folder))
    }

    /// Remove run folders older than `retention_days`, then trim to `retention_runs`
    pub(crate) fn cleanup_old_logs(
        base_log_dir: &Path,
        retention_days: u64,
        retention_runs: usize,
    ) -> Result<()> {
        if !base_log_dir.exists() {
            return Ok(());
        }

        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();

        for entry in std::fs::read_dir(base_log_dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(stamp) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("run_"))
            else {
                continue;
            };
            if let Ok(naive) = NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M%S") {
                runs.push((path, naive.and_utc()));
            }
        }

        // newest first
        runs.sort_by(|a, b| b.1.cmp(&a.1));

        for (index, (path, started)) in runs.iter().enumerate() {
            if *started < cutoff || index >= retention_runs {
                if let Err(e) = std::fs::remove_dir_all(path) {
                    eprintln!(
                        "Warning: Failed to remove old log directory {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("[TEST] logging initialized twice without panicking");
    }
}
