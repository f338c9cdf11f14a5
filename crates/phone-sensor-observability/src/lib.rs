// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # phone-sensor-observability
//!
//! Unified logging for the phone-sensor crates with per-crate debug flag support.
//!
//! ## Features
//! - `file-logging`: timestamped run directories with daily-rotated JSON files

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "phone-sensor",
    "phone-sensor-agent",
    "phone-sensor-config",
    "phone-sensor-observability",
    "phone-sensor-transports",
];

/// Convert a crate name into the module path tracing uses as the target
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
