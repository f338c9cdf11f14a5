// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared types used by every transport

pub mod config;
pub mod error;
pub mod message;

pub use config::{ClientConfig, ServerConfig, TlsFiles, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use message::Frame;
