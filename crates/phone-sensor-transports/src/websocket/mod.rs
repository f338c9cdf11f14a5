// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! WebSocket transports built on tokio-tungstenite

pub mod common;

#[cfg(feature = "websocket-client")]
pub mod client;

#[cfg(feature = "websocket-server")]
pub mod server;

#[cfg(feature = "tls")]
pub mod tls;

pub use common::{normalize_url, EVICTION_NOTICE};
