// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport trait definitions
//!
//! Every transport has the same lifecycle regardless of role (client or
//! server). What a transport hands out once started is role specific: a
//! client yields one [`DuplexLink`](crate::DuplexLink), a server yields one
//! per accepted peer.

use crate::common::TransportResult;

/// Base transport trait - implemented by all transports
pub trait Transport: Send + Sync {
    /// Start the transport
    ///
    /// Must be called from within a Tokio runtime; background tasks are
    /// spawned on the current runtime.
    fn start(&mut self) -> TransportResult<()>;

    /// Stop the transport
    fn stop(&mut self) -> TransportResult<()>;

    /// Check if transport is running
    fn is_running(&self) -> bool;

    /// Get transport name/type
    fn transport_type(&self) -> &str;
}
