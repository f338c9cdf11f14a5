// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! WebSocket server implementations
//!
//! - Exclusive: one client at a time, the newest connection wins

pub mod exclusive;

pub use exclusive::{ClientLink, ExclusiveWsServer};
