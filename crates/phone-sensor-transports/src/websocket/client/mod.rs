// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! WebSocket client implementations
//!
//! - Duplex: one bidirectional link to a server

pub mod duplex;

pub use duplex::WsDuplex;
