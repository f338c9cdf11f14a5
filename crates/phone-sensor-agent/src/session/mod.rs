// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device-side session: shared state, command dispatch and photo submission

mod engine;
mod photo;
mod state;

pub use engine::SessionEngine;
pub use photo::PhotoSubmitter;
pub use state::{DeviceState, SessionPhase, SessionSettings};
