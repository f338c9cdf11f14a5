// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # phone-sensor-agent
//!
//! The device-side session protocol engine and the state it distributes.
//!
//! A device (phone, tablet) serves exactly one controller at a time. The
//! controller sends commands (`grab`, `imu`, `disconnect`); the device executes
//! them against hardware that becomes ready asynchronously and answers with
//! binary photo blobs or JSON sensor frames.
//!
//! ## Building blocks
//!
//! - [`ReactiveCell`]: a value with synchronous, ordered change notification
//! - [`CapabilityRegistry`]: single-slot rendezvous between "grab" commands
//!   and a capture callback that may not exist yet
//! - [`CommandThrottle`]: per-command minimum interval driven by the controller
//! - [`SensorWindow`] / [`SensorFeed`]: sliding time window of readings plus the
//!   latest [`SensorFrame`]
//! - [`SessionEngine`]: decodes and dispatches commands strictly in order
//!
//! ## Feature Flags
//!
//! - `device`: connect a session over WebSocket (default)
//! - `controller`: the controller-side RPC client (default)
//! - `simulator`: synthetic camera and IMU for running without hardware

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod capability;
pub mod error;
pub mod protocol;
pub mod reactive;
pub mod sensors;
pub mod session;
pub mod throttle;

#[cfg(feature = "controller")]
pub mod controller;

#[cfg(feature = "simulator")]
pub mod simulator;

pub use capability::{CapabilityRegistry, CapabilityState, CaptureCallback};
pub use error::{ControllerError, DecodeError, SensorError, SessionError};
pub use protocol::{CameraFacing, CaptureConfiguration, Command, GrabCommand, ImageEncoding};
pub use reactive::{ReactiveCell, SubscriptionId};
pub use sensors::{SensorFeed, SensorFrame, SensorSample, SensorWindow, SignalScope, WindowSnapshot};
pub use session::{DeviceState, PhotoSubmitter, SessionEngine, SessionPhase, SessionSettings};
pub use throttle::{CommandKind, CommandThrottle};
