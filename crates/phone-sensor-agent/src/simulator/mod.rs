// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic camera and motion sensors
//!
//! Stand-ins for phone hardware that plug into a [`DeviceState`] exactly the
//! way a real capture pipeline and sensor source would: the camera registers
//! capture callbacks with the capability registry, the IMU feeds readings to
//! the sensor feed.
//!
//! [`DeviceState`]: crate::session::DeviceState

mod camera;
mod imu;

pub use camera::{render_test_pattern, SyntheticCamera};
pub use imu::{synthetic_reading, SyntheticImu, PERMISSION_DENIED};
