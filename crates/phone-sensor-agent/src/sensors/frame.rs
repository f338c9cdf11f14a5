// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Latest sensor reading, as sent in reply to `imu`

use crate::reactive::ReactiveCell;
use serde::{Deserialize, Serialize};

/// Error text reported before the first reading arrives
pub const AWAITING_FIRST_READING: &str = "no sensor reading received yet";

/// One reading from the motion sensors
///
/// Serialized as a JSON object with `camelCase` keys. Channels the device
/// lacks are omitted. `error` is set when the device cannot provide data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorFrame {
    /// Seconds since the Unix epoch
    pub unix_timestamp: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Orientation as `[x, y, z, w]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quaternion: Option<[f64; 4]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerometer: Option<[f64; 3]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gyroscope: Option<[f64; 3]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnetometer: Option<[f64; 3]>,
}

impl SensorFrame {
    /// Empty reading at `unix_timestamp`
    pub fn at(unix_timestamp: f64) -> Self {
        Self {
            unix_timestamp,
            error: None,
            quaternion: None,
            accelerometer: None,
            gyroscope: None,
            magnetometer: None,
        }
    }

    /// Placeholder held until the first real reading
    pub fn awaiting() -> Self {
        Self::unavailable(0.0, AWAITING_FIRST_READING)
    }

    /// A frame that only reports why no data is available
    pub fn unavailable(unix_timestamp: f64, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::at(unix_timestamp)
        }
    }

    pub fn with_quaternion(mut self, quaternion: [f64; 4]) -> Self {
        self.quaternion = Some(quaternion);
        self
    }

    pub fn with_accelerometer(mut self, reading: [f64; 3]) -> Self {
        self.accelerometer = Some(reading);
        self
    }

    pub fn with_gyroscope(mut self, reading: [f64; 3]) -> Self {
        self.gyroscope = Some(reading);
        self
    }

    pub fn with_magnetometer(mut self, reading: [f64; 3]) -> Self {
        self.magnetometer = Some(reading);
        self
    }

    /// True if any sensor channel carries a value
    pub fn has_data(&self) -> bool {
        self.quaternion.is_some()
            || self.accelerometer.is_some()
            || self.gyroscope.is_some()
            || self.magnetometer.is_some()
    }
}

/// Write hook for the frame cell
///
/// Once a reading with data has been stored, `error` stays absent for the
/// life of the cell. A later data-less write keeps the last reading as is,
/// timestamp included.
pub(crate) fn clear_stale_error(previous: &SensorFrame, next: &mut SensorFrame) {
    if next.has_data() {
        next.error = None;
    } else if previous.has_data() {
        next.error = None;
        next.unix_timestamp = previous.unix_timestamp;
        next.quaternion = previous.quaternion;
        next.accelerometer = previous.accelerometer;
        next.gyroscope = previous.gyroscope;
        next.magnetometer = previous.magnetometer;
    }
}

/// Frame cell starting at [`SensorFrame::awaiting`]
pub fn sensor_frame_cell() -> ReactiveCell<SensorFrame> {
    ReactiveCell::with_transform(SensorFrame::awaiting(), clear_stale_error)
}
