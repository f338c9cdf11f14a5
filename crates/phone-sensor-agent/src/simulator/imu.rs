// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Synthetic motion sensors
//!
//! Emits a slow rotation about the vertical axis at a fixed rate.

use crate::error::SensorError;
use crate::protocol::unix_secs_now;
use crate::sensors::{SensorFeed, SensorFrame};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Error reported when the simulated user refuses motion access
pub const PERMISSION_DENIED: &str = "motion sensor permission denied";

const TURN_RATE_RAD_PER_SEC: f64 = 0.5;
const GRAVITY: f64 = 9.81;

/// Reading `elapsed_secs` into the simulated rotation
pub fn synthetic_reading(unix_timestamp: f64, elapsed_secs: f64) -> SensorFrame {
    let heading = elapsed_secs * TURN_RATE_RAD_PER_SEC;
    let (sin_half, cos_half) = (heading / 2.0).sin_cos();
    SensorFrame::at(unix_timestamp)
        .with_quaternion([0.0, 0.0, sin_half, cos_half])
        .with_accelerometer([0.0, 0.0, GRAVITY])
        .with_gyroscope([0.0, 0.0, TURN_RATE_RAD_PER_SEC])
        .with_magnetometer([30.0 * heading.cos(), -30.0 * heading.sin(), -40.0])
}

/// Handle to a running synthetic IMU; stops it on drop
pub struct SyntheticImu {
    task: JoinHandle<()>,
}

impl SyntheticImu {
    /// Feed readings at `rate_hz` (at least 1 Hz)
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(feed: SensorFeed, rate_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)));
        info!("[SIM-IMU] Producing readings at {} Hz", rate_hz.max(1));
        let task = tokio::spawn(produce(feed, period));
        Self { task }
    }

    /// Report denied permission through the sensor frame and produce nothing
    pub fn spawn_denied(feed: SensorFeed) -> Self {
        info!("[SIM-IMU] Motion permission denied");
        feed.report_unavailable(unix_secs_now(), PERMISSION_DENIED);
        Self {
            task: tokio::spawn(async {}),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SyntheticImu {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn produce(feed: SensorFeed, period: Duration) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let elapsed = started.elapsed().as_secs_f64();
        match feed.record(synthetic_reading(unix_secs_now(), elapsed)) {
            Ok(()) => {}
            Err(SensorError::OutOfOrder { timestamp, newest }) => {
                debug!("[SIM-IMU] Clock went backwards ({} < {}); skipping", timestamp, newest);
            }
            Err(e) => debug!("[SIM-IMU] Reading rejected: {}", e),
        }
    }
}
