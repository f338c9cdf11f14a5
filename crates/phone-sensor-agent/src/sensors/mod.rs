// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor readings: the latest frame, the sliding window and chart scopes
//!
//! A hardware source (or the simulator) hands each reading to a
//! [`SensorFeed`], which appends the orientation to the window and publishes
//! both the new frame and a fresh window snapshot through reactive cells.

mod frame;
mod window;

pub use frame::{sensor_frame_cell, SensorFrame, AWAITING_FIRST_READING};
pub use window::{SensorSample, SensorWindow, WindowSnapshot};

use crate::error::SensorError;
use crate::reactive::ReactiveCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// Describes one chart trace over a [`SensorWindow`]
#[derive(Debug, Clone, PartialEq)]
pub struct SignalScope {
    pub name: String,
    /// One label per channel
    pub labels: Vec<String>,
    pub keep_last_secs: f64,
}

impl SignalScope {
    pub fn new(name: impl Into<String>, labels: &[&str], keep_last_secs: f64) -> Self {
        Self {
            name: name.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            keep_last_secs,
        }
    }

    /// Quaternion trace (`x`, `y`, `z`, `w`)
    pub fn orientation(keep_last_secs: f64) -> Self {
        Self::new("orientation", &["x", "y", "z", "w"], keep_last_secs)
    }

    pub fn channels(&self) -> usize {
        self.labels.len()
    }

    /// Empty window sized for this scope
    pub fn window(&self) -> SensorWindow {
        SensorWindow::with_channels(self.keep_last_secs, self.channels())
    }

    /// Latest value of each channel, paired with its label
    pub fn latest_labelled<'a>(&'a self, snapshot: &WindowSnapshot) -> Vec<(&'a str, f64)> {
        match snapshot.latest() {
            Some(sample) => self
                .labels
                .iter()
                .map(String::as_str)
                .zip(sample.values.iter().copied())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Entry point for readings; owns the window and publishes frame and snapshots
#[derive(Clone)]
pub struct SensorFeed {
    scope: Arc<SignalScope>,
    window: Arc<Mutex<SensorWindow>>,
    frame: ReactiveCell<SensorFrame>,
    snapshots: ReactiveCell<WindowSnapshot>,
}

impl SensorFeed {
    pub fn new(scope: SignalScope) -> Self {
        let window = scope.window();
        Self {
            snapshots: ReactiveCell::new(window.snapshot()),
            window: Arc::new(Mutex::new(window)),
            frame: sensor_frame_cell(),
            scope: Arc::new(scope),
        }
    }

    /// Record a reading
    ///
    /// The orientation (when present) goes into the window. An out-of-order
    /// reading is rejected entirely and the frame is left as it was.
    pub fn record(&self, frame: SensorFrame) -> Result<(), SensorError> {
        if let Some(quaternion) = frame.quaternion {
            let snapshot = {
                let mut window = self.window.lock();
                window.append(frame.unix_timestamp, quaternion.to_vec())?;
                window.snapshot()
            };
            self.snapshots.write(snapshot);
        }
        trace!("[SENSORS] Reading at {}", frame.unix_timestamp);
        self.frame.write(frame);
        Ok(())
    }

    /// Report that no data can be produced (missing sensor, denied permission)
    pub fn report_unavailable(&self, unix_timestamp: f64, reason: impl Into<String>) {
        self.frame
            .write(SensorFrame::unavailable(unix_timestamp, reason));
    }

    /// Frame to send in reply to `imu`
    pub fn current_frame(&self) -> SensorFrame {
        self.frame.read()
    }

    pub fn snapshot(&self) -> WindowSnapshot {
        self.snapshots.read()
    }

    pub fn frame_cell(&self) -> &ReactiveCell<SensorFrame> {
        &self.frame
    }

    pub fn snapshot_cell(&self) -> &ReactiveCell<WindowSnapshot> {
        &self.snapshots
    }

    pub fn scope(&self) -> &SignalScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(t: f64) -> SensorFrame {
        SensorFrame::at(t).with_quaternion([0.0, 0.0, t.sin(), t.cos()])
    }

    #[test]
    fn test_record_updates_frame_and_window() {
        let feed = SensorFeed::new(SignalScope::orientation(10.0));
        assert!(feed.current_frame().error.is_some());

        let published = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&published);
        feed.snapshot_cell()
            .subscribe(move |snapshot| *sink.lock() = snapshot.len());

        feed.record(reading(1.0)).unwrap();
        feed.record(reading(2.0)).unwrap();

        assert_eq!(*published.lock(), 2);
        assert_eq!(feed.current_frame().unix_timestamp, 2.0);
        assert!(feed.current_frame().error.is_none());
        assert_eq!(feed.snapshot().columns().len(), 5);
    }

    #[test]
    fn test_out_of_order_reading_leaves_frame_alone() {
        let feed = SensorFeed::new(SignalScope::orientation(10.0));
        feed.record(reading(5.0)).unwrap();

        assert!(matches!(
            feed.record(reading(4.0)),
            Err(SensorError::OutOfOrder { .. })
        ));
        assert_eq!(feed.current_frame().unix_timestamp, 5.0);
        assert_eq!(feed.snapshot().len(), 1);
    }

    #[test]
    fn test_reading_without_orientation_skips_window() {
        let feed = SensorFeed::new(SignalScope::orientation(10.0));
        feed.record(SensorFrame::at(1.0).with_accelerometer([0.0, 0.0, 9.81]))
            .unwrap();
        assert!(feed.snapshot().is_empty());
        assert!(feed.current_frame().accelerometer.is_some());
    }

    #[test]
    fn test_scope_labels_latest_sample() {
        let scope = SignalScope::orientation(10.0);
        let mut window = scope.window();
        window.append(1.0, vec![0.1, 0.2, 0.3, 0.9]).unwrap();

        let labelled = scope.latest_labelled(&window.snapshot());
        assert_eq!(labelled[0], ("x", 0.1));
        assert_eq!(labelled[3], ("w", 0.9));
    }

    #[test]
    fn test_permission_denied_is_reported_through_frame() {
        let feed = SensorFeed::new(SignalScope::orientation(10.0));
        feed.report_unavailable(1.0, "motion permission denied");
        assert_eq!(
            feed.current_frame().error.as_deref(),
            Some("motion permission denied")
        );
    }
}
