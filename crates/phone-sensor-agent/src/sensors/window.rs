// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sliding time window of sensor samples

use crate::error::SensorError;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::warn;

/// One timestamped multi-channel sample
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub values: Vec<f64>,
}

/// Samples from the last `keep_last_secs` seconds, oldest first
///
/// Timestamps must not decrease. After every append, samples older than
/// `newest - keep_last_secs` are evicted. Snapshots share storage with the
/// window until the next append, which copies only if a snapshot is still
/// alive.
#[derive(Debug, Clone)]
pub struct SensorWindow {
    keep_last_secs: f64,
    channels: Option<usize>,
    samples: Arc<VecDeque<SensorSample>>,
}

impl SensorWindow {
    /// Window with a channel count fixed by the first sample
    pub fn new(keep_last_secs: f64) -> Self {
        Self {
            keep_last_secs,
            channels: None,
            samples: Arc::new(VecDeque::new()),
        }
    }

    /// Window that only accepts samples with `channels` values
    pub fn with_channels(keep_last_secs: f64, channels: usize) -> Self {
        Self {
            channels: Some(channels),
            ..Self::new(keep_last_secs)
        }
    }

    pub fn keep_last_secs(&self) -> f64 {
        self.keep_last_secs
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn newest_timestamp(&self) -> Option<f64> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Add a sample and evict what fell out of the window
    ///
    /// Returns the number of evicted samples. A sample older than the newest
    /// one is rejected and the window is left unchanged.
    pub fn append(&mut self, timestamp: f64, values: Vec<f64>) -> Result<usize, SensorError> {
        if !timestamp.is_finite() {
            return Err(SensorError::NonFiniteTimestamp(timestamp));
        }
        if let Some(newest) = self.newest_timestamp() {
            if timestamp < newest {
                warn!(
                    "[SENSORS] Dropping out-of-order sample: {} < newest {}",
                    timestamp, newest
                );
                return Err(SensorError::OutOfOrder { timestamp, newest });
            }
        }
        match self.channels {
            Some(expected) if expected != values.len() => {
                return Err(SensorError::ChannelMismatch {
                    expected,
                    got: values.len(),
                });
            }
            Some(_) => {}
            None => self.channels = Some(values.len()),
        }

        let samples = Arc::make_mut(&mut self.samples);
        samples.push_back(SensorSample { timestamp, values });

        let cutoff = timestamp - self.keep_last_secs;
        let mut evicted = 0;
        while samples.front().is_some_and(|oldest| oldest.timestamp < cutoff) {
            samples.pop_front();
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Immutable view of the current contents
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            samples: Arc::clone(&self.samples),
        }
    }
}

/// Point-in-time copy of a [`SensorWindow`]
#[derive(Debug, Clone, Default)]
pub struct WindowSnapshot {
    samples: Arc<VecDeque<SensorSample>>,
}

impl WindowSnapshot {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.back()
    }

    /// Time covered, newest minus oldest
    pub fn span_secs(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// Columnar layout: `[timestamps, channel0, channel1, ...]`
    pub fn columns(&self) -> Vec<Vec<f64>> {
        let channels = self.samples.front().map_or(0, |s| s.values.len());
        let mut columns = vec![Vec::with_capacity(self.samples.len()); channels + 1];
        for sample in self.samples.iter() {
            columns[0].push(sample.timestamp);
            for (column, value) in columns[1..].iter_mut().zip(&sample.values) {
                column.push(*value);
            }
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_samples_older_than_keep_window() {
        let mut window = SensorWindow::new(10.0);
        window.append(0.0, vec![0.0]).unwrap();
        window.append(5.0, vec![1.0]).unwrap();
        assert_eq!(window.append(12.0, vec![2.0]).unwrap(), 1);

        let timestamps: Vec<f64> = window.snapshot().iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![5.0, 12.0]);
    }

    #[test]
    fn test_sample_exactly_at_cutoff_is_kept() {
        let mut window = SensorWindow::new(10.0);
        window.append(2.0, vec![0.0]).unwrap();
        assert_eq!(window.append(12.0, vec![0.0]).unwrap(), 0);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_out_of_order_sample_is_rejected() {
        let mut window = SensorWindow::new(10.0);
        window.append(5.0, vec![1.0]).unwrap();
        assert_eq!(
            window.append(4.0, vec![2.0]),
            Err(SensorError::OutOfOrder {
                timestamp: 4.0,
                newest: 5.0
            })
        );
        assert_eq!(window.len(), 1);

        // equal timestamps are fine
        window.append(5.0, vec![3.0]).unwrap();
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_rejects_nan_and_channel_mismatch() {
        let mut window = SensorWindow::with_channels(10.0, 2);
        assert!(matches!(
            window.append(f64::NAN, vec![0.0, 0.0]),
            Err(SensorError::NonFiniteTimestamp(_))
        ));
        assert_eq!(
            window.append(1.0, vec![0.0]),
            Err(SensorError::ChannelMismatch { expected: 2, got: 1 })
        );
        assert!(window.is_empty());
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_appends() {
        let mut window = SensorWindow::new(1.0);
        window.append(0.0, vec![1.0]).unwrap();
        let before = window.snapshot();

        window.append(5.0, vec![2.0]).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(before.latest().unwrap().timestamp, 0.0);
        assert_eq!(window.snapshot().latest().unwrap().timestamp, 5.0);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_columns_layout() {
        let mut window = SensorWindow::new(60.0);
        window.append(1.0, vec![0.1, 0.2]).unwrap();
        window.append(2.0, vec![0.3, 0.4]).unwrap();

        let snapshot = window.snapshot();
        assert_eq!(
            snapshot.columns(),
            vec![vec![1.0, 2.0], vec![0.1, 0.3], vec![0.2, 0.4]]
        );
        assert_eq!(snapshot.span_secs(), 1.0);
        assert!(WindowSnapshot::default().columns().len() == 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_append_keeps_exactly_the_recent_suffix(
                keep_last_secs in 0.0f64..20.0,
                steps in prop::collection::vec(0.0f64..5.0, 1..200),
            ) {
                let mut window = SensorWindow::with_channels(keep_last_secs, 1);
                let mut appended = Vec::new();
                let mut timestamp = 1_000.0;

                for step in steps {
                    timestamp += step;
                    prop_assert!(window.append(timestamp, vec![step]).is_ok());
                    appended.push(timestamp);

                    let newest = timestamp;
                    let cutoff = newest - keep_last_secs;
                    let kept: Vec<f64> = window.snapshot().iter().map(|s| s.timestamp).collect();

                    prop_assert_eq!(window.newest_timestamp(), Some(newest));
                    prop_assert!(kept.iter().all(|&t| t >= cutoff));
                    prop_assert!(kept.windows(2).all(|pair| pair[0] <= pair[1]));

                    let expected: Vec<f64> =
                        appended.iter().copied().filter(|&t| t >= cutoff).collect();
                    prop_assert_eq!(kept, expected);
                }
            }
        }
    }
}
