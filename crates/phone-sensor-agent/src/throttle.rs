// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-command minimum interval
//!
//! A controller may ask that a command not run until some time has passed
//! since the previous command of the same kind (`wait`). The throttle keeps
//! the last execution time for each kind and works out the remaining delay.
//! Uses Tokio's clock so paused-time tests are deterministic.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Command kinds that are rate limited independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Grab,
    Imu,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Grab => write!(f, "grab"),
            CommandKind::Imu => write!(f, "imu"),
        }
    }
}

/// Last-execution table keyed by [`CommandKind`]
#[derive(Debug, Default)]
pub struct CommandThrottle {
    last_executed: Mutex<HashMap<CommandKind, Instant>>,
}

impl CommandThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since `kind` last executed; `Duration::MAX` if it never has
    pub fn time_since_last(&self, kind: CommandKind) -> Duration {
        match self.last_executed.lock().get(&kind) {
            Some(at) => Instant::now().saturating_duration_since(*at),
            None => Duration::MAX,
        }
    }

    /// How long to hold a command of `kind` that asks for `wait` between runs
    ///
    /// Zero when `kind` never ran or `wait` has already elapsed.
    pub fn delay_for(&self, kind: CommandKind, wait: Duration) -> Duration {
        wait.saturating_sub(self.time_since_last(kind))
    }

    /// Mark `kind` as executed now
    pub fn record_now(&self, kind: CommandKind) {
        self.last_executed.lock().insert(kind, Instant::now());
    }

    pub fn last_execution(&self, kind: CommandKind) -> Option<Instant> {
        self.last_executed.lock().get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_never_executed_has_no_delay() {
        let throttle = CommandThrottle::new();
        assert_eq!(throttle.time_since_last(CommandKind::Imu), Duration::MAX);
        assert_eq!(
            throttle.delay_for(CommandKind::Imu, Duration::from_secs(5)),
            Duration::ZERO
        );
        assert!(throttle.last_execution(CommandKind::Imu).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_shrinks_as_time_passes() {
        let throttle = CommandThrottle::new();
        throttle.record_now(CommandKind::Imu);

        let wait = Duration::from_millis(500);
        assert_eq!(throttle.delay_for(CommandKind::Imu, wait), wait);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(
            throttle.delay_for(CommandKind::Imu, wait),
            Duration::from_millis(300)
        );

        tokio::time::advance(Duration::from_millis(400)).await;
        assert_eq!(throttle.delay_for(CommandKind::Imu, wait), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_are_independent() {
        let throttle = CommandThrottle::new();
        throttle.record_now(CommandKind::Grab);

        assert_eq!(
            throttle.delay_for(CommandKind::Imu, Duration::from_secs(1)),
            Duration::ZERO
        );
        assert_eq!(
            throttle.delay_for(CommandKind::Grab, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
    }
}
