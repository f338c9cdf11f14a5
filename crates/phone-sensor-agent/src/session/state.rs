// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Device state shared between the session engine, hardware and UI

use crate::capability::{CapabilityRegistry, InvokeOutcome};
use crate::error::DecodeError;
use crate::protocol::{CameraFacing, CaptureConfiguration, ImageEncoding};
use crate::reactive::ReactiveCell;
use crate::sensors::{SensorFeed, SignalScope};
use crate::session::photo::PhotoSubmitter;
use crate::throttle::{CommandKind, CommandThrottle};
use phone_sensor_config::{ConfigError, PhoneSensorConfig};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Connectivity as seen by the session owner and UI
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No connection, or the last attempt failed
    #[default]
    Unavailable,
    Connecting,
    Open,
    /// Ended by either side, or superseded
    Closed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionPhase::Unavailable => "unavailable",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Open => "open",
            SessionPhase::Closed => "closed",
        };
        f.write_str(text)
    }
}

/// Startup values for [`DeviceState`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub keep_last_secs: f64,
    pub initial_capture: CaptureConfiguration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            keep_last_secs: 10.0,
            initial_capture: CaptureConfiguration::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &PhoneSensorConfig) -> Result<Self, ConfigError> {
        let encoding: ImageEncoding = config
            .capture
            .encoding
            .parse()
            .map_err(|e: DecodeError| ConfigError::ValidationError(e.to_string()))?;
        let [width, height] = config.capture.resolution;

        Ok(Self {
            keep_last_secs: config.sensors.keep_last_secs,
            initial_capture: CaptureConfiguration {
                facing: CameraFacing::from_front_facing(config.capture.front_facing),
                resolution: (width, height),
                encoding,
                quality: config.capture.quality,
            },
        })
    }
}

/// Everything a device shares across sessions, each piece observable
///
/// Cloning shares the same state.
#[derive(Clone)]
pub struct DeviceState {
    pub phase: ReactiveCell<SessionPhase>,
    pub waiting_on_button: ReactiveCell<bool>,
    pub capture_config: ReactiveCell<CaptureConfiguration>,
    pub last_decode_error: ReactiveCell<Option<DecodeError>>,
    pub capability: CapabilityRegistry,
    pub sensors: SensorFeed,
    throttle: Arc<CommandThrottle>,
    photos: PhotoSubmitter,
}

impl DeviceState {
    pub fn new(settings: &SessionSettings) -> Self {
        let waiting_on_button = ReactiveCell::new(false);
        Self {
            phase: ReactiveCell::new(SessionPhase::Unavailable),
            photos: PhotoSubmitter::new(waiting_on_button.clone()),
            waiting_on_button,
            capture_config: ReactiveCell::new(settings.initial_capture),
            last_decode_error: ReactiveCell::new(None),
            capability: CapabilityRegistry::new(),
            sensors: SensorFeed::new(SignalScope::orientation(settings.keep_last_secs)),
            throttle: Arc::new(CommandThrottle::new()),
        }
    }

    /// Sends photos over whichever session is currently open
    pub fn photo_submitter(&self) -> PhotoSubmitter {
        self.photos.clone()
    }

    pub fn throttle(&self) -> &CommandThrottle {
        &self.throttle
    }

    pub fn is_waiting_on_button(&self) -> bool {
        self.waiting_on_button.read()
    }

    /// The user tapped the capture button
    ///
    /// Only acts while `waiting_on_button` is set, and clears it; the photo is
    /// captured (or queued until the camera is ready) and the grab counts as
    /// executed now. Returns false when no tap was expected.
    pub fn tap_capture(&self) -> bool {
        let expected = self.waiting_on_button.read()
            && self
                .waiting_on_button
                .update(|waiting| std::mem::replace(waiting, false));
        if !expected {
            debug!("[SESSION] Tap ignored; no button grab outstanding");
            return false;
        }
        info!("[SESSION] Capture button tapped");
        if let InvokeOutcome::Queued(depth) = self.capability.invoke_or_queue() {
            debug!("[SESSION] Camera not ready; tap queued ({} pending)", depth);
        }
        self.throttle.record_now(CommandKind::Grab);
        true
    }

    /// Close the open session, if any, from the device side
    pub fn disconnect(&self) -> bool {
        self.photos.close_link()
    }

    pub(crate) fn arm_tap(&self) {
        self.waiting_on_button.write(true);
    }

    pub(crate) fn disarm_tap(&self) {
        if self.waiting_on_button.read() {
            self.waiting_on_button.write(false);
        }
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(&SessionSettings::default())
    }
}

impl fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceState")
            .field("phase", &self.phase.read())
            .field("waiting_on_button", &self.waiting_on_button.read())
            .field("capture_config", &self.capture_config.read())
            .field("capability", &self.capability.state())
            .finish()
    }
}
