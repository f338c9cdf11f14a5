// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the session engine, the controller and the sensor window

use phone_sensor_transports::TransportError;
use thiserror::Error;

/// An inbound message could not be turned into a command
///
/// Fatal to the message only; the connection stays open.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Message has no 'cmd' field")]
    MissingCommand,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unexpected binary frame ({0} bytes)")]
    UnexpectedBinary(usize),

    #[error("Photo payload too short: {0} bytes")]
    TruncatedPhoto(usize),
}

/// Why a session stopped, or why a single message was dropped
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Another controller took ownership of the device
    #[error("Superseded by another controller")]
    Superseded,

    /// Connection could not be opened or failed while open
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The controller closed the connection
    #[error("Connection closed by the controller")]
    Closed,
}

impl SessionError {
    /// Terminal errors end the session; the others only drop one message
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionError::Decode(_) | SessionError::Serialization(_))
    }

    /// True when the device never had, or lost, connectivity
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SessionError::Transport(_))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Controller-side RPC failures
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The device went away (or was replaced) before replying
    #[error("Client disconnected")]
    ClientDisconnect,

    /// The device replied, but has no data to give (no sensor, no permission)
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("No client connected")]
    NoClient,

    #[error("Timed out waiting for a reply")]
    Timeout,

    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Rejected sensor samples
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("Sample at {timestamp}s is older than the newest sample at {newest}s")]
    OutOfOrder { timestamp: f64, newest: f64 },

    #[error("Sample timestamp is not finite: {0}")]
    NonFiniteTimestamp(f64),

    #[error("Sample has {got} channels, window holds {expected}")]
    ChannelMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(!SessionError::Decode(DecodeError::MissingCommand).is_terminal());
        assert!(!SessionError::Serialization("nan".into()).is_terminal());
        assert!(SessionError::Superseded.is_terminal());
        assert!(SessionError::Closed.is_terminal());

        let unreachable = SessionError::Transport(TransportError::ConnectFailed("refused".into()));
        assert!(unreachable.is_terminal());
        assert!(unreachable.is_unavailable());
        assert!(!SessionError::Superseded.is_unavailable());
    }
}
