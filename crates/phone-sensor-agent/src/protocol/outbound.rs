// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Outbound payloads (device → controller)
//!
//! Photos travel as one binary frame: an 8-byte big-endian capture time in
//! milliseconds since the Unix epoch, followed by the encoded image. Sensor
//! frames travel as JSON text.

use crate::error::DecodeError;
use crate::sensors::SensorFrame;

/// Width of the timestamp prefix on photo blobs
pub const PHOTO_TIMESTAMP_BYTES: usize = 8;

/// Build a photo blob
pub fn encode_photo(timestamp_ms: u64, image: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(PHOTO_TIMESTAMP_BYTES + image.len());
    blob.extend_from_slice(&timestamp_ms.to_be_bytes());
    blob.extend_from_slice(image);
    blob
}

/// Split a photo blob into its timestamp (ms) and image bytes
pub fn decode_photo(blob: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    if blob.len() < PHOTO_TIMESTAMP_BYTES {
        return Err(DecodeError::TruncatedPhoto(blob.len()));
    }
    let (stamp, image) = blob.split_at(PHOTO_TIMESTAMP_BYTES);
    let mut bytes = [0u8; PHOTO_TIMESTAMP_BYTES];
    bytes.copy_from_slice(stamp);
    Ok((u64::from_be_bytes(bytes), image))
}

pub fn encode_sensor_frame(frame: &SensorFrame) -> Result<String, serde_json::Error> {
    serde_json::to_string(frame)
}

/// Milliseconds since the Unix epoch, clamped at zero
pub fn unix_millis_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Seconds since the Unix epoch
pub fn unix_secs_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
