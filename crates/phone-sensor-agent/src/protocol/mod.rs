// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Wire protocol: JSON commands in, photo blobs and JSON sensor frames out

mod command;
mod outbound;

pub use command::{CameraFacing, CaptureConfiguration, Command, GrabCommand, ImageEncoding};
pub use outbound::{
    decode_photo, encode_photo, encode_sensor_frame, unix_millis_now, unix_secs_now,
    PHOTO_TIMESTAMP_BYTES,
};
