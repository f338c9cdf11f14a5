// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Inbound commands (controller → device)
//!
//! ```json
//! {"cmd": "grab", "frontFacing": false, "button": false, "wait": 0.5,
//!  "encoding": "webp", "quality": 90, "resolution": [640, 480]}
//! {"cmd": "imu", "wait": null}
//! {"cmd": "disconnect"}
//! ```
//!
//! `wait` is a number of seconds (fractions allowed) or `null`.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which camera to capture with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

impl CameraFacing {
    pub fn from_front_facing(front_facing: bool) -> Self {
        if front_facing {
            CameraFacing::Front
        } else {
            CameraFacing::Back
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, CameraFacing::Front)
    }
}

/// Image container requested for photos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Jpeg,
    Png,
    #[default]
    Webp,
    Bmp,
}

impl ImageEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpeg",
            ImageEncoding::Png => "png",
            ImageEncoding::Webp => "webp",
            ImageEncoding::Bmp => "bmp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
            ImageEncoding::Webp => "image/webp",
            ImageEncoding::Bmp => "image/bmp",
        }
    }

    /// True if `quality` affects the output
    pub fn uses_quality(&self) -> bool {
        matches!(self, ImageEncoding::Jpeg)
    }

    #[cfg(any(feature = "controller", feature = "simulator"))]
    pub fn image_format(&self) -> image::ImageFormat {
        match self {
            ImageEncoding::Jpeg => image::ImageFormat::Jpeg,
            ImageEncoding::Png => image::ImageFormat::Png,
            ImageEncoding::Webp => image::ImageFormat::WebP,
            ImageEncoding::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageEncoding {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageEncoding::Jpeg),
            "png" => Ok(ImageEncoding::Png),
            "webp" => Ok(ImageEncoding::Webp),
            "bmp" => Ok(ImageEncoding::Bmp),
            other => Err(DecodeError::InvalidField {
                field: "encoding",
                reason: format!("unsupported encoding '{}'", other),
            }),
        }
    }
}

/// Camera parameters from the most recent grab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureConfiguration {
    pub facing: CameraFacing,
    pub resolution: (u32, u32),
    pub encoding: ImageEncoding,
    pub quality: u8,
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            resolution: (640, 480),
            encoding: ImageEncoding::Webp,
            quality: 90,
        }
    }
}

/// A decoded `grab`
#[derive(Debug, Clone, PartialEq)]
pub struct GrabCommand {
    pub capture: CaptureConfiguration,
    /// Hold the photo until the user taps
    pub button: bool,
    pub wait: Option<Duration>,
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Grab(GrabCommand),
    /// `imu`: reply with the current sensor frame
    SampleRequest { wait: Option<Duration> },
    /// `disconnect`: another controller took over
    Evict,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Grab(_) => "grab",
            Command::SampleRequest { .. } => "imu",
            Command::Evict => "disconnect",
        }
    }

    /// Minimum interval since the previous command of the same kind
    pub fn wait(&self) -> Option<Duration> {
        match self {
            Command::Grab(grab) => grab.wait,
            Command::SampleRequest { wait } => *wait,
            Command::Evict => None,
        }
    }

    /// Decode one text message
    pub fn decode(text: &str) -> Result<Command, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::Malformed("expected a JSON object".to_string()))?;
        let cmd = match object.get("cmd") {
            Some(Value::String(cmd)) => cmd.as_str(),
            Some(_) => {
                return Err(DecodeError::InvalidField {
                    field: "cmd",
                    reason: "expected a string".to_string(),
                })
            }
            None => return Err(DecodeError::MissingCommand),
        };

        match cmd {
            "grab" => {
                let wire: WireGrab = from_object(&value)?;
                wire.into_command()
            }
            "imu" => {
                let wire: WireImu = from_object(&value)?;
                Ok(Command::SampleRequest {
                    wait: wait_from_secs(wire.wait)?,
                })
            }
            "disconnect" => Ok(Command::Evict),
            other => Err(DecodeError::UnknownCommand(other.to_string())),
        }
    }

    /// Encode for sending (controller side)
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let value = match self {
            Command::Grab(grab) => serde_json::to_value(WireGrab::from(grab))?,
            Command::SampleRequest { wait } => serde_json::to_value(WireImu {
                cmd: ImuTag::Imu,
                wait: wait.map(|w| w.as_secs_f64()),
            })?,
            Command::Evict => serde_json::json!({"cmd": "disconnect"}),
        };
        serde_json::to_string(&value)
    }
}

fn from_object<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

fn wait_from_secs(wait: Option<f64>) -> Result<Option<Duration>, DecodeError> {
    match wait {
        None => Ok(None),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|_| DecodeError::InvalidField {
                field: "wait",
                reason: format!("{} is not a non-negative number of seconds", secs),
            }),
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum GrabTag {
    Grab,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ImuTag {
    Imu,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireGrab {
    cmd: GrabTag,
    front_facing: bool,
    button: bool,
    #[serde(default)]
    wait: Option<f64>,
    encoding: String,
    quality: u8,
    resolution: (u32, u32),
}

impl WireGrab {
    fn into_command(self) -> Result<Command, DecodeError> {
        if self.quality > 100 {
            return Err(DecodeError::InvalidField {
                field: "quality",
                reason: format!("{} is above 100", self.quality),
            });
        }
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(DecodeError::InvalidField {
                field: "resolution",
                reason: format!("{:?} has a zero dimension", self.resolution),
            });
        }

        Ok(Command::Grab(GrabCommand {
            capture: CaptureConfiguration {
                facing: CameraFacing::from_front_facing(self.front_facing),
                resolution: self.resolution,
                encoding: self.encoding.parse()?,
                quality: self.quality,
            },
            button: self.button,
            wait: wait_from_secs(self.wait)?,
        }))
    }
}

impl From<&GrabCommand> for WireGrab {
    fn from(grab: &GrabCommand) -> Self {
        Self {
            cmd: GrabTag::Grab,
            front_facing: grab.capture.facing.is_front(),
            button: grab.button,
            wait: grab.wait.map(|w| w.as_secs_f64()),
            encoding: grab.capture.encoding.as_str().to_string(),
            quality: grab.capture.quality,
            resolution: grab.capture.resolution,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireImu {
    cmd: ImuTag,
    #[serde(default)]
    wait: Option<f64>,
}
