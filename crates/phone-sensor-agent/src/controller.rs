// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Controller side: send one command, wait for its reply
//!
//! The controller listens with an [`ExclusiveWsServer`], so only the most
//! recently connected device is served. Each call sends a single command and
//! waits for the matching reply; if the device disconnects (or is replaced by
//! a newer one) before replying, the call fails with
//! [`ControllerError::ClientDisconnect`].
//!
//! ```no_run
//! use phone_sensor_agent::controller::{Controller, GrabOptions, ServerSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = Controller::bind(ServerSettings::new("0.0.0.0:8765")).await?;
//! controller.wait_for_client().await?;
//!
//! let photo = controller.grab(GrabOptions::default()).await?;
//! let image = photo.decode()?;
//! let frame = controller.imu(None).await?;
//! println!("{}x{} at {}, {:?}", image.width(), image.height(), photo.timestamp, frame.quaternion);
//! # Ok(())
//! # }
//! ```

use crate::error::ControllerError;
use crate::protocol::{
    decode_photo, CameraFacing, CaptureConfiguration, Command, GrabCommand, ImageEncoding,
};
use crate::sensors::SensorFrame;
use phone_sensor_config::PhoneSensorConfig;
use phone_sensor_transports::websocket::server::{ClientLink, ExclusiveWsServer};
use phone_sensor_transports::{Frame, ServerConfig, Transport, TransportError};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where and how the controller listens
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub server: ServerConfig,
    /// Give up on a reply after this long and drop the device; `None` waits
    /// indefinitely
    pub reply_timeout: Option<Duration>,
}

impl ServerSettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::new(address).with_path("/ws"),
            reply_timeout: None,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &PhoneSensorConfig) -> Self {
        let mut server =
            ServerConfig::new(config.server.bind_address()).with_path(config.server.path.clone());
        server.base.max_message_size = Some(config.server.max_message_size);
        if let (Some(cert), Some(key)) = (&config.server.tls_cert_path, &config.server.tls_key_path) {
            server = server.with_tls(cert.clone(), key.clone());
        }
        Self {
            server,
            reply_timeout: None,
        }
    }
}

/// Parameters for [`Controller::grab`]
#[derive(Debug, Clone, PartialEq)]
pub struct GrabOptions {
    pub camera: CameraFacing,
    pub resolution: (u32, u32),
    /// Wait for the user to tap the capture button
    pub button: bool,
    /// Minimum time since the previous grab
    pub wait: Option<Duration>,
    pub encoding: ImageEncoding,
    pub quality: u8,
}

impl Default for GrabOptions {
    fn default() -> Self {
        Self {
            camera: CameraFacing::Back,
            resolution: (640, 480),
            button: false,
            wait: None,
            encoding: ImageEncoding::Webp,
            quality: 90,
        }
    }
}

impl GrabOptions {
    pub fn front_facing(mut self) -> Self {
        self.camera = CameraFacing::Front;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    pub fn with_button(mut self) -> Self {
        self.button = true;
        self
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn with_encoding(mut self, encoding: ImageEncoding, quality: u8) -> Self {
        self.encoding = encoding;
        self.quality = quality;
        self
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.button && self.wait.is_some() {
            return Err(ControllerError::InvalidRequest(
                "button and wait cannot be combined".to_string(),
            ));
        }
        if self.quality > 100 {
            return Err(ControllerError::InvalidRequest(format!(
                "quality {} is above 100",
                self.quality
            )));
        }
        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err(ControllerError::InvalidRequest(format!(
                "resolution {:?} has a zero dimension",
                self.resolution
            )));
        }
        Ok(())
    }

    fn to_command(&self) -> Command {
        Command::Grab(GrabCommand {
            capture: CaptureConfiguration {
                facing: self.camera,
                resolution: self.resolution,
                encoding: self.encoding,
                quality: self.quality,
            },
            button: self.button,
            wait: self.wait,
        })
    }
}

/// A photo received from the device
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    /// Capture time, seconds since the Unix epoch
    pub timestamp: f64,
    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl Photo {
    pub fn decode(&self) -> Result<image::DynamicImage, ControllerError> {
        image::load_from_memory(&self.data)
            .map_err(|e| ControllerError::InvalidReply(format!("undecodable image: {}", e)))
    }
}

/// Issues commands to the connected device
pub struct Controller {
    server: ExclusiveWsServer,
    client: Option<ClientLink>,
    reply_timeout: Option<Duration>,
}

impl Controller {
    /// Start listening
    pub async fn bind(settings: ServerSettings) -> Result<Self, ControllerError> {
        let mut server = ExclusiveWsServer::new(settings.server)?;
        server.start_async().await?;
        Ok(Self {
            server,
            client: None,
            reply_timeout: settings.reply_timeout,
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    /// Generation of the device currently being served (0 if none yet)
    pub fn client_generation(&self) -> u64 {
        self.client.as_ref().map_or(0, |client| client.generation)
    }

    /// Wait until a device is connected; returns its generation
    pub async fn wait_for_client(&mut self) -> Result<u64, ControllerError> {
        self.refresh_client()?;
        if let Some(client) = &self.client {
            if !client.link.state().is_closed() {
                return Ok(client.generation);
            }
        }

        loop {
            let client = self.server.next_client().await?;
            if client.link.state().is_closed() {
                debug!("[CONTROLLER] Skipping client {} that already left", client.peer);
                continue;
            }
            info!("[CONTROLLER] Serving device {} (generation {})", client.peer, client.generation);
            let generation = client.generation;
            self.client = Some(client);
            return Ok(generation);
        }
    }

    /// Take a photo
    pub async fn grab(&mut self, options: GrabOptions) -> Result<Photo, ControllerError> {
        options.validate()?;
        match self.call(&options.to_command()).await? {
            Frame::Binary(blob) => {
                let (timestamp_ms, image) =
                    decode_photo(&blob).map_err(|e| ControllerError::InvalidReply(e.to_string()))?;
                Ok(Photo {
                    timestamp: timestamp_ms as f64 / 1000.0,
                    data: image.to_vec(),
                })
            }
            Frame::Text(text) => Err(ControllerError::InvalidReply(format!(
                "expected a photo, got text: {}",
                text
            ))),
        }
    }

    /// Read the motion sensors
    pub async fn imu(&mut self, wait: Option<Duration>) -> Result<SensorFrame, ControllerError> {
        match self.call(&Command::SampleRequest { wait }).await? {
            Frame::Text(text) => {
                let frame: SensorFrame = serde_json::from_str(&text)
                    .map_err(|e| ControllerError::InvalidReply(e.to_string()))?;
                match frame.error {
                    Some(error) => Err(ControllerError::DataUnavailable(error)),
                    None => Ok(frame),
                }
            }
            Frame::Binary(data) => Err(ControllerError::InvalidReply(format!(
                "expected a sensor frame, got {} binary bytes",
                data.len()
            ))),
        }
    }

    /// Stop listening and drop the current device
    pub fn close(&mut self) -> Result<(), ControllerError> {
        if let Some(client) = self.client.take() {
            client.link.close();
        }
        self.server.stop()?;
        Ok(())
    }

    fn refresh_client(&mut self) -> Result<(), ControllerError> {
        if let Some(newer) = self.server.try_next_client()? {
            info!(
                "[CONTROLLER] Device {} replaced the previous one (generation {})",
                newer.peer, newer.generation
            );
            self.client = Some(newer);
        }
        Ok(())
    }

    async fn call(&mut self, command: &Command) -> Result<Frame, ControllerError> {
        let text = command
            .encode()
            .map_err(|e| ControllerError::Transport(TransportError::Serialization(e.to_string())))?;
        self.wait_for_client().await?;
        let reply_timeout = self.reply_timeout;

        let Some(client) = self.client.as_mut() else {
            return Err(ControllerError::NoClient);
        };

        // replies to earlier, abandoned calls must not answer this one
        loop {
            match client.link.try_recv() {
                Ok(stale) => debug!("[CONTROLLER] Discarding stale {} reply", stale.kind()),
                Err(TransportError::NoData) => break,
                Err(_) => {
                    self.client = None;
                    return Err(ControllerError::ClientDisconnect);
                }
            }
        }

        debug!("[CONTROLLER] Sending '{}'", command.name());
        if client.link.send(Frame::Text(text)).is_err() {
            self.client = None;
            return Err(ControllerError::ClientDisconnect);
        }

        let reply = match reply_timeout {
            Some(limit) => match tokio::time::timeout(limit, client.link.recv()).await {
                Ok(reply) => reply,
                Err(_) => {
                    // a late reply would otherwise answer the next call
                    warn!(
                        "[CONTROLLER] No reply to '{}' within {:?}; dropping device",
                        command.name(),
                        limit
                    );
                    client.link.close();
                    self.client = None;
                    return Err(ControllerError::Timeout);
                }
            },
            None => client.link.recv().await,
        };

        match reply {
            Some(frame) => Ok(frame),
            None => {
                warn!("[CONTROLLER] Device disconnected before replying to '{}'", command.name());
                self.client = None;
                Err(ControllerError::ClientDisconnect)
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.server.stop();
    }
}
