// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # phone-sensor-transports
//!
//! Message-boundary transports for the phone-sensor protocol. Everything above
//! this crate works with whole [`Frame`]s on a [`DuplexLink`]; how frames
//! travel is the transport's business.
//!
//! ## Feature Flags
//!
//! - `websocket-client`: [`WsDuplex`](websocket::client::WsDuplex), the device side
//! - `websocket-server`: [`ExclusiveWsServer`](websocket::server::ExclusiveWsServer), the controller side
//! - `websocket`: both (default)
//! - `tls`: wss:// for both sides via rustls
//!
//! ## Example: device connecting to a controller
//!
//! ```no_run
//! use phone_sensor_transports::prelude::*;
//!
//! # async fn run() -> TransportResult<()> {
//! let mut client = WsDuplex::with_address("ws://192.168.1.20:8765/ws")?;
//! let mut link = client.start_async().await?;
//!
//! while let Some(frame) = link.recv().await {
//!     println!("received {} frame", frame.kind());
//! }
//! println!("link ended: {:?}", link.state());
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: controller owning the newest device
//!
//! ```no_run
//! use phone_sensor_transports::prelude::*;
//!
//! # async fn run() -> TransportResult<()> {
//! let mut server = ExclusiveWsServer::new(ServerConfig::new("0.0.0.0:8765").with_path("/ws"))?;
//! server.start_async().await?;
//!
//! let client = server.next_client().await?;
//! client.link.send(Frame::Text(r#"{"cmd":"imu","wait":null}"#.to_string()))?;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod duplex;
pub mod traits;

#[cfg(any(feature = "websocket-server", feature = "websocket-client"))]
pub mod websocket;

pub use common::{
    ClientConfig, Frame, ServerConfig, TlsFiles, TransportConfig, TransportError, TransportResult,
};
pub use duplex::{CloseCause, DuplexLink, LinkDriver, LinkReceiver, LinkSender, LinkState};
pub use traits::Transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::*;
    pub use crate::duplex::*;
    pub use crate::traits::*;

    #[cfg(feature = "websocket-client")]
    pub use crate::websocket::client::*;

    #[cfg(feature = "websocket-server")]
    pub use crate::websocket::server::*;
}
