//! # phone-sensor
//!
//! Remote capture from a phone: a controller program asks a connected phone
//! for photos and motion readings over a WebSocket, one command at a time.
//!
//! ## Feature Flags
//!
//! - **`device`** (default): session engine plus the WebSocket client the phone uses
//! - **`controller`** (default): exclusive WebSocket server and the request/reply API
//! - **`simulator`**: synthetic camera and IMU for running a device without hardware
//! - **`file-logging`**: rotated log files for the `simulated_device` tool
//! - **`tls`**: `wss://` on both sides (rustls)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use phone_sensor::agent::controller::{Controller, GrabOptions, ServerSettings};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = Controller::bind(ServerSettings::new("0.0.0.0:8765")).await?;
//! controller.wait_for_client().await?;
//! let photo = controller.grab(GrabOptions::default().with_resolution(1280, 720)).await?;
//! let frame = controller.imu(None).await?;
//! println!("photo at {} with orientation {:?}", photo.timestamp, frame.quaternion);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: phone-sensor-config, -observability        │
//! │  (TOML config, tracing setup)                           │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  I/O: phone-sensor-transports                           │
//! │  (duplex links, WebSocket client, exclusive server)     │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Protocol: phone-sensor-agent                           │
//! │  (reactive state, session engine, controller RPC)       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

pub use phone_sensor_agent as agent;
pub use phone_sensor_config as config;
pub use phone_sensor_observability as observability;
pub use phone_sensor_transports as transports;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::agent::{
        CaptureConfiguration, Command, ControllerError, DeviceState, ImageEncoding, SensorFrame,
        SessionEngine, SessionError, SessionPhase, SessionSettings,
    };
    pub use crate::config::{load_config, PhoneSensorConfig};

    #[cfg(feature = "controller")]
    pub use crate::agent::controller::{Controller, GrabOptions, Photo, ServerSettings};

    #[cfg(feature = "simulator")]
    pub use crate::agent::simulator::{SyntheticCamera, SyntheticImu};
}
