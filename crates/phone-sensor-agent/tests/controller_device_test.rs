// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Controller and device talking over a real WebSocket

#![cfg(all(feature = "device", feature = "controller"))]

use image::{ImageFormat, Rgb, RgbImage};
use phone_sensor_agent::controller::{Controller, GrabOptions, ServerSettings};
use phone_sensor_agent::{
    ControllerError, DeviceState, SensorFrame, SessionEngine, SessionError, SessionPhase,
};
use phone_sensor_transports::ClientConfig;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

async fn bind_controller() -> (Controller, String) {
    phone_sensor_observability::init_test_logging();
    let controller = Controller::bind(ServerSettings::new("127.0.0.1:0"))
        .await
        .unwrap();
    let url = format!("ws://{}/ws", controller.local_addr().unwrap());
    (controller, url)
}

fn spawn_device(url: &str, state: &DeviceState) -> JoinHandle<Result<(), SessionError>> {
    let engine = SessionEngine::new(state.clone());
    let config = ClientConfig::new(url);
    tokio::spawn(async move { engine.connect(config).await })
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn install_camera(state: &DeviceState, width: u32, height: u32) {
    let submitter = state.photo_submitter();
    state.capability.register(Arc::new(move || {
        submitter.submit(png(width, height)).unwrap();
    }));
}

#[tokio::test]
async fn test_grab_and_imu_round_trip() {
    let (mut controller, url) = bind_controller().await;
    let state = DeviceState::default();
    install_camera(&state, 12, 8);
    state
        .sensors
        .record(SensorFrame::at(1_700_000_000.5).with_quaternion([0.0, 0.0, 0.0, 1.0]))
        .unwrap();
    let _device = spawn_device(&url, &state);

    assert_eq!(controller.wait_for_client().await.unwrap(), 1);

    let photo = controller
        .grab(GrabOptions::default().with_resolution(12, 8))
        .await
        .unwrap();
    let image = photo.decode().unwrap();
    assert_eq!((image.width(), image.height()), (12, 8));
    let now = chrono::Utc::now().timestamp() as f64;
    assert!((photo.timestamp - now).abs() < 60.0);
    assert_eq!(state.capture_config.read().resolution, (12, 8));

    let frame = controller.imu(None).await.unwrap();
    assert_eq!(frame.unix_timestamp, 1_700_000_000.5);
    assert_eq!(frame.quaternion, Some([0.0, 0.0, 0.0, 1.0]));
    assert_eq!(state.phase.read(), SessionPhase::Open);
}

#[tokio::test]
async fn test_imu_without_data_is_unavailable() {
    let (mut controller, url) = bind_controller().await;
    let state = DeviceState::default();
    let _device = spawn_device(&url, &state);

    controller.wait_for_client().await.unwrap();
    assert!(matches!(
        controller.imu(None).await,
        Err(ControllerError::DataUnavailable(_))
    ));
}

#[tokio::test]
async fn test_second_device_supersedes_first() {
    let (mut controller, url) = bind_controller().await;

    let first = DeviceState::default();
    let first_session = spawn_device(&url, &first);
    assert_eq!(controller.wait_for_client().await.unwrap(), 1);

    let second = DeviceState::default();
    second
        .sensors
        .record(SensorFrame::at(2.0).with_gyroscope([0.0, 0.0, 1.0]))
        .unwrap();
    let _second_session = spawn_device(&url, &second);

    let ended = tokio::time::timeout(Duration::from_secs(10), first_session)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(ended, Err(SessionError::Superseded)));
    assert_eq!(first.phase.read(), SessionPhase::Closed);

    let frame = controller.imu(None).await.unwrap();
    assert_eq!(frame.unix_timestamp, 2.0);
    assert_eq!(controller.client_generation(), 2);
}

#[tokio::test]
async fn test_device_leaving_mid_grab_is_client_disconnect() {
    let (mut controller, url) = bind_controller().await;
    let state = DeviceState::default();
    let device = spawn_device(&url, &state);
    controller.wait_for_client().await.unwrap();

    // no camera: the grab stays queued until the device hangs up
    let watcher = {
        let state = state.clone();
        tokio::spawn(async move {
            while state.capability.state().pending() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            state.disconnect()
        })
    };

    let result = controller.grab(GrabOptions::default()).await;
    assert!(matches!(result, Err(ControllerError::ClientDisconnect)));
    assert!(watcher.await.unwrap());
    assert!(device.await.unwrap().is_ok());
    assert_eq!(state.capability.state().pending(), 0);
}

#[tokio::test]
async fn test_reply_timeout_drops_the_device() {
    phone_sensor_observability::init_test_logging();
    let mut controller = Controller::bind(
        ServerSettings::new("127.0.0.1:0").with_reply_timeout(Duration::from_millis(200)),
    )
    .await
    .unwrap();
    let url = format!("ws://{}/ws", controller.local_addr().unwrap());

    // no camera: the grab can only time out
    let slow = DeviceState::default();
    let slow_session = spawn_device(&url, &slow);
    controller.wait_for_client().await.unwrap();
    assert!(matches!(
        controller.grab(GrabOptions::default()).await,
        Err(ControllerError::Timeout)
    ));
    assert_eq!(controller.client_generation(), 0);

    let ended = tokio::time::timeout(Duration::from_secs(10), slow_session)
        .await
        .unwrap()
        .unwrap();
    assert!(ended.is_err());
    assert!(!matches!(ended, Err(SessionError::Superseded)));
    // a photo taken now has nowhere to go
    install_camera(&slow, 4, 4);
    assert!(!slow.photo_submitter().is_attached());

    let next = DeviceState::default();
    next.sensors
        .record(SensorFrame::at(5.0).with_quaternion([0.0, 0.0, 0.0, 1.0]))
        .unwrap();
    let _next_session = spawn_device(&url, &next);

    let frame = controller.imu(None).await.unwrap();
    assert_eq!(frame.unix_timestamp, 5.0);
    assert_eq!(controller.client_generation(), 2);
}

#[tokio::test]
async fn test_invalid_grab_options_are_not_sent() {
    let (mut controller, _url) = bind_controller().await;
    let options = GrabOptions::default()
        .with_button()
        .with_wait(Duration::from_millis(10));
    assert!(matches!(
        controller.grab(options).await,
        Err(ControllerError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_unreachable_controller_reports_unavailable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let state = DeviceState::default();
    let engine = SessionEngine::new(state.clone());
    let config = ClientConfig::new(format!("ws://127.0.0.1:{}/ws", port))
        .with_connect_timeout(Duration::from_secs(2));

    let result = engine.connect(config).await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
    assert!(result.unwrap_err().is_unavailable());
    assert_eq!(state.phase.read().to_string(), "unavailable");
}

#[cfg(not(feature = "tls"))]
#[tokio::test]
async fn test_wss_without_tls_support_is_unavailable() {
    let state = DeviceState::default();
    let engine = SessionEngine::new(state.clone());

    let result = engine.connect(ClientConfig::new("wss://127.0.0.1:9/ws")).await;
    assert!(result.unwrap_err().is_unavailable());
    assert_eq!(state.phase.read(), SessionPhase::Unavailable);
}

#[cfg(feature = "tls")]
#[tokio::test]
async fn test_grab_over_wss_with_pinned_certificate() {
    phone_sensor_observability::init_test_logging();
    let fixtures =
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../phone-sensor-transports/tests/fixtures");
    let mut settings = ServerSettings::new("127.0.0.1:0");
    settings.server = settings
        .server
        .with_tls(fixtures.join("localhost.pem"), fixtures.join("localhost-key.pem"));
    let mut controller = Controller::bind(settings).await.unwrap();
    let port = controller.local_addr().unwrap().port();

    let state = DeviceState::default();
    install_camera(&state, 6, 4);
    let engine = SessionEngine::new(state.clone());
    let config = ClientConfig::new(format!("wss://localhost:{}/ws", port))
        .with_ca_cert(fixtures.join("localhost.pem"));
    let _device = tokio::spawn(async move { engine.connect(config).await });

    assert_eq!(controller.wait_for_client().await.unwrap(), 1);
    let photo = controller
        .grab(GrabOptions::default().with_resolution(6, 4))
        .await
        .unwrap();
    let image = photo.decode().unwrap();
    assert_eq!((image.width(), image.height()), (6, 4));
}
