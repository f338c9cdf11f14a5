// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Session engine: one controller, one command at a time
//!
//! The engine reads frames from a [`DuplexLink`] and executes each decoded
//! command to completion before reading the next. The only suspension point
//! inside a command is the throttle delay, which ends early if the link
//! closes. Hardware keeps writing to the shared [`DeviceState`] meanwhile.

use crate::capability::InvokeOutcome;
use crate::error::{DecodeError, SessionError};
use crate::protocol::{encode_sensor_frame, Command, GrabCommand};
use crate::session::state::{DeviceState, SessionPhase};
use crate::throttle::CommandKind;
use phone_sensor_transports::{
    CloseCause, DuplexLink, Frame, LinkSender, LinkState, TransportError,
};
use tracing::{debug, info, warn};

#[cfg(feature = "device")]
use phone_sensor_transports::{websocket::client::WsDuplex, ClientConfig};

enum Step {
    Continue,
    End(Result<(), SessionError>),
}

/// Runs sessions against a [`DeviceState`]
///
/// `Ok(())` from a run means the device closed the session itself (see
/// [`DeviceState::disconnect`]); every other ending is an error.
pub struct SessionEngine {
    state: DeviceState,
}

impl SessionEngine {
    pub fn new(state: DeviceState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Connect to a controller over WebSocket and serve it until the session ends
    #[cfg(feature = "device")]
    pub async fn connect(&self, config: ClientConfig) -> Result<(), SessionError> {
        self.state.phase.write(SessionPhase::Connecting);

        let mut client = WsDuplex::new(config).map_err(|e| self.unavailable(e))?;
        info!("🦀 [SESSION] Connecting to controller at {}", client.url());
        let link = client.start_async().await.map_err(|e| self.unavailable(e))?;

        let result = self.run(link).await;
        if let Err(e) = phone_sensor_transports::Transport::stop(&mut client) {
            debug!("[SESSION] Client stop reported: {}", e);
        }
        result
    }

    fn unavailable(&self, error: TransportError) -> SessionError {
        warn!("[SESSION] Controller unavailable: {}", error);
        self.state.phase.write(SessionPhase::Unavailable);
        SessionError::Transport(error)
    }

    /// Serve one session on an already created link
    pub async fn run(&self, link: DuplexLink) -> Result<(), SessionError> {
        let (sender, mut receiver) = link.into_split();
        self.state.phase.write(SessionPhase::Connecting);

        let mut link_state = sender.watch_state();
        let opened = match link_state
            .wait_for(|state| !matches!(state, LinkState::Connecting))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => LinkState::Closed(CloseCause::Error("link dropped".to_string())),
        };
        if let LinkState::Closed(cause) = opened {
            let result = match cause {
                CloseCause::Error(reason) => {
                    Err(SessionError::Transport(TransportError::ConnectFailed(reason)))
                }
                other => close_result(&LinkState::Closed(other)),
            };
            return self.finish(result);
        }

        self.state.photo_submitter().attach(sender.clone());
        self.state.phase.write(SessionPhase::Open);
        info!("[SESSION] Session open");

        let result = loop {
            let Some(frame) = receiver.recv().await else {
                break close_result(&sender.state());
            };
            match self.dispatch(frame, &sender).await {
                Step::Continue => {}
                Step::End(result) => break result,
            }
        };
        self.finish(result)
    }

    async fn dispatch(&self, frame: Frame, link: &LinkSender) -> Step {
        let command = match decode_frame(frame) {
            Ok(command) => command,
            Err(e) => {
                warn!("[SESSION] Ignoring message: {}", e);
                self.state.last_decode_error.write(Some(e));
                return Step::Continue;
            }
        };
        debug!("[SESSION] Received '{}'", command.name());

        if command == Command::Evict {
            warn!("[SESSION] Another controller took over; closing session");
            link.close();
            return Step::End(Err(SessionError::Superseded));
        }

        if let (Some(wait), Some(kind)) = (command.wait(), throttled_kind(&command)) {
            let delay = self.state.throttle().delay_for(kind, wait);
            if !delay.is_zero() {
                debug!("[SESSION] Holding '{}' for {:?}", kind, delay);
                let mut watch = link.watch_state();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = watch.wait_for(LinkState::is_closed) => {}
                }
            }
        }

        let current = link.state();
        if current.is_closed() {
            debug!("[SESSION] Link closed before '{}' ran", command.name());
            return Step::End(close_result(&current));
        }

        match command {
            Command::Grab(grab) => {
                self.execute_grab(grab);
                Step::Continue
            }
            Command::SampleRequest { .. } => self.execute_sample(link),
            Command::Evict => Step::End(Err(SessionError::Superseded)),
        }
    }

    fn execute_grab(&self, grab: GrabCommand) {
        self.state.capture_config.write(grab.capture);

        if grab.button {
            info!("[SESSION] Grab waits for the capture button");
            self.state.arm_tap();
            return;
        }

        if let InvokeOutcome::Queued(depth) = self.state.capability.invoke_or_queue() {
            debug!("[SESSION] Camera not ready; grab queued ({} pending)", depth);
        }
        self.state.throttle().record_now(CommandKind::Grab);
    }

    fn execute_sample(&self, link: &LinkSender) -> Step {
        let frame = self.state.sensors.current_frame();
        let text = match encode_sensor_frame(&frame) {
            Ok(text) => text,
            Err(e) => {
                warn!("[SESSION] Could not serialize sensor frame: {}", e);
                return Step::Continue;
            }
        };

        if link.send(Frame::Text(text)).is_err() {
            return Step::End(close_result(&link.state()));
        }
        self.state.throttle().record_now(CommandKind::Imu);
        Step::Continue
    }

    fn finish(&self, result: Result<(), SessionError>) -> Result<(), SessionError> {
        self.state.photo_submitter().detach();
        self.state.disarm_tap();
        let dropped = self.state.capability.cancel_pending();
        if dropped > 0 {
            debug!("[SESSION] Dropped {} grab(s) still waiting for the camera", dropped);
        }

        match &result {
            Ok(()) => info!("[SESSION] Session closed by device"),
            Err(e) => warn!("[SESSION] Session ended: {}", e),
        }
        let phase = match &result {
            Err(e) if e.is_unavailable() => SessionPhase::Unavailable,
            _ => SessionPhase::Closed,
        };
        self.state.phase.write(phase);
        result
    }
}

fn decode_frame(frame: Frame) -> Result<Command, DecodeError> {
    match frame {
        Frame::Text(text) => Command::decode(&text),
        Frame::Binary(data) => Err(DecodeError::UnexpectedBinary(data.len())),
    }
}

fn throttled_kind(command: &Command) -> Option<CommandKind> {
    match command {
        Command::Grab(_) => Some(CommandKind::Grab),
        Command::SampleRequest { .. } => Some(CommandKind::Imu),
        Command::Evict => None,
    }
}

fn close_result(state: &LinkState) -> Result<(), SessionError> {
    match state {
        LinkState::Closed(CloseCause::Local) => Ok(()),
        LinkState::Closed(CloseCause::Error(reason)) => Err(SessionError::Transport(
            TransportError::ReceiveFailed(reason.clone()),
        )),
        _ => Err(SessionError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::SensorFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn_engine(state: DeviceState) -> (DuplexLink, tokio::task::JoinHandle<Result<(), SessionError>>) {
        let (device, controller) = DuplexLink::pair();
        let engine = SessionEngine::new(state);
        let handle = tokio::spawn(async move { engine.run(device).await });
        (controller, handle)
    }

    #[tokio::test]
    async fn test_decode_error_keeps_session_open() {
        let state = DeviceState::default();
        let (mut controller, handle) = spawn_engine(state.clone());

        controller.send(Frame::Text("{\"cmd\":\"reboot\"}".into())).unwrap();
        controller.send(Frame::Binary(vec![1, 2])).unwrap();
        controller.send(Frame::Text("{\"cmd\":\"imu\",\"wait\":null}".into())).unwrap();

        let reply = controller.recv().await.unwrap();
        let frame: SensorFrame = serde_json::from_str(reply.as_text().unwrap()).unwrap();
        assert!(frame.error.is_some());
        assert_eq!(
            state.last_decode_error.read(),
            Some(DecodeError::UnexpectedBinary(2))
        );
        assert_eq!(state.phase.read(), SessionPhase::Open);

        controller.close();
        assert!(matches!(handle.await.unwrap(), Err(SessionError::Closed)));
        assert_eq!(state.phase.read(), SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_grab_invokes_ready_capability() {
        let state = DeviceState::default();
        let captures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&captures);
        state.capability.register(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let (controller, handle) = spawn_engine(state.clone());
        controller
            .send(Frame::Text(
                r#"{"cmd":"grab","frontFacing":true,"button":false,"wait":null,
                    "encoding":"png","quality":80,"resolution":[32,24]}"#
                    .into(),
            ))
            .unwrap();
        controller.send(Frame::Text(r#"{"cmd":"disconnect"}"#.into())).unwrap();

        assert!(matches!(handle.await.unwrap(), Err(SessionError::Superseded)));
        assert_eq!(captures.load(Ordering::SeqCst), 1);
        assert_eq!(state.capture_config.read().resolution, (32, 24));
        assert!(state.capture_config.read().facing.is_front());
    }

    #[tokio::test]
    async fn test_local_disconnect_ends_run_cleanly() {
        let state = DeviceState::default();
        let (_controller, handle) = spawn_engine(state.clone());

        tokio::time::timeout(Duration::from_secs(5), async {
            while state.phase.read() != SessionPhase::Open {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(state.disconnect());
        assert!(handle.await.unwrap().is_ok());
        assert_eq!(state.phase.read(), SessionPhase::Closed);
        assert!(!state.photo_submitter().is_attached());
    }

    #[tokio::test]
    async fn test_link_failing_before_open_is_unavailable() {
        let (link, driver) = DuplexLink::new();
        driver.mark_closed(CloseCause::Error("connection refused".into()));

        let state = DeviceState::default();
        let engine = SessionEngine::new(state.clone());
        let result = engine.run(link).await;

        assert!(matches!(
            result,
            Err(SessionError::Transport(TransportError::ConnectFailed(_)))
        ));
        assert_eq!(state.phase.read(), SessionPhase::Unavailable);
    }
}
