// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Common types and utilities for WebSocket transport

use crate::common::Frame;
use crate::duplex::{CloseCause, LinkDriver, LinkState};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

/// Text frame sent to a client that is being replaced by a newer one
pub const EVICTION_NOTICE: &str = r#"{"cmd":"disconnect"}"#;

/// Prefix `ws://` when the address carries no scheme
pub fn normalize_url(address: &str) -> String {
    if address.starts_with("ws://") || address.starts_with("wss://") {
        address.to_string()
    } else {
        format!("ws://{}", address)
    }
}

pub(crate) fn socket_config(max_message_size: Option<usize>) -> WebSocketConfig {
    WebSocketConfig {
        max_message_size,
        max_frame_size: max_message_size,
        ..Default::default()
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data),
        }
    }
}

/// Pump frames between a socket and a link driver until either side closes
pub(crate) async fn drive_socket<S>(ws: WebSocketStream<S>, driver: LinkDriver, tag: &'static str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();
    let LinkDriver {
        mut outgoing,
        incoming,
        state,
    } = driver;
    let mut state_rx = state.subscribe();

    let close_with = |cause: CloseCause| {
        state.send_if_modified(|current| {
            if current.is_closed() {
                false
            } else {
                *current = LinkState::Closed(cause);
                true
            }
        });
    };

    loop {
        tokio::select! {
            biased;
            frame = outgoing.recv() => match frame {
                Some(frame) => {
                    let size = frame.len();
                    if let Err(e) = write.send(Message::from(frame)).await {
                        warn!("[{}] Send of {} bytes failed: {}", tag, size, e);
                        close_with(CloseCause::Error(e.to_string()));
                        break;
                    }
                }
                None => {
                    close_with(CloseCause::Local);
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state_rx.borrow_and_update().clone();
                if current == LinkState::Closed(CloseCause::Local) {
                    // flush what the application queued before closing
                    while let Ok(frame) = outgoing.try_recv() {
                        if write.send(Message::from(frame)).await.is_err() {
                            break;
                        }
                    }
                    let _ = write.send(Message::Close(None)).await;
                    debug!("[{}] Closed by local request", tag);
                    break;
                }
                if current.is_closed() {
                    break;
                }
            },
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = incoming.send(Frame::Text(text));
                }
                Some(Ok(Message::Binary(data))) => {
                    let _ = incoming.send(Frame::Binary(data));
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("[{}] Peer closed the connection", tag);
                    close_with(CloseCause::Remote);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("[{}] Receive error: {}", tag, e);
                    close_with(CloseCause::Error(e.to_string()));
                    break;
                }
            },
        }
    }
}
