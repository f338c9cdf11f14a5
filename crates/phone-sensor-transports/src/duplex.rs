// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Duplex message links
//!
//! A [`DuplexLink`] is the application's end of one connection: frames go out
//! through an unbounded queue, frames come in through another, and the
//! connection's lifecycle is published through a `watch` channel. The
//! transport owns the other end, a [`LinkDriver`], and pumps frames between
//! the queues and the wire.
//!
//! Closing is a state transition. The first `Closed` cause wins and later
//! attempts are ignored, so "closed locally" and "closed by the peer" never
//! overwrite each other.

use crate::common::{Frame, TransportError, TransportResult};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Why a link stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// This side asked for the close
    Local,
    /// The peer closed the connection
    Remote,
    /// The connection failed (handshake, I/O or protocol error)
    Error(String),
}

/// Lifecycle of a link: `Connecting -> Open -> Closed` (terminal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Open,
    Closed(CloseCause),
}

impl LinkState {
    pub fn is_open(&self) -> bool {
        matches!(self, LinkState::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LinkState::Closed(_))
    }
}

fn transition_closed(state: &watch::Sender<LinkState>, cause: CloseCause) -> bool {
    state.send_if_modified(|current| {
        if current.is_closed() {
            false
        } else {
            *current = LinkState::Closed(cause);
            true
        }
    })
}

/// Cloneable sending half of a link
#[derive(Clone)]
pub struct LinkSender {
    frames: mpsc::UnboundedSender<Frame>,
    state: Arc<watch::Sender<LinkState>>,
}

impl LinkSender {
    /// Queue a frame for transmission
    ///
    /// Fails with `ConnectionClosed` once the link is closed. Frames queued
    /// while the link is still connecting are sent after the handshake.
    pub fn send(&self, frame: Frame) -> TransportResult<()> {
        if self.state.borrow().is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        self.frames
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    pub fn send_text(&self, text: impl Into<String>) -> TransportResult<()> {
        self.send(Frame::Text(text.into()))
    }

    pub fn send_binary(&self, data: Vec<u8>) -> TransportResult<()> {
        self.send(Frame::Binary(data))
    }

    /// Close the link from this side; frames already queued are still flushed
    pub fn close(&self) {
        if transition_closed(&self.state, CloseCause::Local) {
            debug!("[LINK] Closed locally");
        }
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }
}

/// Receiving half of a link
pub struct LinkReceiver {
    frames: mpsc::UnboundedReceiver<Frame>,
    state: watch::Receiver<LinkState>,
}

impl LinkReceiver {
    /// Next inbound frame
    ///
    /// Returns `None` once the link is closed and every frame received before
    /// the close has been handed out.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            if self.state.borrow_and_update().is_closed() {
                return self.frames.try_recv().ok();
            }
            tokio::select! {
                biased;
                frame = self.frames.recv() => return frame,
                changed = self.state.changed() => {
                    if changed.is_err() {
                        return self.frames.try_recv().ok();
                    }
                }
            }
        }
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> TransportResult<Frame> {
        match self.frames.try_recv() {
            Ok(frame) => Ok(frame),
            Err(mpsc::error::TryRecvError::Empty) => {
                if self.state.borrow().is_closed() {
                    Err(TransportError::ConnectionClosed)
                } else {
                    Err(TransportError::NoData)
                }
            }
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::ConnectionClosed),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().clone()
    }
}

/// The application's end of a connection
pub struct DuplexLink {
    sender: LinkSender,
    receiver: LinkReceiver,
}

impl DuplexLink {
    /// Create a link in the `Connecting` state together with the driver a
    /// transport uses to feed it
    pub fn new() -> (DuplexLink, LinkDriver) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(LinkState::Connecting);
        let state = Arc::new(state_tx);

        let link = DuplexLink {
            sender: LinkSender {
                frames: outgoing_tx,
                state: Arc::clone(&state),
            },
            receiver: LinkReceiver {
                frames: incoming_rx,
                state: state_rx,
            },
        };
        let driver = LinkDriver {
            outgoing: outgoing_rx,
            incoming: incoming_tx,
            state,
        };
        (link, driver)
    }

    /// Two open links wired to each other in memory
    ///
    /// Closing one end closes the other with [`CloseCause::Remote`]. Must be
    /// called from within a Tokio runtime.
    pub fn pair() -> (DuplexLink, DuplexLink) {
        let (a, driver_a) = DuplexLink::new();
        let (b, driver_b) = DuplexLink::new();
        driver_a.mark_open();
        driver_b.mark_open();
        tokio::spawn(bridge(driver_a, driver_b));
        (a, b)
    }

    /// A cloneable handle for sending on this link
    pub fn sender(&self) -> LinkSender {
        self.sender.clone()
    }

    pub fn send(&self, frame: Frame) -> TransportResult<()> {
        self.sender.send(frame)
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> TransportResult<Frame> {
        self.receiver.try_recv()
    }

    pub fn close(&self) {
        self.sender.close();
    }

    pub fn state(&self) -> LinkState {
        self.sender.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.sender.watch_state()
    }

    pub fn into_split(self) -> (LinkSender, LinkReceiver) {
        (self.sender, self.receiver)
    }
}

/// Transport-side end of a [`DuplexLink`]
pub struct LinkDriver {
    pub(crate) outgoing: mpsc::UnboundedReceiver<Frame>,
    pub(crate) incoming: mpsc::UnboundedSender<Frame>,
    pub(crate) state: Arc<watch::Sender<LinkState>>,
}

impl LinkDriver {
    /// `Connecting -> Open`; returns false if the link already left `Connecting`
    pub fn mark_open(&self) -> bool {
        self.state.send_if_modified(|current| {
            if matches!(current, LinkState::Connecting) {
                *current = LinkState::Open;
                true
            } else {
                false
            }
        })
    }

    /// Move to `Closed(cause)` unless already closed
    pub fn mark_closed(&self, cause: CloseCause) -> bool {
        transition_closed(&self.state, cause)
    }

    /// Hand an inbound frame to the application; false if nobody is listening
    pub fn deliver(&self, frame: Frame) -> bool {
        self.incoming.send(frame).is_ok()
    }

    /// Next frame the application queued for transmission
    pub async fn next_outgoing(&mut self) -> Option<Frame> {
        self.outgoing.recv().await
    }

    pub fn state(&self) -> LinkState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }
}

async fn bridge(mut a: LinkDriver, mut b: LinkDriver) {
    let mut a_state = a.watch_state();
    let mut b_state = b.watch_state();

    loop {
        tokio::select! {
            biased;
            frame = a.outgoing.recv() => match frame {
                Some(frame) => { let _ = b.incoming.send(frame); }
                None => { b.mark_closed(CloseCause::Remote); break; }
            },
            frame = b.outgoing.recv() => match frame {
                Some(frame) => { let _ = a.incoming.send(frame); }
                None => { a.mark_closed(CloseCause::Remote); break; }
            },
            _ = a_state.changed() => {
                if a_state.borrow_and_update().is_closed() {
                    b.mark_closed(CloseCause::Remote);
                    break;
                }
            },
            _ = b_state.changed() => {
                if b_state.borrow_and_update().is_closed() {
                    a.mark_closed(CloseCause::Remote);
                    break;
                }
            },
        }
    }
}
