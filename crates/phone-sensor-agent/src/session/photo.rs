// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Outbound photo submission
//!
//! The capture pipeline hands finished images to a [`PhotoSubmitter`]. The
//! submitter is created with the device state, before any connection exists;
//! the session engine attaches the live link while a session is open.

use crate::protocol::{encode_photo, unix_millis_now};
use crate::reactive::ReactiveCell;
use parking_lot::RwLock;
use phone_sensor_transports::{Frame, LinkSender, TransportError, TransportResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Packages images as photo blobs and sends them on the open session
#[derive(Clone)]
pub struct PhotoSubmitter {
    link: Arc<RwLock<Option<LinkSender>>>,
    waiting_on_button: ReactiveCell<bool>,
}

impl PhotoSubmitter {
    pub(crate) fn new(waiting_on_button: ReactiveCell<bool>) -> Self {
        Self {
            link: Arc::new(RwLock::new(None)),
            waiting_on_button,
        }
    }

    /// Send `image` stamped with the current time
    pub fn submit(&self, image: Vec<u8>) -> TransportResult<()> {
        self.submit_at(unix_millis_now(), image)
    }

    /// Send `image` stamped with `timestamp_ms`
    ///
    /// Clears the waiting-on-button flag as transmission begins. The frame is
    /// queued on the link and not awaited.
    pub fn submit_at(&self, timestamp_ms: u64, image: Vec<u8>) -> TransportResult<()> {
        if self.waiting_on_button.read() {
            self.waiting_on_button.write(false);
        }

        let link = self.link.read().clone();
        let Some(link) = link else {
            warn!("[PHOTO] No open session; dropping {} byte photo", image.len());
            return Err(TransportError::NotRunning);
        };

        debug!("[PHOTO] Sending {} byte photo taken at {}", image.len(), timestamp_ms);
        link.send(Frame::Binary(encode_photo(timestamp_ms, &image)))
    }

    pub fn is_attached(&self) -> bool {
        self.link
            .read()
            .as_ref()
            .is_some_and(|link| !link.state().is_closed())
    }

    pub(crate) fn attach(&self, link: LinkSender) {
        *self.link.write() = Some(link);
    }

    pub(crate) fn detach(&self) {
        *self.link.write() = None;
    }

    pub(crate) fn close_link(&self) -> bool {
        match self.link.read().as_ref() {
            Some(link) if !link.state().is_closed() => {
                link.close();
                true
            }
            _ => false,
        }
    }
}
