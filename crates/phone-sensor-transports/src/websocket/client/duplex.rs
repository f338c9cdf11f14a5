// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! WebSocket duplex client
//!
//! Connects to a server and exposes the connection as a [`DuplexLink`]. The
//! link exists from the moment the transport starts; it reports `Connecting`
//! until the handshake completes, then `Open`, then `Closed`.
//!
//! With the `tls` feature, `wss://` addresses are secured with rustls.

use crate::common::{ClientConfig, TransportError, TransportResult};
use crate::duplex::{CloseCause, DuplexLink, LinkSender, LinkState};
use crate::traits::Transport;
use crate::websocket::common::{drive_socket, normalize_url, socket_config};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;
#[cfg(not(feature = "tls"))]
use tokio_tungstenite::connect_async_with_config;
#[cfg(feature = "tls")]
use tokio_tungstenite::connect_async_tls_with_config;
use tracing::{info, warn};

/// WebSocket client producing a single [`DuplexLink`]
pub struct WsDuplex {
    config: ClientConfig,
    running: Arc<RwLock<bool>>,
    client_handle: Option<JoinHandle<()>>,
    pending_link: Option<DuplexLink>,
    link_sender: Option<LinkSender>,
}

impl WsDuplex {
    /// Create a new WebSocket duplex client
    pub fn new(config: ClientConfig) -> TransportResult<Self> {
        config.validate()?;

        Ok(Self {
            config,
            running: Arc::new(RwLock::new(false)),
            client_handle: None,
            pending_link: None,
            link_sender: None,
        })
    }

    /// Create with address
    pub fn with_address(address: impl Into<String>) -> TransportResult<Self> {
        Self::new(ClientConfig::new(address))
    }

    /// URL the client connects to
    pub fn url(&self) -> String {
        normalize_url(&self.config.base.address)
    }

    /// Take the link created by [`Transport::start`]
    pub fn take_link(&mut self) -> Option<DuplexLink> {
        self.pending_link.take()
    }

    /// Start and wait for the handshake to settle
    pub async fn start_async(&mut self) -> TransportResult<DuplexLink> {
        self.start()?;
        let link = self.take_link().ok_or(TransportError::NotRunning)?;

        let mut state = link.watch_state();
        let settled = state
            .wait_for(|s| !matches!(s, LinkState::Connecting))
            .await
            .map(|s| s.clone())
            .map_err(|_| TransportError::ConnectionClosed)?;

        match settled {
            LinkState::Open => Ok(link),
            LinkState::Closed(CloseCause::Error(reason)) => {
                Err(TransportError::ConnectFailed(reason))
            }
            LinkState::Closed(_) | LinkState::Connecting => Err(TransportError::ConnectionClosed),
        }
    }
}

impl Transport for WsDuplex {
    fn start(&mut self) -> TransportResult<()> {
        if *self.running.read() {
            return Err(TransportError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::InitializationFailed(e.to_string()))?;

        let url = self.url();
        let connect_timeout = self.config.connect_timeout;
        let ws_config = socket_config(self.config.base.max_message_size);
        #[cfg(feature = "tls")]
        let connector =
            crate::websocket::tls::client_connector(self.config.ca_cert_path.as_deref())?;
        let (link, driver) = DuplexLink::new();
        let running = self.running.clone();
        *running.write() = true;

        let handle = runtime.spawn(async move {
            #[cfg(feature = "tls")]
            let connect =
                connect_async_tls_with_config(url.as_str(), Some(ws_config), true, connector);
            #[cfg(not(feature = "tls"))]
            let connect = connect_async_with_config(url.as_str(), Some(ws_config), true);
            match tokio::time::timeout(connect_timeout, connect).await {
                Ok(Ok((ws_stream, _))) => {
                    info!("🦀 [WS-DUPLEX] Connected to {}", url);
                    driver.mark_open();
                    drive_socket(ws_stream, driver, "WS-DUPLEX").await;
                    info!("[WS-DUPLEX] Disconnected from {}", url);
                }
                Ok(Err(e)) => {
                    warn!("[WS-DUPLEX] Connection to {} failed: {}", url, e);
                    driver.mark_closed(CloseCause::Error(e.to_string()));
                }
                Err(_) => {
                    warn!("[WS-DUPLEX] Connection to {} timed out", url);
                    driver.mark_closed(CloseCause::Error(format!(
                        "connect timed out after {:?}",
                        connect_timeout
                    )));
                }
            }
            *running.write() = false;
        });

        self.link_sender = Some(link.sender());
        self.pending_link = Some(link);
        self.client_handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> TransportResult<()> {
        if let Some(sender) = self.link_sender.take() {
            sender.close();
        }
        self.pending_link = None;
        // the socket task exits on its own once the close is flushed
        self.client_handle = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.running.read()
    }

    fn transport_type(&self) -> &str {
        "websocket-duplex"
    }
}
