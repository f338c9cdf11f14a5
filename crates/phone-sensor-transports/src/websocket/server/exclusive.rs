// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Exclusive WebSocket server (last writer wins)
//!
//! At most one client is current. When a new client completes its handshake
//! while another is connected, the previous client receives
//! [`EVICTION_NOTICE`] and its link is closed before the new link is
//! published. Handshakes are processed one at a time, so the acceptance order
//! decides who ends up owning the server.

use crate::common::{Frame, ServerConfig, TransportError, TransportResult};
use crate::duplex::{DuplexLink, LinkSender};
use crate::traits::Transport;
use crate::websocket::common::{drive_socket, socket_config, EVICTION_NOTICE};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, warn};

/// A newly accepted client
pub struct ClientLink {
    /// Increments with every accepted client, starting at 1
    pub generation: u64,
    pub peer: SocketAddr,
    pub link: DuplexLink,
}

/// Byte stream under a server-side socket, plain TCP or TLS
trait ServerIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ServerIo for T {}

/// WebSocket server that keeps only the most recent client
pub struct ExclusiveWsServer {
    config: ServerConfig,
    #[cfg(feature = "tls")]
    tls: Option<tokio_rustls::TlsAcceptor>,
    running: Arc<RwLock<bool>>,
    server_handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    clients_rx: Option<mpsc::UnboundedReceiver<ClientLink>>,
    generation: Arc<watch::Sender<u64>>,
}

impl ExclusiveWsServer {
    /// Create a new exclusive server
    ///
    /// With TLS configured the certificate and key are loaded here, so a bad
    /// file fails construction rather than every handshake.
    pub fn new(config: ServerConfig) -> TransportResult<Self> {
        config.validate()?;
        #[cfg(feature = "tls")]
        let tls = config
            .tls
            .as_ref()
            .map(crate::websocket::tls::server_acceptor)
            .transpose()?;

        let (generation, _) = watch::channel(0);
        Ok(Self {
            config,
            #[cfg(feature = "tls")]
            tls,
            running: Arc::new(RwLock::new(false)),
            server_handle: None,
            local_addr: None,
            clients_rx: None,
            generation: Arc::new(generation),
        })
    }

    /// Create with address
    pub fn with_address(address: impl Into<String>) -> TransportResult<Self> {
        Self::new(ServerConfig::new(address))
    }

    /// Bind and start accepting clients
    pub async fn start_async(&mut self) -> TransportResult<()> {
        if *self.running.read() {
            return Err(TransportError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.config.base.address)
            .await
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        self.launch(listener)
    }

    /// Address the listener is bound to (useful with port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Wait for the next accepted client
    pub async fn next_client(&mut self) -> TransportResult<ClientLink> {
        let rx = self.clients_rx.as_mut().ok_or(TransportError::NotRunning)?;
        rx.recv().await.ok_or(TransportError::NotRunning)
    }

    /// Most recently accepted client not yet handed out, if any
    ///
    /// Older unclaimed clients are skipped; they have already been evicted.
    pub fn try_next_client(&mut self) -> TransportResult<Option<ClientLink>> {
        let rx = self.clients_rx.as_mut().ok_or(TransportError::NotRunning)?;
        let mut latest = None;
        loop {
            match rx.try_recv() {
                Ok(client) => latest = Some(client),
                Err(mpsc::error::TryRecvError::Empty) => return Ok(latest),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    return match latest {
                        Some(client) => Ok(Some(client)),
                        None => Err(TransportError::NotRunning),
                    }
                }
            }
        }
    }

    /// Whether clients must connect with `wss://`
    pub fn is_secure(&self) -> bool {
        self.config.tls.is_some()
    }

    /// Generation of the current client (0 before the first client)
    pub fn watch_generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn launch(&mut self, listener: TcpListener) -> TransportResult<()> {
        let local_addr = listener.local_addr()?;
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        info!("🦀 [WS-EXCLUSIVE] Listening on {} ({})", local_addr, scheme);

        let (clients_tx, clients_rx) = mpsc::unbounded_channel();
        *self.running.write() = true;

        let acceptor = Acceptor {
            config: self.config.clone(),
            #[cfg(feature = "tls")]
            tls: self.tls.clone(),
            clients_tx,
            generation: Arc::clone(&self.generation),
            current: None,
            accepted: 0,
        };
        let running = self.running.clone();
        let handle = tokio::spawn(async move {
            acceptor.run(listener).await;
            *running.write() = false;
        });

        self.local_addr = Some(local_addr);
        self.clients_rx = Some(clients_rx);
        self.server_handle = Some(handle);
        Ok(())
    }
}

impl Transport for ExclusiveWsServer {
    fn start(&mut self) -> TransportResult<()> {
        if *self.running.read() {
            return Err(TransportError::AlreadyRunning);
        }
        tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::InitializationFailed(e.to_string()))?;

        let std_listener = std::net::TcpListener::bind(&self.config.base.address)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener)?;
        self.launch(listener)
    }

    fn stop(&mut self) -> TransportResult<()> {
        *self.running.write() = false;
        self.clients_rx = None;

        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }

        Ok(())
    }

    fn is_running(&self) -> bool {
        *self.running.read()
    }

    fn transport_type(&self) -> &str {
        "websocket-exclusive"
    }
}

struct Acceptor {
    config: ServerConfig,
    #[cfg(feature = "tls")]
    tls: Option<tokio_rustls::TlsAcceptor>,
    clients_tx: mpsc::UnboundedSender<ClientLink>,
    generation: Arc<watch::Sender<u64>>,
    current: Option<LinkSender>,
    accepted: u64,
}

impl Acceptor {
    #[cfg(feature = "tls")]
    async fn secure(&self, stream: TcpStream, peer: SocketAddr) -> Option<Box<dyn ServerIo>> {
        let Some(tls) = &self.tls else {
            return Some(Box::new(stream));
        };
        match tokio::time::timeout(self.config.handshake_timeout, tls.accept(stream)).await {
            Ok(Ok(secured)) => Some(Box::new(secured)),
            Ok(Err(e)) => {
                warn!("[WS-EXCLUSIVE] TLS handshake with {} failed: {}", peer, e);
                None
            }
            Err(_) => {
                warn!("[WS-EXCLUSIVE] TLS handshake with {} timed out", peer);
                None
            }
        }
    }

    #[cfg(not(feature = "tls"))]
    async fn secure(&self, stream: TcpStream, _peer: SocketAddr) -> Option<Box<dyn ServerIo>> {
        Some(Box::new(stream))
    }

    async fn run(mut self, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("[WS-EXCLUSIVE] Accept error: {}", e);
                    continue;
                }
            };
            debug!("[WS-EXCLUSIVE] New connection from {}", peer);
            let Some(stream) = self.secure(stream, peer).await else {
                continue;
            };

            let path = self.config.path.clone();
            let check_path = move |request: &Request, response: Response| {
                match &path {
                    Some(expected) if request.uri().path() != expected.as_str() => {
                        let mut rejection =
                            ErrorResponse::new(Some(format!("no endpoint at {}", request.uri().path())));
                        *rejection.status_mut() = StatusCode::NOT_FOUND;
                        Err(rejection)
                    }
                    _ => Ok(response),
                }
            };

            let handshake = accept_hdr_async_with_config(
                stream,
                check_path,
                Some(socket_config(self.config.base.max_message_size)),
            );
            let ws_stream = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
                Ok(Ok(ws_stream)) => ws_stream,
                Ok(Err(e)) => {
                    warn!("[WS-EXCLUSIVE] Handshake with {} failed: {}", peer, e);
                    continue;
                }
                Err(_) => {
                    warn!("[WS-EXCLUSIVE] Handshake with {} timed out", peer);
                    continue;
                }
            };

            if let Some(previous) = self.current.take() {
                if !previous.state().is_closed() {
                    info!("[WS-EXCLUSIVE] {} replaces the current client; evicting it", peer);
                    let _ = previous.send(Frame::Text(EVICTION_NOTICE.to_string()));
                    previous.close();
                }
            }

            self.accepted += 1;
            let (link, driver) = DuplexLink::new();
            driver.mark_open();
            self.current = Some(link.sender());
            tokio::spawn(drive_socket(ws_stream, driver, "WS-EXCLUSIVE"));

            info!("[WS-EXCLUSIVE] Client {} connected (generation {})", peer, self.accepted);
            self.generation.send_replace(self.accepted);

            let client = ClientLink {
                generation: self.accepted,
                peer,
                link,
            };
            if self.clients_tx.send(client).is_err() {
                debug!("[WS-EXCLUSIVE] Server handle dropped; stopping accept loop");
                if let Some(current) = self.current.take() {
                    current.close();
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exclusive_server_start_stop() {
        let mut server = ExclusiveWsServer::with_address("127.0.0.1:0").unwrap();
        assert!(!server.is_running());
        assert!(server.local_addr().is_none());

        server.start_async().await.unwrap();
        assert!(server.is_running());
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(matches!(
            server.start_async().await,
            Err(TransportError::AlreadyRunning)
        ));

        server.stop().unwrap();
        assert!(!server.is_running());
        assert!(matches!(
            server.next_client().await,
            Err(TransportError::NotRunning)
        ));
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_unreadable_certificate_fails_construction() {
        let config = ServerConfig::new("127.0.0.1:0").with_tls("no-such-cert.pem", "no-such-key.pem");
        assert!(matches!(
            ExclusiveWsServer::new(config),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_sync_start_inside_runtime() {
        let mut server = ExclusiveWsServer::with_address("127.0.0.1:0").unwrap();
        server.start().unwrap();
        assert!(server.is_running());
        assert_eq!(*server.watch_generation().borrow(), 0);
        assert!(server.try_next_client().unwrap().is_none());
        server.stop().unwrap();
    }
}
