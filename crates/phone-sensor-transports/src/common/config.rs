// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Common configuration types for transports

use super::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Generic transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address to bind (server) or connect (client)
    pub address: String,

    /// Maximum message size (None = unlimited)
    pub max_message_size: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8765".to_string(),
            max_message_size: Some(100_000_000),
        }
    }
}

impl TransportConfig {
    /// Create a new config with the given address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Set maximum message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> TransportResult<()> {
        if self.address.is_empty() {
            return Err(TransportError::InvalidConfig(
                "Address cannot be empty".to_string(),
            ));
        }

        if self.max_message_size == Some(0) {
            return Err(TransportError::InvalidConfig(
                "Maximum message size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// PEM certificate chain and private key served over TLS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

fn require_tls_feature(what: &str) -> TransportResult<()> {
    if cfg!(feature = "tls") {
        Ok(())
    } else {
        Err(TransportError::InvalidConfig(format!(
            "{} requires the `tls` feature",
            what
        )))
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub base: TransportConfig,

    /// Only upgrade requests for this path (None = any path)
    pub path: Option<String>,

    /// Time allowed for a client to complete the TLS and WebSocket handshakes
    pub handshake_timeout: Duration,

    /// Serve wss:// with this certificate (None = plain ws://)
    #[serde(default)]
    pub tls: Option<TlsFiles>,
}

impl ServerConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            base: TransportConfig::new(address),
            path: None,
            handshake_timeout: Duration::from_secs(10),
            tls: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    pub fn validate(&self) -> TransportResult<()> {
        self.base.validate()?;
        if self.tls.is_some() {
            require_tls_feature("Serving wss://")?;
        }
        if let Some(path) = &self.path {
            if !path.starts_with('/') {
                return Err(TransportError::InvalidConfig(format!(
                    "Path must start with '/': {}",
                    path
                )));
            }
        }
        Ok(())
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(flatten)]
    pub base: TransportConfig,

    /// Give up on the handshake after this long
    pub connect_timeout: Duration,

    /// Trust only this PEM certificate for wss:// (None = webpki roots)
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            base: TransportConfig::new(address),
            connect_timeout: Duration::from_secs(5),
            ca_cert_path: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert_path = Some(path.into());
        self
    }

    /// Whether the address asks for wss://
    pub fn is_secure(&self) -> bool {
        self.base.address.starts_with("wss://")
    }

    pub fn validate(&self) -> TransportResult<()> {
        self.base.validate()?;
        if self.is_secure() {
            require_tls_feature("Connecting to wss://")?;
        }
        if self.ca_cert_path.is_some() {
            require_tls_feature("A pinned CA certificate")?;
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_address_rejected() {
        let config = ClientConfig::new("");
        assert!(matches!(
            config.validate(),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_server_path_must_be_absolute() {
        assert!(ServerConfig::new("127.0.0.1:0").with_path("/ws").validate().is_ok());
        assert!(ServerConfig::new("127.0.0.1:0").with_path("ws").validate().is_err());
    }

    #[cfg(not(feature = "tls"))]
    #[test]
    fn test_wss_rejected_without_tls_feature() {
        let client = ClientConfig::new("wss://phone.local/ws");
        assert!(client.is_secure());
        match client.validate() {
            Err(TransportError::InvalidConfig(msg)) => assert!(msg.contains("tls")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
        assert!(ClientConfig::new("ws://phone.local/ws")
            .with_ca_cert("ca.pem")
            .validate()
            .is_err());

        let server = ServerConfig::new("127.0.0.1:0").with_tls("cert.pem", "key.pem");
        assert!(matches!(
            server.validate(),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_wss_accepted_with_tls_feature() {
        assert!(ClientConfig::new("wss://phone.local/ws").validate().is_ok());
        assert!(ServerConfig::new("127.0.0.1:0")
            .with_tls("cert.pem", "key.pem")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_zero_message_size_rejected() {
        let config = TransportConfig::new("127.0.0.1:0").with_max_message_size(0);
        assert!(config.validate().is_err());
    }
}
