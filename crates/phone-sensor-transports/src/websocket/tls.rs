// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! rustls plumbing for wss://
//!
//! The controller usually runs with a self-signed certificate, so the client
//! can pin that certificate instead of relying on the webpki roots.

use crate::common::{TlsFiles, TransportError, TransportResult};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::Connector;

fn open_pem(path: &Path) -> TransportResult<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| {
        TransportError::InvalidConfig(format!("Cannot read {}: {}", path.display(), e))
    })
}

/// Every certificate in a PEM file
pub fn load_certs(path: &Path) -> TransportResult<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open_pem(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(TransportError::InvalidConfig(format!(
            "No certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// First private key (PKCS#8, PKCS#1 or SEC1) in a PEM file
pub fn load_private_key(path: &Path) -> TransportResult<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open_pem(path)?)
        .map_err(|e| TransportError::InvalidConfig(format!("{}: {}", path.display(), e)))?
        .ok_or_else(|| {
            TransportError::InvalidConfig(format!("No private key found in {}", path.display()))
        })
}

/// Acceptor serving the given certificate chain
pub fn server_acceptor(files: &TlsFiles) -> TransportResult<TlsAcceptor> {
    let certs = load_certs(&files.cert_path)?;
    let key = load_private_key(&files.key_path)?;
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| TransportError::InvalidConfig(format!("TLS certificate rejected: {}", e)))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Connector trusting only `ca_cert_path`, or `None` for the webpki roots
#[cfg_attr(not(feature = "websocket-client"), allow(dead_code))]
pub(crate) fn client_connector(ca_cert_path: Option<&Path>) -> TransportResult<Option<Connector>> {
    let Some(path) = ca_cert_path else {
        return Ok(None);
    };

    let mut roots = rustls::RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .map_err(|e| TransportError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    }
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Some(Connector::Rustls(Arc::new(config))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    #[test]
    fn test_fixture_certificate_loads() {
        let files = TlsFiles {
            cert_path: fixture("localhost.pem"),
            key_path: fixture("localhost-key.pem"),
        };
        assert_eq!(load_certs(&files.cert_path).unwrap().len(), 1);
        assert!(server_acceptor(&files).is_ok());
        assert!(client_connector(Some(&files.cert_path)).unwrap().is_some());
        assert!(client_connector(None).unwrap().is_none());
    }

    #[test]
    fn test_key_file_without_certificate_rejected() {
        let result = load_certs(&fixture("localhost-key.pem"));
        assert!(matches!(result, Err(TransportError::InvalidConfig(_))));
    }

    #[test]
    fn test_missing_file_is_invalid_config() {
        match load_private_key(&fixture("missing.pem")) {
            Err(TransportError::InvalidConfig(msg)) => assert!(msg.contains("missing.pem")),
            other => panic!("expected InvalidConfig, got {:?}", other.map(|_| ())),
        }
    }
}
