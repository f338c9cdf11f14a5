//! wss:// integration tests
//!
//! The fixtures are a self-signed certificate for `localhost` and its key.

#[cfg(all(feature = "tls", feature = "websocket-server", feature = "websocket-client"))]
mod tls_tests {
    use phone_sensor_transports::prelude::*;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tokio::time::timeout;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    async fn start_secure_server() -> (ExclusiveWsServer, u16) {
        let config = ServerConfig::new("127.0.0.1:0")
            .with_path("/ws")
            .with_tls(fixture("localhost.pem"), fixture("localhost-key.pem"));
        let mut server = ExclusiveWsServer::new(config).unwrap();
        assert!(server.is_secure());
        server.start_async().await.unwrap();
        let port = server.local_addr().unwrap().port();
        (server, port)
    }

    #[tokio::test]
    async fn test_pinned_certificate_round_trip() {
        let (mut server, port) = start_secure_server().await;

        let config = ClientConfig::new(format!("wss://localhost:{}/ws", port))
            .with_ca_cert(fixture("localhost.pem"));
        let mut client = WsDuplex::new(config).unwrap();
        let mut device = client.start_async().await.unwrap();

        let mut controller = timeout(Duration::from_secs(2), server.next_client())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.generation, 1);

        controller
            .link
            .send(Frame::Text(r#"{"cmd":"imu","wait":null}"#.to_string()))
            .unwrap();
        let received = timeout(Duration::from_secs(2), device.recv()).await.unwrap();
        assert_eq!(
            received,
            Some(Frame::Text(r#"{"cmd":"imu","wait":null}"#.to_string()))
        );

        device.send(Frame::Binary(vec![0, 0, 0, 0, 0, 0, 0, 1, 0xff])).unwrap();
        let received = timeout(Duration::from_secs(2), controller.link.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(Frame::Binary(vec![0, 0, 0, 0, 0, 0, 0, 1, 0xff])));

        server.stop().unwrap();
    }

    #[tokio::test]
    async fn test_self_signed_certificate_untrusted_without_pin() {
        let (mut server, port) = start_secure_server().await;

        let config = ClientConfig::new(format!("wss://localhost:{}/ws", port))
            .with_connect_timeout(Duration::from_secs(2));
        let mut client = WsDuplex::new(config).unwrap();
        assert!(matches!(
            client.start_async().await,
            Err(TransportError::ConnectFailed(_))
        ));
        assert!(server.try_next_client().unwrap().is_none());

        server.stop().unwrap();
    }

    #[tokio::test]
    async fn test_plain_client_rejected_by_secure_server() {
        let (mut server, port) = start_secure_server().await;

        let config = ClientConfig::new(format!("ws://127.0.0.1:{}/ws", port))
            .with_connect_timeout(Duration::from_secs(2));
        let mut client = WsDuplex::new(config).unwrap();
        assert!(client.start_async().await.is_err());
        assert_eq!(*server.watch_generation().borrow(), 0);

        server.stop().unwrap();
    }
}
