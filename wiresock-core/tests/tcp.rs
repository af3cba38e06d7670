use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerConfig};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;
use wiresock_core::{connect_with, SecureTransport, SocketError, SocketOptions, SocketState, TcpTransport, Transport};

struct TestCert {
    cert: Certificate,
    key: PrivateKey,
}

fn self_signed() -> TestCert {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

    TestCert {
        cert: Certificate(cert.serialize_der().unwrap()),
        key: PrivateKey(cert.serialize_private_key_der()),
    }
}

fn acceptor(test_cert: &TestCert) -> TlsAcceptor {
    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(vec![test_cert.cert.clone()], test_cert.key.clone())
        .unwrap();

    TlsAcceptor::from(Arc::new(config))
}

fn transport_trusting(test_cert: &TestCert) -> Arc<dyn Transport> {
    let mut roots = RootCertStore::empty();
    roots.add(&test_cert.cert).unwrap();

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Arc::new(TcpTransport::new(Arc::new(config)))
}

async fn echo<S: AsyncRead + AsyncWrite + Unpin>(mut stream: S) {
    let mut buf = vec![0u8; 1024];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        if stream.write_all(&buf[..n]).await.is_err() {
            return;
        }
        let _ = stream.flush().await;
    }
}

async fn listen() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn test_tcp_echo() {
    let (listener, addr) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        echo(stream).await;
    });

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::default());
    let mut socket = connect_with(transport, addr, SocketOptions::default()).unwrap();

    let info = socket.opened().await.unwrap();
    assert_eq!(info.remote_address, addr.to_string());
    assert!(info.local_address.starts_with("127.0.0.1:"));

    let mut readable = socket.readable().unwrap();
    let writable = socket.writable().unwrap();

    writable.write(b"hello\r\n").await.unwrap();
    assert_eq!(readable.read().await.unwrap(), Some(Bytes::from_static(b"hello\r\n")));

    socket.close().await;
    assert_eq!(socket.state(), SocketState::Closed);
    assert_eq!(readable.read().await.unwrap(), None);
}

#[tokio::test]
async fn test_tcp_connection_refused() {
    let (listener, addr) = listen().await;
    drop(listener);

    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::default());
    let socket = connect_with(transport, addr, SocketOptions::default()).unwrap();

    assert!(matches!(socket.opened().await, Err(SocketError::Connection(_))));
    assert_eq!(socket.state(), SocketState::Failed);
}

#[tokio::test]
async fn test_tls_echo() {
    let test_cert = self_signed();
    let acceptor = acceptor(&test_cert);
    let (listener, addr) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let stream = acceptor.accept(stream).await.unwrap();
        echo(stream).await;
    });

    let options = SocketOptions {
        secure_transport: SecureTransport::On,
        ..Default::default()
    };
    let mut socket = connect_with(transport_trusting(&test_cert), format!("localhost:{}", addr.port()), options).unwrap();

    socket.opened().await.unwrap();

    let mut readable = socket.readable().unwrap();
    let writable = socket.writable().unwrap();

    writable.write(b"over tls").await.unwrap();
    assert_eq!(readable.read().await.unwrap(), Some(Bytes::from_static(b"over tls")));

    socket.close().await;
}

#[tokio::test]
async fn test_tls_rejects_untrusted_certificate() {
    let test_cert = self_signed();
    let acceptor = acceptor(&test_cert);
    let (listener, addr) = listen().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let _ = acceptor.accept(stream).await;
    });

    let options = SocketOptions {
        secure_transport: SecureTransport::On,
        ..Default::default()
    };
    let transport: Arc<dyn Transport> = Arc::new(TcpTransport::default());
    let socket = connect_with(transport, format!("localhost:{}", addr.port()), options).unwrap();

    assert!(matches!(socket.opened().await, Err(SocketError::Connection(_))));
}

#[tokio::test]
async fn test_starttls_upgrade() {
    let test_cert = self_signed();
    let acceptor = acceptor(&test_cert);
    let (listener, addr) = listen().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut line = vec![];
        while !line.ends_with(b"\r\n") {
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            line.extend_from_slice(&buf[..n]);
        }
        assert_eq!(line, b"STARTTLS\r\n");

        stream.write_all(b"220 ready\r\n").await.unwrap();

        let stream = acceptor.accept(stream).await.unwrap();
        echo(stream).await;
    });

    let options = SocketOptions {
        secure_transport: SecureTransport::StartTls,
        ..Default::default()
    };
    let mut socket = connect_with(transport_trusting(&test_cert), format!("localhost:{}", addr.port()), options).unwrap();

    let mut readable = socket.readable().unwrap();
    let writable = socket.writable().unwrap();

    writable.write(b"STARTTLS\r\n").await.unwrap();
    assert_eq!(readable.read().await.unwrap(), Some(Bytes::from_static(b"220 ready\r\n")));

    let mut secure = socket.start_tls().unwrap();
    let info = secure.opened().await.unwrap();
    assert_eq!(info.remote_address, socket.opened().await.unwrap().remote_address);
    assert_eq!(socket.state(), SocketState::Retired);

    let mut secure_readable = secure.readable().unwrap();
    let secure_writable = secure.writable().unwrap();

    secure_writable.write(b"secret").await.unwrap();
    assert_eq!(secure_readable.read().await.unwrap(), Some(Bytes::from_static(b"secret")));

    secure.close().await;
    assert_eq!(secure.state(), SocketState::Closed);
}
