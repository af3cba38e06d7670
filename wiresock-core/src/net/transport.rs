use std::{io, sync::Arc};

use async_trait::async_trait;
use rustls::{ClientConfig, ServerName};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_rustls::{client::TlsStream, TlsConnector};

use crate::{tls, SocketAddress};

/// A raw bidirectional byte stream produced by a [`Transport`].
///
/// Closing a connection is `shutdown` followed by drop.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn remote_address(&self) -> String;

    fn local_address(&self) -> String;
}

pub type BoxConnection = Box<dyn Connection>;

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn remote_address(&self) -> String {
        (**self).remote_address()
    }

    fn local_address(&self) -> String {
        (**self).local_address()
    }
}

impl Connection for TcpStream {
    fn remote_address(&self) -> String {
        self.peer_addr().map(|addr| addr.to_string()).unwrap_or_default()
    }

    fn local_address(&self) -> String {
        self.local_addr().map(|addr| addr.to_string()).unwrap_or_default()
    }
}

impl<IO: Connection> Connection for TlsStream<IO> {
    fn remote_address(&self) -> String {
        self.get_ref().0.remote_address()
    }

    fn local_address(&self) -> String {
        self.get_ref().0.local_address()
    }
}

/// Establishes the connections a socket runs on.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a plaintext connection.
    async fn connect(&self, addr: &SocketAddress) -> io::Result<BoxConnection>;

    /// Open a connection with TLS already negotiated.
    async fn connect_tls(&self, addr: &SocketAddress) -> io::Result<BoxConnection>;

    /// Negotiate TLS over an established plaintext connection.
    async fn upgrade_tls(&self, conn: BoxConnection, addr: &SocketAddress) -> io::Result<BoxConnection>;
}

/// TCP transport with rustls on top.
#[derive(Clone)]
pub struct TcpTransport {
    tls_config: Arc<ClientConfig>,
}

impl TcpTransport {
    pub fn new(tls_config: Arc<ClientConfig>) -> Self {
        Self { tls_config }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Arc::new(tls::default_client_config()))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, addr: &SocketAddress) -> io::Result<BoxConnection> {
        log::debug!("[{}] [tcp] connecting...", addr);

        let stream = TcpStream::connect((addr.hostname(), addr.port())).await?;
        stream.set_nodelay(true)?;

        log::debug!("[{}] [tcp] connected from {}", addr, stream.local_address());

        Ok(Box::new(stream))
    }

    async fn connect_tls(&self, addr: &SocketAddress) -> io::Result<BoxConnection> {
        let conn = self.connect(addr).await?;
        self.upgrade_tls(conn, addr).await
    }

    async fn upgrade_tls(&self, conn: BoxConnection, addr: &SocketAddress) -> io::Result<BoxConnection> {
        let server_name = ServerName::try_from(addr.hostname())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        log::debug!("[{}] [tls] handshaking...", addr);

        let connector = TlsConnector::from(self.tls_config.clone());
        let stream = connector.connect(server_name, conn).await?;

        log::debug!("[{}] [tls] handshake done", addr);

        Ok(Box::new(stream))
    }
}
