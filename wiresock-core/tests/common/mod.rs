#![allow(dead_code)]

use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use async_trait::async_trait;
use tokio::{
    io::{duplex, AsyncRead, AsyncWrite, DuplexStream, ReadBuf},
    sync::{mpsc, oneshot},
};
use wiresock_core::{BoxConnection, Connection, SocketAddress, Transport};

pub const STUB_LOCAL_ADDRESS: &str = "127.0.0.1:49152";

/// In-memory connection; the other end of the pipe is handed to the test.
pub struct StubConnection {
    inner: DuplexStream,
    remote: String,
}

impl AsyncRead for StubConnection {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for StubConnection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl Connection for StubConnection {
    fn remote_address(&self) -> String {
        self.remote.clone()
    }

    fn local_address(&self) -> String {
        STUB_LOCAL_ADDRESS.to_string()
    }
}

/// Transport that hands out in-memory pipes and records every call.
///
/// `upgrade_tls` keeps the very same pipe, so a test can check that the wire
/// survived the hand-over.
pub struct StubTransport {
    refuse: bool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    peers: mpsc::UnboundedSender<DuplexStream>,
    events: Arc<Mutex<Vec<String>>>,
}

pub struct StubHandle {
    pub transport: Arc<StubTransport>,
    pub peers: mpsc::UnboundedReceiver<DuplexStream>,
}

impl StubHandle {
    /// Remote end of the next connection the transport hands out.
    pub async fn peer(&mut self) -> DuplexStream {
        self.peers.recv().await.expect("stub transport dropped")
    }

    pub fn events(&self) -> Vec<String> {
        self.transport.events.lock().unwrap().clone()
    }
}

pub fn stub() -> StubHandle {
    build(false, None)
}

/// Connections fail with `ConnectionRefused`.
pub fn refusing_stub() -> StubHandle {
    build(true, None)
}

/// The first connection attempt stays pending until the sender fires.
pub fn gated_stub() -> (StubHandle, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel();
    (build(false, Some(rx)), tx)
}

fn build(refuse: bool, gate: Option<oneshot::Receiver<()>>) -> StubHandle {
    let (tx, rx) = mpsc::unbounded_channel();

    let transport = Arc::new(StubTransport {
        refuse,
        gate: Mutex::new(gate),
        peers: tx,
        events: Default::default(),
    });

    StubHandle { transport, peers: rx }
}

impl StubTransport {
    fn record(&self, event: &str, addr: &SocketAddress) {
        self.events.lock().unwrap().push(format!("{} {}", event, addr));
    }

    async fn open(&self, addr: &SocketAddress) -> io::Result<BoxConnection> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.refuse {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"));
        }

        let (local, remote) = duplex(64 * 1024);
        let _ = self.peers.send(remote);

        Ok(Box::new(StubConnection {
            inner: local,
            remote: addr.to_string(),
        }))
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn connect(&self, addr: &SocketAddress) -> io::Result<BoxConnection> {
        self.record("connect", addr);
        self.open(addr).await
    }

    async fn connect_tls(&self, addr: &SocketAddress) -> io::Result<BoxConnection> {
        self.record("connect_tls", addr);
        self.open(addr).await
    }

    async fn upgrade_tls(&self, conn: BoxConnection, addr: &SocketAddress) -> io::Result<BoxConnection> {
        self.record("upgrade_tls", addr);
        Ok(conn)
    }
}
