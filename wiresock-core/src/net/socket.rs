use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::{mpsc, watch},
};

use super::{
    address::IntoSocketAddress,
    io::{Readable, Writable},
    transport::{BoxConnection, Transport},
};
use crate::{config, global, utils::signal::Signal, Result, SecureTransport, SocketAddress, SocketError, SocketOptions};

type AsyncMutex<T> = tokio::sync::Mutex<T>;

pub(crate) type ChunkSender = mpsc::UnboundedSender<Result<Bytes>>;

pub(crate) type ChunkReceiver = mpsc::UnboundedReceiver<Result<Bytes>>;

type ConnectionSource = BoxFuture<'static, Result<BoxConnection>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
    Failed,
    /// The wire was handed over to the socket returned by `start_tls`.
    Retired,
}

impl SocketState {
    fn can_transition_to(self, next: SocketState) -> bool {
        use SocketState::*;

        matches!(
            (self, next),
            (Connecting, Open) | (Connecting, Failed) | (Connecting, Retired) | (Open, Retired) | (Open, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SocketState::Closed | SocketState::Failed | SocketState::Retired)
    }
}

impl Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SocketState::Connecting => "connecting",
            SocketState::Open => "open",
            SocketState::Closed => "closed",
            SocketState::Failed => "failed",
            SocketState::Retired => "retired",
        };

        write!(f, "{}", s)
    }
}

/// Addresses negotiated by the underlying connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketInfo {
    pub remote_address: String,
    pub local_address: String,
}

pub(crate) struct Shared {
    pub(crate) address: SocketAddress,

    pub(crate) options: SocketOptions,

    transport: Arc<dyn Transport>,

    state: watch::Sender<SocketState>,

    pub(crate) opened: Signal<Result<SocketInfo>>,

    pub(crate) closed: Signal<()>,

    reader: AsyncMutex<Option<ReadHalf<BoxConnection>>>,

    pub(crate) writer: AsyncMutex<Option<WriteHalf<BoxConnection>>>,

    // handed to the read pump once the connection opens
    chunks: Mutex<Option<ChunkSender>>,

    upgraded: AtomicBool,

    closing: AtomicBool,
}

impl Shared {
    fn new(address: SocketAddress, options: SocketOptions, transport: Arc<dyn Transport>, chunks: ChunkSender) -> Self {
        let (state, _) = watch::channel(SocketState::Connecting);

        Self {
            address,
            options,
            transport,
            state,
            opened: Signal::new(),
            closed: Signal::new(),
            reader: AsyncMutex::new(None),
            writer: AsyncMutex::new(None),
            chunks: Mutex::new(Some(chunks)),
            upgraded: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> SocketState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<SocketState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SocketState) -> bool {
        let address = &self.address;

        self.state.send_if_modified(|state| {
            if !state.can_transition_to(next) {
                return false;
            }
            log::trace!("[{}] {} -> {}", address, state, next);
            *state = next;
            true
        })
    }

    async fn establish(self: Arc<Self>, source: ConnectionSource) {
        match source.await {
            Ok(conn) => self.on_open(conn).await,
            Err(err) => {
                log::error!("[{}] connect failed due to: {}", self.address, err);

                self.transition(SocketState::Failed);
                self.opened.settle(Err(err));
            }
        }
    }

    async fn on_open(self: &Arc<Self>, conn: BoxConnection) {
        let info = SocketInfo {
            remote_address: conn.remote_address(),
            local_address: conn.local_address(),
        };

        let (reader, writer) = tokio::io::split(conn);

        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);

        // a socket retired while connecting keeps its halves for the hand-off
        let is_open = self.transition(SocketState::Open);

        log::info!(
            "[{}] opened, remote = {}, local = {}",
            self.address,
            info.remote_address,
            info.local_address
        );

        self.opened.settle(Ok(info));

        if is_open {
            if let Some(chunks) = self.chunks.lock().take() {
                tokio::spawn(self.clone().pump(chunks));
            }
        }
    }

    /// Move bytes from the reader half into the readable queue, one read per
    /// chunk, and apply the half-open policy once the peer ends its stream.
    ///
    /// The pump never waits for the consumer, so the end of stream is seen
    /// even when nobody reads; queued chunks stay readable after the close.
    /// Holding the reader slot is what keeps the pump alive: it lets go of it
    /// as soon as the socket leaves the `Open` state.
    async fn pump(self: Arc<Self>, chunks: ChunkSender) {
        let mut state = self.subscribe_state();
        let mut chunks = Some(chunks);

        let mut slot = self.reader.lock().await;
        let reader = match slot.as_mut() {
            Some(reader) => reader,
            None => return,
        };

        let failure = loop {
            if state.borrow_and_update().is_terminal() {
                return;
            }

            let mut buf = BytesMut::with_capacity(config::RECV_BUFFER_SIZE);

            let res = tokio::select! {
                res = reader.read_buf(&mut buf) => res,
                _ = state.changed() => continue,
            };

            match res {
                Ok(0) => break None,
                Ok(n) => {
                    log::trace!("[{}] received {} bytes", self.address, n);

                    let dropped = match chunks.as_ref() {
                        Some(tx) => tx.send(Ok(buf.freeze())).is_err(),
                        None => false,
                    };

                    if dropped {
                        // keep draining to observe the end of stream
                        log::trace!("[{}] readable dropped, discarding inbound data", self.address);
                        chunks = None;
                    }
                }
                Err(err) => break Some(err),
            }
        };

        match failure {
            Some(err) => {
                log::debug!("[{}] read failed due to: {}", self.address, err);

                if let Some(tx) = chunks.take() {
                    let _ = tx.send(Err(err.into()));
                }
            }
            None => log::debug!("[{}] remote end of stream", self.address),
        }

        // ends the readable sequence once the queue is drained
        drop(chunks);
        drop(slot);

        if !self.options.allow_half_open {
            self.close().await;
        }
    }

    pub(crate) async fn close(self: &Arc<Self>) {
        let _ = self.opened.wait().await;

        if self.closing.swap(true, Ordering::AcqRel) {
            self.closed.wait().await;
            return;
        }

        if self.transition(SocketState::Closed) {
            // the pump sees the transition and releases the reader slot
            if let Some(mut writer) = self.writer.lock().await.take() {
                if let Err(err) = writer.shutdown().await {
                    log::debug!("[{}] ignored close error: {}", self.address, err);
                }
            }
            drop(self.reader.lock().await.take());

            log::info!("[{}] closed", self.address);
        }

        self.closed.settle(());
    }

    /// Give up the wire: rejoin both halves into the original connection.
    async fn hand_off(self: Arc<Self>) -> Result<BoxConnection> {
        self.opened.wait().await?;

        let reader = self.reader.lock().await.take();
        let writer = self.writer.lock().await.take();

        self.closed.settle(());

        match (reader, writer) {
            (Some(reader), Some(writer)) => {
                log::debug!("[{}] connection handed over for TLS upgrade", self.address);
                Ok(reader.unsplit(writer))
            }
            _ => Err(SocketError::Closed),
        }
    }
}

/// A byte-stream connection with lazily activated I/O.
///
/// The socket is returned before the connection is established; its readable
/// and writable halves wait for [`opened`](Socket::opened) internally.
///
/// The wire stays up until [`close`](Socket::close) is called or, unless
/// `allow_half_open` is set, until the peer ends its stream.
pub struct Socket {
    shared: Arc<Shared>,

    readable: Option<Readable>,

    writable: Option<Writable>,
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("address", &self.shared.address)
            .field("options", &self.shared.options)
            .field("state", &self.shared.state())
            .finish()
    }
}

impl Socket {
    fn spawn(
        address: SocketAddress,
        options: SocketOptions,
        transport: Arc<dyn Transport>,
        source: ConnectionSource,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(address, options, transport, tx));

        tokio::spawn(shared.clone().establish(source));

        Self {
            readable: Some(Readable::new(shared.clone(), rx)),
            writable: Some(Writable::new(shared.clone())),
            shared,
        }
    }

    pub fn address(&self) -> &SocketAddress {
        &self.shared.address
    }

    pub fn options(&self) -> &SocketOptions {
        &self.shared.options
    }

    pub fn state(&self) -> SocketState {
        self.shared.state()
    }

    /// Take the readable half. Returns `None` once it has been taken.
    pub fn readable(&mut self) -> Option<Readable> {
        self.readable.take()
    }

    /// Take the writable half. Returns `None` once it has been taken.
    pub fn writable(&mut self) -> Option<Writable> {
        self.writable.take()
    }

    /// Wait for the connection attempt to finish.
    pub async fn opened(&self) -> Result<SocketInfo> {
        self.shared.opened.wait().await
    }

    /// Wait for the socket to be torn down.
    ///
    /// A socket whose connection failed only settles this after an explicit
    /// [`close`](Socket::close).
    pub async fn closed(&self) {
        self.shared.closed.wait().await
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_settled()
    }

    /// Tear the connection down once the pending connection attempt settles.
    pub async fn close(&self) {
        self.shared.close().await
    }

    /// Upgrade the connection to TLS in place.
    ///
    /// The wire moves into the returned socket; this one reports
    /// [`SocketState::Retired`] and fails every further read or write.
    pub fn start_tls(&self) -> Result<Socket> {
        let shared = &self.shared;

        if !shared.options.is_starttls() {
            return Err(SocketError::InvalidState("socket must be configured for deferred TLS"));
        }
        if matches!(shared.state(), SocketState::Closed | SocketState::Failed) {
            return Err(SocketError::InvalidState("socket must be connecting or open"));
        }
        if shared.upgraded.swap(true, Ordering::AcqRel) {
            return Err(SocketError::AlreadyUpgraded);
        }

        shared.transition(SocketState::Retired);

        log::info!("[{}] upgrading to TLS...", shared.address);

        let address = shared.address.clone();
        let options = SocketOptions {
            secure_transport: SecureTransport::On,
            allow_half_open: shared.options.allow_half_open,
        };
        let transport = shared.transport.clone();

        let source = {
            let previous = shared.clone();
            let transport = transport.clone();
            let address = address.clone();

            Box::pin(async move {
                let conn = previous.hand_off().await?;
                transport
                    .upgrade_tls(conn, &address)
                    .await
                    .map_err(SocketError::connection)
            })
        };

        Ok(Socket::spawn(address, options, transport, source))
    }
}

/// Connect through the global transport (see [`set_transport`](crate::set_transport)).
///
/// Must be called from within a tokio runtime.
pub fn connect(address: impl IntoSocketAddress, options: SocketOptions) -> Result<Socket> {
    connect_with(global::get_transport(), address, options)
}

/// Connect through `transport`.
///
/// Only address normalization fails here; connection failures surface
/// through [`Socket::opened`].
pub fn connect_with(
    transport: Arc<dyn Transport>,
    address: impl IntoSocketAddress,
    options: SocketOptions,
) -> Result<Socket> {
    let address = address.into_socket_address()?;

    log::info!(
        "[{}] connecting with secure transport {}...",
        address,
        options.secure_transport
    );

    let source = {
        let transport = transport.clone();
        let address = address.clone();
        let secure = options.is_secure();

        Box::pin(async move {
            let res = if secure {
                transport.connect_tls(&address).await
            } else {
                transport.connect(&address).await
            };
            res.map_err(SocketError::connection)
        })
    };

    Ok(Socket::spawn(address, options, transport, source))
}
