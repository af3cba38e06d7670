use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Sink, Stream};
use tokio::{
    io::AsyncWriteExt,
    sync::watch,
};

use super::socket::{ChunkReceiver, Shared, SocketState};
use crate::{Result, SocketError};

/// Pull-based sequence of the chunks received on a socket.
///
/// Every chunk is exactly what one underlying read produced.
pub struct Readable {
    shared: Arc<Shared>,

    chunks: ChunkReceiver,
}

impl Readable {
    pub(crate) fn new(shared: Arc<Shared>, chunks: ChunkReceiver) -> Self {
        Self { shared, chunks }
    }

    /// Next chunk, or `None` once the peer ended its stream or the socket closed.
    ///
    /// Waits for the connection to open first and fails with its error if it
    /// could not be established.
    pub async fn read(&mut self) -> Result<Option<Bytes>> {
        self.shared.opened.wait().await?;

        if self.shared.state() == SocketState::Retired {
            return Err(SocketError::Retired);
        }

        match self.chunks.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(err)) => Err(err),
            None if self.shared.state() == SocketState::Retired => Err(SocketError::Retired),
            None => Ok(None),
        }
    }

    /// Adapt into a [`Stream`] that ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> {
        futures_util::stream::unfold(Some(self), |readable| async move {
            let mut readable = readable?;

            match readable.read().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(readable))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

/// Sink side of a socket; backpressure is whatever the transport applies.
pub struct Writable {
    shared: Arc<Shared>,
}

impl Writable {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Write the whole chunk with a single underlying write and flush it.
    pub async fn write(&self, chunk: &[u8]) -> Result<()> {
        self.shared.opened.wait().await?;
        self.check_state()?;

        let mut state = self.shared.subscribe_state();

        let mut slot = self.shared.writer.lock().await;
        let writer = slot.as_mut().ok_or_else(|| self.unusable())?;

        let res = tokio::select! {
            res = async {
                writer.write_all(chunk).await?;
                writer.flush().await
            } => res,
            // a close or a TLS upgrade must not wait for the peer to drain
            _ = wait_terminal(&mut state) => return Err(self.unusable()),
        };

        log::trace!("[{}] sent {} bytes", self.shared.address, chunk.len());

        res.map_err(Into::into)
    }

    /// Shut down the write direction only; reading goes on until the peer
    /// ends its stream.
    pub async fn close(&self) -> Result<()> {
        self.shared.opened.wait().await?;
        self.check_state()?;

        let mut state = self.shared.subscribe_state();

        let mut slot = self.shared.writer.lock().await;
        let writer = slot.as_mut().ok_or_else(|| self.unusable())?;

        tokio::select! {
            res = writer.shutdown() => {
                log::debug!("[{}] write side shut down", self.shared.address);
                res.map_err(Into::into)
            }
            _ = wait_terminal(&mut state) => Err(self.unusable()),
        }
    }

    /// Adapt into a [`Sink`] of byte chunks.
    pub fn into_sink(self) -> impl Sink<Bytes, Error = SocketError> {
        futures_util::sink::unfold(self, |writable, chunk: Bytes| async move {
            writable.write(&chunk).await?;
            Ok::<_, SocketError>(writable)
        })
    }

    fn check_state(&self) -> Result<()> {
        match self.shared.state() {
            SocketState::Retired => Err(SocketError::Retired),
            SocketState::Closed => Err(SocketError::Closed),
            _ => Ok(()),
        }
    }

    fn unusable(&self) -> SocketError {
        match self.shared.state() {
            SocketState::Retired => SocketError::Retired,
            _ => SocketError::Closed,
        }
    }
}

async fn wait_terminal(state: &mut watch::Receiver<SocketState>) {
    loop {
        if state.borrow_and_update().is_terminal() {
            return;
        }
        if state.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
