use std::{io, sync::Arc};

use thiserror::Error;

pub type Result<T, E = SocketError> = std::result::Result<T, E>;

/// Errors surfaced by a [`Socket`](crate::Socket).
///
/// The type is `Clone` so a single failure can settle a life-cycle signal and
/// be observed by every waiter; io errors are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum SocketError {
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("connection failed: {0}")]
    Connection(Arc<io::Error>),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("socket has already been upgraded to TLS")]
    AlreadyUpgraded,

    #[error("socket is closed")]
    Closed,

    #[error("socket has been handed over to its TLS successor")]
    Retired,

    #[error("{0}")]
    Io(Arc<io::Error>),
}

impl SocketError {
    pub(crate) fn connection(err: io::Error) -> Self {
        Self::Connection(Arc::new(err))
    }

    /// The transport error behind a `Connection` or `Io` failure, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Connection(err) | Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
