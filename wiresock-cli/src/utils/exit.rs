use std::process;

use wiresock_core::SocketError;

pub fn exit(err: ExitError) -> ! {
    process::exit(err.into());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitError {
    /// Bad command line, options file or address.
    ArgumentsError,
    /// The socket could not be opened, or failed while in use.
    ConnectError,
}

impl From<&anyhow::Error> for ExitError {
    fn from(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<SocketError>() {
            Some(SocketError::InvalidAddress(_) | SocketError::InvalidState(_)) => ExitError::ArgumentsError,
            _ => ExitError::ConnectError,
        }
    }
}

impl From<ExitError> for i32 {
    fn from(v: ExitError) -> Self {
        match v {
            ExitError::ArgumentsError => 100,
            ExitError::ConnectError => 200,
        }
    }
}
