mod config;
mod error;
mod global;
mod net;
mod options;

pub mod tls;
pub mod utils;

pub use error::{Result, SocketError};
pub use global::{get_transport, set_transport};
pub use net::{
    address::{IntoSocketAddress, SocketAddress},
    io::{Readable, Writable},
    socket::{connect, connect_with, Socket, SocketInfo, SocketState},
    transport::{BoxConnection, Connection, TcpTransport, Transport},
};
pub use options::{SecureTransport, SocketOptions};
