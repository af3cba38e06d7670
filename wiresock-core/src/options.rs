use std::{fmt::Display, str::FromStr};

use serde::Deserialize;

/// How a socket negotiates TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecureTransport {
    /// Plaintext for the whole life of the socket.
    Off,
    /// TLS negotiated right after the TCP handshake.
    On,
    /// Plaintext first, upgraded later through [`Socket::start_tls`](crate::Socket::start_tls).
    StartTls,
}

impl Default for SecureTransport {
    fn default() -> Self {
        Self::Off
    }
}

impl Display for SecureTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SecureTransport::Off => "off",
            SecureTransport::On => "on",
            SecureTransport::StartTls => "starttls",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for SecureTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            "starttls" => Ok(Self::StartTls),
            _ => Err(format!("{} is not one of off, on, starttls", s)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SocketOptions {
    pub secure_transport: SecureTransport,

    /// Keep the writable side open after the peer ends its stream.
    pub allow_half_open: bool,
}

impl SocketOptions {
    pub fn is_secure(&self) -> bool {
        matches!(self.secure_transport, SecureTransport::On)
    }

    pub fn is_starttls(&self) -> bool {
        matches!(self.secure_transport, SecureTransport::StartTls)
    }
}
