use std::{fmt::Display, net::SocketAddr, str::FromStr};

use serde::{de::Visitor, Deserialize, Deserializer};
use url::{Host, Url};

use crate::{config, Result, SocketError};

/// Canonical `{hostname, port}` pair a [`Socket`](crate::Socket) connects to.
///
/// IPv6 literals are kept without their brackets, so the pair can be handed
/// straight to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketAddress {
    hostname: String,
    port: u16,
}

impl SocketAddress {
    /// Validate a structured address record.
    pub fn new(hostname: impl Into<String>, port: u16) -> Result<Self> {
        let hostname = hostname.into();
        let trimmed = hostname
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&hostname);

        if trimmed.is_empty() {
            return Err(SocketError::InvalidAddress(format!("{}:{}", hostname, port)));
        }
        if port == 0 {
            return Err(SocketError::InvalidAddress(format!("{}:{}", hostname, port)));
        }

        Ok(Self {
            hostname: trimmed.to_string(),
            port,
        })
    }

    /// Parse `host[:port]` with URL authority rules, defaulting the port to 443.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || SocketError::InvalidAddress(s.to_string());

        let url = Url::parse(&format!("https://{}", s)).map_err(|_| invalid())?;

        let hostname = match url.host() {
            Some(Host::Domain(name)) if !name.is_empty() => name.to_string(),
            Some(Host::Ipv4(v4)) => v4.to_string(),
            Some(Host::Ipv6(v6)) => v6.to_string(),
            _ => return Err(invalid()),
        };

        let port = url.port().unwrap_or(config::DEFAULT_PORT);

        Self::new(hostname, port).map_err(|_| invalid())
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_ipv6(&self) -> bool {
        self.hostname.contains(':')
    }
}

impl Display for SocketAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.hostname, self.port)
        } else {
            write!(f, "{}:{}", self.hostname, self.port)
        }
    }
}

impl FromStr for SocketAddress {
    type Err = SocketError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<SocketAddr> for SocketAddress {
    fn from(addr: SocketAddr) -> Self {
        Self {
            hostname: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

/// Anything [`connect`](crate::connect) accepts as a destination.
pub trait IntoSocketAddress {
    fn into_socket_address(self) -> Result<SocketAddress>;
}

impl IntoSocketAddress for SocketAddress {
    fn into_socket_address(self) -> Result<SocketAddress> {
        SocketAddress::new(self.hostname, self.port)
    }
}

impl IntoSocketAddress for &SocketAddress {
    fn into_socket_address(self) -> Result<SocketAddress> {
        self.clone().into_socket_address()
    }
}

impl IntoSocketAddress for &str {
    fn into_socket_address(self) -> Result<SocketAddress> {
        SocketAddress::parse(self)
    }
}

impl IntoSocketAddress for String {
    fn into_socket_address(self) -> Result<SocketAddress> {
        SocketAddress::parse(&self)
    }
}

impl IntoSocketAddress for &String {
    fn into_socket_address(self) -> Result<SocketAddress> {
        SocketAddress::parse(self)
    }
}

impl IntoSocketAddress for SocketAddr {
    fn into_socket_address(self) -> Result<SocketAddress> {
        Ok(self.into())
    }
}

struct SocketAddressVisitor;

impl<'de> Visitor<'de> for SocketAddressVisitor {
    type Value = SocketAddress;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("<host>[:<port>]")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        SocketAddress::parse(v).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for SocketAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_string(SocketAddressVisitor)
    }
}
