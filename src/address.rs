//! Endpoint addresses.

use std::fmt;
use std::net::SocketAddr;

use serde::Deserialize;

/// Host and port of a remote endpoint.
///
/// Used as the identity of an endpoint by the fault monitor, so two
/// addresses are equal only when both host text and port match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct Address {
    /// Host name or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Address {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            // IPv6 literal
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Address::new("localhost", 5701).to_string(), "localhost:5701");
        assert_eq!(Address::new("::1", 5701).to_string(), "[::1]:5701");
    }

    #[test]
    fn test_from_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:5702".parse().unwrap();
        assert_eq!(Address::from(addr), Address::new("127.0.0.1", 5702));
    }

    #[test]
    fn test_deserialize() {
        let addr: Address = serde_json::from_str(r#"{"host":"node-1","port":5701}"#).unwrap();
        assert_eq!(addr, Address::new("node-1", 5701));
    }
}
