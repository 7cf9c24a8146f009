//! TCP listener and connector.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::address::Address;
use crate::error::Result;

/// Open a TCP connection to `endpoint`.
///
/// Nagle is disabled; the writer task already batches frames.
pub async fn connect(endpoint: &Address) -> Result<TcpStream> {
    let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(endpoint = %endpoint, "Connected");
    Ok(stream)
}

/// Listening socket handing out accepted connections.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind to a local address. Port 0 picks a free port.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept a single connection.
    ///
    /// Returns the stream and the address of the peer.
    pub async fn accept(&self) -> Result<(TcpStream, Address)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((stream, Address::from(peer)))
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}
