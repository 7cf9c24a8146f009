//! Transport module - connection setup over TCP.
//!
//! Every client connection opens with the three byte protocol preamble
//! [`PROTOCOL_PREAMBLE`] before the first frame. After the preamble the
//! stream carries frames only, in both directions.
//!
//! # Example
//!
//! ```no_run
//! use gridwire::transport::{connect, TcpAcceptor};
//! use gridwire::Address;
//!
//! # async fn run() -> gridwire::Result<()> {
//! let acceptor = TcpAcceptor::bind("127.0.0.1:5701").await?;
//! let stream = connect(&Address::new("127.0.0.1", 5701)).await?;
//! let (_server_side, remote) = acceptor.accept().await?;
//! # drop((stream, remote));
//! # Ok(())
//! # }
//! ```

mod tcp;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{GridwireError, Result};

pub use tcp::{connect, TcpAcceptor};

/// Bytes a client sends before its first frame.
pub const PROTOCOL_PREAMBLE: [u8; 3] = *b"CP2";

/// Send the protocol preamble.
pub async fn write_preamble<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    writer.write_all(&PROTOCOL_PREAMBLE).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and check the protocol preamble.
///
/// # Errors
///
/// - [`GridwireError::InvalidPreamble`] if the peer sent something else
/// - [`GridwireError::Io`] if the stream ended first
pub async fn read_preamble<R: AsyncRead + Unpin>(reader: &mut R) -> Result<()> {
    let mut preamble = [0u8; 3];
    reader.read_exact(&mut preamble).await?;
    if preamble != PROTOCOL_PREAMBLE {
        return Err(GridwireError::InvalidPreamble(preamble));
    }
    Ok(())
}
