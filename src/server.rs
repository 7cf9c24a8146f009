//! Server side of a connection.
//!
//! A served connection runs one read loop and one writer task:
//! 1. Check the `CP2` preamble
//! 2. Split the stream and spawn the writer task
//! 3. Read frames, reassemble fragments
//! 4. Spawn a handler task per request, bounded by a semaphore
//!
//! Requests that cannot be served (corrupt bytes, unknown message type) are
//! answered with an exception message; the connection stays up. Only framing
//! errors, which leave the byte stream out of sync, end the connection.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gridwire::codec::ops::ClientPingCodec;
//! use gridwire::config::ProtocolConfig;
//! use gridwire::handler::{Dispatcher, MessageTypeRegistry};
//! use gridwire::server::Server;
//! use gridwire::transport::TcpAcceptor;
//!
//! # async fn run() -> gridwire::Result<()> {
//! let registry = Arc::new(MessageTypeRegistry::builtin()?);
//! let dispatcher = Dispatcher::builder(registry)
//!     .register::<ClientPingCodec, _, _>(|_: (), _ctx| async { Ok(()) })?
//!     .build();
//!
//! let server = Server::new(Arc::new(dispatcher), ProtocolConfig::default());
//! server.run(TcpAcceptor::bind("0.0.0.0:5701").await?).await
//! # }
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::address::Address;
use crate::config::ProtocolConfig;
use crate::error::{GridwireError, Result};
use crate::handler::{error_response, Dispatcher};
use crate::protocol::{FragmentAssembler, Message, MessageBuffer};
use crate::transport::{read_preamble, TcpAcceptor};
use crate::writer::{spawn_writer_task, WriterHandle};

/// Size of the socket read buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Accepts connections and serves each one on its own task.
#[derive(Debug, Clone)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    config: ProtocolConfig,
}

impl Server {
    /// Create a server dispatching to `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>, config: ProtocolConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Get the dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Accept connections until accepting fails.
    pub async fn run(&self, acceptor: TcpAcceptor) -> Result<()> {
        loop {
            let (stream, remote) = acceptor.accept().await?;
            tracing::debug!(remote = %remote, "Accepted connection");

            let dispatcher = self.dispatcher.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                let result =
                    serve_connection(stream, Some(remote.clone()), dispatcher, &config).await;
                if let Err(e) = result {
                    tracing::error!(remote = %remote, "Connection failed: {}", e);
                }
            });
        }
    }
}

/// Serve one connection until the peer closes it.
///
/// Waits for in-flight handlers to queue their responses before returning.
///
/// # Errors
///
/// - [`GridwireError::InvalidPreamble`] if the peer does not speak the protocol
/// - [`GridwireError::FrameTooLarge`] if the byte stream is unusable
/// - [`GridwireError::Io`] on socket errors
pub async fn serve_connection<S>(
    mut stream: S,
    remote: Option<Address>,
    dispatcher: Arc<Dispatcher>,
    config: &ProtocolConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    read_preamble(&mut stream).await?;

    let (reader, write_half) = tokio::io::split(stream);
    let (writer, writer_task) = spawn_writer_task(write_half, config.writer_config());
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_handlers));

    let result = read_loop(reader, &remote, &dispatcher, &writer, &semaphore, config).await;

    // The writer task ends once the last handler drops its handle.
    drop(writer);
    match writer_task.await {
        Ok(Err(e)) => tracing::debug!("Writer stopped: {}", e),
        Err(e) => tracing::error!("Writer task panicked: {}", e),
        Ok(Ok(())) => {}
    }

    tracing::debug!(remote = ?remote, "Connection closed");
    result
}

/// Main read loop - reads frames and spawns a handler per request.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    remote: &Option<Address>,
    dispatcher: &Arc<Dispatcher>,
    writer: &WriterHandle,
    semaphore: &Arc<Semaphore>,
    config: &ProtocolConfig,
) -> Result<()> {
    let mut buffer = MessageBuffer::with_max_frame_size(config.max_frame_size)
        .with_max_message_size(config.max_message_size);
    let mut assembler =
        FragmentAssembler::with_limits(config.max_message_size, config.max_fragment_groups);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(GridwireError::Io(e)),
        };

        for message in buffer.push(&buf[..n])? {
            let request = match assembler.accept(message) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(remote = ?remote, "Dropping fragment: {}", e);
                    continue;
                }
            };

            // Waiting here stops reading until a handler finishes.
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| GridwireError::ConnectionClosed)?;

            tokio::spawn(handle_request(
                request,
                remote.clone(),
                dispatcher.clone(),
                writer.clone(),
                permit,
            ));
        }
    }
}

/// Run one request and queue its response.
async fn handle_request(
    request: Message,
    remote: Option<Address>,
    dispatcher: Arc<Dispatcher>,
    writer: WriterHandle,
    _permit: OwnedSemaphorePermit,
) {
    let response = match dispatcher.dispatch(&request, remote.as_ref()).await {
        Ok(response) => response,
        Err(e) => {
            let Ok(correlation_id) = request.correlation_id() else {
                tracing::warn!("Dropping request without a readable header: {}", e);
                return;
            };
            match &e {
                GridwireError::Decode(_) | GridwireError::UnknownMessageType(_) => {
                    tracing::warn!(correlation_id, "Rejecting request: {}", e);
                }
                _ => tracing::error!(correlation_id, "Handler failed: {}", e),
            }
            let Some(response) = error_response(&e, correlation_id) else {
                return;
            };
            response
        }
    };

    if let Err(e) = writer.send(response).await {
        tracing::debug!("Response dropped: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ops::{AddAndGetRequest, AtomicLongAddAndGetCodec, ClientPingCodec};
    use crate::codec::{ErrorCode, ErrorHolder, ErrorsCodec, OperationCodec};
    use crate::error::DecodeError;
    use crate::handler::MessageTypeRegistry;
    use crate::protocol::{message_to_bytes, FrameFlags, FrameHeader};
    use crate::transport::write_preamble;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    fn dispatcher() -> Arc<Dispatcher> {
        let registry = Arc::new(MessageTypeRegistry::builtin().unwrap());
        let dispatcher = Dispatcher::builder(registry)
            .register::<AtomicLongAddAndGetCodec, _, _>(
                |request: AddAndGetRequest, _ctx| async move {
                    if request.name.is_empty() {
                        let code = ErrorCode::IllegalArgument;
                        return Err(ErrorHolder::from_code(code, "empty name"));
                    }
                    Ok(request.delta * 2)
                },
            )
            .unwrap()
            .register::<ClientPingCodec, _, _>(|_: (), _ctx| async { Ok(()) })
            .unwrap()
            .build();
        Arc::new(dispatcher)
    }

    fn start() -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        start_with(ProtocolConfig::default())
    }

    fn start_with(config: ProtocolConfig) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(async move {
            serve_connection(server, None, dispatcher(), &config).await
        });
        (client, task)
    }

    async fn read_message(client: &mut DuplexStream, buffer: &mut MessageBuffer) -> Message {
        let mut buf = [0u8; 1024];
        loop {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed the connection");
            if let Some(message) = buffer.push(&buf[..n]).unwrap().into_iter().next() {
                return message;
            }
        }
    }

    fn add_and_get(name: &str, delta: i64, correlation_id: i64) -> Vec<u8> {
        let mut request = AtomicLongAddAndGetCodec::encode_request(&AddAndGetRequest {
            name: name.into(),
            delta,
        });
        request.set_correlation_id(correlation_id).unwrap();
        message_to_bytes(&request).to_vec()
    }

    #[tokio::test]
    async fn test_request_response() {
        let (mut client, task) = start();
        write_preamble(&mut client).await.unwrap();
        client.write_all(&add_and_get("hits", 21, 7)).await.unwrap();

        let mut buffer = MessageBuffer::new();
        let response = read_message(&mut client, &mut buffer).await;
        assert_eq!(response.correlation_id().unwrap(), 7);
        assert_eq!(AtomicLongAddAndGetCodec::decode_response(&response).unwrap(), 42);

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_business_error_is_exception() {
        let (mut client, _task) = start();
        write_preamble(&mut client).await.unwrap();
        client.write_all(&add_and_get("", 1, 3)).await.unwrap();

        let response = read_message(&mut client, &mut MessageBuffer::new()).await;
        assert!(ErrorsCodec::is_exception(&response));
        assert_eq!(response.correlation_id().unwrap(), 3);
        let errors = ErrorsCodec::decode(&response).unwrap();
        assert_eq!(errors[0].code(), ErrorCode::IllegalArgument);
    }

    #[tokio::test]
    async fn test_corrupt_request_keeps_connection() {
        let (mut client, _task) = start();
        write_preamble(&mut client).await.unwrap();

        // Add-and-get request with the delta field cut off.
        let mut truncated = AtomicLongAddAndGetCodec::encode_request(&AddAndGetRequest {
            name: "hits".into(),
            delta: 1,
        });
        truncated.set_correlation_id(5).unwrap();
        let mut frames = truncated.into_frames();
        let initial = frames.remove(0);
        let short = crate::protocol::Frame::new(
            initial.content_bytes().slice(..crate::protocol::REQUEST_HEADER_SIZE),
            initial.flags(),
        );
        let mut corrupt = Message::for_encode();
        corrupt.add(short);
        for frame in frames {
            corrupt.add(frame);
        }
        client.write_all(&message_to_bytes(&corrupt)).await.unwrap();

        let mut buffer = MessageBuffer::new();
        let response = read_message(&mut client, &mut buffer).await;
        let errors = ErrorsCodec::decode(&response).unwrap();
        assert_eq!(errors[0].code(), ErrorCode::ProtocolCorruption);
        assert_eq!(response.correlation_id().unwrap(), 5);

        client.write_all(&add_and_get("hits", 1, 6)).await.unwrap();
        let response = read_message(&mut client, &mut buffer).await;
        assert_eq!(AtomicLongAddAndGetCodec::decode_response(&response).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unknown_message_type() {
        let (mut client, _task) = start();
        write_preamble(&mut client).await.unwrap();

        let mut request = ClientPingCodec::encode_request(&());
        request.set_correlation_id(9).unwrap();
        let mut bytes = message_to_bytes(&request).to_vec();
        // Overwrite the message type after the 6-byte frame prefix.
        bytes[6..10].copy_from_slice(&0x7F7F00i32.to_le_bytes());
        client.write_all(&bytes).await.unwrap();

        let response = read_message(&mut client, &mut MessageBuffer::new()).await;
        let errors = ErrorsCodec::decode(&response).unwrap();
        assert_eq!(errors[0].code(), ErrorCode::UnsupportedOperation);
        assert_eq!(response.correlation_id().unwrap(), 9);
    }

    #[tokio::test]
    async fn test_unbounded_message_closes_connection() {
        let config = ProtocolConfig {
            max_fragment_size: 1024,
            max_frame_size: 1024,
            max_message_size: 4096,
            ..ProtocolConfig::default()
        };
        let (mut client, task) = start_with(config);
        write_preamble(&mut client).await.unwrap();

        // Frames that never carry IS_FINAL.
        let mut frame = FrameHeader::new(1000, FrameFlags::empty()).encode().to_vec();
        frame.extend_from_slice(&[0u8; 1000]);
        for _ in 0..5 {
            client.write_all(&frame).await.unwrap();
        }

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            GridwireError::Decode(DecodeError::MessageTooLarge { max: 4096, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_preamble() {
        let (mut client, task) = start();
        client.write_all(b"HTT").await.unwrap();
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GridwireError::InvalidPreamble(_)));
    }
}
