//! Client side of a connection.
//!
//! A [`ClientConnection`] owns one connection to a member:
//! 1. Send the `CP2` preamble
//! 2. Spawn the writer task and the read loop
//! 3. Assign correlation ids and park callers until their response arrives
//!
//! Transport faults on either half of the socket (a read or write error, the
//! peer closing it) are recorded with the [`FaultMonitor`] once per
//! connection and fail every pending invocation with
//! [`GridwireError::ConnectionClosed`]. The first response received resets
//! the endpoint's fault record.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gridwire::client::ClientConnection;
//! use gridwire::codec::ops::{AddAndGetRequest, AtomicLongAddAndGetCodec};
//! use gridwire::config::{ConfiguredMembership, ProtocolConfig};
//! use gridwire::monitor::FaultMonitor;
//! use gridwire::Address;
//!
//! # async fn run() -> gridwire::Result<()> {
//! let config = ProtocolConfig::default();
//! let monitor = Arc::new(FaultMonitor::new(Arc::new(ConfiguredMembership::new(&config))));
//! let connection =
//!     ClientConnection::connect_tcp(Address::new("127.0.0.1", 5701), monitor, &config).await?;
//!
//! let request = AddAndGetRequest { name: "hits".into(), delta: 1 };
//! let value = connection.invoke_codec::<AtomicLongAddAndGetCodec>(&request).await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::address::Address;
use crate::codec::{ErrorsCodec, OperationCodec};
use crate::config::ProtocolConfig;
use crate::error::{GridwireError, Result};
use crate::monitor::FaultMonitor;
use crate::protocol::{FragmentAssembler, Message, MessageBuffer};
use crate::transport::{self, write_preamble};
use crate::writer::{spawn_writer_task, WriterHandle};

/// Size of the socket read buffer.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Invocations waiting for their response.
#[derive(Debug, Default)]
struct Correlations {
    calls: HashMap<i64, oneshot::Sender<Message>>,
    closed: bool,
}

/// State shared between callers and the read loop.
#[derive(Debug, Default)]
struct Shared {
    correlations: Mutex<Correlations>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Correlations> {
        self.correlations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark closed and drop every waiting sender.
    fn close(&self) {
        let mut correlations = self.lock();
        correlations.closed = true;
        correlations.calls.clear();
    }

    /// Close after `error` stopped one half of the connection.
    ///
    /// Only the first failure is reported. A transport fault is recorded with
    /// `monitor` before the waiting callers are woken.
    fn fail(&self, endpoint: &Address, monitor: &FaultMonitor, error: &GridwireError) {
        let (first, calls) = {
            let mut correlations = self.lock();
            let first = !correlations.closed;
            correlations.closed = true;
            (first, std::mem::take(&mut correlations.calls))
        };
        if first {
            let failed = calls.len();
            if error.is_transport_fault() {
                tracing::debug!(endpoint = %endpoint, failed, "Connection lost: {}", error);
                monitor.on_error_now(endpoint, error);
            } else {
                tracing::error!(endpoint = %endpoint, failed, "Connection failed: {}", error);
            }
        }
        drop(calls);
    }
}

/// An open connection to one endpoint.
///
/// Dropping the connection stops its read loop and closes the socket once
/// queued messages are written.
#[derive(Debug)]
pub struct ClientConnection {
    endpoint: Address,
    writer: WriterHandle,
    shared: Arc<Shared>,
    monitor: Arc<FaultMonitor>,
    next_correlation_id: AtomicI64,
    read_task: JoinHandle<()>,
    _writer_watch: JoinHandle<()>,
}

impl ClientConnection {
    /// Connect over TCP and start the connection.
    ///
    /// A failed connect counts as a fault of `endpoint`.
    pub async fn connect_tcp(
        endpoint: Address,
        monitor: Arc<FaultMonitor>,
        config: &ProtocolConfig,
    ) -> Result<Self> {
        let stream = match transport::connect(&endpoint).await {
            Ok(stream) => stream,
            Err(e) => {
                monitor.on_error_now(&endpoint, &e);
                return Err(e);
            }
        };
        Self::connect(stream, endpoint, monitor, config).await
    }

    /// Start a connection over an already open stream.
    pub async fn connect<S>(
        mut stream: S,
        endpoint: Address,
        monitor: Arc<FaultMonitor>,
        config: &ProtocolConfig,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        if let Err(e) = write_preamble(&mut stream).await {
            monitor.on_error_now(&endpoint, &e);
            return Err(e);
        }

        let (reader, write_half) = tokio::io::split(stream);
        let (writer, writer_task) = spawn_writer_task(write_half, config.writer_config());

        let shared = Arc::new(Shared::default());
        let read_task = tokio::spawn(read_loop(
            reader,
            endpoint.clone(),
            shared.clone(),
            monitor.clone(),
            config.clone(),
        ));
        let writer_watch = tokio::spawn(watch_writer(
            writer_task,
            endpoint.clone(),
            shared.clone(),
            monitor.clone(),
        ));

        tracing::debug!(endpoint = %endpoint, "Client connection started");
        Ok(Self {
            endpoint,
            writer,
            shared,
            monitor,
            next_correlation_id: AtomicI64::new(1),
            read_task,
            _writer_watch: writer_watch,
        })
    }

    /// Get the remote endpoint.
    pub fn endpoint(&self) -> &Address {
        &self.endpoint
    }

    /// Check if the connection has stopped.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Number of invocations waiting for a response.
    pub fn pending(&self) -> usize {
        self.shared.lock().calls.len()
    }

    /// Send `request` and wait for its response.
    ///
    /// The request gets a fresh correlation id. Retrying after an error is
    /// up to the caller; [`Message::is_retryable`] tells whether it is safe.
    ///
    /// # Errors
    ///
    /// - [`GridwireError::Server`] if the member answered with an exception
    /// - [`GridwireError::ConnectionClosed`] if the connection stopped first
    /// - [`GridwireError::FrameTooLarge`] if a request frame is over the limit
    /// - [`GridwireError::Decode`] if the request or the exception is corrupt
    pub async fn invoke(&self, mut request: Message) -> Result<Message> {
        let correlation_id = self.next_correlation_id.fetch_add(1, Ordering::Relaxed);
        request.set_correlation_id(correlation_id)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut correlations = self.shared.lock();
            if correlations.closed {
                return Err(GridwireError::ConnectionClosed);
            }
            correlations.calls.insert(correlation_id, tx);
        }

        if let Err(e) = self.writer.send(request).await {
            self.shared.lock().calls.remove(&correlation_id);
            if e.is_transport_fault() {
                self.shared.fail(&self.endpoint, &self.monitor, &e);
            }
            return Err(e);
        }

        let response = rx.await.map_err(|_| GridwireError::ConnectionClosed)?;
        if ErrorsCodec::is_exception(&response) {
            return Err(GridwireError::Server(ErrorsCodec::decode(&response)?));
        }
        Ok(response)
    }

    /// Encode `request` with `C`, invoke it and decode the response.
    ///
    /// # Errors
    ///
    /// Everything [`invoke`](Self::invoke) returns, plus
    /// [`GridwireError::Protocol`] when the response belongs to another
    /// operation.
    pub async fn invoke_codec<C: OperationCodec>(
        &self,
        request: &C::Request,
    ) -> Result<C::Response> {
        let response = self.invoke(C::encode_request(request)).await?;
        let message_type = response.message_type()?;
        if message_type != C::RESPONSE_MESSAGE_TYPE {
            return Err(GridwireError::Protocol(format!(
                "{} expected response type {:#x}, got {:#x}",
                C::OPERATION_NAME,
                C::RESPONSE_MESSAGE_TYPE,
                message_type
            )));
        }
        Ok(C::decode_response(&response)?)
    }
}

impl Drop for ClientConnection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.shared.close();
    }
}

/// Waits for the writer task and fails the connection if it stops on an error.
async fn watch_writer(
    writer_task: JoinHandle<Result<()>>,
    endpoint: Address,
    shared: Arc<Shared>,
    monitor: Arc<FaultMonitor>,
) {
    match writer_task.await {
        Ok(Ok(())) => shared.close(),
        Ok(Err(e)) => shared.fail(&endpoint, &monitor, &e),
        Err(e) => {
            tracing::error!(endpoint = %endpoint, "Writer task panicked: {}", e);
            shared.close();
        }
    }
}

/// Read loop - routes responses to their callers until the connection ends.
async fn read_loop<R: AsyncRead + Unpin>(
    reader: R,
    endpoint: Address,
    shared: Arc<Shared>,
    monitor: Arc<FaultMonitor>,
    config: ProtocolConfig,
) {
    match route_responses(reader, &endpoint, &shared, &monitor, &config).await {
        Err(e) => shared.fail(&endpoint, &monitor, &e),
        Ok(()) => shared.close(),
    }
}

async fn route_responses<R: AsyncRead + Unpin>(
    mut reader: R,
    endpoint: &Address,
    shared: &Shared,
    monitor: &FaultMonitor,
    config: &ProtocolConfig,
) -> Result<()> {
    let mut healthy = false;
    let mut buffer = MessageBuffer::with_max_frame_size(config.max_frame_size)
        .with_max_message_size(config.max_message_size);
    let mut assembler =
        FragmentAssembler::with_limits(config.max_message_size, config.max_fragment_groups);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(GridwireError::ConnectionClosed);
        }

        for message in buffer.push(&buf[..n])? {
            let response = match assembler.accept(message) {
                Ok(Some(response)) => response,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, "Dropping fragment: {}", e);
                    continue;
                }
            };

            if !healthy {
                monitor.reset(endpoint);
                healthy = true;
            }

            if response.is_event() {
                tracing::trace!(endpoint = %endpoint, "Ignoring event message");
                continue;
            }

            let correlation_id = match response.correlation_id() {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, "Dropping response: {}", e);
                    continue;
                }
            };

            let waiter = shared.lock().calls.remove(&correlation_id);
            match waiter {
                // The caller may have given up; nothing to do then.
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => tracing::warn!(
                    endpoint = %endpoint,
                    correlation_id,
                    "Response for unknown correlation id"
                ),
            }
        }
    }
}
