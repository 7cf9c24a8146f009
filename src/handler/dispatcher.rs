//! Dispatch of decoded requests to typed handlers.
//!
//! A [`Dispatcher`] is a table from request message type to a handler that
//! decodes the request with the operation's codec, runs user code and
//! encodes the response. It is filled once through [`DispatcherBuilder`]
//! and immutable afterwards, so it can be shared across connections.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gridwire::codec::ops::{AddAndGetRequest, AtomicLongAddAndGetCodec};
//! use gridwire::handler::{Dispatcher, MessageTypeRegistry};
//!
//! let registry = Arc::new(MessageTypeRegistry::builtin().unwrap());
//! let dispatcher = Dispatcher::builder(registry)
//!     .register::<AtomicLongAddAndGetCodec, _, _>(|request: AddAndGetRequest, _ctx| async move {
//!         Ok(request.delta)
//!     })
//!     .unwrap()
//!     .build();
//! assert!(dispatcher.handles(0x090300));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use super::{MessageTypeRegistry, RequestContext};
use crate::address::Address;
use crate::codec::{ErrorCode, ErrorHolder, ErrorsCodec, OperationCodec};
use crate::error::{GridwireError, Result};
use crate::protocol::Message;

/// Result type for handler functions: a response or a business error.
pub type HandlerResult<T> = std::result::Result<T, ErrorHolder>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle a request message and produce the response message.
    ///
    /// Decode failures are returned as errors; business errors come back as
    /// exception messages.
    fn call(&self, request: &Message, ctx: RequestContext) -> BoxFuture<'static, Result<Message>>;
}

/// Wrapper that decodes the request with codec `C` before calling the
/// handler, and encodes what the handler returns.
pub struct TypedHandler<C, F, Fut>
where
    C: OperationCodec,
    F: Fn(C::Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<C::Response>> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(C) -> Fut>,
}

impl<C, F, Fut> TypedHandler<C, F, Fut>
where
    C: OperationCodec,
    F: Fn(C::Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<C::Response>> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<C, F, Fut> Handler for TypedHandler<C, F, Fut>
where
    C: OperationCodec + 'static,
    F: Fn(C::Request, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<C::Response>> + Send + 'static,
{
    fn call(&self, request: &Message, ctx: RequestContext) -> BoxFuture<'static, Result<Message>> {
        let parsed = match C::decode_request(request) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e.into()) }),
        };

        let fut = (self.handler)(parsed, ctx);
        Box::pin(async move {
            Ok(match fut.await {
                Ok(response) => C::encode_response(&response),
                Err(error) => ErrorsCodec::encode(&[error]),
            })
        })
    }
}

/// Builder collecting handlers before the table is frozen.
pub struct DispatcherBuilder {
    registry: Arc<MessageTypeRegistry>,
    handlers: HashMap<i32, Box<dyn Handler>>,
}

impl DispatcherBuilder {
    /// Register the handler for operation `C`.
    ///
    /// Fails if `C` is not in the registry or already has a handler.
    pub fn register<C, F, Fut>(mut self, handler: F) -> Result<Self>
    where
        C: OperationCodec + 'static,
        F: Fn(C::Request, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<C::Response>> + Send + 'static,
    {
        if self.registry.request(C::REQUEST_MESSAGE_TYPE).is_none() {
            return Err(GridwireError::UnknownMessageType(C::REQUEST_MESSAGE_TYPE));
        }
        if self.handlers.contains_key(&C::REQUEST_MESSAGE_TYPE) {
            return Err(GridwireError::DuplicateMessageType(C::REQUEST_MESSAGE_TYPE));
        }
        self.handlers.insert(
            C::REQUEST_MESSAGE_TYPE,
            Box::new(TypedHandler::<C, F, Fut>::new(handler)),
        );
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            handlers: self.handlers,
        }
    }
}

/// Immutable table from request message type to handler.
pub struct Dispatcher {
    registry: Arc<MessageTypeRegistry>,
    handlers: HashMap<i32, Box<dyn Handler>>,
}

impl Dispatcher {
    /// Start building a dispatcher over `registry`.
    pub fn builder(registry: Arc<MessageTypeRegistry>) -> DispatcherBuilder {
        DispatcherBuilder {
            registry,
            handlers: HashMap::new(),
        }
    }

    /// Check if a handler exists for a request message type.
    pub fn handles(&self, message_type: i32) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// The registry this dispatcher resolves message types with.
    pub fn registry(&self) -> &MessageTypeRegistry {
        &self.registry
    }

    /// Run the handler for `request` and return its response, carrying the
    /// request's correlation id.
    ///
    /// # Errors
    ///
    /// - [`GridwireError::Decode`] if the request header or body is corrupt
    /// - [`GridwireError::UnknownMessageType`] if no handler is registered
    pub async fn dispatch(&self, request: &Message, remote: Option<&Address>) -> Result<Message> {
        let message_type = request.message_type()?;
        let correlation_id = request.correlation_id()?;
        let partition_id = request.partition_id()?;

        let (Some(handler), Some(info)) = (
            self.handlers.get(&message_type),
            self.registry.request(message_type),
        ) else {
            return Err(GridwireError::UnknownMessageType(message_type));
        };

        let mut ctx = RequestContext::new(message_type, correlation_id, partition_id, info.name);
        if let Some(remote) = remote {
            ctx = ctx.with_remote(remote.clone());
        }

        let mut response = handler.call(request, ctx).await?;
        response.set_correlation_id(correlation_id)?;
        Ok(response)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut message_types: Vec<_> = self.handlers.keys().copied().collect();
        message_types.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("message_types", &message_types)
            .finish_non_exhaustive()
    }
}

/// Exception response for a request that could not be served.
///
/// Returns `None` for errors that are not about the request itself (the
/// connection is gone, nothing can be answered).
pub fn error_response(error: &GridwireError, correlation_id: i64) -> Option<Message> {
    let holder = match error {
        GridwireError::Decode(e) => {
            ErrorHolder::from_code(ErrorCode::ProtocolCorruption, e.to_string())
        }
        GridwireError::UnknownMessageType(t) => ErrorHolder::from_code(
            ErrorCode::UnsupportedOperation,
            format!("unknown message type {t:#x}"),
        ),
        GridwireError::Server(errors) => {
            let mut message = ErrorsCodec::encode(errors);
            message.set_correlation_id(correlation_id).ok()?;
            return Some(message);
        }
        e if e.is_transport_fault() => return None,
        e => ErrorHolder::from_code(ErrorCode::Internal, e.to_string()),
    };
    let mut message = ErrorsCodec::encode(&[holder]);
    message.set_correlation_id(correlation_id).ok()?;
    Some(message)
}
