//! Handler module - message type registry and request dispatch.
//!
//! Provides:
//! - [`MessageTypeRegistry`] - read-only map from message type to operation
//! - [`Dispatcher`] - maps request message types to typed handlers
//! - [`RequestContext`] - request metadata handed to handlers
//!
//! # Example
//!
//! ```ignore
//! use gridwire::codec::ops::{ClientPingCodec, MapGetCodec, MapGetRequest};
//! use gridwire::handler::{Dispatcher, MessageTypeRegistry};
//!
//! let registry = Arc::new(MessageTypeRegistry::builtin()?);
//! let dispatcher = Dispatcher::builder(registry)
//!     .register::<ClientPingCodec, _, _>(|_: (), _ctx| async { Ok(()) })?
//!     .register::<MapGetCodec, _, _>(|request: MapGetRequest, _ctx| async move {
//!         Ok(store.get(&request.name, &request.key))
//!     })?
//!     .build();
//! ```

mod context;
mod dispatcher;
mod registry;

pub use context::RequestContext;
pub use dispatcher::{
    error_response, BoxFuture, Dispatcher, DispatcherBuilder, Handler, HandlerResult, TypedHandler,
};
pub use registry::{MessageTypeRegistry, OperationInfo, BUILTIN_OPERATIONS};
