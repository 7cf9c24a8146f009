//! Request context for handlers.
//!
//! Carries what a handler may need besides its decoded parameters: which
//! request it is serving and where it came from.
//!
//! # Example
//!
//! ```ignore
//! async fn add_and_get(request: AddAndGetRequest, ctx: RequestContext) -> HandlerResult<i64> {
//!     tracing::debug!(correlation_id = ctx.correlation_id(), "add and get");
//!     Ok(counters.add(&request.name, request.delta))
//! }
//! ```

use crate::address::Address;

/// Context passed to request handlers.
///
/// `RequestContext` is `Clone` and can be moved into spawned tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Message type of the request.
    message_type: i32,
    /// Correlation id the response will carry.
    correlation_id: i64,
    /// Partition the request was routed to (-1 = any).
    partition_id: i32,
    /// Operation name from the message type registry.
    operation_name: &'static str,
    /// Remote endpoint, when known.
    remote: Option<Address>,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(
        message_type: i32,
        correlation_id: i64,
        partition_id: i32,
        operation_name: &'static str,
    ) -> Self {
        Self {
            message_type,
            correlation_id,
            partition_id,
            operation_name,
            remote: None,
        }
    }

    /// Attach the remote endpoint.
    pub fn with_remote(mut self, remote: Address) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Get the message type.
    #[inline]
    pub fn message_type(&self) -> i32 {
        self.message_type
    }

    /// Get the correlation id.
    #[inline]
    pub fn correlation_id(&self) -> i64 {
        self.correlation_id
    }

    /// Get the partition id.
    #[inline]
    pub fn partition_id(&self) -> i32 {
        self.partition_id
    }

    /// Get the operation name.
    #[inline]
    pub fn operation_name(&self) -> &'static str {
        self.operation_name
    }

    /// Get the remote endpoint.
    pub fn remote(&self) -> Option<&Address> {
        self.remote.as_ref()
    }
}
