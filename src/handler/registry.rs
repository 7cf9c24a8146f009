//! Message type registry.
//!
//! Every operation owns two message types, one per direction. The registry
//! is built once at startup from a fixed list of operations, rejects any
//! type claimed twice, and is read-only afterwards. It is passed explicitly
//! to whatever needs to resolve message types.
//!
//! # Example
//!
//! ```
//! use gridwire::codec::ops::{ClientPingCodec, MapGetCodec};
//! use gridwire::handler::{MessageTypeRegistry, OperationInfo};
//!
//! let registry = MessageTypeRegistry::new(&[
//!     OperationInfo::of::<ClientPingCodec>(),
//!     OperationInfo::of::<MapGetCodec>(),
//! ])
//! .unwrap();
//!
//! assert_eq!(registry.request(0x010200).unwrap().name, "Map.Get");
//! ```

use std::collections::HashMap;

use crate::codec::ops::{
    AtomicLongAddAndGetCodec, ClientPingCodec, DynamicConfigAddPnCounterConfigCodec, MapGetCodec,
    MapPutCodec,
};
use crate::codec::{OperationCodec, EXCEPTION_MESSAGE_TYPE};
use crate::error::{GridwireError, Result};

/// Static description of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationInfo {
    /// Operation name.
    pub name: &'static str,
    /// Message type of the request.
    pub request_message_type: i32,
    /// Message type of the response.
    pub response_message_type: i32,
    /// Whether the request may be retried.
    pub retryable: bool,
}

impl OperationInfo {
    /// Describe the operation implemented by codec `C`.
    pub const fn of<C: OperationCodec>() -> Self {
        Self {
            name: C::OPERATION_NAME,
            request_message_type: C::REQUEST_MESSAGE_TYPE,
            response_message_type: C::RESPONSE_MESSAGE_TYPE,
            retryable: C::RETRYABLE,
        }
    }
}

/// Operations shipped with this crate.
pub const BUILTIN_OPERATIONS: &[OperationInfo] = &[
    OperationInfo::of::<ClientPingCodec>(),
    OperationInfo::of::<MapPutCodec>(),
    OperationInfo::of::<MapGetCodec>(),
    OperationInfo::of::<AtomicLongAddAndGetCodec>(),
    OperationInfo::of::<DynamicConfigAddPnCounterConfigCodec>(),
];

/// Read-only map from message type to operation.
#[derive(Debug, Clone)]
pub struct MessageTypeRegistry {
    /// Operations by request message type.
    requests: HashMap<i32, OperationInfo>,
    /// Operations by response message type.
    responses: HashMap<i32, OperationInfo>,
}

impl MessageTypeRegistry {
    /// Build a registry from a list of operations.
    ///
    /// Fails with [`GridwireError::DuplicateMessageType`] when a message type
    /// is used twice, by two operations or by both directions of one, or
    /// collides with the exception message type.
    pub fn new(operations: &[OperationInfo]) -> Result<Self> {
        let mut requests = HashMap::with_capacity(operations.len());
        let mut responses = HashMap::with_capacity(operations.len());

        for op in operations {
            for message_type in [op.request_message_type, op.response_message_type] {
                if message_type == EXCEPTION_MESSAGE_TYPE
                    || requests.contains_key(&message_type)
                    || responses.contains_key(&message_type)
                {
                    return Err(GridwireError::DuplicateMessageType(message_type));
                }
            }
            if op.request_message_type == op.response_message_type {
                return Err(GridwireError::DuplicateMessageType(op.request_message_type));
            }
            requests.insert(op.request_message_type, *op);
            responses.insert(op.response_message_type, *op);
        }

        Ok(Self {
            requests,
            responses,
        })
    }

    /// Registry holding [`BUILTIN_OPERATIONS`].
    pub fn builtin() -> Result<Self> {
        Self::new(BUILTIN_OPERATIONS)
    }

    /// Look up an operation by its request message type.
    pub fn request(&self, message_type: i32) -> Option<&OperationInfo> {
        self.requests.get(&message_type)
    }

    /// Look up an operation by its response message type.
    pub fn response(&self, message_type: i32) -> Option<&OperationInfo> {
        self.responses.get(&message_type)
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if no operation is registered.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Iterate over all operations, in no particular order.
    pub fn operations(&self) -> impl Iterator<Item = &OperationInfo> {
        self.requests.values()
    }
}
