//! Error types for gridwire.
//!
//! Errors fall into four classes:
//!
//! - **Frame corruption** ([`DecodeError`]): a frame is too short for a
//!   fixed-offset read, a frame is missing, or its bytes are not what the
//!   codec expects. Fatal to one message only.
//! - **Unknown message type** ([`GridwireError::UnknownMessageType`]): the
//!   peer speaks an operation this side does not know. The message is
//!   rejected, the connection stays up.
//! - **Transport faults** ([`GridwireError::Io`]): I/O errors on a
//!   connection. These are the only errors recorded by the fault monitor.
//! - **Business errors** ([`GridwireError::Server`]): an operation failed on
//!   the remote side and the failure came back as a normal response payload.

use thiserror::Error;

use crate::codec::ErrorHolder;

/// Protocol corruption detected while decoding a single message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A fixed-width read ran past the end of the frame content.
    #[error("frame too short: need {needed} bytes at offset {offset}, frame has {len}")]
    FrameTooShort {
        /// Offset of the field.
        offset: usize,
        /// Width of the field in bytes.
        needed: usize,
        /// Actual content length.
        len: usize,
    },

    /// The cursor ran out of frames while a field was still expected.
    #[error("missing frame for {expected}")]
    MissingFrame {
        /// What the decoder was looking for.
        expected: &'static str,
    },

    /// A frame of the wrong kind was found (e.g. no begin frame before a list).
    #[error("unexpected frame: expected {expected}, found flags {flags:#06x}")]
    UnexpectedFrame {
        /// What the decoder was looking for.
        expected: &'static str,
        /// Raw flags of the frame actually found.
        flags: u16,
    },

    /// A string frame did not contain valid UTF-8.
    #[error("invalid UTF-8 in string frame")]
    InvalidUtf8,

    /// A length prefix disagrees with the bytes available.
    #[error("length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Length claimed by the prefix.
        declared: usize,
        /// Length actually present.
        actual: usize,
    },

    /// A message grew past the configured size while being assembled.
    #[error("message size {size} exceeds maximum {max}")]
    MessageTooLarge {
        /// Wire size reached so far.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A new fragment group was opened while the maximum number were open.
    #[error("too many open fragment groups (maximum {max})")]
    TooManyFragmentGroups {
        /// Configured maximum.
        max: usize,
    },
}

/// Main error type for all gridwire operations.
#[derive(Debug, Error)]
pub enum GridwireError {
    /// I/O error on a connection (transport fault).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be decoded.
    #[error("decode failure: {0}")]
    Decode(#[from] DecodeError),

    /// No codec or handler knows this message type.
    #[error("unknown message type: {0:#x}")]
    UnknownMessageType(i32),

    /// Two operations claim the same message type.
    #[error("duplicate message type: {0:#x}")]
    DuplicateMessageType(i32),

    /// The remote side answered with an exception message.
    #[error("server error: {}", .0.first().map(|e| e.to_string()).unwrap_or_default())]
    Server(Vec<ErrorHolder>),

    /// A frame on the wire declared a size above the configured maximum.
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge {
        /// Declared size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The connection did not start with the protocol preamble.
    #[error("invalid connection preamble: {0:?}")]
    InvalidPreamble([u8; 3]),

    /// Configuration parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serializing a user value into `Data` failed.
    #[error("data encode error: {0}")]
    DataEncode(#[from] rmp_serde::encode::Error),

    /// Deserializing `Data` into a user value failed.
    #[error("data decode error: {0}")]
    DataDecode(#[from] rmp_serde::decode::Error),

    /// Protocol violation that is not tied to one message's bytes.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl GridwireError {
    /// Whether this error is a protocol-corruption decode failure.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, GridwireError::Decode(_))
    }

    /// Whether this error is a transport fault that the fault monitor records.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, GridwireError::Io(_) | GridwireError::ConnectionClosed)
    }
}

/// Result type alias using GridwireError.
pub type Result<T> = std::result::Result<T, GridwireError>;
