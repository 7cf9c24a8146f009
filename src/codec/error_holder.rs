//! Business errors carried as response payloads.
//!
//! When an operation fails on the remote side, the response is an
//! exception message: message type 0, a response initial frame, then a
//! list of [`ErrorHolder`] structures (the error and its causes, outermost
//! first). Transport and decoding never produce these; they are ordinary
//! payloads.

use std::fmt;

use bytes::BytesMut;

use super::builtin::{
    decode_nullable, encode_nullable, expect_begin_frame, ListMultiFrameCodec, StringCodec,
};
use super::fixed_size::{decode_int, encode_int, INT_SIZE_IN_BYTES};
use super::operation::response_initial_frame;
use crate::error::DecodeError;
use crate::protocol::{Frame, FrameCursor, Message, RESPONSE_HEADER_SIZE};

/// Message type of an exception response.
pub const EXCEPTION_MESSAGE_TYPE: i32 = 0;

/// Well-known error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// No more specific code applies.
    Undefined = 0,
    /// A request could not be decoded.
    ProtocolCorruption = 1,
    /// No handler is registered for the message type.
    UnsupportedOperation = 2,
    /// An argument was rejected by the handler.
    IllegalArgument = 3,
    /// The target is in a state that does not allow the operation.
    IllegalState = 4,
    /// The handler failed unexpectedly.
    Internal = 5,
}

impl ErrorCode {
    /// Map a wire code to a known variant, `Undefined` for anything else.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::ProtocolCorruption,
            2 => Self::UnsupportedOperation,
            3 => Self::IllegalArgument,
            4 => Self::IllegalState,
            5 => Self::Internal,
            _ => Self::Undefined,
        }
    }

    /// Wire value.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Class name reported for errors raised by this crate.
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Undefined => "UndefinedErrorCodeException",
            Self::ProtocolCorruption => "ProtocolCorruptionException",
            Self::UnsupportedOperation => "UnsupportedOperationException",
            Self::IllegalArgument => "IllegalArgumentException",
            Self::IllegalState => "IllegalStateException",
            Self::Internal => "InternalError",
        }
    }
}

/// One error in an exception response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHolder {
    /// Error code, see [`ErrorCode`].
    pub error_code: i32,
    /// Name of the error class on the remote side.
    pub class_name: String,
    /// Human readable message.
    pub message: Option<String>,
    /// Remote stack trace, outermost frame first.
    pub stack_trace: Vec<String>,
}

impl ErrorHolder {
    /// Create a holder without message or stack trace.
    pub fn new(error_code: i32, class_name: impl Into<String>) -> Self {
        Self {
            error_code,
            class_name: class_name.into(),
            message: None,
            stack_trace: Vec::new(),
        }
    }

    /// Create a holder for one of the well-known codes.
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.code(), code.class_name()).with_message(message)
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Known code of this error.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_code(self.error_code)
    }
}

impl fmt::Display for ErrorHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

const ERROR_CODE_FIELD_OFFSET: usize = 0;
const INITIAL_FRAME_SIZE: usize = ERROR_CODE_FIELD_OFFSET + INT_SIZE_IN_BYTES;

/// Codec for a single [`ErrorHolder`] structure.
pub struct ErrorHolderCodec;

impl ErrorHolderCodec {
    /// Append one holder as a nested structure.
    pub fn encode(message: &mut Message, holder: &ErrorHolder) {
        message.add(Frame::begin());

        let mut initial = BytesMut::zeroed(INITIAL_FRAME_SIZE);
        encode_int(&mut initial, ERROR_CODE_FIELD_OFFSET, holder.error_code);
        message.add(Frame::with_content(initial.freeze()));

        StringCodec::encode(message, &holder.class_name);
        encode_nullable(message, holder.message.as_deref(), StringCodec::encode);
        ListMultiFrameCodec::encode(message, &holder.stack_trace, |m, s| StringCodec::encode(m, s));

        message.add(Frame::end());
    }

    /// Decode one holder, skipping fields added by newer peers.
    pub fn decode(cursor: &mut FrameCursor<'_>) -> Result<ErrorHolder, DecodeError> {
        expect_begin_frame(cursor, "begin of error holder")?;

        let initial = cursor.next_for("error holder initial frame")?;
        let error_code = decode_int(initial.content(), ERROR_CODE_FIELD_OFFSET)?;
        let class_name = StringCodec::decode(cursor)?;
        let message = decode_nullable(cursor, StringCodec::decode)?;
        let stack_trace = ListMultiFrameCodec::decode(cursor, StringCodec::decode)?;

        cursor.skip_to_end_frame()?;
        Ok(ErrorHolder {
            error_code,
            class_name,
            message,
            stack_trace,
        })
    }
}

/// Codec for whole exception responses.
pub struct ErrorsCodec;

impl ErrorsCodec {
    /// Build an exception response carrying `errors`.
    pub fn encode(errors: &[ErrorHolder]) -> Message {
        let mut message = Message::for_encode();
        message.add(response_initial_frame(EXCEPTION_MESSAGE_TYPE, RESPONSE_HEADER_SIZE).freeze());
        ListMultiFrameCodec::encode(&mut message, errors, ErrorHolderCodec::encode);
        message
    }

    /// Decode the holders of an exception response.
    pub fn decode(message: &Message) -> Result<Vec<ErrorHolder>, DecodeError> {
        let mut cursor = message.cursor();
        cursor.next_for("initial frame")?;
        ListMultiFrameCodec::decode(&mut cursor, ErrorHolderCodec::decode)
    }

    /// Whether `message` is an exception response.
    pub fn is_exception(message: &Message) -> bool {
        matches!(message.message_type(), Ok(EXCEPTION_MESSAGE_TYPE))
    }
}
