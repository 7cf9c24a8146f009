//! The contract every operation codec follows.
//!
//! An operation is a pair of message types (request and response) plus four
//! pure functions. Layout rules:
//!
//! - fixed-width fields live in the initial frame, at `const` offsets that
//!   are running sums starting at [`REQUEST_HEADER_SIZE`] or
//!   [`RESPONSE_HEADER_SIZE`];
//! - variable fields follow as extra frames in declaration order;
//! - decoders read what they know and ignore anything after it.
//!
//! ```text
//! const REQUEST_DELTA_FIELD_OFFSET: usize = REQUEST_HEADER_SIZE;
//! const REQUEST_INITIAL_FRAME_SIZE: usize = REQUEST_DELTA_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
//! ```
//!
//! [`REQUEST_HEADER_SIZE`]: crate::protocol::REQUEST_HEADER_SIZE
//! [`RESPONSE_HEADER_SIZE`]: crate::protocol::RESPONSE_HEADER_SIZE

use std::ops::{Deref, DerefMut};

use bytes::BytesMut;

use super::fixed_size::encode_int;
use crate::error::DecodeError;
use crate::protocol::{
    Frame, FrameCursor, FrameFlags, Message, PARTITION_ID_FIELD_OFFSET, TYPE_FIELD_OFFSET,
};

/// Partition id of a request that is not bound to a partition.
pub const ANY_PARTITION: i32 = -1;

/// Request/response codec for one operation.
///
/// Implementors are stateless marker types. Metadata constants are copied
/// into every encoded request; they never depend on the parameters.
pub trait OperationCodec {
    /// Human readable operation name, e.g. `"Map.Put"`.
    const OPERATION_NAME: &'static str;
    /// Message type of the request.
    const REQUEST_MESSAGE_TYPE: i32;
    /// Message type of the response.
    const RESPONSE_MESSAGE_TYPE: i32;
    /// Whether the request may be resent after a transport fault.
    const RETRYABLE: bool;
    /// Whether the request acquires a resource on the remote side.
    const ACQUIRES_RESOURCE: bool = false;

    /// Decoded request parameters.
    type Request: Send + 'static;
    /// Decoded response parameters.
    type Response: Send + 'static;

    /// Build a request message.
    fn encode_request(request: &Self::Request) -> Message;

    /// Read a request message.
    fn decode_request(message: &Message) -> Result<Self::Request, DecodeError>;

    /// Build a response message.
    fn encode_response(response: &Self::Response) -> Message;

    /// Read a response message.
    fn decode_response(message: &Message) -> Result<Self::Response, DecodeError>;
}

/// Initial frame being filled in by an encoder.
///
/// Dereferences to its content, so the fixed-size encoders write into it
/// directly.
#[derive(Debug)]
pub struct InitialFrame(BytesMut);

impl InitialFrame {
    fn new(message_type: i32, size: usize) -> Self {
        let mut content = BytesMut::zeroed(size);
        encode_int(&mut content, TYPE_FIELD_OFFSET, message_type);
        Self(content)
    }

    /// Finish the frame. Initial frames always head a whole message.
    pub fn freeze(self) -> Frame {
        Frame::new(self.0.freeze(), FrameFlags::UNFRAGMENTED)
    }
}

impl Deref for InitialFrame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for InitialFrame {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Start a request initial frame of `size` bytes, not bound to a partition.
pub fn request_initial_frame(message_type: i32, size: usize) -> InitialFrame {
    let mut frame = InitialFrame::new(message_type, size);
    encode_int(&mut frame, PARTITION_ID_FIELD_OFFSET, ANY_PARTITION);
    frame
}

/// Start a response initial frame of `size` bytes.
pub fn response_initial_frame(message_type: i32, size: usize) -> InitialFrame {
    InitialFrame::new(message_type, size)
}

/// New request message for `C`, with its metadata and initial frame.
pub fn request_message<C: OperationCodec>(initial_frame: InitialFrame) -> Message {
    let mut message = Message::for_encode();
    message.set_retryable(C::RETRYABLE);
    message.set_acquires_resource(C::ACQUIRES_RESOURCE);
    message.set_operation_name(C::OPERATION_NAME);
    message.add(initial_frame.freeze());
    message
}

/// New response message with its initial frame.
pub fn response_message(initial_frame: InitialFrame) -> Message {
    let mut message = Message::for_encode();
    message.add(initial_frame.freeze());
    message
}

/// Open a fresh cursor and take the initial frame off it.
pub fn initial_frame_cursor(message: &Message) -> Result<(&Frame, FrameCursor<'_>), DecodeError> {
    let mut cursor = message.cursor();
    let initial = cursor.next_for("initial frame")?;
    Ok((initial, cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::fixed_size::decode_int;
    use crate::protocol::{REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};

    struct Sample;

    impl OperationCodec for Sample {
        const OPERATION_NAME: &'static str = "Test.Sample";
        const REQUEST_MESSAGE_TYPE: i32 = 0x7F0100;
        const RESPONSE_MESSAGE_TYPE: i32 = 0x7F0101;
        const RETRYABLE: bool = true;
        const ACQUIRES_RESOURCE: bool = true;

        type Request = ();
        type Response = ();

        fn encode_request(_: &()) -> Message {
            request_message::<Self>(request_initial_frame(
                Self::REQUEST_MESSAGE_TYPE,
                REQUEST_HEADER_SIZE,
            ))
        }

        fn decode_request(message: &Message) -> Result<(), DecodeError> {
            initial_frame_cursor(message).map(|_| ())
        }

        fn encode_response(_: &()) -> Message {
            response_message(response_initial_frame(
                Self::RESPONSE_MESSAGE_TYPE,
                RESPONSE_HEADER_SIZE,
            ))
        }

        fn decode_response(message: &Message) -> Result<(), DecodeError> {
            initial_frame_cursor(message).map(|_| ())
        }
    }

    #[test]
    fn test_request_metadata_and_header() {
        let message = Sample::encode_request(&());
        assert!(message.is_retryable());
        assert!(message.acquires_resource());
        assert_eq!(message.operation_name(), Some("Test.Sample"));
        assert_eq!(message.message_type().unwrap(), 0x7F0100);
        assert_eq!(message.partition_id().unwrap(), ANY_PARTITION);
        assert_eq!(message.correlation_id().unwrap(), 0);

        let initial = message.initial_frame().unwrap();
        assert_eq!(initial.flags(), FrameFlags::UNFRAGMENTED);
        assert_eq!(initial.len(), REQUEST_HEADER_SIZE);
    }

    #[test]
    fn test_response_header() {
        let message = Sample::encode_response(&());
        assert!(!message.is_retryable());
        assert_eq!(message.operation_name(), None);
        assert_eq!(message.number_of_backup_acks().unwrap(), 0);
        assert_eq!(
            decode_int(message.initial_frame().unwrap().content(), TYPE_FIELD_OFFSET).unwrap(),
            0x7F0101
        );
    }

    #[test]
    fn test_empty_message_has_no_initial_frame() {
        let err = Sample::decode_request(&Message::for_encode()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingFrame {
                expected: "initial frame"
            }
        );
    }
}
