//! `AtomicLong.AddAndGet`: atomically adds to a counter and returns the
//! new value.

use crate::codec::builtin::StringCodec;
use crate::codec::fixed_size::{decode_long, encode_long, LONG_SIZE_IN_BYTES};
use crate::codec::operation::{
    initial_frame_cursor, request_initial_frame, request_message, response_initial_frame,
    response_message, OperationCodec,
};
use crate::error::DecodeError;
use crate::protocol::{Message, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};

const REQUEST_DELTA_FIELD_OFFSET: usize = REQUEST_HEADER_SIZE;
const REQUEST_INITIAL_FRAME_SIZE: usize = REQUEST_DELTA_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
const RESPONSE_RESPONSE_FIELD_OFFSET: usize = RESPONSE_HEADER_SIZE;
const RESPONSE_INITIAL_FRAME_SIZE: usize = RESPONSE_RESPONSE_FIELD_OFFSET + LONG_SIZE_IN_BYTES;

/// Parameters of an add-and-get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddAndGetRequest {
    /// Counter name.
    pub name: String,
    /// Value to add; may be negative.
    pub delta: i64,
}

/// Codec for `AtomicLong.AddAndGet`.
pub struct AtomicLongAddAndGetCodec;

impl OperationCodec for AtomicLongAddAndGetCodec {
    const OPERATION_NAME: &'static str = "AtomicLong.AddAndGet";
    const REQUEST_MESSAGE_TYPE: i32 = 0x090300;
    const RESPONSE_MESSAGE_TYPE: i32 = 0x090301;
    const RETRYABLE: bool = false;

    type Request = AddAndGetRequest;
    type Response = i64;

    fn encode_request(request: &AddAndGetRequest) -> Message {
        let mut initial =
            request_initial_frame(Self::REQUEST_MESSAGE_TYPE, REQUEST_INITIAL_FRAME_SIZE);
        encode_long(&mut initial, REQUEST_DELTA_FIELD_OFFSET, request.delta);
        let mut message = request_message::<Self>(initial);
        StringCodec::encode(&mut message, &request.name);
        message
    }

    fn decode_request(message: &Message) -> Result<AddAndGetRequest, DecodeError> {
        let (initial, mut cursor) = initial_frame_cursor(message)?;
        let delta = decode_long(initial.content(), REQUEST_DELTA_FIELD_OFFSET)?;
        Ok(AddAndGetRequest {
            name: StringCodec::decode(&mut cursor)?,
            delta,
        })
    }

    fn encode_response(value: &i64) -> Message {
        let mut initial =
            response_initial_frame(Self::RESPONSE_MESSAGE_TYPE, RESPONSE_INITIAL_FRAME_SIZE);
        encode_long(&mut initial, RESPONSE_RESPONSE_FIELD_OFFSET, *value);
        response_message(initial)
    }

    fn decode_response(message: &Message) -> Result<i64, DecodeError> {
        let initial = message.initial_frame()?;
        decode_long(initial.content(), RESPONSE_RESPONSE_FIELD_OFFSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_response_value_lives_in_initial_frame() {
        let message = AtomicLongAddAndGetCodec::encode_response(&-1);
        assert_eq!(message.frames().len(), 1);
        assert_eq!(message.initial_frame().unwrap().len(), 21);
        assert_eq!(AtomicLongAddAndGetCodec::decode_response(&message).unwrap(), -1);
    }

    #[test]
    fn test_response_from_short_frame() {
        let message = AtomicLongAddAndGetCodec::encode_response(&5);
        let initial = message.initial_frame().unwrap();
        let short = Message::for_decode(vec![crate::protocol::Frame::new(
            initial.content()[..RESPONSE_HEADER_SIZE].to_vec(),
            initial.flags(),
        )]);
        assert!(matches!(
            AtomicLongAddAndGetCodec::decode_response(&short),
            Err(DecodeError::FrameTooShort { offset: 13, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_request_roundtrip(name in ".{0,32}", delta in any::<i64>()) {
            let original = AddAndGetRequest { name, delta };
            let message = AtomicLongAddAndGetCodec::encode_request(&original);
            prop_assert_eq!(AtomicLongAddAndGetCodec::decode_request(&message).unwrap(), original);
        }

        #[test]
        fn prop_response_roundtrip(value in any::<i64>()) {
            let message = AtomicLongAddAndGetCodec::encode_response(&value);
            prop_assert_eq!(AtomicLongAddAndGetCodec::decode_response(&message).unwrap(), value);
        }
    }
}
