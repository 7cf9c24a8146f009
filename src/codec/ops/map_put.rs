//! `Map.Put`: stores a value under a key and returns the previous value.

use crate::codec::builtin::{decode_nullable, encode_nullable, DataCodec, StringCodec};
use crate::codec::data::Data;
use crate::codec::fixed_size::{decode_long, encode_long, LONG_SIZE_IN_BYTES};
use crate::codec::operation::{
    initial_frame_cursor, request_initial_frame, request_message, response_initial_frame,
    response_message, OperationCodec,
};
use crate::error::DecodeError;
use crate::protocol::{Message, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};

const REQUEST_THREAD_ID_FIELD_OFFSET: usize = REQUEST_HEADER_SIZE;
const REQUEST_TTL_FIELD_OFFSET: usize = REQUEST_THREAD_ID_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
const REQUEST_INITIAL_FRAME_SIZE: usize = REQUEST_TTL_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
const RESPONSE_INITIAL_FRAME_SIZE: usize = RESPONSE_HEADER_SIZE;

/// Parameters of a put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapPutRequest {
    /// Map name.
    pub name: String,
    /// Serialized key.
    pub key: Data,
    /// Serialized value.
    pub value: Data,
    /// Id of the calling thread, for lock ownership.
    pub thread_id: i64,
    /// Entry time to live in milliseconds; -1 uses the map default.
    pub ttl: i64,
}

/// Codec for `Map.Put`.
pub struct MapPutCodec;

impl OperationCodec for MapPutCodec {
    const OPERATION_NAME: &'static str = "Map.Put";
    const REQUEST_MESSAGE_TYPE: i32 = 0x010100;
    const RESPONSE_MESSAGE_TYPE: i32 = 0x010101;
    const RETRYABLE: bool = false;

    type Request = MapPutRequest;
    /// Previous value, if any.
    type Response = Option<Data>;

    fn encode_request(request: &MapPutRequest) -> Message {
        let mut initial =
            request_initial_frame(Self::REQUEST_MESSAGE_TYPE, REQUEST_INITIAL_FRAME_SIZE);
        encode_long(&mut initial, REQUEST_THREAD_ID_FIELD_OFFSET, request.thread_id);
        encode_long(&mut initial, REQUEST_TTL_FIELD_OFFSET, request.ttl);
        let mut message = request_message::<Self>(initial);
        StringCodec::encode(&mut message, &request.name);
        DataCodec::encode(&mut message, &request.key);
        DataCodec::encode(&mut message, &request.value);
        message
    }

    fn decode_request(message: &Message) -> Result<MapPutRequest, DecodeError> {
        let (initial, mut cursor) = initial_frame_cursor(message)?;
        let thread_id = decode_long(initial.content(), REQUEST_THREAD_ID_FIELD_OFFSET)?;
        let ttl = decode_long(initial.content(), REQUEST_TTL_FIELD_OFFSET)?;
        Ok(MapPutRequest {
            name: StringCodec::decode(&mut cursor)?,
            key: DataCodec::decode(&mut cursor)?,
            value: DataCodec::decode(&mut cursor)?,
            thread_id,
            ttl,
        })
    }

    fn encode_response(previous: &Option<Data>) -> Message {
        let mut message = response_message(response_initial_frame(
            Self::RESPONSE_MESSAGE_TYPE,
            RESPONSE_INITIAL_FRAME_SIZE,
        ));
        encode_nullable(&mut message, previous.as_ref(), DataCodec::encode);
        message
    }

    fn decode_response(message: &Message) -> Result<Option<Data>, DecodeError> {
        let (_, mut cursor) = initial_frame_cursor(message)?;
        decode_nullable(&mut cursor, DataCodec::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn data() -> impl Strategy<Value = Data> {
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(|bytes| Data::from_bytes(bytes))
    }

    fn request() -> MapPutRequest {
        MapPutRequest {
            name: "sessions".to_string(),
            key: Data::serialize(&"user-1").unwrap(),
            value: Data::serialize(&vec![1u8, 2, 3]).unwrap(),
            thread_id: 17,
            ttl: -1,
        }
    }

    #[test]
    fn test_request_roundtrip() {
        let message = MapPutCodec::encode_request(&request());
        assert_eq!(message.frames().len(), 4);
        assert_eq!(message.initial_frame().unwrap().len(), 32);
        assert_eq!(MapPutCodec::decode_request(&message).unwrap(), request());
    }

    #[test]
    fn test_extreme_longs() {
        let original = MapPutRequest {
            thread_id: i64::MIN,
            ttl: i64::MAX,
            ..request()
        };
        let decoded = MapPutCodec::decode_request(&MapPutCodec::encode_request(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_response_with_and_without_previous() {
        let previous = Some(Data::serialize(&42u32).unwrap());
        let message = MapPutCodec::encode_response(&previous);
        assert_eq!(MapPutCodec::decode_response(&message).unwrap(), previous);

        let message = MapPutCodec::encode_response(&None);
        assert!(message.frames()[1].is_null_frame());
        assert_eq!(MapPutCodec::decode_response(&message).unwrap(), None);
    }

    #[test]
    fn test_empty_data_is_not_null() {
        let message = MapPutCodec::encode_response(&Some(Data::default()));
        assert_eq!(
            MapPutCodec::decode_response(&message).unwrap(),
            Some(Data::default())
        );
    }

    proptest! {
        #[test]
        fn prop_request_roundtrip(
            name in ".{0,32}",
            key in data(),
            value in data(),
            thread_id in any::<i64>(),
            ttl in any::<i64>(),
        ) {
            let original = MapPutRequest { name, key, value, thread_id, ttl };
            let message = MapPutCodec::encode_request(&original);
            prop_assert_eq!(MapPutCodec::decode_request(&message).unwrap(), original);
        }

        #[test]
        fn prop_response_roundtrip(previous in proptest::option::of(data())) {
            let message = MapPutCodec::encode_response(&previous);
            prop_assert_eq!(MapPutCodec::decode_response(&message).unwrap(), previous);
        }
    }
}
