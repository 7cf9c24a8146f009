//! `Map.Get`: reads the value stored under a key.

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
const REQUEST_INITIAL_FRAME_SIZE: usize = REQUEST_THREAD_ID_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
const RESPONSE_INITIAL_FRAME_SIZE: usize = RESPONSE_HEADER_SIZE;

/// Parameters of a get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapGetRequest {
    /// Map name.
    pub name: String,
    /// Serialized key.
    pub key: Data,
    /// Id of the calling thread.
    pub thread_id: i64,
}

/// Codec for `Map.Get`.
pub struct MapGetCodec;

impl OperationCodec for MapGetCodec {
    const OPERATION_NAME: &'static str = "Map.Get";
    const REQUEST_MESSAGE_TYPE: i32 = 0x010200;
    const RESPONSE_MESSAGE_TYPE: i32 = 0x010201;
    const RETRYABLE: bool = true;

    type Request = MapGetRequest;
    type Response = Option<Data>;

    fn encode_request(request: &MapGetRequest) -> Message {
        let mut initial =
            request_initial_frame(Self::REQUEST_MESSAGE_TYPE, REQUEST_INITIAL_FRAME_SIZE);
        encode_long(&mut initial, REQUEST_THREAD_ID_FIELD_OFFSET, request.thread_id);
        let mut message = request_message::<Self>(initial);
        StringCodec::encode(&mut message, &request.name);
        DataCodec::encode(&mut message, &request.key);
        message
    }

    fn decode_request(message: &Message) -> Result<MapGetRequest, DecodeError> {
        let (initial, mut cursor) = initial_frame_cursor(message)?;
        let thread_id = decode_long(initial.content(), REQUEST_THREAD_ID_FIELD_OFFSET)?;
        Ok(MapGetRequest {
            name: StringCodec::decode(&mut cursor)?,
            key: DataCodec::decode(&mut cursor)?,
            thread_id,
        })
    }

    fn encode_response(value: &Option<Data>) -> Message {
        let mut message = response_message(response_initial_frame(
            Self::RESPONSE_MESSAGE_TYPE,
            RESPONSE_INITIAL_FRAME_SIZE,
        ));
        encode_nullable(&mut message, value.as_ref(), DataCodec::encode);
        message
    }

    fn decode_response(message: &Message) -> Result<Option<Data>, DecodeError> {
        let (_, mut cursor) = initial_frame_cursor(message)?;
        decode_nullable(&mut cursor, DataCodec::decode)
    }
}
