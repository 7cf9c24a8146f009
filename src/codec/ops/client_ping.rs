//! `Client.Ping`: liveness check with no parameters.

use crate::codec::operation::{
    initial_frame_cursor, request_initial_frame, request_message, response_initial_frame,
    response_message, OperationCodec,
};
use crate::error::DecodeError;
use crate::protocol::{Message, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};

/// Codec for `Client.Ping`.
pub struct ClientPingCodec;

impl OperationCodec for ClientPingCodec {
    const OPERATION_NAME: &'static str = "Client.Ping";
    const REQUEST_MESSAGE_TYPE: i32 = 0x000B00;
    const RESPONSE_MESSAGE_TYPE: i32 = 0x000B01;
    const RETRYABLE: bool = true;

    type Request = ();
    type Response = ();

    fn encode_request(_: &()) -> Message {
        request_message::<Self>(request_initial_frame(
            Self::REQUEST_MESSAGE_TYPE,
            REQUEST_HEADER_SIZE,
        ))
    }

    fn decode_request(message: &Message) -> Result<(), DecodeError> {
        initial_frame_cursor(message)?;
        Ok(())
    }

    fn encode_response(_: &()) -> Message {
        response_message(response_initial_frame(
            Self::RESPONSE_MESSAGE_TYPE,
            RESPONSE_HEADER_SIZE,
        ))
    }

    fn decode_response(message: &Message) -> Result<(), DecodeError> {
        initial_frame_cursor(message)?;
        Ok(())
    }
}
