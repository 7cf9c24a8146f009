//! `DynamicConfig.AddPNCounterConfig`: adds a PN counter configuration at
//! runtime.

use crate::codec::builtin::{decode_nullable, encode_nullable, StringCodec};
use crate::codec::fixed_size::{
    decode_boolean, decode_int, encode_boolean, encode_int, BOOLEAN_SIZE_IN_BYTES,
    INT_SIZE_IN_BYTES, LONG_SIZE_IN_BYTES,
};
use crate::codec::operation::{
    initial_frame_cursor, request_initial_frame, request_message, response_initial_frame,
    response_message, OperationCodec,
};
use crate::error::DecodeError;
use crate::protocol::{Message, CORRELATION_ID_FIELD_OFFSET, REQUEST_HEADER_SIZE};

const REQUEST_REPLICA_COUNT_FIELD_OFFSET: usize = REQUEST_HEADER_SIZE;
const REQUEST_STATISTICS_ENABLED_FIELD_OFFSET: usize =
    REQUEST_REPLICA_COUNT_FIELD_OFFSET + INT_SIZE_IN_BYTES;
const REQUEST_INITIAL_FRAME_SIZE: usize =
    REQUEST_STATISTICS_ENABLED_FIELD_OFFSET + BOOLEAN_SIZE_IN_BYTES;
// The response has no backup acks field.
const RESPONSE_INITIAL_FRAME_SIZE: usize = CORRELATION_ID_FIELD_OFFSET + LONG_SIZE_IN_BYTES;

/// Parameters of a PN counter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPnCounterConfigRequest {
    /// Name of the configuration.
    pub name: String,
    /// Number of replicas holding the counter state.
    pub replica_count: i32,
    /// Whether statistics are collected.
    pub statistics_enabled: bool,
    /// Split brain protection to apply; `None` disables it.
    pub split_brain_protection_name: Option<String>,
}

/// Codec for `DynamicConfig.AddPNCounterConfig`.
pub struct DynamicConfigAddPnCounterConfigCodec;

impl OperationCodec for DynamicConfigAddPnCounterConfigCodec {
    const OPERATION_NAME: &'static str = "DynamicConfig.AddPNCounterConfig";
    const REQUEST_MESSAGE_TYPE: i32 = 0x1E1600;
    const RESPONSE_MESSAGE_TYPE: i32 = 0x1E1601;
    const RETRYABLE: bool = false;

    type Request = AddPnCounterConfigRequest;
    type Response = ();

    fn encode_request(request: &AddPnCounterConfigRequest) -> Message {
        let mut initial =
            request_initial_frame(Self::REQUEST_MESSAGE_TYPE, REQUEST_INITIAL_FRAME_SIZE);
        encode_int(&mut initial, REQUEST_REPLICA_COUNT_FIELD_OFFSET, request.replica_count);
        encode_boolean(
            &mut initial,
            REQUEST_STATISTICS_ENABLED_FIELD_OFFSET,
            request.statistics_enabled,
        );
        let mut message = request_message::<Self>(initial);
        StringCodec::encode(&mut message, &request.name);
        encode_nullable(
            &mut message,
            request.split_brain_protection_name.as_deref(),
            StringCodec::encode,
        );
        message
    }

    fn decode_request(message: &Message) -> Result<AddPnCounterConfigRequest, DecodeError> {
        let (initial, mut cursor) = initial_frame_cursor(message)?;
        let replica_count = decode_int(initial.content(), REQUEST_REPLICA_COUNT_FIELD_OFFSET)?;
        let statistics_enabled =
            decode_boolean(initial.content(), REQUEST_STATISTICS_ENABLED_FIELD_OFFSET)?;
        Ok(AddPnCounterConfigRequest {
            name: StringCodec::decode(&mut cursor)?,
            replica_count,
            statistics_enabled,
            split_brain_protection_name: decode_nullable(&mut cursor, StringCodec::decode)?,
        })
    }

    fn encode_response(_: &()) -> Message {
        response_message(response_initial_frame(
            Self::RESPONSE_MESSAGE_TYPE,
            RESPONSE_INITIAL_FRAME_SIZE,
        ))
    }

    fn decode_response(message: &Message) -> Result<(), DecodeError> {
        // Empty initial frame.
        initial_frame_cursor(message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, FrameFlags};
    use proptest::prelude::*;

    type Codec = DynamicConfigAddPnCounterConfigCodec;

    fn request(sbp: Option<&str>) -> AddPnCounterConfigRequest {
        AddPnCounterConfigRequest {
            name: "counters".to_string(),
            replica_count: 2,
            statistics_enabled: true,
            split_brain_protection_name: sbp.map(str::to_owned),
        }
    }

    #[test]
    fn test_offsets() {
        assert_eq!(REQUEST_REPLICA_COUNT_FIELD_OFFSET, 16);
        assert_eq!(REQUEST_STATISTICS_ENABLED_FIELD_OFFSET, 20);
        assert_eq!(REQUEST_INITIAL_FRAME_SIZE, 21);
        assert_eq!(RESPONSE_INITIAL_FRAME_SIZE, 12);
    }

    #[test]
    fn test_null_split_brain_protection() {
        let message = Codec::encode_request(&request(None));
        assert_eq!(message.frames().len(), 3);
        assert!(message.frames()[2].is_null_frame());
        assert_eq!(Codec::decode_request(&message).unwrap(), request(None));
    }

    #[test]
    fn test_named_split_brain_protection() {
        let message = Codec::encode_request(&request(Some("sbp-1")));
        assert_eq!(message.frames()[2].content(), b"sbp-1");
        assert_eq!(message.frames()[2].flags(), FrameFlags::empty());

        let decoded = Codec::decode_request(&message).unwrap();
        assert_eq!(decoded.split_brain_protection_name.as_deref(), Some("sbp-1"));

        // Re-encoding the decoded request is byte-identical.
        assert_eq!(Codec::encode_request(&decoded), message);
    }

    #[test]
    fn test_metadata_is_static() {
        let message = Codec::encode_request(&request(None));
        assert!(!message.is_retryable());
        assert!(!message.acquires_resource());
        assert_eq!(
            message.operation_name(),
            Some("DynamicConfig.AddPNCounterConfig")
        );
        assert_eq!(message.message_type().unwrap(), 1971712);
    }

    #[test]
    fn test_boundary_values() {
        for replica_count in [0, -1, i32::MIN, i32::MAX] {
            let original = AddPnCounterConfigRequest {
                name: String::new(),
                replica_count,
                statistics_enabled: false,
                split_brain_protection_name: Some(String::new()),
            };
            let decoded = Codec::decode_request(&Codec::encode_request(&original)).unwrap();
            assert_eq!(decoded, original);
        }
    }

    #[test]
    fn test_offsets_do_not_depend_on_values() {
        let a = Codec::encode_request(&request(None));
        let b = Codec::encode_request(&AddPnCounterConfigRequest {
            name: "x".repeat(1000),
            replica_count: -7,
            statistics_enabled: false,
            split_brain_protection_name: Some("other".to_string()),
        });
        assert_eq!(
            a.initial_frame().unwrap().len(),
            b.initial_frame().unwrap().len()
        );
    }

    #[test]
    fn test_trailing_frames_are_ignored() {
        let mut message = Codec::encode_request(&request(Some("sbp-1")));
        message.add(Frame::with_content(&b"field from a newer peer"[..]));
        assert_eq!(
            Codec::decode_request(&message).unwrap(),
            request(Some("sbp-1"))
        );
    }

    #[test]
    fn test_short_initial_frame_is_corruption() {
        let full = Codec::encode_request(&request(None));
        let mut truncated = Message::for_encode();
        let initial = full.initial_frame().unwrap();
        truncated.add(Frame::new(initial.content()[..18].to_vec(), initial.flags()));
        for frame in &full.frames()[1..] {
            truncated.add(frame.clone());
        }
        assert_eq!(
            Codec::decode_request(&truncated),
            Err(DecodeError::FrameTooShort {
                offset: 16,
                needed: 4,
                len: 18
            })
        );
    }

    #[test]
    fn test_missing_nullable_marker() {
        let full = Codec::encode_request(&request(None));
        let truncated = Message::for_decode(full.frames()[..2].to_vec());
        assert!(matches!(
            Codec::decode_request(&truncated),
            Err(DecodeError::MissingFrame { .. })
        ));
    }

    #[test]
    fn test_response_roundtrip() {
        let message = Codec::encode_response(&());
        assert_eq!(message.message_type().unwrap(), 0x1E1601);
        assert_eq!(message.frames().len(), 1);
        assert_eq!(message.initial_frame().unwrap().len(), 12);
        Codec::decode_response(&message).unwrap();
    }

    #[test]
    fn test_response_correlation_id() {
        let mut message = Codec::encode_response(&());
        message.set_correlation_id(i64::MAX).unwrap();
        assert_eq!(message.correlation_id().unwrap(), i64::MAX);
    }

    proptest! {
        #[test]
        fn prop_request_roundtrip(
            name in ".{0,32}",
            replica_count in any::<i32>(),
            statistics_enabled in any::<bool>(),
            split_brain_protection_name in proptest::option::of(".{0,16}"),
        ) {
            let original = AddPnCounterConfigRequest {
                name,
                replica_count,
                statistics_enabled,
                split_brain_protection_name,
            };
            let message = Codec::encode_request(&original);
            prop_assert_eq!(Codec::decode_request(&message).unwrap(), original);
        }

        #[test]
        fn prop_response_roundtrip(correlation_id in any::<i64>()) {
            let mut message = Codec::encode_response(&());
            message.set_correlation_id(correlation_id).unwrap();
            prop_assert!(Codec::decode_response(&message).is_ok());
            prop_assert_eq!(message.correlation_id().unwrap(), correlation_id);
        }
    }
}
