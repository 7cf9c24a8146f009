//! Protocol module - frames, messages, wire format and fragmentation.
//!
//! This module implements the transport layer under the operation codecs:
//! - 6-byte frame prefix encoding/decoding and initial frame header offsets
//! - Frame and Message types with a single-use decode cursor
//! - Message buffer for accumulating partial reads
//! - Fragment splitting and reassembly

mod cursor;
mod flags;
mod fragmentation;
mod frame;
mod message;
mod message_buffer;
mod wire_format;

pub use cursor::FrameCursor;
pub use flags::FrameFlags;
pub use fragmentation::{
    split, FragmentAssembler, DEFAULT_MAX_FRAGMENT_GROUPS, DEFAULT_MAX_FRAGMENT_SIZE,
};
pub use frame::Frame;
pub use message::Message;
pub use message_buffer::MessageBuffer;
pub use wire_format::{
    encode_message, frame_headers, message_to_bytes, FrameHeader, CORRELATION_ID_FIELD_OFFSET,
    DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE, FRAGMENTATION_ID_OFFSET,
    PARTITION_ID_FIELD_OFFSET, REQUEST_HEADER_SIZE, RESPONSE_BACKUP_ACKS_FIELD_OFFSET,
    RESPONSE_HEADER_SIZE, SIZE_OF_FRAME_LENGTH_AND_FLAGS, TYPE_FIELD_OFFSET,
};
