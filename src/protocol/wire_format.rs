//! Wire format encoding and decoding.
//!
//! Every frame on the wire has a 6-byte prefix:
//! ```text
//! ┌──────────────┬──────────┬──────────────────┐
//! │ Length       │ Flags    │ Content          │
//! │ 4 bytes      │ 2 bytes  │ length - 6 bytes │
//! │ uint32 LE    │ uint16 LE│                  │
//! └──────────────┴──────────┴──────────────────┘
//! ```
//!
//! `Length` counts the prefix itself. A physical message is a run of frames
//! whose last frame carries [`FrameFlags::IS_FINAL`].
//!
//! The initial frame of every message starts with fixed header fields:
//! ```text
//! request:  type i32 @0 │ correlation id i64 @4 │ partition id i32 @12
//! response: type i32 @0 │ correlation id i64 @4 │ backup acks u8 @12
//! ```

use bytes::{BufMut, BytesMut};

use super::flags::FrameFlags;
use super::frame::Frame;
use super::message::Message;
use crate::codec::fixed_size::{BYTE_SIZE_IN_BYTES, INT_SIZE_IN_BYTES, LONG_SIZE_IN_BYTES};
use crate::error::{DecodeError, GridwireError, Result};

/// Size of the frame length and flags prefix (fixed, exactly 6).
pub const SIZE_OF_FRAME_LENGTH_AND_FLAGS: usize = INT_SIZE_IN_BYTES + 2;

/// Default maximum size of one frame on the wire (64 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Default maximum size of one message on the wire, physical or reassembled
/// (128 MB). Leaves room for a maximum size frame plus its headers.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * DEFAULT_MAX_FRAME_SIZE;

/// Offset of the message type in the initial frame.
pub const TYPE_FIELD_OFFSET: usize = 0;
/// Offset of the correlation id in the initial frame.
pub const CORRELATION_ID_FIELD_OFFSET: usize = TYPE_FIELD_OFFSET + INT_SIZE_IN_BYTES;
/// Offset of the partition id in a request's initial frame.
pub const PARTITION_ID_FIELD_OFFSET: usize = CORRELATION_ID_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
/// Offset of the backup ack count in a response's initial frame.
pub const RESPONSE_BACKUP_ACKS_FIELD_OFFSET: usize =
    CORRELATION_ID_FIELD_OFFSET + LONG_SIZE_IN_BYTES;
/// Offset of the fragmentation id in a fragment header frame.
pub const FRAGMENTATION_ID_OFFSET: usize = 0;

/// First free offset in a request's initial frame.
pub const REQUEST_HEADER_SIZE: usize = PARTITION_ID_FIELD_OFFSET + INT_SIZE_IN_BYTES;
/// First free offset in a response's initial frame.
pub const RESPONSE_HEADER_SIZE: usize = RESPONSE_BACKUP_ACKS_FIELD_OFFSET + BYTE_SIZE_IN_BYTES;

/// Decoded frame prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame length including the prefix.
    pub frame_length: u32,
    /// Frame flags.
    pub flags: FrameFlags,
}

impl FrameHeader {
    /// Create a header for a frame with `content_len` content bytes.
    pub fn new(content_len: usize, flags: FrameFlags) -> Self {
        Self {
            frame_length: (SIZE_OF_FRAME_LENGTH_AND_FLAGS + content_len) as u32,
            flags,
        }
    }

    /// Encode the prefix to bytes (Little Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use gridwire::protocol::{FrameFlags, FrameHeader};
    ///
    /// let header = FrameHeader::new(10, FrameFlags::IS_FINAL);
    /// assert_eq!(header.encode(), [16, 0, 0, 0, 0x00, 0x20]);
    /// ```
    pub fn encode(&self) -> [u8; SIZE_OF_FRAME_LENGTH_AND_FLAGS] {
        let mut buf = [0u8; SIZE_OF_FRAME_LENGTH_AND_FLAGS];
        buf[0..4].copy_from_slice(&self.frame_length.to_le_bytes());
        buf[4..6].copy_from_slice(&self.flags.to_wire().to_le_bytes());
        buf
    }

    /// Decode the prefix from bytes.
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < SIZE_OF_FRAME_LENGTH_AND_FLAGS {
            return None;
        }
        Some(Self {
            frame_length: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            flags: FrameFlags::from_wire(u16::from_le_bytes([buf[4], buf[5]])),
        })
    }

    /// Content length implied by the frame length.
    #[inline]
    pub fn content_length(&self) -> usize {
        (self.frame_length as usize).saturating_sub(SIZE_OF_FRAME_LENGTH_AND_FLAGS)
    }

    /// Validate the prefix against protocol limits.
    ///
    /// Checks:
    /// - Frame length covers at least the prefix
    /// - Frame length doesn't exceed max
    pub fn validate(&self, max_frame_size: usize) -> Result<()> {
        let len = self.frame_length as usize;
        if len < SIZE_OF_FRAME_LENGTH_AND_FLAGS {
            return Err(DecodeError::LengthMismatch {
                declared: len,
                actual: SIZE_OF_FRAME_LENGTH_AND_FLAGS,
            }
            .into());
        }
        if len > max_frame_size {
            return Err(GridwireError::FrameTooLarge {
                size: len,
                max: max_frame_size,
            });
        }
        Ok(())
    }

    /// Check if this frame ends a physical message.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.has(FrameFlags::IS_FINAL)
    }
}

/// Wire headers of a message's frames, in order, with the last frame
/// marked final.
pub fn frame_headers(message: &Message) -> impl Iterator<Item = (FrameHeader, &Frame)> + '_ {
    let last = message.frames().len().saturating_sub(1);
    message.frames().iter().enumerate().map(move |(index, frame)| {
        let mut flags = frame.flags();
        if index == last {
            flags |= FrameFlags::IS_FINAL;
        }
        (FrameHeader::new(frame.len(), flags), frame)
    })
}

/// Append a message's frames to `dst`, marking the last one final.
pub fn encode_message(message: &Message, dst: &mut BytesMut) {
    dst.reserve(message.frame_length());
    for (header, frame) in frame_headers(message) {
        dst.put_slice(&header.encode());
        dst.put_slice(frame.content());
    }
}

/// Encode a message into a fresh buffer.
pub fn message_to_bytes(message: &Message) -> BytesMut {
    let mut buf = BytesMut::with_capacity(message.frame_length());
    encode_message(message, &mut buf);
    buf
}
