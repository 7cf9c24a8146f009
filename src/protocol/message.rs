//! Message: an ordered run of frames for one request or response.
//!
//! The first frame is the initial frame. It carries the message type,
//! correlation id and partition id (or backup ack count) at the offsets in
//! [`wire_format`](super::wire_format), followed by the operation's own
//! fixed-width fields.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use gridwire::protocol::{Frame, FrameFlags, Message, REQUEST_HEADER_SIZE};
//!
//! let mut message = Message::for_encode();
//! message.add(Frame::new(BytesMut::zeroed(REQUEST_HEADER_SIZE), FrameFlags::UNFRAGMENTED));
//! message.set_correlation_id(42).unwrap();
//! assert_eq!(message.correlation_id().unwrap(), 42);
//! ```

use bytes::BytesMut;

use super::cursor::FrameCursor;
use super::flags::FrameFlags;
use super::frame::Frame;
use super::wire_format::{
    CORRELATION_ID_FIELD_OFFSET, PARTITION_ID_FIELD_OFFSET, RESPONSE_BACKUP_ACKS_FIELD_OFFSET,
    TYPE_FIELD_OFFSET,
};
use crate::codec::fixed_size::{
    decode_byte, decode_int, decode_long, encode_int, encode_long, INT_SIZE_IN_BYTES,
    LONG_SIZE_IN_BYTES,
};
use crate::error::DecodeError;

/// One logical request or response.
///
/// Built frame by frame by an operation codec, then treated as immutable:
/// frames are only reachable through shared references, and decoding goes
/// through a fresh [`FrameCursor`] per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    frames: Vec<Frame>,
    retryable: bool,
    acquires_resource: bool,
    operation_name: Option<&'static str>,
}

impl Message {
    /// Create an empty message to be filled by an encoder.
    pub fn for_encode() -> Self {
        Self::default()
    }

    /// Wrap frames received from a connection.
    pub fn for_decode(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            ..Self::default()
        }
    }

    /// Append a frame.
    ///
    /// No validation: the operation codec is responsible for the layout.
    pub fn add(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Frames in append order.
    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Consume the message into its frames.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Fresh forward-only cursor over the frames.
    pub fn cursor(&self) -> FrameCursor<'_> {
        FrameCursor::new(&self.frames)
    }

    /// Total size of the message on the wire.
    pub fn frame_length(&self) -> usize {
        self.frames.iter().map(Frame::wire_size).sum()
    }

    /// The initial frame.
    pub fn initial_frame(&self) -> Result<&Frame, DecodeError> {
        self.frames.first().ok_or(DecodeError::MissingFrame {
            expected: "initial frame",
        })
    }

    /// Message type tag.
    pub fn message_type(&self) -> Result<i32, DecodeError> {
        decode_int(self.initial_frame()?.content(), TYPE_FIELD_OFFSET)
    }

    /// Correlation id linking a response to its request.
    pub fn correlation_id(&self) -> Result<i64, DecodeError> {
        decode_long(self.initial_frame()?.content(), CORRELATION_ID_FIELD_OFFSET)
    }

    /// Set the correlation id.
    pub fn set_correlation_id(&mut self, correlation_id: i64) -> Result<(), DecodeError> {
        self.rewrite_initial(CORRELATION_ID_FIELD_OFFSET, LONG_SIZE_IN_BYTES, |buf| {
            encode_long(buf, CORRELATION_ID_FIELD_OFFSET, correlation_id)
        })
    }

    /// Partition id of a request (-1 = any partition).
    pub fn partition_id(&self) -> Result<i32, DecodeError> {
        decode_int(self.initial_frame()?.content(), PARTITION_ID_FIELD_OFFSET)
    }

    /// Set the partition id of a request.
    pub fn set_partition_id(&mut self, partition_id: i32) -> Result<(), DecodeError> {
        self.rewrite_initial(PARTITION_ID_FIELD_OFFSET, INT_SIZE_IN_BYTES, |buf| {
            encode_int(buf, PARTITION_ID_FIELD_OFFSET, partition_id)
        })
    }

    /// Number of backup acknowledgments a response waits for.
    pub fn number_of_backup_acks(&self) -> Result<u8, DecodeError> {
        decode_byte(self.initial_frame()?.content(), RESPONSE_BACKUP_ACKS_FIELD_OFFSET)
    }

    /// Check if this is a server-pushed event.
    pub fn is_event(&self) -> bool {
        self.frames
            .first()
            .is_some_and(|f| f.flags().has(FrameFlags::IS_EVENT))
    }

    /// Whether the caller may transparently retry this request.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Set the retryable flag.
    pub fn set_retryable(&mut self, retryable: bool) {
        self.retryable = retryable;
    }

    /// Whether the request acquires a resource (lock, permit) on the server.
    #[inline]
    pub fn acquires_resource(&self) -> bool {
        self.acquires_resource
    }

    /// Set the acquires-resource flag.
    pub fn set_acquires_resource(&mut self, acquires_resource: bool) {
        self.acquires_resource = acquires_resource;
    }

    /// Operation name, for diagnostics.
    #[inline]
    pub fn operation_name(&self) -> Option<&'static str> {
        self.operation_name
    }

    /// Set the operation name.
    pub fn set_operation_name(&mut self, name: &'static str) {
        self.operation_name = Some(name);
    }

    /// Rewrite a fixed field of the initial frame. The frame keeps its length
    /// and flags; only the shared content buffer is copied.
    fn rewrite_initial(
        &mut self,
        offset: usize,
        width: usize,
        write: impl FnOnce(&mut [u8]),
    ) -> Result<(), DecodeError> {
        let frame = self.frames.first_mut().ok_or(DecodeError::MissingFrame {
            expected: "initial frame",
        })?;
        if frame.len() < offset + width {
            return Err(DecodeError::FrameTooShort {
                offset,
                needed: width,
                len: frame.len(),
            });
        }
        let mut content = BytesMut::from(frame.content());
        write(&mut content);
        *frame = Frame::new(content.freeze(), frame.flags());
        Ok(())
    }
}
