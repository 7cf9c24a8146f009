//! Frame: the atomic transport unit.
//!
//! A frame is a content buffer plus [`FrameFlags`]. Content is held in
//! `bytes::Bytes`, so frames decoded from a read buffer share memory with it.
//!
//! # Example
//!
//! ```
//! use gridwire::protocol::{Frame, FrameFlags};
//!
//! let frame = Frame::new(&b"hello"[..], FrameFlags::empty());
//! assert_eq!(frame.content(), b"hello");
//! assert_eq!(frame.wire_size(), 6 + 5);
//! assert!(Frame::null().is_null_frame());
//! ```

use bytes::Bytes;

use super::flags::FrameFlags;
use super::wire_format::SIZE_OF_FRAME_LENGTH_AND_FLAGS;

/// A protocol frame.
///
/// Content length and flags are fixed at construction; there are no
/// mutators, so a frame handed to a [`Message`](super::Message) cannot change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    content: Bytes,
    flags: FrameFlags,
}

impl Frame {
    /// Create a frame from content and flags.
    pub fn new(content: impl Into<Bytes>, flags: FrameFlags) -> Self {
        Self {
            content: content.into(),
            flags,
        }
    }

    /// Create a frame with empty flags.
    pub fn with_content(content: impl Into<Bytes>) -> Self {
        Self::new(content, FrameFlags::empty())
    }

    /// Frame standing in for an absent value.
    pub fn null() -> Self {
        Self::new(Bytes::new(), FrameFlags::IS_NULL)
    }

    /// Frame opening a nested structure.
    pub fn begin() -> Self {
        Self::new(Bytes::new(), FrameFlags::BEGIN_DATA_STRUCTURE)
    }

    /// Frame closing a nested structure.
    pub fn end() -> Self {
        Self::new(Bytes::new(), FrameFlags::END_DATA_STRUCTURE)
    }

    /// Content bytes.
    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content as `Bytes` (cheap clone).
    #[inline]
    pub fn content_bytes(&self) -> Bytes {
        self.content.clone()
    }

    /// Content length.
    #[inline]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the content is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Frame flags.
    #[inline]
    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// Size on the wire: length and flags prefix plus content.
    #[inline]
    pub fn wire_size(&self) -> usize {
        SIZE_OF_FRAME_LENGTH_AND_FLAGS + self.content.len()
    }

    /// Check if this is a null frame.
    #[inline]
    pub fn is_null_frame(&self) -> bool {
        self.flags.has(FrameFlags::IS_NULL)
    }

    /// Check if this frame opens a nested structure.
    #[inline]
    pub fn is_begin_frame(&self) -> bool {
        self.flags.has(FrameFlags::BEGIN_DATA_STRUCTURE)
    }

    /// Check if this frame closes a nested structure.
    #[inline]
    pub fn is_end_frame(&self) -> bool {
        self.flags.has(FrameFlags::END_DATA_STRUCTURE)
    }

    /// Check if this frame heads a whole (unfragmented) message.
    #[inline]
    pub fn is_unfragmented(&self) -> bool {
        self.flags.has(FrameFlags::UNFRAGMENTED)
    }

    /// Same content with different flags. Used by the wire layer, which owns
    /// the transport-only bits.
    pub(crate) fn with_flags(&self, flags: FrameFlags) -> Self {
        Self {
            content: self.content.clone(),
            flags,
        }
    }
}
