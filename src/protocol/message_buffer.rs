//! Buffer for accumulating partial reads into whole messages.
//!
//! Uses `bytes::BytesMut` so frame content is split off the read buffer
//! without copying. A state machine tracks where parsing stands:
//! - `WaitingForHeader`: need the 6-byte frame prefix
//! - `WaitingForContent`: prefix parsed, need N more content bytes
//!
//! Frames collect into the current message until one arrives with
//! [`FrameFlags::IS_FINAL`]; that bit is a transport marker and is removed
//! before the frame is stored.
//!
//! # Example
//!
//! ```ignore
//! use gridwire::protocol::MessageBuffer;
//!
//! let mut buffer = MessageBuffer::new();
//!
//! // Data arrives in chunks from the socket
//! for message in buffer.push(&chunk)? {
//!     println!("message type {}", message.message_type()?);
//! }
//! ```

use bytes::BytesMut;

use super::flags::FrameFlags;
use super::frame::Frame;
use super::message::Message;
use super::wire_format::{
    FrameHeader, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE, SIZE_OF_FRAME_LENGTH_AND_FLAGS,
};
use crate::error::{DecodeError, Result};

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Waiting for a complete frame prefix.
    WaitingForHeader,
    /// Prefix parsed, waiting for content bytes.
    WaitingForContent { header: FrameHeader },
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct MessageBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Frames of the message being assembled.
    frames: Vec<Frame>,
    /// Wire size of `frames`.
    pending_size: usize,
    /// Maximum allowed frame size.
    max_frame_size: usize,
    /// Maximum wire size of one physical message.
    max_message_size: usize,
}

impl MessageBuffer {
    /// Create a new message buffer with default settings.
    ///
    /// Default capacity: 64KB, max frame: 64MB.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new message buffer with a custom max frame size.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            frames: Vec::new(),
            pending_size: 0,
            max_frame_size,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE.max(max_frame_size),
        }
    }

    /// Set the largest physical message accepted.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial frames and partial messages stay buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns error if a frame prefix is malformed, exceeds the maximum
    /// frame size, or a message grows past the maximum message size without
    /// ending. The stream cannot be resynchronized after that.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        while let Some(frame) = self.try_extract_frame()? {
            let is_final = frame.flags().has(FrameFlags::IS_FINAL);
            let flags = frame.flags() - FrameFlags::IS_FINAL;

            self.pending_size += frame.wire_size();
            if self.pending_size > self.max_message_size {
                return Err(DecodeError::MessageTooLarge {
                    size: self.pending_size,
                    max: self.max_message_size,
                }
                .into());
            }
            self.frames.push(frame.with_flags(flags));

            if is_final {
                self.pending_size = 0;
                messages.push(Message::for_decode(std::mem::take(&mut self.frames)));
            }
        }

        Ok(messages)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    fn try_extract_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::WaitingForHeader => {
                    let Some(header) = FrameHeader::decode(&self.buffer) else {
                        return Ok(None);
                    };
                    header.validate(self.max_frame_size)?;

                    let _ = self.buffer.split_to(SIZE_OF_FRAME_LENGTH_AND_FLAGS);
                    self.state = State::WaitingForContent { header };
                }

                State::WaitingForContent { header } => {
                    let remaining = header.content_length();
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let content = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(Frame::new(content, header.flags)));
                }
            }
        }
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered: no bytes and no partial message.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.frames.is_empty()
    }

    /// Number of frames held for a message that has not ended yet.
    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.frames.clear();
        self.pending_size = 0;
        self.state = State::WaitingForHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForContent { .. } => "WaitingForContent",
        }
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
