//! Single-use forward cursor over a message's frames.

use super::frame::Frame;
use crate::error::DecodeError;

/// Forward-only cursor handed to decoders.
///
/// Obtained from [`Message::cursor`](super::Message::cursor). It is neither
/// `Clone` nor rewindable: every decode call starts from a fresh cursor and
/// each frame is consumed at most once.
#[derive(Debug)]
pub struct FrameCursor<'a> {
    frames: &'a [Frame],
    position: usize,
}

impl<'a> FrameCursor<'a> {
    pub(crate) fn new(frames: &'a [Frame]) -> Self {
        Self {
            frames,
            position: 0,
        }
    }

    /// Consume the next frame, failing if the message has run out.
    pub fn next_frame(&mut self) -> Result<&'a Frame, DecodeError> {
        self.next_for("frame")
    }

    /// Like [`next_frame`](Self::next_frame), naming the field in the error.
    pub fn next_for(&mut self, expected: &'static str) -> Result<&'a Frame, DecodeError> {
        let frame = self
            .frames
            .get(self.position)
            .ok_or(DecodeError::MissingFrame { expected })?;
        self.position += 1;
        Ok(frame)
    }

    /// Look at the next frame without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<&'a Frame> {
        self.frames.get(self.position)
    }

    /// Check if any frame is left.
    #[inline]
    pub fn has_next(&self) -> bool {
        self.position < self.frames.len()
    }

    /// Number of frames consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Skip everything up to and including the end frame that closes the
    /// current nested structure.
    ///
    /// Nested begin/end pairs inside the skipped region are balanced, so
    /// fields added by a newer peer, structured or not, are passed over.
    pub fn skip_to_end_frame(&mut self) -> Result<(), DecodeError> {
        let mut depth = 1usize;
        while depth > 0 {
            let frame = self.next_for("end of data structure")?;
            if frame.is_end_frame() {
                depth -= 1;
            } else if frame.is_begin_frame() {
                depth += 1;
            }
        }
        Ok(())
    }

    /// Consume the next frame if it is a null frame.
    pub fn next_is_null(&mut self) -> bool {
        self.consume_if(Frame::is_null_frame)
    }

    /// Consume the next frame if it is an end frame.
    pub fn next_is_end(&mut self) -> bool {
        self.consume_if(Frame::is_end_frame)
    }

    fn consume_if(&mut self, predicate: impl Fn(&Frame) -> bool) -> bool {
        match self.peek() {
            Some(frame) if predicate(frame) => {
                self.position += 1;
                true
            }
            _ => false,
        }
    }
}

impl<'a> Iterator for FrameCursor<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frames.len() - self.position;
        (remaining, Some(remaining))
    }
}
