//! Splitting large messages into fragments and putting them back together.
//!
//! A message whose wire size exceeds the configured limit is cut at frame
//! boundaries into fragment messages. Each fragment starts with a fragment
//! header frame holding the 8-byte fragmentation id:
//!
//! ```text
//! first:  [id, BEGIN_FRAGMENT] [frame] [frame] ...
//! middle: [id, -             ] [frame] ...
//! last:   [id, END_FRAGMENT  ] [frame] ...
//! ```
//!
//! A whole message needs no header: its initial frame already carries
//! `UNFRAGMENTED` (both bits). A single frame larger than the limit travels
//! alone in its fragment; frames are never cut.
//!
//! Codecs never see any of this: the assembler hands back a message whose
//! frames are exactly those of the original, in order.

use std::collections::HashMap;

use bytes::BytesMut;

use super::flags::FrameFlags;
use super::frame::Frame;
use super::message::Message;
use super::wire_format::{
    DEFAULT_MAX_MESSAGE_SIZE, FRAGMENTATION_ID_OFFSET, SIZE_OF_FRAME_LENGTH_AND_FLAGS,
};
use crate::codec::fixed_size::{decode_long, encode_long, LONG_SIZE_IN_BYTES};
use crate::error::DecodeError;

/// Default fragment size limit (128 KB).
pub const DEFAULT_MAX_FRAGMENT_SIZE: usize = 128 * 1024;

/// Default cap on fragment groups open at once on one connection.
pub const DEFAULT_MAX_FRAGMENT_GROUPS: usize = 256;

/// Wire size of a fragment header frame.
const FRAGMENT_HEADER_WIRE_SIZE: usize = SIZE_OF_FRAME_LENGTH_AND_FLAGS + LONG_SIZE_IN_BYTES;

fn fragment_header(fragmentation_id: i64, flags: FrameFlags) -> Frame {
    let mut content = BytesMut::zeroed(LONG_SIZE_IN_BYTES);
    encode_long(&mut content, FRAGMENTATION_ID_OFFSET, fragmentation_id);
    Frame::new(content.freeze(), flags)
}

/// Split `message` into fragments of at most `max_fragment_size` wire bytes.
///
/// Returns the message unchanged (as a single element) when it fits or has
/// only one frame.
pub fn split(message: Message, max_fragment_size: usize, fragmentation_id: i64) -> Vec<Message> {
    if message.frame_length() <= max_fragment_size || message.frames().len() < 2 {
        return vec![message];
    }

    let mut groups: Vec<Vec<Frame>> = Vec::new();
    let mut current: Vec<Frame> = Vec::new();
    let mut current_size = FRAGMENT_HEADER_WIRE_SIZE;

    for frame in message.into_frames() {
        let size = frame.wire_size();
        if !current.is_empty() && current_size + size > max_fragment_size {
            groups.push(std::mem::take(&mut current));
            current_size = FRAGMENT_HEADER_WIRE_SIZE;
        }
        current_size += size;
        current.push(frame);
    }
    groups.push(current);

    let last = groups.len() - 1;
    groups
        .into_iter()
        .enumerate()
        .map(|(index, frames)| {
            let flags = match index {
                0 => FrameFlags::BEGIN_FRAGMENT,
                i if i == last => FrameFlags::END_FRAGMENT,
                _ => FrameFlags::empty(),
            };
            let mut fragment = Message::for_encode();
            fragment.add(fragment_header(fragmentation_id, flags));
            for frame in frames {
                fragment.add(frame);
            }
            fragment
        })
        .collect()
}

/// Reassembles fragments received on one connection.
///
/// Groups are keyed by fragmentation id, so fragments of different messages
/// may interleave. Within a group, frames are appended in arrival order.
///
/// Both the number of open groups and the reassembled size of each group are
/// bounded; a peer exceeding either gets a [`DecodeError`].
#[derive(Debug)]
pub struct FragmentAssembler {
    in_progress: HashMap<i64, Group>,
    max_message_size: usize,
    max_groups: usize,
}

#[derive(Debug, Default)]
struct Group {
    frames: Vec<Frame>,
    /// Wire size of `frames`.
    size: usize,
}

impl Group {
    fn extend(&mut self, frames: impl Iterator<Item = Frame>) {
        for frame in frames {
            self.size += frame.wire_size();
            self.frames.push(frame);
        }
    }
}

impl Default for FragmentAssembler {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_MAX_FRAGMENT_GROUPS)
    }
}

impl FragmentAssembler {
    /// Create an empty assembler with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty assembler.
    ///
    /// `max_message_size` bounds the wire size of one reassembled message,
    /// `max_groups` the number of groups open at once.
    pub fn with_limits(max_message_size: usize, max_groups: usize) -> Self {
        Self {
            in_progress: HashMap::new(),
            max_message_size,
            max_groups,
        }
    }

    /// Feed one physical message.
    ///
    /// Returns the complete logical message when `message` is whole or is the
    /// last fragment of its group, `None` while a group is still open.
    ///
    /// Opening a group beyond the group cap, or growing a group past the
    /// maximum message size, is an error. An oversized group is discarded.
    pub fn accept(&mut self, message: Message) -> Result<Option<Message>, DecodeError> {
        let header = message.initial_frame()?;
        if header.is_unfragmented() {
            return Ok(Some(message));
        }

        let flags = header.flags();
        let fragmentation_id = decode_long(header.content(), FRAGMENTATION_ID_OFFSET)?;
        let frames = message.into_frames().into_iter().skip(1);

        if flags.has(FrameFlags::BEGIN_FRAGMENT) {
            let restarted = self.in_progress.contains_key(&fragmentation_id);
            if restarted {
                tracing::warn!(
                    fragmentation_id,
                    "Fragment group restarted, discarding earlier fragments"
                );
            } else if self.in_progress.len() >= self.max_groups {
                return Err(DecodeError::TooManyFragmentGroups {
                    max: self.max_groups,
                });
            }
            self.in_progress.insert(fragmentation_id, Group::default());
        }

        let Some(group) = self.in_progress.get_mut(&fragmentation_id) else {
            tracing::warn!(fragmentation_id, "Dropping fragment of unknown group");
            return Ok(None);
        };
        group.extend(frames);

        if group.size > self.max_message_size {
            let size = group.size;
            self.in_progress.remove(&fragmentation_id);
            return Err(DecodeError::MessageTooLarge {
                size,
                max: self.max_message_size,
            });
        }

        if flags.has(FrameFlags::END_FRAGMENT) {
            let frames = self
                .in_progress
                .remove(&fragmentation_id)
                .map(|group| group.frames)
                .unwrap_or_default();
            return Ok(Some(Message::for_decode(frames)));
        }
        Ok(None)
    }

    /// Number of groups still waiting for their last fragment.
    pub fn in_progress(&self) -> usize {
        self.in_progress.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_frames(count: usize, content_len: usize) -> Message {
        let mut message = Message::for_encode();
        message.add(Frame::new(vec![0xAA; 16], FrameFlags::UNFRAGMENTED));
        for i in 0..count {
            message.add(Frame::with_content(vec![i as u8; content_len]));
        }
        message
    }

    #[test]
    fn test_small_message_is_not_split() {
        let message = message_with_frames(2, 10);
        let fragments = split(message.clone(), 1024, 1);
        assert_eq!(fragments, vec![message]);
    }

    #[test]
    fn test_split_flags_and_ids() {
        let message = message_with_frames(6, 100);
        let fragments = split(message, 250, 77);
        assert!(fragments.len() >= 3);

        for (i, fragment) in fragments.iter().enumerate() {
            assert!(fragment.frame_length() <= 250);
            let header = fragment.initial_frame().unwrap();
            assert_eq!(decode_long(header.content(), 0).unwrap(), 77);
            let expected = if i == 0 {
                FrameFlags::BEGIN_FRAGMENT
            } else if i == fragments.len() - 1 {
                FrameFlags::END_FRAGMENT
            } else {
                FrameFlags::empty()
            };
            assert_eq!(header.flags(), expected);
        }
    }

    #[test]
    fn test_oversized_frame_travels_alone() {
        let mut message = message_with_frames(1, 10);
        message.add(Frame::with_content(vec![1u8; 500]));
        message.add(Frame::with_content(vec![2u8; 10]));

        let fragments = split(message, 100, 5);

        let sizes: Vec<usize> = fragments.iter().map(|f| f.frames().len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(fragments[1].frames()[1].len(), 500);
    }

    #[test]
    fn test_reassembly_restores_frames() {
        let message = message_with_frames(10, 64);
        let fragments = split(message.clone(), 200, -3);
        let mut assembler = FragmentAssembler::new();

        let last = fragments.len() - 1;
        for (i, fragment) in fragments.into_iter().enumerate() {
            let result = assembler.accept(fragment).unwrap();
            if i < last {
                assert!(result.is_none());
                assert_eq!(assembler.in_progress(), 1);
            } else {
                assert_eq!(result.unwrap().frames(), message.frames());
            }
        }
        assert_eq!(assembler.in_progress(), 0);
    }

    #[test]
    fn test_interleaved_groups() {
        let a = message_with_frames(4, 100);
        let b = message_with_frames(4, 90);
        let fa = split(a.clone(), 250, 1);
        let fb = split(b.clone(), 250, 2);
        assert_eq!(fa.len(), fb.len());

        let mut assembler = FragmentAssembler::new();
        let mut done = Vec::new();
        for (x, y) in fa.into_iter().zip(fb) {
            done.extend(assembler.accept(x).unwrap());
            done.extend(assembler.accept(y).unwrap());
        }

        assert_eq!(done.len(), 2);
        assert_eq!(done[0].frames(), a.frames());
        assert_eq!(done[1].frames(), b.frames());
    }

    #[test]
    fn test_unknown_group_is_dropped() {
        let fragments = split(message_with_frames(6, 100), 250, 9);
        let mut assembler = FragmentAssembler::new();
        // Skip the first fragment.
        for fragment in fragments.into_iter().skip(1) {
            assert!(assembler.accept(fragment).unwrap().is_none());
        }
        assert_eq!(assembler.in_progress(), 0);
    }

    #[test]
    fn test_open_groups_are_capped() {
        let mut assembler = FragmentAssembler::with_limits(DEFAULT_MAX_MESSAGE_SIZE, 2);
        for id in 0..2 {
            let first = split(message_with_frames(6, 100), 250, id).remove(0);
            assert!(assembler.accept(first).unwrap().is_none());
        }

        let first = split(message_with_frames(6, 100), 250, 2).remove(0);
        assert_eq!(
            assembler.accept(first),
            Err(DecodeError::TooManyFragmentGroups { max: 2 })
        );
        assert_eq!(assembler.in_progress(), 2);

        // Restarting an open group does not count against the cap.
        let again = split(message_with_frames(6, 100), 250, 1).remove(0);
        assert!(assembler.accept(again).unwrap().is_none());
        assert_eq!(assembler.in_progress(), 2);
    }

    #[test]
    fn test_oversized_group_is_discarded() {
        // Each 100-byte frame is 106 bytes on the wire.
        let fragments = split(message_with_frames(6, 100), 250, 4);
        let mut assembler = FragmentAssembler::with_limits(300, DEFAULT_MAX_FRAGMENT_GROUPS);

        let mut result = Ok(None);
        for fragment in fragments {
            result = assembler.accept(fragment);
            if result.is_err() {
                break;
            }
        }

        assert!(matches!(
            result,
            Err(DecodeError::MessageTooLarge { max: 300, .. })
        ));
        assert_eq!(assembler.in_progress(), 0);
    }

    #[test]
    fn test_whole_message_passes_through() {
        let message = message_with_frames(1, 4);
        let mut assembler = FragmentAssembler::new();
        assert_eq!(assembler.accept(message.clone()).unwrap(), Some(message));
    }
}
