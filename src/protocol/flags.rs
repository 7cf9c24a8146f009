//! Frame flags.
//!
//! Each frame carries a 16-bit flag set on the wire. The two highest bits
//! describe fragmentation, the next one marks the last frame of a physical
//! message, and the rest describe the frame's role inside a message.

use bitflags::bitflags;

bitflags! {
    /// Frame flag bits (16 bits, little endian on the wire).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u16 {
        /// First fragment of a fragmented message.
        const BEGIN_FRAGMENT = 1 << 15;
        /// Last fragment of a fragmented message.
        const END_FRAGMENT = 1 << 14;
        /// Whole message in one fragment.
        const UNFRAGMENTED = Self::BEGIN_FRAGMENT.bits() | Self::END_FRAGMENT.bits();
        /// Last frame of a physical message. Set at write time only.
        const IS_FINAL = 1 << 13;
        /// Opens a nested structure.
        const BEGIN_DATA_STRUCTURE = 1 << 12;
        /// Closes a nested structure.
        const END_DATA_STRUCTURE = 1 << 11;
        /// Stands in for an absent value.
        const IS_NULL = 1 << 10;
        /// Server-pushed event message.
        const IS_EVENT = 1 << 9;
        /// Request expects backup acknowledgments.
        const BACKUP_AWARE = 1 << 8;
        /// Backup acknowledgment event.
        const BACKUP_EVENT = 1 << 7;
    }
}

impl FrameFlags {
    /// Create flags from the raw wire value.
    ///
    /// Infallible: unknown bits are kept but never checked, so newer peers
    /// can define them without breaking older ones.
    #[must_use]
    pub const fn from_wire(value: u16) -> Self {
        Self::from_bits_retain(value)
    }

    /// Raw wire value.
    #[must_use]
    pub const fn to_wire(self) -> u16 {
        self.bits()
    }

    /// Whether `flag` is fully contained in these flags.
    #[inline]
    pub fn has(self, flag: FrameFlags) -> bool {
        self.contains(flag)
    }
}

impl Default for FrameFlags {
    fn default() -> Self {
        Self::empty()
    }
}
