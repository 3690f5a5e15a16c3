//! Core memory device types
//!
//! Pure data: constants, the packed size word, slot indices and the external
//! error kinds. Nothing here allocates or locks.

use serde::{Deserialize, Serialize};

/// Marker stored in the top byte of every configured buffer's size word.
pub const BUFFER_TAG: u8 = 0x5A;

/// Low 24 bits of the size word carry the buffer length.
pub const LENGTH_MASK: u32 = 0x00FF_FFFF;

/// Largest legal buffer length (lengths live in the open interval `(0, 0x1000000)`).
pub const MAX_BUFFER_LEN: u32 = LENGTH_MASK;

/// Number of slots in a table built from the default configuration.
pub const DEFAULT_SLOT_COUNT: usize = 3;

/// Check a requested length against the legal interval.
pub const fn is_valid_length(length: u64) -> bool {
    length > 0 && length <= MAX_BUFFER_LEN as u64
}

/// Packed tag + length word.
///
/// Bit layout (native `u32`):
///
/// ```text
///  31        24 23                               0
/// ┌────────────┬──────────────────────────────────┐
/// │    tag     │             length               │
/// └────────────┴──────────────────────────────────┘
/// ```
///
/// A single word carries both the validity marker and the size, exactly as the
/// device's ioctl-visible state does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SizeWord(pub u32);

impl SizeWord {
    /// Word of a slot that was never configured.
    pub const EMPTY: SizeWord = SizeWord(0);

    /// Pack an arbitrary tag and length. Length bits above 24 are discarded.
    pub const fn pack(tag: u8, length: u32) -> Self {
        Self(((tag as u32) << 24) | (length & LENGTH_MASK))
    }

    /// Pack a length with the valid buffer tag.
    pub const fn tagged(length: u32) -> Self {
        Self::pack(BUFFER_TAG, length)
    }

    /// Raw 32-bit value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Tag byte (bits 24..32).
    pub const fn tag(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Length (bits 0..24).
    pub const fn length(self) -> u32 {
        self.0 & LENGTH_MASK
    }

    /// True when the tag byte is [`BUFFER_TAG`].
    pub const fn is_tagged(self) -> bool {
        self.tag() == BUFFER_TAG
    }

    /// Little-endian encoding, as the word sits in device memory on the
    /// platforms this device targets.
    pub const fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Decode a little-endian word.
    pub const fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

/// Device table slot index (the device minor number).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotIndex(pub usize);

impl SlotIndex {
    /// Validate a caller-supplied signed index against the table capacity.
    ///
    /// Negative values are rejected by range, never by reinterpreting the sign.
    pub fn checked(raw: i64, capacity: usize) -> Option<SlotIndex> {
        if raw < 0 {
            return None;
        }
        let index = usize::try_from(raw).ok()?;
        (index < capacity).then_some(SlotIndex(index))
    }

    /// Raw index.
    pub fn get(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally visible error kinds.
///
/// Several concrete failures collapse onto one kind; see
/// [`MemDevError::kind`](crate::MemDevError::kind).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Open with an identity outside the table
    NoSuchDevice,
    /// Transfer against an absent or untagged buffer
    InvalidState,
    /// Cursor beyond the buffer length
    OutOfRange,
    /// Malformed configure/seek request
    InvalidArgument,
    /// Buffer allocation could not be satisfied
    AllocationFailure,
}
