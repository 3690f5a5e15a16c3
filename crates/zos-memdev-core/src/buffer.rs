//! Tagged device buffer
//!
//! A `Buffer` is the storage installed in one device table slot: a packed
//! size word plus exactly `length` bytes of zero-initialized data.

use alloc::vec::Vec;

use crate::error::{MemDevError, MemDevResult};
use crate::types::{is_valid_length, SizeWord};

/// Owned, zero-initialized byte region with its packed size word.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Buffer {
    size: SizeWord,
    data: Vec<u8>,
}

impl Buffer {
    /// Allocate a zero-filled, tagged buffer of `length` bytes.
    ///
    /// Fails with `InvalidLength` outside `(0, 0x1000000)` and with
    /// `AllocationFailure` when the allocator refuses the request. Nothing is
    /// returned half-built: the word is only tagged once the storage exists.
    pub fn allocate(length: u64) -> MemDevResult<Self> {
        if !is_valid_length(length) {
            return Err(MemDevError::InvalidLength { requested: length });
        }
        // Bounded by MAX_BUFFER_LEN above.
        let length = length as u32;

        let mut data = Vec::new();
        data.try_reserve_exact(length as usize)
            .map_err(|_| MemDevError::AllocationFailure { requested: length })?;
        data.resize(length as usize, 0);

        Ok(Self {
            size: SizeWord::tagged(length),
            data,
        })
    }

    /// Build a buffer around an arbitrary size word.
    ///
    /// Only used to exercise the validator against corrupted words.
    #[cfg(test)]
    pub(crate) fn from_raw_parts(size: SizeWord, data: Vec<u8>) -> Self {
        Self { size, data }
    }

    /// Packed size word.
    pub fn size_word(&self) -> SizeWord {
        self.size
    }

    /// Tag byte of the size word.
    pub fn tag(&self) -> u8 {
        self.size.tag()
    }

    /// Usable length in bytes, as recorded in the size word.
    pub fn len(&self) -> u32 {
        self.size.length()
    }

    /// Buffers are never empty once configured.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the size word carries the buffer tag.
    pub fn is_tagged(&self) -> bool {
        self.size.is_tagged()
    }

    /// Buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Mutable buffer contents.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
