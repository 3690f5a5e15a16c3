//! Access validation - the gate in front of every transfer
//!
//! Every read and write goes through [`transfer_window`] before a single byte
//! moves:
//!
//! 1. Absent or untagged buffer: `InvalidState` (fail closed)
//! 2. Position past the end: `OutOfRange`
//! 3. Otherwise the request is clamped to the bytes that remain
//!
//! `position == length` is legal and yields an empty window.

use core::ops::Range;

use crate::buffer::Buffer;
use crate::error::{MemDevError, MemDevResult};

/// Byte range a validated transfer may touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferWindow {
    /// First byte of the transfer
    pub start: usize,
    /// Bytes to move (already clamped)
    pub count: usize,
}

impl TransferWindow {
    /// One past the last byte of the transfer.
    pub fn end(&self) -> usize {
        self.start + self.count
    }

    /// Window as a slice range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Decide whether a transfer is permitted and compute its clamped window.
///
/// This function never modifies any state.
pub fn transfer_window(
    buffer: Option<&Buffer>,
    position: u64,
    requested: usize,
) -> MemDevResult<TransferWindow> {
    // 1. FAIL CLOSED on a missing or untagged buffer
    let buffer = buffer.ok_or(MemDevError::NotConfigured)?;
    if !buffer.is_tagged() {
        return Err(MemDevError::BadTag { tag: buffer.tag() });
    }

    // 2. The cursor may sit exactly at the end, never past it
    let length = buffer.len();
    if position > length as u64 {
        return Err(MemDevError::OutOfRange { position, length });
    }

    // 3. Clamp to what remains
    let available = (length as u64 - position) as usize;
    Ok(TransferWindow {
        start: position as usize,
        count: requested.min(available),
    })
}

/// Copy from the buffer at `position` into `out`, returning the count moved.
pub fn read_at(buffer: Option<&Buffer>, position: u64, out: &mut [u8]) -> MemDevResult<usize> {
    let window = transfer_window(buffer, position, out.len())?;
    if let Some(buffer) = buffer {
        out[..window.count].copy_from_slice(&buffer.as_slice()[window.range()]);
    }
    Ok(window.count)
}

/// Copy `src` into the buffer at `position`, returning the count moved.
pub fn write_at(buffer: Option<&mut Buffer>, position: u64, src: &[u8]) -> MemDevResult<usize> {
    let buffer = buffer.ok_or(MemDevError::NotConfigured)?;
    let window = transfer_window(Some(&*buffer), position, src.len())?;
    buffer.as_mut_slice()[window.range()].copy_from_slice(&src[..window.count]);
    Ok(window.count)
}

// ============================================================================
// Kani Proofs for Transfer Clamping
// ============================================================================

#[cfg(kani)]
mod proofs {
    use super::*;
    use crate::types::SizeWord;

    /// Proof: a granted window never extends past the buffer length
    #[kani::proof]
    fn window_within_length() {
        let length: u32 = kani::any();
        kani::assume(length > 0 && length <= 64);
        let buffer = Buffer::allocate(length as u64).unwrap();

        let position: u64 = kani::any();
        let requested: usize = kani::any();

        if let Ok(window) = transfer_window(Some(&buffer), position, requested) {
            kani::assert(
                window.end() <= length as usize,
                "Window must stay inside the buffer",
            );
            kani::assert(window.count <= requested, "Window never grows a request");
        }
    }

    /// Proof: size word packing round-trips every legal length
    #[kani::proof]
    fn size_word_round_trip() {
        let length: u32 = kani::any();
        kani::assume(length > 0 && length <= crate::types::MAX_BUFFER_LEN);
        let word = SizeWord::tagged(length);
        kani::assert(word.length() == length, "Length must survive packing");
        kani::assert(word.is_tagged(), "Packed word must carry the tag");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SizeWord, BUFFER_TAG};
    use crate::ErrorKind;
    use alloc::vec;

    fn buffer(len: u64) -> Buffer {
        Buffer::allocate(len).unwrap()
    }

    #[test]
    fn test_absent_buffer_fails_closed() {
        let err = transfer_window(None, 0, 1).unwrap_err();
        assert_eq!(err, MemDevError::NotConfigured);
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_untagged_buffer_fails_closed() {
        let buf = Buffer::from_raw_parts(SizeWord::pack(0x00, 16), vec![0; 16]);
        let err = transfer_window(Some(&buf), 0, 1).unwrap_err();
        assert_eq!(err, MemDevError::BadTag { tag: 0 });
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_wrong_tag_fails_closed() {
        let buf = Buffer::from_raw_parts(SizeWord::pack(BUFFER_TAG ^ 1, 16), vec![0; 16]);
        assert_eq!(
            transfer_window(Some(&buf), 0, 1).unwrap_err().kind(),
            ErrorKind::InvalidState
        );
    }

    #[test]
    fn test_position_at_end_is_empty_success() {
        let buf = buffer(16);
        let window = transfer_window(Some(&buf), 16, 100).unwrap();
        assert_eq!(window.count, 0);
        assert_eq!(window.start, 16);
    }

    #[test]
    fn test_position_past_end_is_out_of_range() {
        let buf = buffer(16);
        let err = transfer_window(Some(&buf), 17, 1).unwrap_err();
        assert_eq!(
            err,
            MemDevError::OutOfRange {
                position: 17,
                length: 16
            }
        );
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_huge_position_is_out_of_range() {
        let buf = buffer(16);
        // The packed word is 0x5A000010; only the length bits count.
        let err = transfer_window(Some(&buf), 0x5A00_0000, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_clamps_to_remaining() {
        let buf = buffer(16);
        let window = transfer_window(Some(&buf), 10, 100).unwrap();
        assert_eq!(window.count, 6);
        assert_eq!(window.range(), 10..16);
    }

    #[test]
    fn test_request_smaller_than_remaining() {
        let buf = buffer(16);
        let window = transfer_window(Some(&buf), 4, 3).unwrap();
        assert_eq!(window.range(), 4..7);
    }

    #[test]
    fn test_write_then_read() {
        let mut buf = buffer(8);
        assert_eq!(write_at(Some(&mut buf), 2, &[7, 8, 9]).unwrap(), 3);

        let mut out = [0u8; 8];
        assert_eq!(read_at(Some(&buf), 0, &mut out).unwrap(), 8);
        assert_eq!(out, [0, 0, 7, 8, 9, 0, 0, 0]);
    }

    #[test]
    fn test_write_clamped_at_tail() {
        let mut buf = buffer(4);
        assert_eq!(write_at(Some(&mut buf), 2, &[1, 2, 3, 4]).unwrap(), 2);
        assert_eq!(buf.as_slice(), &[0, 0, 1, 2]);
    }

    #[test]
    fn test_write_absent_buffer() {
        assert_eq!(
            write_at(None, 0, &[1]).unwrap_err(),
            MemDevError::NotConfigured
        );
    }

    #[test]
    fn test_read_into_short_output() {
        let mut buf = buffer(4);
        buf.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        let mut out = [0u8; 2];
        assert_eq!(read_at(Some(&buf), 1, &mut out).unwrap(), 2);
        assert_eq!(out, [2, 3]);
    }
}
