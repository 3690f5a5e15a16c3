//! Open device handles
//!
//! A `Session` is bound to one slot when it is opened and keeps its own
//! cursor. It never owns the slot's buffer: every transfer takes the slot
//! guard, validates against whatever buffer is installed at that moment, and
//! releases the guard before returning.

use std::io::SeekFrom;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zos_memdev_core::{read_at, transfer_window, write_at, MemDevError, MemDevResult, SlotIndex};

use crate::table::DeviceTable;

/// Session identifier, unique for the lifetime of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

/// One open handle on a device slot.
pub struct Session {
    id: SessionId,
    slot: SlotIndex,
    position: u64,
    table: Arc<DeviceTable>,
}

impl Session {
    pub(crate) fn new(id: SessionId, slot: SlotIndex, table: Arc<DeviceTable>) -> Self {
        Self {
            id,
            slot,
            position: 0,
            table,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Slot this session is bound to.
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    /// Current cursor.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read up to `max_count` bytes at the cursor.
    ///
    /// The returned vector holds exactly the bytes transferred; it is empty
    /// when the cursor sits at the end of the buffer.
    pub fn read(&mut self, max_count: usize) -> MemDevResult<Vec<u8>> {
        let position = self.position;
        let bytes = self
            .table
            .with_buffer(self.slot, |buffer| {
                let buffer = buffer.as_deref();
                let window = transfer_window(buffer, position, max_count)?;
                Ok(buffer.map_or_else(Vec::new, |b| b.as_slice()[window.range()].to_vec()))
            })
            .unwrap_or(Err(MemDevError::NotConfigured))?;

        self.position += bytes.len() as u64;
        Ok(bytes)
    }

    /// Read into a caller buffer, returning the count transferred.
    pub fn read_into(&mut self, out: &mut [u8]) -> MemDevResult<usize> {
        let position = self.position;
        let count = self
            .table
            .with_buffer(self.slot, |buffer| {
                read_at(buffer.as_deref(), position, out)
            })
            .unwrap_or(Err(MemDevError::NotConfigured))?;

        self.position += count as u64;
        Ok(count)
    }

    /// Write `bytes` at the cursor, returning the count transferred.
    ///
    /// Writes are clamped to the buffer end; the caller sees a short count.
    pub fn write(&mut self, bytes: &[u8]) -> MemDevResult<usize> {
        let position = self.position;
        let count = self
            .table
            .with_buffer(self.slot, |buffer| write_at(buffer, position, bytes))
            .unwrap_or(Err(MemDevError::NotConfigured))?;

        self.position += count as u64;
        Ok(count)
    }

    /// Move the cursor.
    ///
    /// `End` is relative to the slot's current buffer length (0 when the slot
    /// is unconfigured). Negative or overflowing targets fail with
    /// `InvalidSeek` and leave the cursor where it was. Targets past the end
    /// are accepted; the next transfer reports `OutOfRange`.
    pub fn seek(&mut self, from: SeekFrom) -> MemDevResult<u64> {
        let target = match from {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => {
                let length = self.table.buffer_len(self.slot).unwrap_or(0) as u64;
                length.checked_add_signed(delta)
            }
        };

        // Positions must stay representable as a signed file offset.
        let target = target
            .filter(|&t| t <= i64::MAX as u64)
            .ok_or(MemDevError::InvalidSeek)?;
        self.position = target;
        Ok(target)
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("position", &self.position)
            .finish()
    }
}
