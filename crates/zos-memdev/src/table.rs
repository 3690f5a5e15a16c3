//! Device table - fixed array of guarded buffer slots
//!
//! Each slot owns an optional [`Buffer`] behind its own exclusive guard. A
//! guard is held for one install or one transfer, never across slots, so
//! traffic on different slots never contends.
//!
//! The stray region records installs through out-of-table indices when the
//! device runs with [`IndexPolicy::LegacyUnchecked`](crate::IndexPolicy).
//! Nothing outside the table is ever written; the region only makes those
//! installs observable.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use zos_memdev_core::{
    check_buffer, Buffer, InvariantViolation, MemDevError, MemDevResult, SizeWord, SlotIndex,
};

/// Point-in-time view of one slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    /// Slot index (minor number)
    pub index: usize,
    /// Packed size word (`SizeWord::EMPTY` when unconfigured)
    pub size_word: SizeWord,
    /// Whether a buffer is installed
    pub configured: bool,
}

impl SlotInfo {
    /// Buffer length, 0 when unconfigured.
    pub fn length(&self) -> u32 {
        self.size_word.length()
    }
}

/// Fixed-capacity table of guarded buffer slots.
pub struct DeviceTable {
    /// One guard per slot
    slots: Box<[Mutex<Option<Buffer>>]>,
    /// Legacy out-of-table installs, keyed by the raw index
    stray: Mutex<BTreeMap<i64, Buffer>>,
}

impl DeviceTable {
    /// Create a table with `capacity` unconfigured slots.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Mutex::new(None)).collect();
        Self {
            slots,
            stray: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Install `buffer` at `slot`, returning the buffer it replaced.
    ///
    /// The previous buffer is handed back rather than dropped under the guard.
    pub fn install(&self, slot: SlotIndex, buffer: Buffer) -> MemDevResult<Option<Buffer>> {
        let guard = self
            .slots
            .get(slot.get())
            .ok_or(MemDevError::SlotOutOfRange {
                index: slot.get() as i64,
                capacity: self.capacity(),
            })?;
        Ok(guard.lock().replace(buffer))
    }

    /// Record an install through an index outside the table.
    pub fn install_stray(&self, index: i64, buffer: Buffer) -> Option<Buffer> {
        self.stray.lock().insert(index, buffer)
    }

    /// Run `f` against the slot's buffer while holding the slot guard.
    ///
    /// Returns `None` if `slot` is outside the table.
    pub fn with_buffer<R>(&self, slot: SlotIndex, f: impl FnOnce(Option<&mut Buffer>) -> R) -> Option<R> {
        let guard = self.slots.get(slot.get())?;
        let mut buffer = guard.lock();
        Some(f(buffer.as_mut()))
    }

    /// Current length of the slot's buffer, if configured.
    pub fn buffer_len(&self, slot: SlotIndex) -> Option<u32> {
        self.with_buffer(slot, |buffer| buffer.map(|b| b.len()))
            .flatten()
    }

    /// Snapshot of every slot, in index order.
    pub fn snapshot(&self) -> Vec<SlotInfo> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, guard)| {
                let buffer = guard.lock();
                SlotInfo {
                    index,
                    size_word: buffer.as_ref().map_or(SizeWord::EMPTY, |b| b.size_word()),
                    configured: buffer.is_some(),
                }
            })
            .collect()
    }

    /// Raw indices that received legacy out-of-table installs.
    pub fn stray_indices(&self) -> Vec<i64> {
        self.stray.lock().keys().copied().collect()
    }

    /// Size word of a stray install.
    pub fn stray_size_word(&self, index: i64) -> Option<SizeWord> {
        self.stray.lock().get(&index).map(|b| b.size_word())
    }

    /// Check buffer invariants for every configured slot and stray install.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for (index, guard) in self.slots.iter().enumerate() {
            if let Some(buffer) = guard.lock().as_ref() {
                violations.extend(check_buffer(index as i64, buffer));
            }
        }

        for (&index, buffer) in self.stray.lock().iter() {
            violations.extend(check_buffer(index, buffer));
        }

        violations
    }

    /// Release every buffer, returning how many were freed.
    pub fn teardown(&self) -> usize {
        let mut freed = 0;
        for guard in self.slots.iter() {
            if guard.lock().take().is_some() {
                freed += 1;
            }
        }

        let stray = std::mem::take(&mut *self.stray.lock());
        freed + stray.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_unconfigured() {
        let table = DeviceTable::new(3);
        assert_eq!(table.capacity(), 3);
        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.iter().all(|s| !s.configured && s.size_word == SizeWord::EMPTY));
    }

    #[test]
    fn test_install_and_replace() {
        let table = DeviceTable::new(3);
        let first = Buffer::allocate(8).unwrap();
        assert_eq!(table.install(SlotIndex(1), first).unwrap(), None);

        let previous = table
            .install(SlotIndex(1), Buffer::allocate(32).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(previous.len(), 8);
        assert_eq!(table.buffer_len(SlotIndex(1)), Some(32));
    }

    #[test]
    fn test_install_out_of_range() {
        let table = DeviceTable::new(3);
        let err = table
            .install(SlotIndex(3), Buffer::allocate(8).unwrap())
            .unwrap_err();
        assert_eq!(err, MemDevError::SlotOutOfRange { index: 3, capacity: 3 });
    }

    #[test]
    fn test_with_buffer_out_of_range() {
        let table = DeviceTable::new(3);
        assert!(table.with_buffer(SlotIndex(5), |_| ()).is_none());
    }

    #[test]
    fn test_with_buffer_unconfigured() {
        let table = DeviceTable::new(3);
        assert_eq!(table.with_buffer(SlotIndex(0), |b| b.is_none()), Some(true));
        assert_eq!(table.buffer_len(SlotIndex(0)), None);
    }

    #[test]
    fn test_stray_region() {
        let table = DeviceTable::new(3);
        table.install_stray(999, Buffer::allocate(16).unwrap());
        assert_eq!(table.stray_indices(), vec![999]);
        assert_eq!(table.stray_size_word(999), Some(SizeWord::tagged(16)));
        assert!(table.snapshot().iter().all(|s| !s.configured));
    }

    #[test]
    fn test_invariants_hold() {
        let table = DeviceTable::new(2);
        table.install(SlotIndex(0), Buffer::allocate(1).unwrap()).unwrap();
        table.install_stray(-4, Buffer::allocate(2).unwrap());
        assert!(table.check_invariants().is_empty());
    }

    #[test]
    fn test_teardown_counts() {
        let table = DeviceTable::new(3);
        table.install(SlotIndex(0), Buffer::allocate(4).unwrap()).unwrap();
        table.install(SlotIndex(2), Buffer::allocate(4).unwrap()).unwrap();
        table.install_stray(7, Buffer::allocate(4).unwrap());
        assert_eq!(table.teardown(), 3);
        assert!(table.snapshot().iter().all(|s| !s.configured));
        assert!(table.stray_indices().is_empty());
        assert_eq!(table.teardown(), 0);
    }
}
