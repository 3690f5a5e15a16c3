//! Memory device facade
//!
//! `MemDevice` ties the table, the configuration and session bookkeeping
//! together and is the boundary the host talks to:
//!
//! - `open()` - bind a session to a slot by device identity
//! - `read()` / `write()` / `seek()` - transfers through a session
//! - `configure()` / `ioctl()` - the privileged (re)allocation path
//! - `close()` - drop a session; the slot's buffer is untouched
//!
//! Configure is the only path that mutates the table. Allocation happens
//! before any slot guard is taken, so a failed configure installs nothing.

use std::io::SeekFrom;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zos_memdev_core::{
    Buffer, ConfigureRequest, InvariantViolation, MemDevError, MemDevResult, MemInit, SlotIndex,
    CMD_CONFIGURE,
};

use crate::config::{DeviceConfig, IndexPolicy};
use crate::session::{Session, SessionId};
use crate::table::{DeviceTable, SlotInfo};

/// Identity of an opened device node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Major number of the node
    pub major: u32,
    /// Minor number, selects the table slot
    pub minor: u32,
}

impl DeviceIdentity {
    /// Identity with the given numbers.
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Identity for a minor number under a host-assigned major.
    pub fn minor(minor: u32) -> Self {
        Self { major: 0, minor }
    }
}

/// Where a successful configure installed its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placement {
    /// Inside the table
    Slot(SlotIndex),
    /// Outside the table (legacy unchecked policy only)
    Stray(i64),
}

/// Multiplexed in-memory byte device.
pub struct MemDevice {
    config: DeviceConfig,
    table: Arc<DeviceTable>,
    next_session: AtomicU64,
}

impl MemDevice {
    /// Build a device from a validated configuration.
    pub fn new(config: DeviceConfig) -> Self {
        let table = Arc::new(DeviceTable::new(config.slot_count));
        info!(
            name = %config.name,
            slots = config.slot_count,
            policy = ?config.index_policy,
            "memory device initialized"
        );
        Self {
            config,
            table,
            next_session: AtomicU64::new(1),
        }
    }

    /// Device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Underlying table.
    pub fn table(&self) -> &Arc<DeviceTable> {
        &self.table
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.table.capacity()
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Open a session on the slot named by `identity.minor`.
    ///
    /// A minor number outside the table, or a major number that does not
    /// match a fixed configured major, is `NoSuchDevice`.
    pub fn open(&self, identity: DeviceIdentity) -> MemDevResult<Session> {
        let major_matches = self.config.major == 0 || identity.major == self.config.major;
        let slot = SlotIndex::checked(identity.minor as i64, self.table.capacity())
            .filter(|_| major_matches)
            .ok_or(MemDevError::NoSuchDevice {
                minor: identity.minor,
            })
            .inspect_err(|_| debug!(?identity, "open rejected"))?;

        let id = SessionId(self.next_session.fetch_add(1, Ordering::Relaxed));
        debug!(session = id.0, %slot, "session opened");
        Ok(Session::new(id, slot, Arc::clone(&self.table)))
    }

    /// Read up to `max_count` bytes, returning them with the new cursor.
    pub fn read(&self, session: &mut Session, max_count: usize) -> MemDevResult<(Vec<u8>, u64)> {
        let bytes = session.read(max_count).inspect_err(|e| {
            debug!(session = session.id().0, error = %e, "read rejected")
        })?;
        Ok((bytes, session.position()))
    }

    /// Write `bytes`, returning the count written and the new cursor.
    pub fn write(&self, session: &mut Session, bytes: &[u8]) -> MemDevResult<(usize, u64)> {
        let count = session.write(bytes).inspect_err(|e| {
            debug!(session = session.id().0, error = %e, "write rejected")
        })?;
        Ok((count, session.position()))
    }

    /// Move a session's cursor.
    pub fn seek(&self, session: &mut Session, from: SeekFrom) -> MemDevResult<u64> {
        session.seek(from)
    }

    /// Close a session. The slot's buffer is unaffected.
    pub fn close(&self, session: Session) {
        debug!(session = session.id().0, slot = %session.slot(), "session closed");
    }

    // ========================================================================
    // Configure (privileged)
    // ========================================================================

    /// (Re)allocate a slot's buffer.
    pub fn configure(&self, slot_index: i64, requested_length: u64) -> MemDevResult<()> {
        self.configure_request(ConfigureRequest::new(slot_index, requested_length))
            .map(|_| ())
    }

    /// (Re)allocate a slot's buffer, reporting where it landed.
    ///
    /// Validation order: length, then slot index per the index policy. The
    /// buffer is allocated and zero-filled before any guard is taken; the old
    /// buffer is released after the guard is dropped.
    pub fn configure_request(&self, request: ConfigureRequest) -> MemDevResult<Placement> {
        let length = request.checked_length().inspect_err(|e| {
            debug!(slot = request.slot_index, error = %e, "configure rejected")
        })?;

        let slot = SlotIndex::checked(request.slot_index, self.table.capacity());
        if slot.is_none() && self.config.index_policy == IndexPolicy::Checked {
            let err = MemDevError::SlotOutOfRange {
                index: request.slot_index,
                capacity: self.table.capacity(),
            };
            debug!(error = %err, "configure rejected");
            return Err(err);
        }

        let buffer = Buffer::allocate(length as u64)?;

        match slot {
            Some(slot) => {
                let previous = self.table.install(slot, buffer)?;
                info!(
                    %slot,
                    length,
                    replaced = previous.is_some(),
                    "slot configured"
                );
                Ok(Placement::Slot(slot))
            }
            None => {
                warn!(
                    index = request.slot_index,
                    capacity = self.table.capacity(),
                    length,
                    "configure outside device table (legacy unchecked index)"
                );
                self.table.install_stray(request.slot_index, buffer);
                Ok(Placement::Stray(request.slot_index))
            }
        }
    }

    /// Raw ioctl entry point.
    ///
    /// Checks run in the driver's order: payload present, payload decodable,
    /// length, slot index, then command number.
    pub fn ioctl(&self, cmd: u32, payload: Option<&[u8]>) -> MemDevResult<()> {
        let request = ConfigureRequest::from(MemInit::from_bytes(payload)?);
        request.checked_length()?;

        let in_table = SlotIndex::checked(request.slot_index, self.table.capacity()).is_some();
        if !in_table && self.config.index_policy == IndexPolicy::Checked {
            return Err(MemDevError::SlotOutOfRange {
                index: request.slot_index,
                capacity: self.table.capacity(),
            });
        }

        if cmd != CMD_CONFIGURE {
            debug!(cmd, "unknown ioctl command");
            return Err(MemDevError::UnknownCommand { cmd });
        }

        self.configure_request(request).map(|_| ())
    }

    // ========================================================================
    // Introspection and lifecycle
    // ========================================================================

    /// Snapshot of every slot.
    pub fn slots(&self) -> Vec<SlotInfo> {
        self.table.snapshot()
    }

    /// Check buffer invariants across the table.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        self.table.check_invariants()
    }

    /// Release every buffer. Open sessions stay valid and see unconfigured
    /// slots afterwards.
    pub fn teardown(&self) -> usize {
        let freed = self.table.teardown();
        info!(name = %self.config.name, freed, "memory device torn down");
        freed
    }
}

impl Default for MemDevice {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}
