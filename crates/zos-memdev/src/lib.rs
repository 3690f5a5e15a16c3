//! Zero OS Memory Device - Multiplexed In-Memory Byte Device
//!
//! A fixed table of independently (re)allocatable byte buffers, each reached
//! through open / read / write / seek / configure, with a tag check in front
//! of every transfer. The pure buffer and validation logic lives in
//! `zos-memdev-core`; this crate adds the shared, guarded runtime around it.
//!
//! # Architecture
//!
//! ```text
//!   host (device nodes memdev0..N-1)
//!        │ FileOp
//!        ▼
//! ┌──────────────┐   audit   ┌──────────────┐
//! │  Dispatcher  │──────────▶│   AuditLog   │
//! │  sessions    │           └──────────────┘
//! └──────┬───────┘
//!        │ open / read / write / seek / ioctl / close
//!        ▼
//! ┌──────────────┐  configure (only mutation path)
//! │  MemDevice   │──────────────────────┐
//! └──────┬───────┘                      │
//!        │ Session (slot, cursor)       ▼
//!        ▼                       ┌──────────────┐
//!   transfer_window ◀────────────│ DeviceTable  │
//!   (zos-memdev-core)   slot     │ Mutex/slot   │
//!                       guard    └──────────────┘
//! ```
//!
//! # Concurrency
//!
//! Every slot has its own exclusive guard, held for one install or one
//! transfer. There is no cross-slot lock. A transfer therefore sees either
//! the whole buffer that was installed before it or the whole buffer that
//! replaced it.
//!
//! # Index policy
//!
//! Configure validates its slot index by default. `IndexPolicy::LegacyUnchecked`
//! accepts any index and parks out-of-table installs in a stray region so the
//! behaviour of the unchecked driver can be studied without touching memory
//! outside the table.

pub mod audit;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod session;
pub mod table;


pub use audit::{AuditEvent, AuditEventType, AuditLog, EventId, OpCode};
pub use config::{ConfigError, DeviceConfig, IndexPolicy};
pub use device::{DeviceIdentity, MemDevice, Placement};
pub use dispatch::{Dispatcher, FileOp, OpResult};
pub use session::{Session, SessionId};
pub use table::{DeviceTable, SlotInfo};

pub use zos_memdev_core::{
    errno, Buffer, ConfigureRequest, ErrorKind, MemDevError, MemDevResult, MemInit, SizeWord,
    SlotIndex, BUFFER_TAG, CMD_CONFIGURE, DEFAULT_SLOT_COUNT, MAX_BUFFER_LEN,
};
