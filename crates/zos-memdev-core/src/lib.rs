//! Zero OS Memory Device Core - Pure Buffer and Validation Logic
//!
//! This crate contains the **pure, lock-free** core of the multiplexed memory
//! device: the packed size word, the tagged buffer, the access validator and
//! the configure request shapes. It owns no table and performs no I/O.
//!
//! # Design Principles
//!
//! 1. **No locking or logging**: All of that lives in `zos-memdev`
//! 2. **Fail closed**: An untagged or absent buffer never transfers a byte
//! 3. **Deterministic**: Same input always produces same output
//! 4. **Verifiable**: Small enough for Kani proofs of packing and clamping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    zos-memdev-core                          │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │    Buffer     │    │   validate    │                   │
//! │   │  - SizeWord   │───▶│  tag check    │                   │
//! │   │  - data       │    │  clamp window │                   │
//! │   └───────────────┘    └───────────────┘                   │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐                   │
//! │   │   request     │    │  invariants   │                   │
//! │   │  mem_init ABI │    │  assertions   │                   │
//! │   └───────────────┘    └───────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              │ used by
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       zos-memdev                            │
//! │   - Device table with per-slot guards                       │
//! │   - Sessions, dispatcher, audit log                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! - `types` - Constants, `SizeWord`, `SlotIndex`, `ErrorKind`
//! - `error` - `MemDevError` and its errno mapping
//! - `buffer` - Tagged, zero-initialized byte buffer
//! - `validate` - Access validator and the read/write copies built on it
//! - `request` - Configure request and the raw `mem_init` payload
//! - `invariants` - Runtime-checkable buffer invariants

#![no_std]
extern crate alloc;

pub mod buffer;
pub mod error;
pub mod invariants;
pub mod request;
pub mod types;
pub mod validate;

pub use buffer::Buffer;
pub use error::{errno, MemDevError, MemDevResult};
pub use invariants::{check_buffer, InvariantViolation};
pub use request::{ConfigureRequest, MemInit, CMD_CONFIGURE, MEM_INIT_SIZE};
pub use types::{
    ErrorKind, SizeWord, SlotIndex, BUFFER_TAG, DEFAULT_SLOT_COUNT, LENGTH_MASK, MAX_BUFFER_LEN,
};
pub use validate::{read_at, transfer_window, write_at, TransferWindow};
