//! Error types for the memory device.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ErrorKind;

/// Errno values surfaced at the host boundary.
pub mod errno {
    /// Bad file descriptor (unknown session)
    pub const EBADF: i32 = 9;
    /// Out of memory / cursor past the buffer
    pub const ENOMEM: i32 = 12;
    /// Bad address / untagged buffer
    pub const EFAULT: i32 = 14;
    /// No such device
    pub const ENODEV: i32 = 19;
    /// Invalid argument
    pub const EINVAL: i32 = 22;
}

/// Errors from memory device operations.
///
/// The variants are richer than [`ErrorKind`]; callers that only speak errno
/// see the collapsed view through [`MemDevError::errno`].
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemDevError {
    /// Open named a minor number outside the table
    #[error("no such device: minor {minor}")]
    NoSuchDevice { minor: u32 },

    /// Slot has never been configured
    #[error("slot is not configured")]
    NotConfigured,

    /// Size word does not carry the buffer tag
    #[error("buffer tag mismatch: found {tag:#04x}")]
    BadTag { tag: u8 },

    /// Cursor lies beyond the end of the buffer
    #[error("position {position} is past buffer length {length}")]
    OutOfRange { position: u64, length: u32 },

    /// Configure called without a payload
    #[error("missing configure payload")]
    MissingPayload,

    /// Configure payload too short to hold a `mem_init`
    #[error("malformed configure payload: {len} bytes")]
    MalformedPayload { len: usize },

    /// Requested length outside `(0, 0x1000000)`
    #[error("invalid buffer length {requested:#x}")]
    InvalidLength { requested: u64 },

    /// Slot index outside the table under the checked index policy
    #[error("slot index {index} out of range for {capacity} slots")]
    SlotOutOfRange { index: i64, capacity: usize },

    /// Unsupported ioctl command
    #[error("unknown command {cmd}")]
    UnknownCommand { cmd: u32 },

    /// Seek to a negative or overflowing position
    #[error("invalid seek")]
    InvalidSeek,

    /// Allocator refused the buffer
    #[error("failed to allocate {requested} bytes")]
    AllocationFailure { requested: u32 },
}

impl MemDevError {
    /// Collapse onto the externally visible kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MemDevError::NoSuchDevice { .. } => ErrorKind::NoSuchDevice,
            MemDevError::NotConfigured | MemDevError::BadTag { .. } => ErrorKind::InvalidState,
            MemDevError::OutOfRange { .. } => ErrorKind::OutOfRange,
            MemDevError::MissingPayload
            | MemDevError::MalformedPayload { .. }
            | MemDevError::InvalidLength { .. }
            | MemDevError::SlotOutOfRange { .. }
            | MemDevError::UnknownCommand { .. }
            | MemDevError::InvalidSeek => ErrorKind::InvalidArgument,
            MemDevError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
        }
    }

    /// Positive errno for this error.
    pub fn errno(&self) -> i32 {
        match self.kind() {
            ErrorKind::NoSuchDevice => errno::ENODEV,
            ErrorKind::InvalidState => errno::EFAULT,
            ErrorKind::OutOfRange | ErrorKind::AllocationFailure => errno::ENOMEM,
            ErrorKind::InvalidArgument => errno::EINVAL,
        }
    }

    /// Return code as a file operation reports it (`-errno`).
    pub fn to_return_code(&self) -> i64 {
        -(self.errno() as i64)
    }
}

/// Result type for memory device operations.
pub type MemDevResult<T> = Result<T, MemDevError>;
