//! Buffer invariants
//!
//! Runtime-checkable assertions that must hold for every configured slot:
//!
//! 1. **Tagged**: The size word's top byte is `0x5A`
//! 2. **Length in range**: `0 < length < 0x1000000`
//! 3. **Storage matches**: The data region holds exactly `length` bytes
//!
//! The runtime table walks its slots and feeds each buffer through
//! [`check_buffer`].

use alloc::string::String;
use alloc::vec::Vec;

use crate::buffer::Buffer;
use crate::types::{is_valid_length, BUFFER_TAG};

/// An invariant violation with details
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    /// Name of the violated invariant
    pub invariant: &'static str,
    /// Description of what went wrong
    pub description: String,
}

/// Check every buffer invariant for the buffer in `slot`.
///
/// Returns a list of violations (empty if all invariants hold).
pub fn check_buffer(slot: i64, buffer: &Buffer) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if buffer.tag() != BUFFER_TAG {
        violations.push(InvariantViolation {
            invariant: "buffer_tagged",
            description: alloc::format!(
                "Slot {} carries tag {:#04x}, expected {:#04x}",
                slot,
                buffer.tag(),
                BUFFER_TAG
            ),
        });
    }

    if !is_valid_length(buffer.len() as u64) {
        violations.push(InvariantViolation {
            invariant: "buffer_length_in_range",
            description: alloc::format!("Slot {} has illegal length {}", slot, buffer.len()),
        });
    }

    if buffer.as_slice().len() != buffer.len() as usize {
        violations.push(InvariantViolation {
            invariant: "buffer_storage_matches",
            description: alloc::format!(
                "Slot {} records length {} but holds {} bytes",
                slot,
                buffer.len(),
                buffer.as_slice().len()
            ),
        });
    }

    violations
}
