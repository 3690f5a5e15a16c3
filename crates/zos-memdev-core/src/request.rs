//! Configure request shapes
//!
//! The configure path accepts either a typed [`ConfigureRequest`] or the raw
//! ioctl payload, laid out like the driver ABI:
//!
//! ```text
//! struct mem_init {
//!     uint32_t idx;   // offset 0
//!     uint32_t len;   // offset 4
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{MemDevError, MemDevResult};
use crate::types::is_valid_length;

/// The only configure command number.
pub const CMD_CONFIGURE: u32 = 0;

/// Size of a `mem_init` payload in bytes.
pub const MEM_INIT_SIZE: usize = 8;

/// Typed configure request.
///
/// `slot_index` is signed so that negative caller input reaches range
/// validation instead of wrapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigureRequest {
    /// Table slot to (re)allocate
    pub slot_index: i64,
    /// Buffer length in bytes
    pub requested_length: u64,
}

impl ConfigureRequest {
    /// Create a request.
    pub fn new(slot_index: i64, requested_length: u64) -> Self {
        Self {
            slot_index,
            requested_length,
        }
    }

    /// Validate the requested length against `(0, 0x1000000)`.
    pub fn checked_length(&self) -> MemDevResult<u32> {
        if !is_valid_length(self.requested_length) {
            return Err(MemDevError::InvalidLength {
                requested: self.requested_length,
            });
        }
        Ok(self.requested_length as u32)
    }
}

/// Raw ioctl payload, field-for-field with the driver's `struct mem_init`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInit {
    /// Slot index
    pub idx: u32,
    /// Buffer length
    pub len: u32,
}

impl MemInit {
    /// Decode a payload.
    ///
    /// A missing payload is the null-argument case; a short one cannot be
    /// copied in. Trailing bytes are ignored.
    pub fn from_bytes(payload: Option<&[u8]>) -> MemDevResult<Self> {
        let bytes = payload.ok_or(MemDevError::MissingPayload)?;
        if bytes.len() < MEM_INIT_SIZE {
            return Err(MemDevError::MalformedPayload { len: bytes.len() });
        }
        let idx = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self { idx, len })
    }

    /// Encode as the 8-byte payload.
    pub fn to_bytes(&self) -> [u8; MEM_INIT_SIZE] {
        let mut out = [0u8; MEM_INIT_SIZE];
        out[..4].copy_from_slice(&self.idx.to_le_bytes());
        out[4..].copy_from_slice(&self.len.to_le_bytes());
        out
    }
}

impl From<MemInit> for ConfigureRequest {
    fn from(raw: MemInit) -> Self {
        Self {
            slot_index: raw.idx as i64,
            requested_length: raw.len as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_init_layout() {
        assert_eq!(core::mem::size_of::<MemInit>(), MEM_INIT_SIZE);
        let raw = MemInit { idx: 2, len: 0x10 };
        assert_eq!(raw.to_bytes(), [2, 0, 0, 0, 0x10, 0, 0, 0]);
    }

    #[test]
    fn test_decode_payload() {
        let bytes = [1, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0x00];
        let raw = MemInit::from_bytes(Some(&bytes)).unwrap();
        assert_eq!(raw, MemInit { idx: 1, len: 0xFF_FFFF });
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let bytes = [0, 0, 0, 0, 4, 0, 0, 0, 0xEE, 0xEE];
        let raw = MemInit::from_bytes(Some(&bytes)).unwrap();
        assert_eq!(raw, MemInit { idx: 0, len: 4 });
    }

    #[test]
    fn test_missing_payload() {
        assert_eq!(MemInit::from_bytes(None), Err(MemDevError::MissingPayload));
    }

    #[test]
    fn test_short_payload() {
        assert_eq!(
            MemInit::from_bytes(Some(&[0, 0, 0])),
            Err(MemDevError::MalformedPayload { len: 3 })
        );
    }

    #[test]
    fn test_large_idx_stays_positive() {
        let req = ConfigureRequest::from(MemInit { idx: u32::MAX, len: 16 });
        assert_eq!(req.slot_index, u32::MAX as i64);
    }

    #[test]
    fn test_checked_length() {
        assert_eq!(ConfigureRequest::new(0, 16).checked_length(), Ok(16));
        assert_eq!(
            ConfigureRequest::new(0, 0).checked_length(),
            Err(MemDevError::InvalidLength { requested: 0 })
        );
        assert_eq!(
            ConfigureRequest::new(0, 0x100_0000).checked_length(),
            Err(MemDevError::InvalidLength {
                requested: 0x100_0000
            })
        );
        assert_eq!(
            ConfigureRequest::new(0, 0xFF_FFFF).checked_length(),
            Ok(0xFF_FFFF)
        );
    }

    #[test]
    fn test_request_json_shape() {
        let req: ConfigureRequest =
            serde_json::from_str(r#"{"slot_index":-1,"requested_length":16}"#).unwrap();
        assert_eq!(req, ConfigureRequest::new(-1, 16));
    }
}
