//! Device configuration
//!
//! Table capacity, node naming and the configure index policy are fixed when
//! the device is built; nothing here is negotiated at runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zos_memdev_core::DEFAULT_SLOT_COUNT;

/// How configure treats a slot index outside the table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Require `0 <= index < slot_count`; anything else is `InvalidArgument`.
    #[default]
    Checked,
    /// Accept any index. Out-of-table installs land in the stray region and
    /// are reported with a warning. Mirrors the unchecked legacy driver.
    LegacyUnchecked,
}

/// Errors from loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Input was not valid configuration JSON
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A table must hold at least one slot
    #[error("slot_count must be at least 1")]
    NoSlots,
}

/// Memory device configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base name for device nodes (`memdev0`, `memdev1`, ...)
    pub name: String,
    /// Major number; 0 means "assigned by the host" and matches any major
    pub major: u32,
    /// Number of table slots
    pub slot_count: usize,
    /// Out-of-table index handling for configure
    pub index_policy: IndexPolicy,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: String::from("memdev"),
            major: 0,
            slot_count: DEFAULT_SLOT_COUNT,
            index_policy: IndexPolicy::Checked,
        }
    }
}

impl DeviceConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: DeviceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the slot count.
    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    /// Set the index policy.
    pub fn with_index_policy(mut self, policy: IndexPolicy) -> Self {
        self.index_policy = policy;
        self
    }

    /// Set the major number.
    pub fn with_major(mut self, major: u32) -> Self {
        self.major = major;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count == 0 {
            return Err(ConfigError::NoSlots);
        }
        Ok(())
    }

    /// Device node name for a minor number.
    pub fn node_name(&self, minor: u32) -> String {
        format!("{}{}", self.name, minor)
    }

    /// Node names for every slot, in minor order.
    pub fn node_names(&self) -> Vec<String> {
        (0..self.slot_count as u32)
            .map(|minor| self.node_name(minor))
            .collect()
    }
}
