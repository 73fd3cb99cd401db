//! Session configuration.
//!
//! Defaults match the sensor firmware; a YAML document may override any
//! subset of fields:
//!
//! ```rust
//! use uricsense::SessionConfig;
//!
//! let config = SessionConfig::from_yaml_str("page_size: 10\ndevice_id: 2\n").unwrap();
//! assert_eq!(config.page_size, 10);
//! assert_eq!(config.sample_interval_secs, 120);
//! ```

use serde::{Deserialize, Serialize};

use crate::protocol::codes::DEFAULT_DEVICE_ID;
use crate::protocol::decoder::DEFAULT_SAMPLE_INTERVAL_SECS;
use crate::{Result, SensorError};

/// Samples requested per history page.
pub const DEFAULT_PAGE_SIZE: u16 = 20;

/// Tunables for one device session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Cap on samples per history request
    pub page_size: u16,

    /// Identifier byte carried by every status query
    pub device_id: u8,

    /// Seconds between consecutive serial numbers
    pub sample_interval_secs: u32,

    /// Broadcast buffer for session events; slow subscribers skip ahead
    pub event_capacity: usize,

    /// Queue depth for application control requests
    pub control_capacity: usize,

    /// Consecutive transport read errors tolerated before giving up
    pub max_transport_errors: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            device_id: DEFAULT_DEVICE_ID,
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            event_capacity: 256,
            control_capacity: 16,
            max_transport_errors: 10,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SessionConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SensorError::config("page_size", "must be at least 1"));
        }
        if self.page_size > u16::from(u8::MAX) {
            // history batches carry a one-byte item count
            return Err(SensorError::config("page_size", "must fit the one-byte batch count"));
        }
        if self.sample_interval_secs == 0 {
            return Err(SensorError::config("sample_interval_secs", "must be non-zero"));
        }
        if self.event_capacity == 0 {
            return Err(SensorError::config("event_capacity", "must be non-zero"));
        }
        if self.control_capacity == 0 {
            return Err(SensorError::config("control_capacity", "must be non-zero"));
        }
        Ok(())
    }
}
