//! Decoded handshake (status) response

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw hydration field value meaning "hydration not yet started".
pub const HYDRATION_NOT_STARTED: u16 = 0xFFFF;

/// Sensor warm-up state reported in the handshake response.
///
/// The wire carries two sentinels besides a real countdown. Both mean "ready,
/// no countdown" to consumers; the distinction is kept here but collapsed by
/// [`Hydration::seconds_remaining`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hydration {
    /// Wire value `0`
    Complete,
    /// Wire value `0xFFFF`
    NotStarted,
    /// Seconds until readings become valid
    Remaining(u16),
}

impl Hydration {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Hydration::Complete,
            HYDRATION_NOT_STARTED => Hydration::NotStarted,
            secs => Hydration::Remaining(secs),
        }
    }

    /// Countdown with both sentinels collapsed to zero.
    pub fn seconds_remaining(self) -> u16 {
        match self {
            Hydration::Remaining(secs) => secs,
            Hydration::Complete | Hydration::NotStarted => 0,
        }
    }

    pub fn is_hydrating(self) -> bool {
        self.seconds_remaining() > 0
    }
}

/// Session anchor fields from the device's status response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakeInfo {
    /// Highest sample serial number the device can serve
    pub device_max_serial_number: u32,

    /// Remaining sensor lifetime in minutes
    pub life_minutes_remaining: u16,

    /// Epoch for all serial-number-relative timestamps
    pub device_start_time: DateTime<Utc>,

    pub hydration: Hydration,
}

impl HandshakeInfo {
    pub fn hydration_seconds_remaining(&self) -> u16 {
        self.hydration.seconds_remaining()
    }
}
