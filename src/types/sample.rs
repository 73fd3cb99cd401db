//! Sample types shared by the realtime and history decoders

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One physical reading from the sensor.
///
/// The serial number is both the sample's identity and its time offset from
/// the device start time. Timestamps are never later than the wall clock at
/// decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Device-assigned monotonic index
    pub serial_number: u32,

    /// Fixed-point reading, one decimal place (physical value = raw / 10)
    pub raw_value: u16,

    /// Sensor life budget at capture time. History records do not carry it.
    pub life_minutes_remaining: Option<u16>,

    /// Capture time, clamped to "not after now"
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// Build a sample from raw device fields.
    pub fn from_raw(
        serial_number: u32,
        raw_value: u16,
        life_minutes_remaining: Option<u16>,
        device_start_time: DateTime<Utc>,
        interval_secs: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let timestamp = sample_timestamp(device_start_time, serial_number, interval_secs, now);
        Self { serial_number, raw_value, life_minutes_remaining, timestamp }
    }

    /// Physical value in device units.
    pub fn value(&self) -> f64 {
        f64::from(self.raw_value) / 10.0
    }
}

/// Realtime sample plus the device's clock resync request.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSample {
    pub sample: Sample,
    pub needs_resync: bool,
}

/// `device_start_time + serial * interval`, clamped to `now`.
///
/// Device clocks free-run and drift ahead of the phone, so the derived time is
/// never trusted beyond the wall clock. Arithmetic overflow also clamps.
pub(crate) fn sample_timestamp(
    device_start_time: DateTime<Utc>,
    serial_number: u32,
    interval_secs: u32,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    i64::from(serial_number)
        .checked_mul(i64::from(interval_secs))
        .and_then(TimeDelta::try_seconds)
        .and_then(|offset| device_start_time.checked_add_signed(offset))
        .map_or(now, |derived| derived.min(now))
}
