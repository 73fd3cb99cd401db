//! Typed decoding of inbound payloads.
//!
//! All layouts are big-endian. Decoders only read the payload; framing has
//! already been validated by [`decode`](super::codec::decode).

use chrono::{DateTime, Utc};

use super::codes::{RESYNC_FLAG, RESYNC_FLAG_OFFSET, sizes};
use crate::error::DecodeError;
use crate::types::{HandshakeInfo, Hydration, RealtimeSample, Sample};

/// Seconds between consecutive serial numbers.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u32 = 120;

/// Epoch and spacing used to turn serial numbers into timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    pub device_start_time: DateTime<Utc>,
    pub interval_secs: u32,
}

impl Timebase {
    pub fn new(device_start_time: DateTime<Utc>) -> Self {
        Self { device_start_time, interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS }
    }

    pub fn with_interval(mut self, interval_secs: u32) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    fn sample(
        &self,
        serial: u32,
        raw_value: u16,
        life: Option<u16>,
        now: DateTime<Utc>,
    ) -> Sample {
        Sample::from_raw(serial, raw_value, life, self.device_start_time, self.interval_secs, now)
    }
}

fn require(record: &'static str, payload: &[u8], expected: usize) -> Result<(), DecodeError> {
    if payload.len() < expected {
        return Err(DecodeError::PayloadTooShort { record, expected, actual: payload.len() });
    }
    Ok(())
}

fn be_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

fn be_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Decode a realtime notification.
///
/// Layout: serial (0..4), life minutes (4..6), raw value (6..8). A payload of
/// 11 bytes or more also carries the resync flag at offset 10.
pub fn decode_realtime_sample(
    payload: &[u8],
    timebase: &Timebase,
    now: DateTime<Utc>,
) -> Result<RealtimeSample, DecodeError> {
    require("realtime sample", payload, sizes::REALTIME_SAMPLE)?;

    let serial = be_u32(payload, 0);
    let life = be_u16(payload, 4);
    let raw_value = be_u16(payload, 6);
    let needs_resync = payload.len() >= sizes::REALTIME_SAMPLE_WITH_FLAG
        && payload[RESYNC_FLAG_OFFSET] == RESYNC_FLAG;

    Ok(RealtimeSample { sample: timebase.sample(serial, raw_value, Some(life), now), needs_resync })
}

/// Decode the status response.
///
/// Layout: max serial (0..4), life minutes (4..6), start time as Unix seconds
/// (6..10), 12 reserved bytes, hydration seconds (22..24).
pub fn decode_handshake_response(payload: &[u8]) -> Result<HandshakeInfo, DecodeError> {
    require("handshake response", payload, sizes::HANDSHAKE_RESPONSE)?;

    let start_secs = be_u32(payload, 6);
    let device_start_time =
        DateTime::<Utc>::from_timestamp(i64::from(start_secs), 0).unwrap_or_default();

    Ok(HandshakeInfo {
        device_max_serial_number: be_u32(payload, 0),
        life_minutes_remaining: be_u16(payload, 4),
        device_start_time,
        hydration: Hydration::from_raw(be_u16(payload, 22)),
    })
}

/// Decode a history page, preserving the device's item order.
///
/// Byte 0 is the item count; each 8-byte item is serial (0..4), two reserved
/// bytes, raw value (6..8). History items carry no life minutes.
pub fn decode_history_batch(
    payload: &[u8],
    timebase: &Timebase,
    now: DateTime<Utc>,
) -> Result<Vec<Sample>, DecodeError> {
    require("history batch", payload, 1)?;

    let count = usize::from(payload[0]);
    require("history batch", payload, 1 + count * sizes::HISTORY_ITEM)?;

    Ok(payload[1..]
        .chunks_exact(sizes::HISTORY_ITEM)
        .take(count)
        .map(|item| timebase.sample(be_u32(item, 0), be_u16(item, 6), None, now))
        .collect())
}
