//! Per-connection session fields and the backfill cursor

use chrono::{DateTime, Utc};

use crate::protocol::Command;
use crate::protocol::decoder::Timebase;
use crate::types::HandshakeInfo;

/// Fields learned from the device during one connection.
///
/// Created by the first handshake response and dropped on disconnect.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub device_start_time: DateTime<Utc>,
    pub device_max_serial_number: u32,
    /// Last value read from the store; never advanced in memory
    pub local_max_serial_number: Option<u32>,
    pub life_minutes_remaining: u16,
    pub hydration_seconds_remaining: u16,
}

impl SessionState {
    pub fn from_handshake(info: &HandshakeInfo) -> Self {
        Self {
            device_start_time: info.device_start_time,
            device_max_serial_number: info.device_max_serial_number,
            local_max_serial_number: None,
            life_minutes_remaining: info.life_minutes_remaining,
            hydration_seconds_remaining: info.hydration_seconds_remaining(),
        }
    }

    /// Refresh device-reported fields from a later handshake.
    pub fn update(&mut self, info: &HandshakeInfo) {
        self.device_start_time = info.device_start_time;
        self.device_max_serial_number = info.device_max_serial_number;
        self.life_minutes_remaining = info.life_minutes_remaining;
        self.hydration_seconds_remaining = info.hydration_seconds_remaining();
    }

    pub fn timebase(&self, interval_secs: u32) -> Timebase {
        Timebase::new(self.device_start_time).with_interval(interval_secs)
    }
}

/// Progress through a paginated history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillCursor {
    pub next_start_serial_number: u32,
    pub remaining_count: u32,
    pub page_size: u16,
}

impl BackfillCursor {
    /// Cursor covering `local + 1 ..= device`, or `None` when there is no gap.
    pub fn new(local_max: u32, device_max: u32, page_size: u16) -> Option<Self> {
        (local_max < device_max).then(|| Self {
            next_start_serial_number: local_max + 1,
            remaining_count: device_max - local_max,
            page_size: page_size.max(1),
        })
    }

    /// Items requested by the next page: `min(page_size, remaining)`.
    pub fn page_count(&self) -> u16 {
        u16::try_from(self.remaining_count).map_or(self.page_size, |r| r.min(self.page_size))
    }

    pub fn request(&self) -> Command {
        Command::HistoryRequest {
            start_serial: self.next_start_serial_number,
            count: self.page_count(),
        }
    }

    /// Move past everything the store now holds.
    pub fn advance(&self, local_max: u32, device_max: u32) -> Option<Self> {
        Self::new(local_max, device_max, self.page_size)
    }

    /// Whether the store moved into the range this cursor was fetching.
    pub fn progressed(&self, local_max: u32) -> bool {
        local_max >= self.next_start_serial_number
    }
}

/// Next step after comparing the stored maximum with the device's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDecision {
    /// Nothing missing; arm realtime notifications.
    Stream,
    /// Fetch the gap page by page.
    Backfill(BackfillCursor),
}

impl ReconcileDecision {
    /// The command this decision sends first.
    pub fn command(&self) -> Command {
        match self {
            ReconcileDecision::Stream => Command::SetStreaming { enabled: true },
            ReconcileDecision::Backfill(cursor) => cursor.request(),
        }
    }
}

/// Compare the two maxima. Pure, so repeated calls agree.
pub fn reconcile(local_max: u32, device_max: u32, page_size: u16) -> ReconcileDecision {
    BackfillCursor::new(local_max, device_max, page_size)
        .map_or(ReconcileDecision::Stream, ReconcileDecision::Backfill)
}
