//! Events surfaced to the application

use serde::Serialize;

use crate::protocol::Command;
use crate::types::Sample;

/// Discrete notifications for the application layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    /// A realtime sample was decoded and handed to persistence.
    Reading(Sample),

    /// A history page was handed to persistence.
    HistoryBatchPersisted { count: usize },

    /// Sensor warm-up countdown; zero means ready.
    ///
    /// Raised on every completed handshake, so a warmed-up sensor reports
    /// `0` rather than staying silent.
    HydrationCountdown { seconds_remaining: u16 },

    /// The device answered a status query that started reconciliation.
    HandshakeComplete { device_max_serial_number: u32, life_minutes_remaining: u16 },

    ConnectionStateChanged { connected: bool },

    /// The device confirmed a streaming enable/disable command.
    StreamingAcknowledged,

    /// The transport refused a command. The session does not retry.
    SendFailed {
        #[serde(skip)]
        command: Command,
        reason: String,
    },
}
