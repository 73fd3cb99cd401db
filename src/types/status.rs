//! Session phase and published status snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the session protocol currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No handshake yet (also the state after any disconnect)
    #[default]
    Idle,
    /// Status query sent, response pending
    AwaitingHandshake,
    /// Comparing local and device maxima
    Reconciling,
    /// History pages in flight
    Backfilling,
    /// Realtime notifications armed
    Streaming,
}

/// Read-only view of a session, published after every input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub connected: bool,
    pub phase: SessionPhase,
    pub device_start_time: Option<DateTime<Utc>>,
    pub device_max_serial_number: Option<u32>,
    /// Last value read from the persistence collaborator
    pub local_max_serial_number: Option<u32>,
    pub life_minutes_remaining: Option<u16>,
    pub hydration_seconds_remaining: u16,
    /// Samples still to fetch while backfilling
    pub backfill_remaining: Option<u32>,
}
