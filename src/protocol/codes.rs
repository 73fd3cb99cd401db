//! Frame type codes and fixed protocol constants

/// Two-byte magic that opens every frame.
pub const MAGIC: [u8; 2] = [0xD3, 0x96];

/// Byte at realtime payload offset 10 that asks for a clock resync.
pub const RESYNC_FLAG: u8 = 0x01;

/// Offset of the optional resync flag in a realtime payload.
pub const RESYNC_FLAG_OFFSET: usize = 10;

/// Device identifier sent with every status query.
pub const DEFAULT_DEVICE_ID: u8 = 0x01;

/// Payload sizes for each record layout.
pub mod sizes {
    /// Magic + type + checksum, empty payload.
    pub const MIN_FRAME: usize = 4;
    /// Serial (4) + life minutes (2) + raw value (2).
    pub const REALTIME_SAMPLE: usize = 8;
    /// Realtime payload long enough to carry the resync flag.
    pub const REALTIME_SAMPLE_WITH_FLAG: usize = 11;
    /// Max serial (4) + life (2) + start time (4) + reserved (12) + hydration (2).
    pub const HANDSHAKE_RESPONSE: usize = 24;
    /// Serial (4) + reserved (2) + raw value (2).
    pub const HISTORY_ITEM: usize = 8;
    /// Device id (1) + unix time (4).
    pub const STATUS_QUERY: usize = 5;
    /// Start serial (4) + count (2).
    pub const HISTORY_REQUEST: usize = 6;
}

/// Commands the phone sends to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Query status and sync the device clock.
    StatusQuery = 0x01,
    /// Ask for a page of stored samples.
    HistoryRequest = 0x02,
    /// Enable or disable realtime notifications.
    StreamingControl = 0x03,
}

impl CommandCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::StatusQuery),
            0x02 => Some(Self::HistoryRequest),
            0x03 => Some(Self::StreamingControl),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Frames the device sends to the phone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    HandshakeResponse = 0x81,
    HistoryBatch = 0x82,
    StreamingAck = 0x83,
    RealtimeSample = 0x84,
}

impl ResponseCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x81 => Some(Self::HandshakeResponse),
            0x82 => Some(Self::HistoryBatch),
            0x83 => Some(Self::StreamingAck),
            0x84 => Some(Self::RealtimeSample),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}
