//! Outbound commands

use std::fmt;

use super::codec::encode;
use super::codes::{CommandCode, sizes};

/// A command the phone sends to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query status and push the phone's clock to the device.
    StatusQuery { device_id: u8, unix_time: u32 },
    /// Ask for `count` stored samples starting at `start_serial`.
    HistoryRequest { start_serial: u32, count: u16 },
    /// Arm or disarm realtime notifications.
    SetStreaming { enabled: bool },
}

impl Command {
    pub fn code(&self) -> CommandCode {
        match self {
            Command::StatusQuery { .. } => CommandCode::StatusQuery,
            Command::HistoryRequest { .. } => CommandCode::HistoryRequest,
            Command::SetStreaming { .. } => CommandCode::StreamingControl,
        }
    }

    /// Payload bytes, without framing.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Command::StatusQuery { device_id, unix_time } => {
                let mut buf = Vec::with_capacity(sizes::STATUS_QUERY);
                buf.push(device_id);
                buf.extend_from_slice(&unix_time.to_be_bytes());
                buf
            }
            Command::HistoryRequest { start_serial, count } => {
                let mut buf = Vec::with_capacity(sizes::HISTORY_REQUEST);
                buf.extend_from_slice(&start_serial.to_be_bytes());
                buf.extend_from_slice(&count.to_be_bytes());
                buf
            }
            Command::SetStreaming { enabled } => vec![u8::from(enabled)],
        }
    }

    /// Complete frame ready for the transport.
    pub fn to_frame(&self) -> Vec<u8> {
        encode(self.code().as_byte(), &self.payload())
    }

    /// Parse a command payload. Used by device simulators and sniffers.
    pub fn parse(code: CommandCode, payload: &[u8]) -> Option<Self> {
        match code {
            CommandCode::StatusQuery if payload.len() >= sizes::STATUS_QUERY => {
                Some(Command::StatusQuery {
                    device_id: payload[0],
                    unix_time: u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]),
                })
            }
            CommandCode::HistoryRequest if payload.len() >= sizes::HISTORY_REQUEST => {
                Some(Command::HistoryRequest {
                    start_serial: u32::from_be_bytes([
                        payload[0], payload[1], payload[2], payload[3],
                    ]),
                    count: u16::from_be_bytes([payload[4], payload[5]]),
                })
            }
            CommandCode::StreamingControl if !payload.is_empty() => {
                Some(Command::SetStreaming { enabled: payload[0] != 0 })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StatusQuery { unix_time, .. } => write!(f, "status query @{}", unix_time),
            Command::HistoryRequest { start_serial, count } => {
                write!(f, "history request {}+{}", start_serial, count)
            }
            Command::SetStreaming { enabled: true } => f.write_str("enable streaming"),
            Command::SetStreaming { enabled: false } => f.write_str("disable streaming"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::decode;

    #[test]
    fn status_query_wire_format() {
        let cmd = Command::StatusQuery { device_id: 0x01, unix_time: 1_700_000_000 };
        let bytes = cmd.to_frame();
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.frame_type, 0x01);
        assert_eq!(frame.payload, &[0x01, 0x65, 0x53, 0xF1, 0x00]);
    }

    #[test]
    fn history_request_wire_format() {
        let cmd = Command::HistoryRequest { start_serial: 0x0102_0304, count: 20 };
        let bytes = cmd.to_frame();
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.frame_type, 0x02);
        assert_eq!(frame.payload, &[0x01, 0x02, 0x03, 0x04, 0x00, 0x14]);
    }

    #[test]
    fn streaming_wire_format() {
        assert_eq!(Command::SetStreaming { enabled: true }.payload(), vec![1]);
        assert_eq!(Command::SetStreaming { enabled: false }.payload(), vec![0]);
    }

    #[test]
    fn parse_recovers_commands() {
        for cmd in [
            Command::StatusQuery { device_id: 7, unix_time: 42 },
            Command::HistoryRequest { start_serial: 101, count: 5 },
            Command::SetStreaming { enabled: true },
        ] {
            assert_eq!(Command::parse(cmd.code(), &cmd.payload()), Some(cmd));
        }
        assert_eq!(Command::parse(CommandCode::HistoryRequest, &[0, 0, 1]), None);
    }

    #[test]
    fn display_is_readable() {
        let cmd = Command::HistoryRequest { start_serial: 21, count: 20 };
        assert_eq!(cmd.to_string(), "history request 21+20");
    }
}
