//! Test utilities: payload builders, a simulated sensor and scripted transports
//!
//! These helpers are shared by unit tests, connection tests and benchmarks so
//! that every layer talks to the same fake device.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::protocol::codes::RESYNC_FLAG;
use crate::protocol::{Command, CommandCode, ResponseCode, decode, encode};
use crate::transport::{Transport, TransportEvent};

/// Unix seconds to a UTC timestamp.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("timestamp in range")
}

/// Handshake response payload with zeroed reserved bytes.
pub fn handshake_payload(
    max_serial: u32,
    life_minutes: u16,
    start_secs: u32,
    hydration: u16,
) -> Vec<u8> {
    let mut payload = Vec::with_capacity(24);
    payload.extend_from_slice(&max_serial.to_be_bytes());
    payload.extend_from_slice(&life_minutes.to_be_bytes());
    payload.extend_from_slice(&start_secs.to_be_bytes());
    payload.extend_from_slice(&[0; 12]);
    payload.extend_from_slice(&hydration.to_be_bytes());
    payload
}

/// One 8-byte history item.
pub fn history_item(serial: u32, raw_value: u16) -> [u8; 8] {
    let [s0, s1, s2, s3] = serial.to_be_bytes();
    let [v0, v1] = raw_value.to_be_bytes();
    [s0, s1, s2, s3, 0, 0, v0, v1]
}

/// History batch payload from `(serial, raw value)` pairs.
pub fn history_batch_payload(items: &[(u32, u16)]) -> Vec<u8> {
    let count = u8::try_from(items.len()).expect("batch fits a one-byte count");
    let mut payload = vec![count];
    for &(serial, raw) in items {
        payload.extend(history_item(serial, raw));
    }
    payload
}

/// Deterministic reading for a serial number, so tests can check values.
pub fn raw_value_for(serial: u32) -> u16 {
    3000 + (serial % 1000) as u16
}

/// What a device holding samples `1..=device_max` answers to a history request.
pub fn serve_history(start_serial: u32, count: u16, device_max: u32) -> Vec<u8> {
    let end = start_serial.saturating_add(u32::from(count)).min(device_max.saturating_add(1));
    let items: Vec<(u32, u16)> = (start_serial..end).map(|s| (s, raw_value_for(s))).collect();
    history_batch_payload(&items)
}

/// Realtime payload; `resync` appends the 11-byte tail carrying the flag.
pub fn realtime_payload(serial: u32, life_minutes: u16, raw_value: u16, resync: bool) -> Vec<u8> {
    let mut payload = Vec::with_capacity(11);
    payload.extend_from_slice(&serial.to_be_bytes());
    payload.extend_from_slice(&life_minutes.to_be_bytes());
    payload.extend_from_slice(&raw_value.to_be_bytes());
    if resync {
        payload.extend_from_slice(&[0, 0, RESYNC_FLAG]);
    }
    payload
}

/// A sensor that answers commands the way the firmware does.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    pub max_serial: u32,
    pub life_minutes: u16,
    pub start_secs: u32,
    pub hydration: u16,
    pub streaming: bool,
    /// Every command received, in order
    pub received: Vec<Command>,
}

impl SimulatedDevice {
    pub fn new(max_serial: u32, start_secs: u32) -> Self {
        Self {
            max_serial,
            life_minutes: 14_400,
            start_secs,
            hydration: 0,
            streaming: false,
            received: Vec::new(),
        }
    }

    /// Answer one command frame. Unparseable frames get no answer.
    pub fn respond(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        let frame = decode(frame).ok()?;
        let command = Command::parse(CommandCode::from_byte(frame.frame_type)?, frame.payload)?;
        self.received.push(command);

        let response = match command {
            Command::StatusQuery { .. } => {
                let payload = handshake_payload(
                    self.max_serial,
                    self.life_minutes,
                    self.start_secs,
                    self.hydration,
                );
                encode(ResponseCode::HandshakeResponse.as_byte(), &payload)
            }
            Command::HistoryRequest { start_serial, count } => encode(
                ResponseCode::HistoryBatch.as_byte(),
                &serve_history(start_serial, count, self.max_serial),
            ),
            Command::SetStreaming { enabled } => {
                self.streaming = enabled;
                encode(ResponseCode::StreamingAck.as_byte(), &[])
            }
        };
        Some(response)
    }

    /// Take the next reading and return its realtime frame.
    pub fn next_reading(&mut self, resync: bool) -> Vec<u8> {
        self.max_serial += 1;
        self.life_minutes = self.life_minutes.saturating_sub(2);
        let serial = self.max_serial;
        encode(
            ResponseCode::RealtimeSample.as_byte(),
            &realtime_payload(serial, self.life_minutes, raw_value_for(serial), resync),
        )
    }

    pub fn history_requests(&self) -> Vec<(u32, u16)> {
        self.received
            .iter()
            .filter_map(|c| match *c {
                Command::HistoryRequest { start_serial, count } => Some((start_serial, count)),
                _ => None,
            })
            .collect()
    }
}

/// Transport driven from a [`TransportHandle`].
pub struct ScriptedTransport {
    events: mpsc::UnboundedReceiver<Result<TransportEvent, TransportError>>,
    writes: mpsc::UnboundedSender<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
}

/// Test side of a [`ScriptedTransport`].
pub struct TransportHandle {
    events: mpsc::UnboundedSender<Result<TransportEvent, TransportError>>,
    writes: mpsc::UnboundedReceiver<Vec<u8>>,
    fail_writes: Arc<AtomicBool>,
}

pub fn scripted_transport() -> (ScriptedTransport, TransportHandle) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (write_tx, write_rx) = mpsc::unbounded_channel();
    let fail_writes = Arc::new(AtomicBool::new(false));
    (
        ScriptedTransport { events: event_rx, writes: write_tx, fail_writes: fail_writes.clone() },
        TransportHandle { events: event_tx, writes: write_rx, fail_writes },
    )
}

impl TransportHandle {
    pub fn connect(&self) {
        let _ = self.events.send(Ok(TransportEvent::Connected));
    }

    pub fn disconnect(&self) {
        let _ = self.events.send(Ok(TransportEvent::Disconnected));
    }

    pub fn deliver(&self, bytes: Vec<u8>) {
        let _ = self.events.send(Ok(TransportEvent::Data(bytes)));
    }

    pub fn fail_read(&self, reason: &str) {
        let _ = self.events.send(Err(TransportError::ReadFailed { reason: reason.to_string() }));
    }

    /// Whether the session side has dropped its transport.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Next frame the session wrote, waiting up to a second.
    pub async fn next_write(&mut self) -> Option<Vec<u8>> {
        tokio::time::timeout(std::time::Duration::from_secs(1), self.writes.recv()).await.ok()?
    }

    /// Next written frame parsed back into a command.
    pub async fn next_command(&mut self) -> Option<Command> {
        let bytes = self.next_write().await?;
        let frame = decode(&bytes).ok()?;
        Command::parse(CommandCode::from_byte(frame.frame_type)?, frame.payload)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn next_event(&mut self) -> Result<Option<TransportEvent>, TransportError> {
        self.events.recv().await.transpose()
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::WriteFailed { reason: "scripted failure".to_string() });
        }
        self.writes.send(bytes.to_vec()).map_err(|_| TransportError::Closed)
    }
}

/// Transport wired straight to a [`SimulatedDevice`].
///
/// Starts connected; every write is answered on the next read. Extra events
/// (realtime frames, disconnects) can be injected through the returned sender.
pub struct LoopbackTransport {
    device: Arc<Mutex<SimulatedDevice>>,
    pending: VecDeque<TransportEvent>,
    injected: mpsc::UnboundedReceiver<TransportEvent>,
}

impl LoopbackTransport {
    pub fn new(
        device: SimulatedDevice,
    ) -> (Self, Arc<Mutex<SimulatedDevice>>, mpsc::UnboundedSender<TransportEvent>) {
        let device = Arc::new(Mutex::new(device));
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let transport = Self {
            device: device.clone(),
            pending: VecDeque::from([TransportEvent::Connected]),
            injected: inject_rx,
        };
        (transport, device, inject_tx)
    }
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    async fn next_event(&mut self) -> Result<Option<TransportEvent>, TransportError> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        Ok(self.injected.recv().await)
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let response = self.device.lock().unwrap_or_else(PoisonError::into_inner).respond(bytes);
        if let Some(response) = response {
            self.pending.push_back(TransportEvent::Data(response));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_history_stops_at_device_max() {
        let payload = serve_history(41, 20, 45);
        assert_eq!(payload[0], 5);
        assert_eq!(payload.len(), 1 + 5 * 8);
        assert_eq!(&payload[1..9], &history_item(41, raw_value_for(41)));

        assert_eq!(serve_history(46, 20, 45), vec![0]);
    }

    #[test]
    fn device_answers_each_command() {
        let mut device = SimulatedDevice::new(3, 1_700_000_000);

        let query = Command::StatusQuery { device_id: 1, unix_time: 0 }.to_frame();
        let answer = device.respond(&query).unwrap();
        assert_eq!(decode(&answer).unwrap().frame_type, 0x81);

        let request = Command::HistoryRequest { start_serial: 1, count: 20 }.to_frame();
        let answer = device.respond(&request).unwrap();
        assert_eq!(decode(&answer).unwrap().payload[0], 3);

        let enable = Command::SetStreaming { enabled: true }.to_frame();
        assert_eq!(decode(&device.respond(&enable).unwrap()).unwrap().frame_type, 0x83);
        assert!(device.streaming);

        assert_eq!(device.history_requests(), vec![(1, 20)]);
        assert!(device.respond(&[0xD3, 0x96]).is_none());
    }

    #[test]
    fn readings_advance_the_device() {
        let mut device = SimulatedDevice::new(10, 0);
        let frame = device.next_reading(true);
        let payload = decode(&frame).unwrap().payload;
        assert_eq!(device.max_serial, 11);
        assert_eq!(&payload[..4], &11u32.to_be_bytes());
        assert_eq!(payload.len(), 11);
    }
}
