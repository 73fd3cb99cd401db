//! End-to-end tests through the public API only.
//!
//! A minimal in-test device answers the facade's commands so the full
//! handshake, backfill and streaming sequence runs without a radio.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::broadcast;
use uricsense::protocol::{Command, CommandCode, decode, encode};
use uricsense::{
    DeviceSession, ManualClock, MemoryStore, SampleStore, SessionConfig, SessionEvent,
    SessionPhase, TransportError,
};

const START: u32 = 1_700_000_000;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

#[derive(Clone, Default)]
struct Wire(Arc<Mutex<Vec<Vec<u8>>>>);

impl Wire {
    fn take(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl uricsense::CommandSink for Wire {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.0.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

fn handshake(max_serial: u32, life: u16, start: u32, hydration: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&max_serial.to_be_bytes());
    payload.extend_from_slice(&life.to_be_bytes());
    payload.extend_from_slice(&start.to_be_bytes());
    payload.extend_from_slice(&[0; 12]);
    payload.extend_from_slice(&hydration.to_be_bytes());
    encode(0x81, &payload)
}

/// Device holding serials `1..=max_serial`, each worth `serial + 1000` raw.
fn answer(max_serial: u32, frame: &[u8]) -> Vec<u8> {
    let frame = decode(frame).expect("session writes valid frames");
    let code = CommandCode::from_byte(frame.frame_type).expect("known command");
    match Command::parse(code, frame.payload).expect("well-formed command") {
        Command::StatusQuery { .. } => handshake(max_serial, 500, START, 0),
        Command::HistoryRequest { start_serial, count } => {
            let end = (start_serial + u32::from(count)).min(max_serial + 1);
            let mut payload = vec![(end - start_serial) as u8];
            for serial in start_serial..end {
                payload.extend_from_slice(&serial.to_be_bytes());
                payload.extend_from_slice(&[0, 0]);
                payload.extend_from_slice(&((serial + 1000) as u16).to_be_bytes());
            }
            encode(0x82, &payload)
        }
        Command::SetStreaming { .. } => encode(0x83, &[]),
    }
}

type Session = DeviceSession<Wire, MemoryStore, ManualClock>;

fn session() -> (Session, Wire, MemoryStore, broadcast::Receiver<SessionEvent>) {
    let _ = tracing_subscriber::fmt::try_init();
    let wire = Wire::default();
    let store = MemoryStore::new();
    let clock = ManualClock::new(at(i64::from(START) + 1_000_000));
    let session = DeviceSession::new(wire.clone(), store.clone(), clock, SessionConfig::default())
        .unwrap();
    let events = session.subscribe();
    (session, wire, store, events)
}

/// Let the device answer until the session goes quiet.
fn converse(session: &mut Session, wire: &Wire, max_serial: u32) -> Vec<Command> {
    let mut sent = Vec::new();
    loop {
        let frames = wire.take();
        if frames.is_empty() {
            return sent;
        }
        for frame in frames {
            let parsed = decode(&frame).unwrap();
            let code = CommandCode::from_byte(parsed.frame_type).unwrap();
            sent.push(Command::parse(code, parsed.payload).unwrap());
            session.on_bytes_received(&answer(max_serial, &frame));
        }
    }
}

fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[test]
fn handshake_scenario() {
    let (mut session, wire, _store, mut events) = session();
    session.on_connection_established();
    wire.take();

    session.on_bytes_received(&handshake(100, 500, START, 0x0000));

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::HydrationCountdown { seconds_remaining: 0 }));
    assert!(events.contains(&SessionEvent::HandshakeComplete {
        device_max_serial_number: 100,
        life_minutes_remaining: 500
    }));
    assert_eq!(session.status().hydration_seconds_remaining, 0);
    assert_eq!(session.status().device_start_time, Some(at(i64::from(START))));
}

#[test]
fn full_backfill_of_45_samples() {
    let (mut session, wire, store, mut events) = session();
    session.on_connection_established();
    let sent = converse(&mut session, &wire, 45);

    let pages: Vec<u16> = sent
        .iter()
        .filter_map(|c| match c {
            Command::HistoryRequest { count, .. } => Some(*count),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![20, 20, 5]);
    assert!(matches!(sent.last(), Some(Command::SetStreaming { enabled: true })));
    assert_eq!(session.phase(), SessionPhase::Streaming);

    assert_eq!(store.highest_stored_serial_number().unwrap(), 45);
    let samples = store.samples();
    assert_eq!(samples[9].serial_number, 10);
    assert_eq!(samples[9].value(), 101.0);
    assert_eq!(samples[9].timestamp, at(i64::from(START) + 1200));

    let events = drain(&mut events);
    assert_eq!(events.last(), Some(&SessionEvent::StreamingAcknowledged));
}

#[test]
fn realtime_scenario() {
    let (mut session, wire, store, mut events) = session();
    session.on_connection_established();
    converse(&mut session, &wire, 0);
    drain(&mut events);

    session.on_bytes_received(&encode(0x84, &[0x00, 0x00, 0x00, 0x05, 0x01, 0x2C, 0x0F, 0xA0]));

    let [SessionEvent::Reading(sample)] = &drain(&mut events)[..] else {
        panic!("expected exactly one reading");
    };
    assert_eq!(sample.serial_number, 5);
    assert_eq!(sample.value(), 400.0);
    assert_eq!(sample.life_minutes_remaining, Some(300));
    assert_eq!(sample.timestamp, at(i64::from(START) + 600));
    assert_eq!(store.len(), 1);
}

#[test]
fn malformed_frame_raises_nothing() {
    let (mut session, wire, _store, mut events) = session();
    session.on_connection_established();
    converse(&mut session, &wire, 0);
    drain(&mut events);
    let before = session.status();

    session.on_bytes_received(&[0xD3, 0x96, 0xFF]);

    assert!(drain(&mut events).is_empty());
    assert_eq!(session.status(), before);
    assert!(wire.take().is_empty());
}

#[test]
fn store_already_ahead_skips_backfill() {
    let (mut session, wire, store, _events) = session();
    // another writer imported the history before the connection came up
    let start = at(i64::from(START));
    let now = at(i64::from(START) + 1_000_000);
    for serial in 1..=30 {
        let sample = uricsense::Sample::from_raw(serial, 1, None, start, 120, now);
        store.append(&sample).unwrap();
    }

    session.on_connection_established();
    let sent = converse(&mut session, &wire, 30);
    assert!(sent.iter().all(|c| !matches!(c, Command::HistoryRequest { .. })));
    assert_eq!(session.phase(), SessionPhase::Streaming);
}

#[test]
fn config_and_events_serialize() {
    let config = SessionConfig { page_size: 8, ..SessionConfig::default() };
    let yaml = serde_yaml_ng::to_string(&config).unwrap();
    assert_eq!(SessionConfig::from_yaml_str(&yaml).unwrap(), config);

    let event = SessionEvent::HandshakeComplete {
        device_max_serial_number: 100,
        life_minutes_remaining: 500,
    };
    let yaml = serde_yaml_ng::to_string(&event).unwrap();
    assert!(yaml.contains("device_max_serial_number: 100"));
}
