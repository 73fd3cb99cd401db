//! Handshake, reconciliation, backfill and streaming.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::event::SessionEvent;
use super::state::{BackfillCursor, ReconcileDecision, SessionState, reconcile};
use crate::config::SessionConfig;
use crate::error::ProtocolError;
use crate::protocol::decoder::{
    decode_handshake_response, decode_history_batch, decode_realtime_sample,
};
use crate::protocol::{Command, Frame, ResponseCode};
use crate::store::SampleStore;
use crate::types::{HandshakeInfo, SessionPhase, SessionStatus};
use crate::{Result, SensorError};

/// Something the caller must do after feeding the machine an input.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write this command to the transport.
    Send(Command),
    /// Deliver this event to the application.
    Emit(SessionEvent),
}

/// The session protocol for one device.
///
/// Feed it connection changes and validated frames; it answers with the
/// commands to send and the events to surface. Frames that fail to decode or
/// arrive in the wrong phase return an error and leave the machine untouched.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    config: SessionConfig,
    phase: SessionPhase,
    state: Option<SessionState>,
    cursor: Option<BackfillCursor>,
}

impl SessionMachine {
    pub fn new(config: SessionConfig) -> Self {
        Self { config, phase: SessionPhase::Idle, state: None, cursor: None }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Fields from the latest handshake, if one completed on this connection.
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn cursor(&self) -> Option<&BackfillCursor> {
        self.cursor.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot for publication.
    pub fn status(&self, connected: bool) -> SessionStatus {
        let state = self.state.as_ref();
        SessionStatus {
            connected,
            phase: self.phase,
            device_start_time: state.map(|s| s.device_start_time),
            device_max_serial_number: state.map(|s| s.device_max_serial_number),
            local_max_serial_number: state.and_then(|s| s.local_max_serial_number),
            life_minutes_remaining: state.map(|s| s.life_minutes_remaining),
            hydration_seconds_remaining: state.map_or(0, |s| s.hydration_seconds_remaining),
            backfill_remaining: self.cursor.map(|c| c.remaining_count),
        }
    }

    /// Status query stamped with `now`.
    pub fn status_query(&self, now: DateTime<Utc>) -> Command {
        // the device clock is 32-bit; pre-epoch hosts send zero
        let unix_time = u32::try_from(now.timestamp()).unwrap_or(0);
        Command::StatusQuery { device_id: self.config.device_id, unix_time }
    }

    /// Start (or restart) the handshake.
    ///
    /// Used for a fresh connection and for application-requested refreshes.
    /// Any backfill in flight is abandoned; its progress is already stored.
    pub fn begin_handshake(&mut self, now: DateTime<Utc>) -> Vec<Action> {
        if self.cursor.take().is_some() {
            debug!("Abandoning backfill for a new handshake");
        }
        self.phase = SessionPhase::AwaitingHandshake;
        vec![Action::Send(self.status_query(now))]
    }

    /// Forget everything learned on this connection.
    pub fn reset(&mut self) {
        if self.phase != SessionPhase::Idle {
            debug!("Session reset from {:?}", self.phase);
        }
        self.phase = SessionPhase::Idle;
        self.state = None;
        self.cursor = None;
    }

    /// Route one validated frame to its handler.
    pub fn handle_frame<S: SampleStore + ?Sized>(
        &mut self,
        frame: Frame<'_>,
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        let code = ResponseCode::from_byte(frame.frame_type)
            .ok_or(ProtocolError::UnknownFrameType(frame.frame_type))?;

        match (code, self.phase) {
            (ResponseCode::HandshakeResponse, SessionPhase::AwaitingHandshake) => {
                self.on_handshake(frame.payload, store)
            }
            (ResponseCode::HandshakeResponse, SessionPhase::Streaming) => {
                self.on_resync_response(frame.payload)
            }
            (ResponseCode::HistoryBatch, SessionPhase::Backfilling) => {
                self.on_history_batch(frame.payload, store, now)
            }
            (ResponseCode::RealtimeSample, SessionPhase::Streaming) => {
                self.on_realtime_sample(frame.payload, store, now)
            }
            (ResponseCode::StreamingAck, phase) if phase != SessionPhase::Idle => {
                debug!("Streaming acknowledged");
                Ok(vec![Action::Emit(SessionEvent::StreamingAcknowledged)])
            }
            (_, phase) => Err(ProtocolError::UnexpectedFrameInState {
                frame_type: frame.frame_type,
                phase,
            }
            .into()),
        }
    }

    fn on_handshake<S: SampleStore + ?Sized>(
        &mut self,
        payload: &[u8],
        store: &S,
    ) -> Result<Vec<Action>> {
        let info = decode_handshake_response(payload)?;
        info!(
            "Handshake: device max serial {}, {} min life, started {}",
            info.device_max_serial_number, info.life_minutes_remaining, info.device_start_time
        );

        self.apply_handshake(&info);
        self.phase = SessionPhase::Reconciling;

        let mut actions = vec![
            Action::Emit(SessionEvent::HydrationCountdown {
                seconds_remaining: info.hydration_seconds_remaining(),
            }),
            Action::Emit(SessionEvent::HandshakeComplete {
                device_max_serial_number: info.device_max_serial_number,
                life_minutes_remaining: info.life_minutes_remaining,
            }),
        ];
        actions.push(Action::Send(self.reconcile(store)));
        Ok(actions)
    }

    /// Answer to a resync requested mid-stream: refresh the epoch, stay put.
    fn on_resync_response(&mut self, payload: &[u8]) -> Result<Vec<Action>> {
        let info = decode_handshake_response(payload)?;
        debug!("Clock resync: device start time now {}", info.device_start_time);
        self.apply_handshake(&info);
        Ok(Vec::new())
    }

    fn apply_handshake(&mut self, info: &HandshakeInfo) {
        match &mut self.state {
            Some(state) => state.update(info),
            None => self.state = Some(SessionState::from_handshake(info)),
        }
    }

    /// Compare stored and device maxima and pick the next command.
    fn reconcile<S: SampleStore + ?Sized>(&mut self, store: &S) -> Command {
        let device_max = self.state.as_ref().map_or(0, |s| s.device_max_serial_number);

        let decision = match store.highest_stored_serial_number() {
            Ok(local_max) => {
                self.set_local_max(local_max);
                reconcile(local_max, device_max, self.config.page_size)
            }
            Err(e) => {
                // without a local max the gap is unknown; stream now, a later
                // refresh will backfill
                warn!("Cannot read stored maximum, skipping backfill: {}", e);
                ReconcileDecision::Stream
            }
        };

        match decision {
            ReconcileDecision::Stream => {
                info!("No history gap, enabling streaming");
                self.phase = SessionPhase::Streaming;
            }
            ReconcileDecision::Backfill(cursor) => {
                info!(
                    "Backfilling {} samples from serial {}",
                    cursor.remaining_count, cursor.next_start_serial_number
                );
                self.cursor = Some(cursor);
                self.phase = SessionPhase::Backfilling;
            }
        }
        decision.command()
    }

    fn on_history_batch<S: SampleStore + ?Sized>(
        &mut self,
        payload: &[u8],
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        let (Some(state), Some(cursor)) = (self.state.as_ref(), self.cursor) else {
            return Err(self.unexpected(ResponseCode::HistoryBatch));
        };

        let samples =
            decode_history_batch(payload, &state.timebase(self.config.sample_interval_secs), now)?;
        let device_max = state.device_max_serial_number;

        let mut persisted = 0;
        for sample in &samples {
            match store.append(sample) {
                Ok(_) => persisted += 1,
                Err(e) => warn!("Failed to store history sample {}: {}", sample.serial_number, e),
            }
        }
        debug!("History batch: {} items, {} stored", samples.len(), persisted);

        let mut actions =
            vec![Action::Emit(SessionEvent::HistoryBatchPersisted { count: persisted })];

        let local_max = match store.highest_stored_serial_number() {
            Ok(local_max) => {
                self.set_local_max(local_max);
                Some(local_max)
            }
            Err(e) => {
                warn!("Cannot re-read stored maximum: {}", e);
                None
            }
        };

        let next = match local_max {
            Some(local_max) if !samples.is_empty() && cursor.progressed(local_max) => {
                cursor.advance(local_max, device_max)
            }
            _ => None,
        };

        match next {
            Some(next) => {
                debug!(
                    "Backfill continues at serial {}, {} remaining",
                    next.next_start_serial_number, next.remaining_count
                );
                self.cursor = Some(next);
                actions.push(Action::Send(next.request()));
            }
            None => {
                debug!("Backfill finished, re-verifying device status");
                self.cursor = None;
                self.phase = SessionPhase::AwaitingHandshake;
                actions.push(Action::Send(self.status_query(now)));
            }
        }
        Ok(actions)
    }

    fn on_realtime_sample<S: SampleStore + ?Sized>(
        &mut self,
        payload: &[u8],
        store: &S,
        now: DateTime<Utc>,
    ) -> Result<Vec<Action>> {
        let Some(state) = self.state.as_mut() else {
            return Err(self.unexpected(ResponseCode::RealtimeSample));
        };

        let realtime = decode_realtime_sample(
            payload,
            &state.timebase(self.config.sample_interval_secs),
            now,
        )?;
        let sample = realtime.sample;

        if let Some(life) = sample.life_minutes_remaining {
            state.life_minutes_remaining = life;
        }
        if let Err(e) = store.append(&sample) {
            warn!("Failed to store reading {}: {}", sample.serial_number, e);
        }

        let mut actions = vec![Action::Emit(SessionEvent::Reading(sample))];
        if realtime.needs_resync {
            debug!("Device requested clock resync");
            actions.push(Action::Send(self.status_query(now)));
        }
        Ok(actions)
    }

    fn set_local_max(&mut self, local_max: u32) {
        if let Some(state) = self.state.as_mut() {
            state.local_max_serial_number = Some(local_max);
        }
    }

    fn unexpected(&self, code: ResponseCode) -> SensorError {
        ProtocolError::UnexpectedFrameInState { frame_type: code.as_byte(), phase: self.phase }
            .into()
    }
}
