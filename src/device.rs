//! Device session facade.
//!
//! [`DeviceSession`] is the boundary the transport and the application call
//! into. It validates deliveries, drives the [`SessionMachine`], writes the
//! resulting commands through a [`CommandSink`] and fans events out to
//! subscribers. All inputs are processed one at a time through `&mut self`.

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

use crate::Result;
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{ProtocolError, TransportError};
use crate::protocol::codec::{coalesced_frame_len, decode};
use crate::protocol::{Command, CommandCode, Hex};
use crate::session::{Action, SessionEvent, SessionMachine};
use crate::store::SampleStore;
use crate::transport::CommandSink;
use crate::types::{SessionPhase, SessionStatus};

/// One device connection's protocol session.
///
/// ```rust
/// use uricsense::{DeviceSession, MemoryStore, SessionConfig, SystemClock};
/// use uricsense::protocol::decode;
///
/// let mut written = Vec::new();
/// let sink = |bytes: &[u8]| -> Result<(), uricsense::TransportError> {
///     written.push(bytes.to_vec());
///     Ok(())
/// };
/// let config = SessionConfig::default();
/// let mut session = DeviceSession::new(sink, MemoryStore::new(), SystemClock, config)?;
/// let mut events = session.subscribe();
///
/// session.on_connection_established();
/// drop(session);
///
/// assert_eq!(decode(&written[0]).unwrap().frame_type, 0x01);
/// assert!(events.try_recv().is_ok());
/// # Ok::<(), uricsense::SensorError>(())
/// ```
pub struct DeviceSession<T, S, C> {
    machine: SessionMachine,
    sink: T,
    store: S,
    clock: C,
    connected: bool,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl<T, S, C> DeviceSession<T, S, C>
where
    T: CommandSink,
    S: SampleStore,
    C: Clock,
{
    /// Build an idle session.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`](crate::SensorError::Config) if `config`
    /// fails validation.
    pub fn new(sink: T, store: S, clock: C, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (status, _) = watch::channel(SessionStatus::default());
        Ok(Self {
            machine: SessionMachine::new(config),
            sink,
            store,
            clock,
            connected: false,
            events,
            status,
        })
    }

    /// The link came up: start the handshake.
    pub fn on_connection_established(&mut self) {
        if self.connected {
            debug!("Connection re-established, restarting session");
            self.machine.reset();
        } else {
            info!("Device connected");
            self.connected = true;
            self.emit(SessionEvent::ConnectionStateChanged { connected: true });
        }
        let actions = self.machine.begin_handshake(self.clock.now());
        self.perform(actions);
        self.publish();
    }

    /// The link dropped: discard all session state.
    pub fn on_connection_lost(&mut self) {
        self.machine.reset();
        if self.connected {
            info!("Device disconnected");
            self.connected = false;
            self.emit(SessionEvent::ConnectionStateChanged { connected: false });
        }
        self.publish();
    }

    /// Handle one transport delivery.
    ///
    /// Malformed or out-of-phase frames are logged and dropped; they never
    /// change the session.
    pub fn on_bytes_received(&mut self, bytes: &[u8]) {
        trace!("<- {}", Hex(bytes));

        if !self.connected {
            debug!("Dropping {} bytes received while disconnected", bytes.len());
            return;
        }

        if let Some(first_frame_len) = coalesced_frame_len(bytes) {
            let err = ProtocolError::CoalescedFrames { len: bytes.len(), first_frame_len };
            warn!("Dropping delivery: {} [{}]", err, Hex(bytes));
            return;
        }

        let frame = match decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping malformed frame: {} [{}]", e, Hex(bytes));
                return;
            }
        };

        match self.machine.handle_frame(frame, &self.store, self.clock.now()) {
            Ok(actions) => self.perform(actions),
            Err(e) => warn!("Dropping frame {:#04x}: {}", frame.frame_type, e),
        }
        self.publish();
    }

    /// Re-run the handshake from any phase.
    pub fn request_status_refresh(&mut self) {
        let now = self.clock.now();
        if !self.connected {
            self.refuse(self.machine.status_query(now));
            return;
        }
        info!("Status refresh requested");
        let actions = self.machine.begin_handshake(now);
        self.perform(actions);
        self.publish();
    }

    /// Enable or disable realtime notifications on the device.
    ///
    /// Does not move the session; the device answers with a streaming
    /// acknowledgement.
    pub fn set_streaming(&mut self, enabled: bool) {
        let command = Command::SetStreaming { enabled };
        if !self.connected {
            self.refuse(command);
            return;
        }
        self.perform(vec![Action::Send(command)]);
    }

    /// Report that an asynchronous write of `bytes` failed after the sink
    /// accepted it.
    pub fn report_send_failure(&mut self, bytes: &[u8], error: &TransportError) {
        let command = decode(bytes).ok().and_then(|frame| {
            CommandCode::from_byte(frame.frame_type)
                .and_then(|code| Command::parse(code, frame.payload))
        });
        match command {
            Some(command) => {
                warn!("Failed to send {}: {}", command, error);
                self.emit(SessionEvent::SendFailed { command, reason: error.to_string() });
            }
            None => warn!("Failed to send [{}]: {}", Hex(bytes), error),
        }
    }

    /// New receiver for session events.
    ///
    /// Receivers that fall more than the configured capacity behind skip
    /// ahead and see a lag error.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver that sees every published status.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> &SessionConfig {
        self.machine.config()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink_mut(&mut self) -> &mut T {
        &mut self.sink
    }

    fn perform(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(command) => self.send(command),
                Action::Emit(event) => self.emit(event),
            }
        }
    }

    fn send(&mut self, command: Command) {
        let bytes = command.to_frame();
        debug!("-> {} [{}]", command, Hex(&bytes));
        if let Err(e) = self.sink.write_bytes(&bytes) {
            warn!("Failed to send {}: {}", command, e);
            self.emit(SessionEvent::SendFailed { command, reason: e.to_string() });
        }
    }

    fn refuse(&mut self, command: Command) {
        warn!("Cannot send {} while disconnected", command);
        self.emit(SessionEvent::SendFailed {
            command,
            reason: TransportError::NotConnected.to_string(),
        });
    }

    fn emit(&self, event: SessionEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.status.send_replace(self.machine.status(self.connected));
    }
}
