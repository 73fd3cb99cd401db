//! Sensor connection backed by the session driver task

use std::sync::{Mutex, PoisonError};

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::device::DeviceSession;
use crate::driver::{Control, Driver};
use crate::error::TransportError;
use crate::session::SessionEvent;
use crate::store::SampleStore;
use crate::transport::{Outbox, Transport};
use crate::types::SessionStatus;

/// Live session with one sensor.
///
/// Owns the background task that reads the transport. Dropping the
/// connection stops the task.
pub struct SensorConnection {
    /// Event broadcast, for late subscribers
    events: broadcast::Sender<SessionEvent>,

    /// Receiver created before the task started; handed to the first caller
    first_events: Mutex<Option<broadcast::Receiver<SessionEvent>>>,

    /// Status watch receiver
    status: watch::Receiver<SessionStatus>,

    /// Control requests into the task
    control: mpsc::Sender<Control>,

    /// Cancellation token for stopping the task
    cancel: CancellationToken,
}

impl SensorConnection {
    /// Validate `config` and start a session over `transport`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn<T, S, C>(transport: T, store: S, clock: C, config: SessionConfig) -> Result<Self>
    where
        T: Transport,
        S: SampleStore,
        C: Clock,
    {
        info!("Starting sensor session (page size {})", config.page_size);

        let session = DeviceSession::new(Outbox::new(), store, clock, config)?;
        let channels = Driver::spawn(transport, session);

        Ok(Self {
            events: channels.events,
            first_events: Mutex::new(Some(channels.first_events)),
            status: channels.status,
            control: channels.control,
            cancel: channels.cancel,
        })
    }

    /// Stream of session events.
    ///
    /// The first call sees every event since the connection was spawned;
    /// later calls start from now. A subscriber that falls behind skips the
    /// events it missed.
    pub fn events(&self) -> impl Stream<Item = SessionEvent> + 'static {
        let receiver = self
            .first_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.events.subscribe());

        BroadcastStream::new(receiver).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                    None
                }
            }
        })
    }

    /// Raw broadcast receiver starting from now.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Stream of status snapshots, starting with the current one.
    pub fn status_updates(&self) -> impl Stream<Item = SessionStatus> + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Wait until the published status satisfies `predicate`.
    pub async fn wait_for_status<F>(&self, predicate: F) -> Result<SessionStatus>
    where
        F: FnMut(&SessionStatus) -> bool,
    {
        let mut status = self.status.clone();
        let matched = status.wait_for(predicate).await.map_err(|_| TransportError::Closed)?;
        Ok(matched.clone())
    }

    /// Ask the device for a fresh handshake.
    pub async fn request_status_refresh(&self) -> Result<()> {
        self.send_control(Control::RefreshStatus).await
    }

    /// Enable or disable realtime notifications.
    pub async fn set_streaming(&self, enabled: bool) -> Result<()> {
        self.send_control(Control::SetStreaming(enabled)).await
    }

    /// Whether the session task is still running.
    pub fn is_running(&self) -> bool {
        !self.control.is_closed()
    }

    /// Stop the session task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn send_control(&self, request: Control) -> Result<()> {
        self.control.send(request).await.map_err(|_| TransportError::Closed)?;
        Ok(())
    }
}

impl Drop for SensorConnection {
    fn drop(&mut self) {
        debug!("Dropping sensor connection");
        self.cancel.cancel();
    }
}
