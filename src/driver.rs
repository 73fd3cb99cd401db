//! Driver spawns and manages the session task

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::clock::Clock;
use crate::device::DeviceSession;
use crate::session::SessionEvent;
use crate::store::SampleStore;
use crate::transport::{Outbox, Transport, TransportEvent};
use crate::types::SessionStatus;

/// Application requests forwarded to the session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Re-run the handshake.
    RefreshStatus,
    /// Enable or disable realtime notifications.
    SetStreaming(bool),
}

/// Result of spawning the session task
pub struct DriverChannels {
    /// Sender side of the event broadcast, for new subscriptions
    pub events: broadcast::Sender<SessionEvent>,
    /// Receiver subscribed before the task started, so no event is missed
    pub first_events: broadcast::Receiver<SessionEvent>,
    /// Status published after every input
    pub status: watch::Receiver<SessionStatus>,
    /// Control requests into the task
    pub control: mpsc::Sender<Control>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Driver spawns and manages the session task
///
/// The task owns the transport and the session, so every delivery, connection
/// change and control request is handled one at a time in arrival order.
pub struct Driver;

impl Driver {
    /// Spawn the session task for the given transport.
    pub fn spawn<T, S, C>(transport: T, session: DeviceSession<Outbox, S, C>) -> DriverChannels
    where
        T: Transport,
        S: SampleStore,
        C: Clock,
    {
        let (control_tx, control_rx) = mpsc::channel(session.config().control_capacity.max(1));
        let events = session.event_sender();
        let first_events = session.subscribe();
        let status = session.watch_status();

        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            Self::session_task(transport, session, control_rx, cancel_task).await;
        });

        DriverChannels { events, first_events, status, control: control_tx, cancel }
    }

    async fn session_task<T, S, C>(
        mut transport: T,
        mut session: DeviceSession<Outbox, S, C>,
        mut control: mpsc::Receiver<Control>,
        cancel: CancellationToken,
    ) where
        T: Transport,
        S: SampleStore,
        C: Clock,
    {
        info!("Session task started");
        let max_errors = session.config().max_transport_errors.max(1);
        let mut delivery_count = 0u64;
        let mut error_count = 0u32;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Session task cancelled");
                    break;
                }
                Some(request) = control.recv() => {
                    debug!("Control request: {:?}", request);
                    match request {
                        Control::RefreshStatus => session.request_status_refresh(),
                        Control::SetStreaming(enabled) => session.set_streaming(enabled),
                    }
                }
                result = transport.next_event() => match result {
                    Ok(Some(event)) => {
                        error_count = 0;
                        match event {
                            TransportEvent::Connected => session.on_connection_established(),
                            TransportEvent::Disconnected => session.on_connection_lost(),
                            TransportEvent::Data(bytes) => {
                                delivery_count += 1;
                                trace!("Delivery {}: {} bytes", delivery_count, bytes.len());
                                session.on_bytes_received(&bytes);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("Transport ended after {} deliveries", delivery_count);
                        session.on_connection_lost();
                        break;
                    }
                    Err(e) => {
                        // Transport error - don't tear down on transient failures
                        error_count += 1;
                        error!("Transport error ({}/{}): {}", error_count, max_errors, e);

                        if error_count >= max_errors {
                            error!("Too many transport errors, shutting down");
                            session.on_connection_lost();
                            break;
                        }

                        // Exponential backoff: 50ms, 100ms, 200ms, ...
                        let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                },
            }

            Self::flush(&mut transport, &mut session).await;
        }

        info!("Session task ended ({} deliveries)", delivery_count);
    }

    /// Write every queued frame, in order.
    async fn flush<T, S, C>(transport: &mut T, session: &mut DeviceSession<Outbox, S, C>)
    where
        T: Transport,
        S: SampleStore,
        C: Clock,
    {
        while let Some(frame) = session.sink_mut().pop() {
            if let Err(e) = transport.write_bytes(&frame).await {
                warn!("Transport write failed: {}", e);
                session.report_send_failure(&frame, &e);
            }
        }
    }
}
