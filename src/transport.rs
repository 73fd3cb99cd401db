//! Transport collaborator.
//!
//! The radio stack (scanning, pairing, characteristic discovery) lives outside
//! this crate. It is seen through two seams:
//!
//! - [`Transport`]: the async link the [`Driver`](crate::driver::Driver) owns,
//!   delivering connection changes and notification payloads
//! - [`CommandSink`]: the synchronous "write bytes" primitive the
//!   [`DeviceSession`](crate::DeviceSession) hands finished frames to

use std::collections::VecDeque;

use crate::error::TransportError;

/// Something the link reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    /// One notification payload; expected to hold exactly one frame.
    Data(Vec<u8>),
}

/// Async link to one peripheral.
///
/// Connection-level timeouts ("handshake never answered") belong here too:
/// surface them as [`TransportEvent::Disconnected`].
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Wait for the next link event.
    ///
    /// Returns:
    /// - `Ok(Some(event))` - Something happened on the link
    /// - `Ok(None)` - The link is gone for good (normal termination)
    /// - `Err(e)` - A read failed; the driver retries with backoff
    ///
    /// Must be cancel-safe: the driver drops a pending call when a control
    /// request arrives.
    async fn next_event(&mut self) -> Result<Option<TransportEvent>, TransportError>;

    /// Write one complete frame.
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Synchronous write primitive used by the session facade.
///
/// The facade never waits for a response; answers come back as later
/// deliveries.
pub trait CommandSink: Send {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl<F> CommandSink for F
where
    F: FnMut(&[u8]) -> Result<(), TransportError> + Send,
{
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self(bytes)
    }
}

/// FIFO of frames waiting for an async writer.
///
/// Lets the synchronous facade sit in front of an async [`Transport`]: the
/// driver drains it after every input, in order.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: VecDeque<Vec<u8>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest queued frame.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl CommandSink for Outbox {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.frames.push_back(bytes.to_vec());
        Ok(())
    }
}
