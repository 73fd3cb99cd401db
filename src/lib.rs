//! Wire protocol and session engine for uric-acid biosensors.
//!
//! The sensor talks over a low-energy radio link using short checksummed
//! frames. This crate owns everything between "bytes arrived" and "a reading
//! was stored":
//!
//! - **Packet codec**: framing, XOR checksum, validation ([`protocol::codec`])
//! - **Sample decoder**: serial numbers to timestamps, raw counts to values
//!   ([`protocol::decoder`])
//! - **Session state machine**: handshake, gap reconciliation, paginated
//!   backfill, streaming ([`session`])
//! - **Device session facade**: the boundary transport and application call
//!   into ([`DeviceSession`])
//!
//! The radio stack, persistence engine and wall clock are collaborators
//! supplied by the caller through [`Transport`], [`SampleStore`] and
//! [`Clock`].
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use uricsense::{MemoryStore, SessionEvent, Transport, TransportError, TransportEvent, UricSense};
//!
//! struct Radio;
//!
//! #[async_trait::async_trait]
//! impl Transport for Radio {
//!     async fn next_event(&mut self) -> Result<Option<TransportEvent>, TransportError> {
//!         Ok(None)
//!     }
//!
//!     async fn write_bytes(&mut self, _bytes: &[u8]) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> uricsense::Result<()> {
//!     let connection = UricSense::connect(Radio, MemoryStore::new())?;
//!     let mut events = Box::pin(connection.events());
//!
//!     while let Some(event) = events.next().await {
//!         if let SessionEvent::Reading(sample) = event {
//!             println!("{} at {}", sample.value(), sample.timestamp);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod clock;
pub mod config;
mod error;
pub mod protocol;
pub mod store;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Session engine
pub mod device;
pub mod session;
pub mod transport;

// Async runtime integration
pub mod connection;
pub mod driver;

// Core exports
pub use error::*;
pub use types::*;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use store::{MemoryStore, SampleStore};

// Session exports
pub use device::DeviceSession;
pub use session::{Action, SessionEvent, SessionMachine};
pub use transport::{CommandSink, Outbox, Transport, TransportEvent};

// Main API exports
pub use connection::SensorConnection;

/// Entry point for sensor sessions.
///
/// Spawns the session task on the current tokio runtime and returns a
/// [`SensorConnection`] handle.
///
/// # Examples
///
/// ```rust,no_run
/// use uricsense::{MemoryStore, SessionConfig, SystemClock, UricSense};
/// # use uricsense::{Transport, TransportError, TransportEvent};
/// # struct Radio;
/// # #[async_trait::async_trait]
/// # impl Transport for Radio {
/// #     async fn next_event(&mut self) -> Result<Option<TransportEvent>, TransportError> { Ok(None) }
/// #     async fn write_bytes(&mut self, _: &[u8]) -> Result<(), TransportError> { Ok(()) }
/// # }
///
/// # #[tokio::main]
/// # async fn main() -> uricsense::Result<()> {
/// let config = SessionConfig::from_yaml_str("page_size: 10")?;
/// let connection = UricSense::connect_with(Radio, MemoryStore::new(), SystemClock, config)?;
/// connection.set_streaming(true).await?;
/// # Ok(())
/// # }
/// ```
pub struct UricSense;

impl UricSense {
    /// Start a session with default configuration and the system clock.
    ///
    /// # Errors
    ///
    /// Never fails with the default configuration; the `Result` matches
    /// [`UricSense::connect_with`].
    pub fn connect<T, S>(transport: T, store: S) -> Result<SensorConnection>
    where
        T: Transport,
        S: SampleStore,
    {
        Self::connect_with(transport, store, SystemClock, SessionConfig::default())
    }

    /// Start a session with explicit collaborators and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SensorError::Config`] if `config` fails validation.
    pub fn connect_with<T, S, C>(
        transport: T,
        store: S,
        clock: C,
        config: SessionConfig,
    ) -> Result<SensorConnection>
    where
        T: Transport,
        S: SampleStore,
        C: Clock,
    {
        SensorConnection::spawn(transport, store, clock, config)
    }
}
