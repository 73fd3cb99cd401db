//! Error types for the biosensor protocol core.
//!
//! Errors are layered the same way the protocol is:
//!
//! - **Codec Errors**: A delivery is not a well-formed frame (length, magic, checksum)
//! - **Decode Errors**: A frame's payload is shorter than its record layout requires
//! - **Protocol Errors**: A well-formed frame arrived that the session cannot use now
//! - **Transport Errors**: The radio link refused a write or stopped delivering
//! - **Store Errors**: The persistence collaborator rejected a sample
//! - **Config Errors**: A [`SessionConfig`](crate::SessionConfig) value is unusable
//!
//! Codec, decode and protocol errors never escape the device facade; they are
//! logged and the offending frame is dropped. [`SensorError`] exists so that
//! callers using the lower layers directly get one type to propagate with `?`.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use uricsense::SensorError;
//!
//! let error = SensorError::transport_failed("peripheral went out of range");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

use crate::types::SessionPhase;

/// Result type alias for protocol operations.
pub type Result<T, E = SensorError> = std::result::Result<T, E>;

/// Frame-level validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Frame too short: {len} bytes (minimum 4)")]
    FrameTooShort { len: usize },

    #[error("Bad frame header: {found:02X?}")]
    BadHeader { found: [u8; 2] },

    #[error("Checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    ChecksumMismatch { expected: u8, found: u8 },
}

/// Payload-level parsing failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record} payload too short: need {expected} bytes, got {actual}")]
    PayloadTooShort { record: &'static str, expected: usize, actual: usize },
}

/// Frames that are valid on the wire but unusable by the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected frame {frame_type:#04x} while {phase:?}")]
    UnexpectedFrameInState { frame_type: u8, phase: SessionPhase },

    #[error("Unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    #[error("Delivery of {len} bytes holds more than one frame (first frame is {first_frame_len} bytes)")]
    CoalescedFrames { len: usize, first_frame_len: usize },
}

/// Failures reported by the transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("Write failed: {reason}")]
    WriteFailed { reason: String },

    #[error("Read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("Transport closed")]
    Closed,
}

/// Failures reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Sample store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Main error type for the crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SensorError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid configuration for '{field}': {reason}")]
    Config { field: String, reason: String },
}

impl SensorError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            SensorError::Codec(_) => true,
            SensorError::Decode(_) => false,
            SensorError::Protocol(ProtocolError::UnexpectedFrameInState { .. }) => true,
            SensorError::Protocol(_) => false,
            SensorError::Transport(TransportError::Closed) => false,
            SensorError::Transport(_) => true,
            SensorError::Store(_) => true,
            SensorError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            SensorError::Codec(_) => vec![
                "Check that each transport delivery carries exactly one frame",
                "Verify the peripheral firmware speaks this frame format",
            ],
            SensorError::Decode(_) => vec![
                "Check the firmware version of the sensor",
                "Capture the raw frame bytes for analysis",
            ],
            SensorError::Protocol(_) => vec![
                "Request a status refresh to resynchronise the session",
                "Reconnect to restart the handshake",
            ],
            SensorError::Transport(_) => vec![
                "Ensure the sensor is powered and in range",
                "Reconnect to the peripheral",
                "Check Bluetooth permissions on the host",
            ],
            SensorError::Store(_) => vec![
                "Check the persistence backend is reachable",
                "Retry once storage is available; backfill resumes from the stored maximum",
            ],
            SensorError::Config { .. } => {
                vec!["Fix the named configuration field", "Fall back to SessionConfig::default()"]
            }
        }
    }

    /// Helper constructor for transport write failures.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        SensorError::Transport(TransportError::WriteFailed { reason: reason.into() })
    }

    /// Helper constructor for configuration errors.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SensorError::Config { field: field.into(), reason: reason.into() }
    }

    /// Helper constructor for short payloads.
    pub fn payload_too_short(record: &'static str, expected: usize, actual: usize) -> Self {
        SensorError::Decode(DecodeError::PayloadTooShort { record, expected, actual })
    }
}

impl From<serde_yaml_ng::Error> for SensorError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        SensorError::Config { field: "<document>".to_string(), reason: err.to_string() }
    }
}
