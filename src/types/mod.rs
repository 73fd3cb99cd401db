//! Core types for biosensor readings and session state.
//!
//! - [`Sample`] is one physical reading, produced by both the realtime and the
//!   history paths and handed to the persistence collaborator
//! - [`HandshakeInfo`] is the decoded status response that anchors a session
//! - [`SessionPhase`] and [`SessionStatus`] describe where a session stands
//!
//! ## Usage Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use uricsense::types::Sample;
//!
//! let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
//! let now = Utc.timestamp_opt(1_800_000_000, 0).unwrap();
//!
//! let sample = Sample::from_raw(5, 4000, Some(300), start, 120, now);
//! assert_eq!(sample.value(), 400.0);
//! assert_eq!(sample.timestamp, Utc.timestamp_opt(1_700_000_600, 0).unwrap());
//! ```

mod handshake;
mod sample;
mod status;

pub use handshake::{HandshakeInfo, Hydration};
pub use sample::{RealtimeSample, Sample};
pub use status::{SessionPhase, SessionStatus};
