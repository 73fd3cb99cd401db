//! Session protocol.
//!
//! ```text
//!  connect ──► AwaitingHandshake ──handshake──► Reconciling
//!                    ▲                          │        │
//!                    │ gap closed / empty page  │ gap    │ no gap
//!                    │                          ▼        ▼
//!                    └──────────────────── Backfilling  Streaming
//!
//!  disconnect (from anywhere) ──► Idle
//! ```
//!
//! [`SessionMachine`] is sans-IO: every input returns the [`Action`]s to
//! perform, so the protocol can be driven and tested without a radio. The
//! [`DeviceSession`](crate::DeviceSession) facade performs those actions.

mod event;
mod machine;
mod state;

pub use event::SessionEvent;
pub use machine::{Action, SessionMachine};
pub use state::{BackfillCursor, ReconcileDecision, SessionState, reconcile};
