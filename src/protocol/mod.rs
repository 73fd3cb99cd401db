//! Biosensor wire protocol
//!
//! Every frame on the link has the same shape, with all multi-byte integers
//! big-endian:
//!
//! ```text
//! +--------------+--------+-------------------+----------+
//! | Magic        | Type   | Payload           | Checksum |
//! | 0xD3 0x96    | 1 byte | N bytes           | 1 byte   |
//! +--------------+--------+-------------------+----------+
//! ```
//!
//! The checksum is the XOR of every preceding byte. There is no length field;
//! each transport delivery is one frame.
//!
//! - [`codec`]: frame encoding, validation and hex rendering
//! - [`command`]: outbound commands
//! - [`decoder`]: typed views of inbound payloads

pub mod codec;
pub mod codes;
pub mod command;
pub mod decoder;

pub use codec::{Frame, Hex, checksum, decode, encode};
pub use codes::{CommandCode, ResponseCode};
pub use command::Command;
pub use decoder::{decode_handshake_response, decode_history_batch, decode_realtime_sample};
