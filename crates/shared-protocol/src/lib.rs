//! Shared Protocol Definitions for the cloud relay
//!
//! Command ids, wire framing, and the payloads exchanged with the remote
//! device through the HTTP relay. Nothing in here is encrypted; the
//! crypto-session crate wraps these bytes before they leave the process.

mod command;
mod error;
mod frame;
mod handshake;
mod upload;

pub use command::*;
pub use error::*;
pub use frame::*;
pub use handshake::*;
pub use upload::*;

/// Type byte shared by the QR payload and the RSA exchange payload
pub const HANDSHAKE_TYPE: u8 = 2;

/// Length of the transient QR keystream key
pub const QR_KEY_LEN: usize = 24;

/// Length of the raw client / server identifiers
pub const PEER_ID_LEN: usize = 8;

/// RSA-2048 modulus size in bytes
pub const RSA_MODULUS_LEN: usize = 2048 / 8;

/// Public exponent size carried in the RSA exchange payload
pub const RSA_EXPONENT_LEN: usize = 3;
