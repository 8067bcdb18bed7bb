//! Network Transport - HTTP relay plumbing
//!
//! The client never reaches the remote device directly. Every exchange is
//! an HTTP request to the relay's `/data` endpoint carrying opaque bytes.

mod error;
mod transport;

pub use error::*;
pub use transport::*;

/// Relay path that forwards payloads to the remote device
pub const DATA_PATH: &str = "/data";

/// Relay used when nothing else is configured
pub const DEFAULT_PROXY_URL: &str = "http://proxy.tc0.it:5050";
