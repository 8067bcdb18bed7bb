//! Sync Engine - client side of the cloud relay
//!
//! Pairs with a remote storage device through an HTTP relay, then keeps a
//! bounded number of encrypted requests in flight and streams uploads in
//! chunks paced by the remote device's acks.

mod config;
mod dispatcher;
mod engine;
mod error;
mod handshake;
mod notify;
mod session;
mod upload;

#[cfg(test)]
mod test_support;

pub use config::*;
pub use dispatcher::Dispatcher;
pub use engine::*;
pub use error::*;
pub use handshake::*;
pub use notify::*;
pub use session::*;
pub use upload::*;

/// Requests allowed on the wire at once
pub const MAX_IN_FLIGHT: usize = 5;

/// Default bytes per uploaded chunk
pub const DEFAULT_UPLOAD_CHUNK_LEN: usize = 1024 * 1024;
