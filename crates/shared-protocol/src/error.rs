//! Error types for the protocol

use thiserror::Error;

/// Protocol error
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unsupported QR code type: {0}")]
    UnsupportedQrType(u8),

    #[error("Unsupported handshake type: {0}")]
    UnsupportedHandshakeType(u8),

    #[error("Truncated {what}: need {needed} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Malformed upload acknowledgment: {0:?}")]
    MalformedAck(String),

    #[error("Invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Empty response body")]
    EmptyResponse,

    #[error("Cloud not found by server id, no cloud with this id is registered at the relay")]
    UnknownRemote,

    #[error("The cloud is not logged into the relay")]
    RemoteNotLoggedIn,
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
