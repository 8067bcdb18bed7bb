//! Engine error taxonomy

use thiserror::Error;

use crypto_session::CryptoError;
use net_transport::TransportError;
use shared_protocol::ProtocolError;

/// Pairing checks that failed against the current session
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Wrong connection, key verification failed: expected client {expected}, got {actual}")]
    ClientIdMismatch { expected: String, actual: String },

    #[error("Attempt to change the encryption key")]
    KeyReassignmentAttempt,
}

/// Operation not valid in the current engine state
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Unregistered user, log in to the server to initialize the encryption")]
    Unregistered,

    #[error("Upload state missing for {0}")]
    UnknownUpload(String),

    #[error("No active session")]
    NoSession,
}

/// Capacity limits signaled by the relay
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Max request concurrent limit reached")]
    ConcurrencyLimitReached,
}

/// Any failure surfaced by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category, as shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    Security,
    Serialization,
    State,
    Resource,
    Crypto,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Io(_) => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Security(_) => ErrorKind::Security,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::State(_) => ErrorKind::State,
            Self::Resource(_) => ErrorKind::Resource,
            Self::Crypto(_) => ErrorKind::Crypto,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
