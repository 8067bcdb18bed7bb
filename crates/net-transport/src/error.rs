//! Transport error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request error: {0}")]
    Http(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),

    #[error("Error reading response body: {0}")]
    Body(String),

    #[error("HTTP error code: {0}")]
    Status(u16),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::InvalidUrl(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
