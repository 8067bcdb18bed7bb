//! Engine configuration
//!
//! Defaults, then an optional TOML file, then `CLOUD_SYNC_*` environment
//! variables. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use net_transport::DEFAULT_PROXY_URL;
use shared_protocol::ClientSettings;

use crate::{DEFAULT_UPLOAD_CHUNK_LEN, MAX_IN_FLIGHT};

/// Prefix of the environment overrides
pub const ENV_PREFIX: &str = "CLOUD_SYNC_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Relay base URL; requests go to `<proxy_url>/data`
    pub proxy_url: String,
    /// PIN mixed into the authentication verifier
    pub pin: u32,
    /// Chunk size announced to the remote device in `SetClient`
    pub client_chunk_size: u32,
    pub thumbnail_size: u16,
    /// Bytes per uploaded chunk
    pub upload_chunk_len: usize,
    pub max_in_flight: usize,
    /// `None` waits for the relay indefinitely
    pub request_timeout_secs: Option<u64>,
    pub poll_interval_secs: u64,
    /// Files uploaded as soon as authentication completes
    pub bootstrap_uploads: Vec<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            proxy_url: DEFAULT_PROXY_URL.to_string(),
            pin: 762836,
            client_chunk_size: ClientSettings::DEFAULT_CHUNK_SIZE,
            thumbnail_size: ClientSettings::DEFAULT_THUMBNAIL_SIZE,
            upload_chunk_len: DEFAULT_UPLOAD_CHUNK_LEN,
            max_in_flight: MAX_IN_FLIGHT,
            request_timeout_secs: None,
            poll_interval_secs: 30,
            bootstrap_uploads: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional TOML file plus the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CLOUD_SYNC_*` overrides read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("PROXY_URL") {
            self.proxy_url = v;
        }
        if let Some(v) = var("PIN") {
            self.pin = parse_env("PIN", &v)?;
        }
        if let Some(v) = var("CLIENT_CHUNK_SIZE") {
            self.client_chunk_size = parse_env("CLIENT_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = var("THUMBNAIL_SIZE") {
            self.thumbnail_size = parse_env("THUMBNAIL_SIZE", &v)?;
        }
        if let Some(v) = var("UPLOAD_CHUNK_LEN") {
            self.upload_chunk_len = parse_env("UPLOAD_CHUNK_LEN", &v)?;
        }
        if let Some(v) = var("MAX_IN_FLIGHT") {
            self.max_in_flight = parse_env("MAX_IN_FLIGHT", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(parse_env("REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("POLL_INTERVAL_SECS") {
            self.poll_interval_secs = parse_env("POLL_INTERVAL_SECS", &v)?;
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy_url.trim().is_empty() {
            return Err(ConfigError::Invalid("proxy_url is empty".to_string()));
        }
        if self.upload_chunk_len == 0 {
            return Err(ConfigError::Invalid("upload_chunk_len must be positive".to_string()));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid("max_in_flight must be positive".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be positive".to_string()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub(crate) fn client_settings(&self, public_key: Vec<u8>) -> ClientSettings {
        ClientSettings {
            chunk_size: self.client_chunk_size,
            thumbnail_size: self.thumbnail_size,
            public_key,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{ENV_PREFIX}{name}={value:?}")))
}
