//! HTTP sender abstraction and the reqwest-backed relay client

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use tracing::debug;

use crate::{DATA_PATH, TransportError, TransportResult};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// HTTP method used for a relay call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMethod {
    Get,
    Post,
}

/// One request to the relay's data endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub method: RelayMethod,
    pub query: Vec<(String, String)>,
    /// Octet-stream body; ignored for GET
    pub body: Bytes,
}

impl RelayRequest {
    pub fn get(query: Vec<(String, String)>) -> Self {
        Self {
            method: RelayMethod::Get,
            query,
            body: Bytes::new(),
        }
    }

    pub fn post(query: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            method: RelayMethod::Post,
            query,
            body: body.into(),
        }
    }

    /// Value of a query parameter, if present
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Status and text body returned by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    /// Base64 text on success
    pub body: String,
}

impl RelayResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends relay requests. `Err` means no HTTP response was received at all;
/// every received status, including errors, comes back as `Ok`.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: RelayRequest) -> TransportResult<RelayResponse>;
}

/// Relay client over reqwest
#[derive(Clone)]
pub struct ReqwestSender {
    data_url: Url,
    client: Client,
}

impl ReqwestSender {
    /// `timeout = None` waits for the relay indefinitely
    pub fn new(proxy_base: impl AsRef<str>, timeout: Option<Duration>) -> TransportResult<Self> {
        let data_url = data_url(proxy_base.as_ref())?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = Client::builder().use_rustls_tls().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self { data_url, client })
    }

    pub fn data_url(&self) -> &Url {
        &self.data_url
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn send(&self, request: RelayRequest) -> TransportResult<RelayResponse> {
        let builder = match request.method {
            RelayMethod::Get => self.client.get(self.data_url.clone()),
            RelayMethod::Post => self
                .client
                .post(self.data_url.clone())
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(request.body),
        };

        let resp = builder.query(&request.query).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!("Relay answered {} with {} bytes", status, body.len());

        Ok(RelayResponse { status, body })
    }
}

fn data_url(proxy_base: &str) -> TransportResult<Url> {
    let joined = format!("{}{}", proxy_base.trim_end_matches('/'), DATA_PATH);
    Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{joined}: {e}")))
}
