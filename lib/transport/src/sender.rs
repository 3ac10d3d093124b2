//! The HTTP boundary.
//!
//! [`HttpSender`] executes one prepared request and reports either a raw
//! response (any status) or a failure to get one. Status classification
//! happens in [`Transport`](crate::Transport), so senders stay dumb and
//! tests can script them.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use registrar_session::Credential;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::config::TransportConfig;
use crate::error::TransportError;

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the base address.
    pub path: String,
    /// Query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<JsonValue>,
    /// Bearer credential to attach, if any.
    pub credential: Option<Credential>,
}

/// A raw response of any status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response with a JSON body.
    #[must_use]
    pub fn json(status: StatusCode, body: &JsonValue) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.to_string().into_bytes(),
        }
    }

    /// Builds a response with an empty body.
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

/// Failure to obtain any response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// The request did not complete in time.
    Timeout,
    /// Connection, DNS, TLS or protocol failure.
    Connection { reason: String },
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Connection { reason } => write!(f, "connection failed: {reason}"),
        }
    }
}

impl std::error::Error for SendFailure {}

/// Executes prepared requests.
#[async_trait]
pub trait HttpSender: Send + Sync {
    /// Sends the request and returns the raw response.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SendFailure>;
}

/// Production sender backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestSender {
    /// Builds a client with the configured timeout and default headers.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in config.default_headers() {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::InvalidConfig {
                    reason: format!("header name '{name}': {e}"),
                }
            })?;
            let value =
                HeaderValue::from_str(value).map_err(|e| TransportError::InvalidConfig {
                    reason: format!("header value for '{name}': {e}"),
                })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpSender for ReqwestSender {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, SendFailure> {
        let mut builder = self
            .client
            .request(request.method, self.url(&request.path))
            .query(&request.query);

        if let Some(credential) = &request.credential {
            builder = builder.header(AUTHORIZATION, credential.bearer_header());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                SendFailure::Timeout
            } else {
                SendFailure::Connection {
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SendFailure::Timeout
            } else {
                SendFailure::Connection {
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}
