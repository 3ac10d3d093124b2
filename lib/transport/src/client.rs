//! The authenticated transport.

use reqwest::{Method, StatusCode};
use registrar_session::{Credential, EndReason, Redirect, SessionStore};
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use crate::config::TransportConfig;
use crate::envelope::{ApiResponse, field_errors_of, message_of};
use crate::error::TransportError;
use crate::sender::{HttpRequest, HttpResponse, HttpSender, ReqwestSender, SendFailure};

/// Capacity of the redirect channel. Receivers that fall further behind only
/// miss duplicate `ToLogin` signals.
const REDIRECT_CAPACITY: usize = 16;

const DEFAULT_FORBIDDEN_MESSAGE: &str = "access denied";
const DEFAULT_LOGIN_REJECTED_MESSAGE: &str = "invalid credentials";

struct TransportInner {
    sender: Arc<dyn HttpSender>,
    session: SessionStore,
    login_path: String,
    timeout: Duration,
    redirects: broadcast::Sender<Redirect>,
}

/// The single HTTP client of the console.
///
/// Cloning is cheap; clones share the sender, session and redirect channel.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("session", &self.inner.session)
            .field("login_path", &self.inner.login_path)
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Builds a transport backed by `reqwest`.
    pub fn new(config: &TransportConfig, session: SessionStore) -> Result<Self, TransportError> {
        let sender = ReqwestSender::new(config)?;
        Ok(Self::with_sender(
            Arc::new(sender),
            session,
            config.login_path(),
            config.timeout(),
        ))
    }

    /// Builds a transport around any sender.
    #[must_use]
    pub fn with_sender(
        sender: Arc<dyn HttpSender>,
        session: SessionStore,
        login_path: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let (redirects, _) = broadcast::channel(REDIRECT_CAPACITY);
        Self {
            inner: Arc::new(TransportInner {
                sender,
                session,
                login_path: login_path.into(),
                timeout,
                redirects,
            }),
        }
    }

    /// Returns the session store this transport reads credentials from.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Returns the login endpoint path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    /// Subscribes to redirects emitted after a forced logout.
    #[must_use]
    pub fn redirects(&self) -> broadcast::Receiver<Redirect> {
        self.inner.redirects.subscribe()
    }

    /// Sends a request and classifies the outcome.
    ///
    /// The session's credential is attached to every request except the
    /// login call.
    #[instrument(skip(self, body, query))]
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, TransportError> {
        let is_login = same_path(path, &self.inner.login_path);
        let credential = if is_login {
            None
        } else {
            self.inner.session.credential()
        };

        let request = HttpRequest {
            method,
            path: path.to_string(),
            query: query
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
            body: body.cloned(),
            credential: credential.clone(),
        };

        let response =
            match tokio::time::timeout(self.inner.timeout, self.inner.sender.execute(request))
                .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(SendFailure::Timeout)) | Err(_) => {
                    debug!("request timed out");
                    return Err(TransportError::Timeout);
                }
                Ok(Err(SendFailure::Connection { reason })) => {
                    debug!(%reason, "request failed");
                    return Err(TransportError::Network { reason });
                }
            };

        self.classify(response, credential.as_ref(), is_login).await
    }

    /// Sends a GET request.
    pub async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, TransportError> {
        self.send(Method::GET, path, None, query).await
    }

    /// Sends a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &JsonValue) -> Result<ApiResponse, TransportError> {
        self.send(Method::POST, path, Some(body), &[]).await
    }

    /// Sends a PUT request with a JSON body.
    pub async fn put(&self, path: &str, body: &JsonValue) -> Result<ApiResponse, TransportError> {
        self.send(Method::PUT, path, Some(body), &[]).await
    }

    /// Sends a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, TransportError> {
        self.send(Method::DELETE, path, None, &[]).await
    }

    async fn classify(
        &self,
        response: HttpResponse,
        credential: Option<&Credential>,
        is_login: bool,
    ) -> Result<ApiResponse, TransportError> {
        let HttpResponse {
            status,
            headers,
            body,
        } = response;

        if status.is_success() {
            return Ok(ApiResponse::new(status, headers, body));
        }

        let message = message_of(&body);
        match status {
            StatusCode::UNAUTHORIZED if is_login => Err(TransportError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| DEFAULT_LOGIN_REJECTED_MESSAGE.to_string()),
            }),
            StatusCode::UNAUTHORIZED => {
                let ended = match credential {
                    Some(credential) => {
                        self.inner
                            .session
                            .invalidate_credential(credential, EndReason::Unauthorized)
                            .await
                    }
                    None => true,
                };
                if !ended {
                    debug!("401 for a replaced credential, session kept");
                    return Err(TransportError::Rejected {
                        status: status.as_u16(),
                        message: message.unwrap_or_else(|| "credential replaced".to_string()),
                    });
                }
                warn!("server rejected credential, redirecting to login");
                // No receivers is fine: nobody is routing.
                let _ = self.inner.redirects.send(Redirect::ToLogin);
                Err(TransportError::Unauthorized {
                    message: message.unwrap_or_else(|| "session expired".to_string()),
                })
            }
            StatusCode::FORBIDDEN => {
                debug!("request forbidden");
                Err(TransportError::Forbidden {
                    message: message.unwrap_or_else(|| DEFAULT_FORBIDDEN_MESSAGE.to_string()),
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(TransportError::Validation {
                    message: message.unwrap_or_else(|| "invalid request".to_string()),
                    fields: field_errors_of(&body),
                })
            }
            _ => Err(TransportError::Rejected {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                }),
            }),
        }
    }
}

fn same_path(a: &str, b: &str) -> bool {
    let normalize = |p: &str| p.trim().trim_matches('/').to_ascii_lowercase();
    normalize(a) == normalize(b)
}
