//! The login endpoint.

use async_trait::async_trait;
use registrar_session::{AuthError, Authenticator, LoginGrant, Session};
use serde_json::json;
use tracing::instrument;

use crate::client::Transport;
use crate::error::TransportError;

#[async_trait]
impl Authenticator for Transport {
    #[instrument(skip(self, password))]
    async fn authenticate(&self, username: &str, password: &str) -> Result<LoginGrant, AuthError> {
        let body = json!({ "username": username, "password": password });
        let response = self
            .post(self.login_path(), &body)
            .await
            .map_err(login_failure)?;
        response
            .data::<LoginGrant>()
            .map_err(|e| AuthError::InvalidGrant {
                reason: e.to_string(),
            })
    }
}

impl Transport {
    /// Signs in through this transport's login endpoint.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        self.session().login(self, username, password).await
    }

    /// Signs out of the session this transport uses.
    pub async fn logout(&self) {
        self.session().logout().await;
    }
}

fn login_failure(err: TransportError) -> AuthError {
    match err {
        TransportError::Rejected { message, .. }
        | TransportError::Unauthorized { message }
        | TransportError::Forbidden { message }
        | TransportError::Validation { message, .. } => AuthError::Rejected { message },
        TransportError::Network { reason } => AuthError::Unavailable { reason },
        TransportError::Timeout => AuthError::Unavailable {
            reason: "request timed out".to_string(),
        },
        TransportError::InvalidConfig { reason } => AuthError::Unavailable { reason },
        TransportError::Decode { reason } => AuthError::InvalidGrant { reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn server_rejections_keep_message() {
        let err = login_failure(TransportError::Rejected {
            status: 401,
            message: "account locked".to_string(),
        });
        assert_eq!(
            err,
            AuthError::Rejected {
                message: "account locked".to_string()
            }
        );

        let err = login_failure(TransportError::Validation {
            message: "username required".to_string(),
            fields: BTreeMap::new(),
        });
        assert_eq!(
            err,
            AuthError::Rejected {
                message: "username required".to_string()
            }
        );
    }

    #[test]
    fn network_failures_are_unavailable() {
        assert!(login_failure(TransportError::Timeout).is_retryable());
        assert!(
            login_failure(TransportError::Network {
                reason: "dns".to_string()
            })
            .is_retryable()
        );
    }

    #[test]
    fn malformed_grant_is_invalid() {
        let err = login_failure(TransportError::Decode {
            reason: "missing field `token`".to_string(),
        });
        assert!(matches!(err, AuthError::InvalidGrant { .. }));
    }
}
