//! Transport error classification.
//!
//! Pages branch on these variants to decide how to show a failure:
//! `Unauthorized` has already ended the session and triggered a redirect,
//! `Forbidden` is a dismissible message, `Validation` belongs next to a form,
//! and `Network`/`Timeout` can be retried.

use std::collections::BTreeMap;
use std::fmt;

/// Classified failure of a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 401 outside the login endpoint. The session has been ended.
    Unauthorized { message: String },
    /// 403. The session is untouched.
    Forbidden { message: String },
    /// 400 or 422: the server rejected the payload.
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },
    /// Any other non-success status. Also a 401 from the login endpoint, or
    /// one for a credential a newer login already replaced.
    Rejected { status: u16, message: String },
    /// The request never produced a response.
    Network { reason: String },
    /// No response within the configured timeout.
    Timeout,
    /// The response body did not have the expected shape.
    Decode { reason: String },
    /// The transport could not be built from its configuration.
    InvalidConfig { reason: String },
}

impl TransportError {
    /// Returns true if the same request may succeed when retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout)
    }

    /// Returns true if this failure ended the session.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns the HTTP status behind the failure, if there was a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::Rejected { status, .. } => Some(*status),
            Self::Validation { .. }
            | Self::Network { .. }
            | Self::Timeout
            | Self::Decode { .. }
            | Self::InvalidConfig { .. } => None,
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized { message } => write!(f, "unauthorized: {message}"),
            Self::Forbidden { message } => write!(f, "forbidden: {message}"),
            Self::Validation { message, fields } => {
                write!(f, "validation failed: {message}")?;
                for (field, problem) in fields {
                    write!(f, "; {field}: {problem}")?;
                }
                Ok(())
            }
            Self::Rejected { status, message } => {
                write!(f, "request rejected with status {status}: {message}")
            }
            Self::Network { reason } => write!(f, "network error: {reason}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Decode { reason } => write!(f, "unexpected response: {reason}"),
            Self::InvalidConfig { reason } => write!(f, "invalid transport configuration: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_failures_are_retryable() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(
            TransportError::Network {
                reason: "refused".to_string()
            }
            .is_retryable()
        );
        assert!(
            !TransportError::Forbidden {
                message: "no".to_string()
            }
            .is_retryable()
        );
        assert!(
            !TransportError::Unauthorized {
                message: "expired".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn validation_display_lists_fields() {
        let err = TransportError::Validation {
            message: "invalid student".to_string(),
            fields: BTreeMap::from([("email".to_string(), "must not be blank".to_string())]),
        };
        let text = err.to_string();
        assert!(text.contains("invalid student"));
        assert!(text.contains("email: must not be blank"));
    }

    #[test]
    fn status_reflects_response() {
        assert_eq!(
            TransportError::Rejected {
                status: 500,
                message: "boom".to_string()
            }
            .status(),
            Some(500)
        );
        assert_eq!(TransportError::Timeout.status(), None);
    }
}
