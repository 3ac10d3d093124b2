//! Error types for the session crate.
//!
//! - `AuthError`: a login attempt did not produce a session
//! - `StorageError`: the durable session entries could not be read or written

use std::fmt;

/// Errors from login attempts.
///
/// These are shown inline on the login form; none of them touches an
/// existing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server refused the credentials (bad password, locked account, ...).
    /// The message is the server's own and is passed through verbatim.
    Rejected { message: String },
    /// The login endpoint could not be reached.
    Unavailable { reason: String },
    /// The server accepted the login but the grant was unusable.
    InvalidGrant { reason: String },
}

impl AuthError {
    /// Returns true if retrying the same login may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { message } => write!(f, "login rejected: {message}"),
            Self::Unavailable { reason } => write!(f, "login service unavailable: {reason}"),
            Self::InvalidGrant { reason } => write!(f, "invalid login grant: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Errors from the durable session storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Reading an entry failed.
    ReadFailed { key: String, reason: String },
    /// Writing an entry failed.
    WriteFailed { key: String, reason: String },
    /// Removing an entry failed.
    RemoveFailed { key: String, reason: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { key, reason } => {
                write!(f, "failed to read session entry '{key}': {reason}")
            }
            Self::WriteFailed { key, reason } => {
                write!(f, "failed to write session entry '{key}': {reason}")
            }
            Self::RemoveFailed { key, reason } => {
                write!(f, "failed to remove session entry '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for StorageError {}
