//! Session types for signed-in console users.
//!
//! A `Session` pairs the bearer credential issued at login with the identity
//! the server returned alongside it. Neither half exists without the other:
//! the store holds a whole `Session` or none at all.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::role::Role;

/// Opaque bearer token issued by the login endpoint.
///
/// The console never parses it; it is only echoed back in the
/// `Authorization` header. `Debug` output is redacted so the token does not
/// leak into logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the token is empty or only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns the value for an `Authorization` header.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Identity of the signed-in user, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Login name.
    pub username: String,
    /// Role assigned by the server.
    pub role: Role,
}

impl UserIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

/// An authenticated session: credential plus the identity it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    credential: Credential,
    user: UserIdentity,
}

impl Session {
    /// Creates a session from a credential and its identity.
    #[must_use]
    pub fn new(credential: Credential, user: UserIdentity) -> Self {
        Self { credential, user }
    }

    /// Returns the bearer credential.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Returns the signed-in user.
    #[must_use]
    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    /// Returns true if the user is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.role.is_admin()
    }
}

/// Why an authenticated session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The user logged out.
    LoggedOut,
    /// The server answered 401 to an authenticated request.
    Unauthorized,
    /// Expiry was detected without a failed request.
    Expired,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::Unauthorized => write!(f, "rejected by server"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Lifecycle state held by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Persisted entries are still being read at startup.
    #[default]
    Rehydrating,
    /// No session. `ended` records how the previous one ended, if any.
    Anonymous { ended: Option<EndReason> },
    /// A login request is in flight and there was no prior session.
    Authenticating,
    /// Signed in.
    Authenticated(Session),
}

impl SessionState {
    /// The state of a fresh store with nothing persisted.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::Anonymous { ended: None }
    }

    /// Returns the session when authenticated.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    /// Returns the credential when authenticated.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.session().map(Session::credential)
    }

    /// Returns the user when authenticated.
    #[must_use]
    pub fn user(&self) -> Option<&UserIdentity> {
        self.session().map(Session::user)
    }

    /// Returns true if signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns true if signed in as an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.session().is_some_and(Session::is_admin)
    }

    /// Returns true once startup rehydration has finished.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Rehydrating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teacher_session() -> Session {
        Session::new(
            Credential::new("tok_teacher"),
            UserIdentity::new("ms.lee", Role::Teacher),
        )
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("super-secret");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn credential_bearer_header() {
        let credential = Credential::new("abc");
        assert_eq!(credential.bearer_header(), "Bearer abc");
    }

    #[test]
    fn blank_credential_detection() {
        assert!(Credential::new("  ").is_blank());
        assert!(!Credential::new("x").is_blank());
    }

    #[test]
    fn anonymous_state_has_no_user_or_credential() {
        let state = SessionState::anonymous();
        assert!(state.user().is_none());
        assert!(state.credential().is_none());
        assert!(!state.is_admin());
        assert!(state.is_settled());
    }

    #[test]
    fn authenticated_state_exposes_both_halves() {
        let state = SessionState::Authenticated(teacher_session());
        assert_eq!(state.user().map(|u| u.username.as_str()), Some("ms.lee"));
        assert_eq!(state.credential().map(Credential::as_str), Some("tok_teacher"));
        assert!(!state.is_admin());
    }

    #[test]
    fn rehydrating_is_not_settled() {
        assert!(!SessionState::Rehydrating.is_settled());
        assert_eq!(SessionState::default(), SessionState::Rehydrating);
    }

    #[test]
    fn user_identity_wire_format() {
        let user = UserIdentity::new("admin", Role::Admin);
        let json = serde_json::to_value(&user).expect("serialize");
        assert_eq!(json, serde_json::json!({"username": "admin", "role": "ADMIN"}));
    }
}
