//! The process-wide session store.
//!
//! `SessionStore` is the only owner of authentication state. Readers (the
//! transport, the guard, views) hold a cheap clone and either read the
//! current state or subscribe to transitions. Mutation goes through exactly
//! one method per transition: `login`, `logout`, `expire`, and the
//! transport's `invalidate_credential`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, StorageError};
use crate::session::{Credential, EndReason, Session, SessionState, UserIdentity};
use crate::storage::{SessionStorage, TOKEN_KEY, USER_KEY};

/// What a successful login returns.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginGrant {
    /// The bearer token for subsequent requests.
    pub token: Credential,
    /// The identity the token belongs to.
    pub user: UserIdentity,
}

/// Exchanges a username and password for a login grant.
///
/// Implemented by the transport's login endpoint; tests substitute fakes.
/// Implementations must call the endpoint unauthenticated.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Performs the login call.
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<LoginGrant, AuthError>;
}

struct StoreInner {
    state: watch::Sender<SessionState>,
    storage: Arc<dyn SessionStorage>,
}

/// Shared handle to the session state.
///
/// Cloning is cheap; all clones observe and mutate the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    /// Creates a store in the `Rehydrating` state.
    ///
    /// Call [`rehydrate`](Self::rehydrate) to load the persisted entries.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let (state, _) = watch::channel(SessionState::Rehydrating);
        Self {
            inner: Arc::new(StoreInner { state, storage }),
        }
    }

    /// Creates a store and rehydrates it from storage.
    pub async fn open(storage: Arc<dyn SessionStorage>) -> Self {
        let store = Self::new(storage);
        store.rehydrate().await;
        store
    }

    /// Loads the persisted session, if any.
    ///
    /// A missing, partial, or malformed pair leaves the store anonymous and
    /// scrubs whatever was left behind. Only has an effect while the store
    /// is still `Rehydrating`.
    #[instrument(skip(self))]
    pub async fn rehydrate(&self) {
        let restored = match self.read_persisted().await {
            Ok(restored) => restored,
            Err(e) => {
                warn!(error = %e, "failed to read persisted session, starting anonymous");
                None
            }
        };

        let applied = self.inner.state.send_if_modified(|state| {
            if !matches!(state, SessionState::Rehydrating) {
                return false;
            }
            *state = match &restored {
                Some(session) => SessionState::Authenticated(session.clone()),
                None => SessionState::anonymous(),
            };
            true
        });

        match (&restored, applied) {
            (Some(session), true) => {
                info!(username = %session.user().username, role = %session.user().role, "restored session");
            }
            (None, true) => debug!("no persisted session"),
            (_, false) => debug!("store already settled, rehydration ignored"),
        }
    }

    /// Signs in.
    ///
    /// On success the credential and identity are installed in one
    /// transition and persisted. On failure the prior state is left as it
    /// was and the server's reason is returned.
    #[instrument(skip(self, authenticator, password))]
    pub async fn login(
        &self,
        authenticator: &dyn Authenticator,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let mut prior_end = None;
        self.inner.state.send_if_modified(|state| {
            if let SessionState::Anonymous { ended } = *state {
                prior_end = ended;
                *state = SessionState::Authenticating;
                true
            } else {
                false
            }
        });

        let grant = authenticator
            .authenticate(username, password)
            .await
            .and_then(|grant| {
                if grant.token.is_blank() {
                    Err(AuthError::InvalidGrant {
                        reason: "empty token".to_string(),
                    })
                } else {
                    Ok(grant)
                }
            });

        let grant = match grant {
            Ok(grant) => grant,
            Err(e) => {
                self.inner.state.send_if_modified(|state| {
                    if matches!(state, SessionState::Authenticating) {
                        *state = SessionState::Anonymous { ended: prior_end };
                        true
                    } else {
                        false
                    }
                });
                info!(error = %e, "login failed");
                return Err(e);
            }
        };

        let session = Session::new(grant.token, grant.user);
        self.inner
            .state
            .send_replace(SessionState::Authenticated(session.clone()));
        info!(username = %session.user().username, role = %session.user().role, "signed in");

        if let Err(e) = self.write_persisted(&session).await {
            warn!(error = %e, "failed to persist session, it will not survive a restart");
            self.clear_persisted().await;
        } else if self.credential().as_ref() != Some(session.credential()) {
            // Ended while the entries were being written.
            self.clear_persisted().await;
        }

        Ok(session)
    }

    /// Signs out. Calling it while anonymous does nothing.
    pub async fn logout(&self) {
        self.invalidate(EndReason::LoggedOut).await;
    }

    /// Ends the session because expiry was detected.
    pub async fn expire(&self) {
        self.invalidate(EndReason::Expired).await;
    }

    /// Ends the current session, whatever credential it holds.
    ///
    /// Returns true if a session was ended.
    pub async fn invalidate(&self, reason: EndReason) -> bool {
        let ended = self.inner.state.send_if_modified(|state| {
            if state.is_authenticated() {
                *state = SessionState::Anonymous {
                    ended: Some(reason),
                };
                true
            } else {
                false
            }
        });
        self.finish_invalidation(ended, reason).await;
        ended
    }

    /// Ends the session only if it still holds `credential`.
    ///
    /// Used when a request fails with 401: a late failure from a request
    /// sent with an older credential must not end a newer session.
    pub async fn invalidate_credential(&self, credential: &Credential, reason: EndReason) -> bool {
        let ended = self.inner.state.send_if_modified(|state| {
            if state.credential() == Some(credential) {
                *state = SessionState::Anonymous {
                    ended: Some(reason),
                };
                true
            } else {
                false
            }
        });
        self.finish_invalidation(ended, reason).await;
        ended
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Returns the current credential, if signed in.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.inner.state.borrow().credential().cloned()
    }

    /// Returns true if signed in as an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.inner.state.borrow().is_admin()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    async fn finish_invalidation(&self, ended: bool, reason: EndReason) {
        if !ended {
            debug!(%reason, "no session to end");
            return;
        }
        match reason {
            EndReason::LoggedOut => info!("signed out"),
            EndReason::Unauthorized | EndReason::Expired => {
                warn!(%reason, "session ended by the server");
            }
        }
        self.clear_persisted().await;
    }

    async fn read_persisted(&self) -> Result<Option<Session>, StorageError> {
        let storage = &self.inner.storage;
        let token = storage.read(TOKEN_KEY).await?;
        let user = storage.read(USER_KEY).await?;

        let restored = match (token, user) {
            (None, None) => return Ok(None),
            (Some(token), Some(user)) => {
                let credential = Credential::new(token);
                match serde_json::from_str::<UserIdentity>(&user) {
                    Ok(user) if !credential.is_blank() => Some(Session::new(credential, user)),
                    Ok(_) => None,
                    Err(e) => {
                        debug!(error = %e, "persisted user entry is malformed");
                        None
                    }
                }
            }
            _ => None,
        };

        if restored.is_none() {
            warn!("discarding incomplete persisted session");
            self.clear_persisted().await;
        }
        Ok(restored)
    }

    async fn write_persisted(&self, session: &Session) -> Result<(), StorageError> {
        let user = serde_json::to_string(session.user()).map_err(|e| StorageError::WriteFailed {
            key: USER_KEY.to_string(),
            reason: e.to_string(),
        })?;
        let storage = &self.inner.storage;
        storage
            .write(TOKEN_KEY, session.credential().as_str())
            .await?;
        storage.write(USER_KEY, &user).await
    }

    async fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.inner.storage.remove(key).await {
                warn!(error = %e, "failed to remove persisted session entry");
            }
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    /// Accepts `admin/secret` and `teacher/secret`, refuses everything else.
    struct FakeAuthenticator {
        calls: Mutex<u32>,
    }

    impl FakeAuthenticator {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Authenticator for FakeAuthenticator {
        async fn authenticate(
            &self,
            username: &str,
            password: &str,
        ) -> Result<LoginGrant, AuthError> {
            *self.calls.lock().unwrap() += 1;
            let role = match (username, password) {
                ("admin", "secret") => Role::Admin,
                ("teacher", "secret") => Role::Teacher,
                ("blank", _) => {
                    return Ok(LoginGrant {
                        token: Credential::new(""),
                        user: UserIdentity::new("blank", Role::Teacher),
                    });
                }
                _ => {
                    return Err(AuthError::Rejected {
                        message: "bad credentials".to_string(),
                    });
                }
            };
            Ok(LoginGrant {
                token: Credential::new(format!("tok_{username}")),
                user: UserIdentity::new(username, role),
            })
        }
    }

    async fn memory_store() -> (SessionStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::open(storage.clone()).await;
        (store, storage)
    }

    #[tokio::test]
    async fn login_sets_credential_and_user_together() {
        let (store, storage) = memory_store().await;
        let auth = FakeAuthenticator::new();

        let session = store.login(&auth, "admin", "secret").await.unwrap();

        assert_eq!(session.credential().as_str(), "tok_admin");
        assert_eq!(session.user().role, Role::Admin);
        assert_eq!(store.current(), SessionState::Authenticated(session));
        assert!(store.is_admin());

        let persisted = storage.snapshot();
        assert_eq!(persisted.get(TOKEN_KEY).map(String::as_str), Some("tok_admin"));
        let user: UserIdentity = serde_json::from_str(&persisted[USER_KEY]).unwrap();
        assert_eq!(user, UserIdentity::new("admin", Role::Admin));
    }

    #[tokio::test]
    async fn failed_login_returns_server_message_and_keeps_state() {
        let (store, storage) = memory_store().await;
        let auth = FakeAuthenticator::new();

        let err = store.login(&auth, "admin", "wrong").await.unwrap_err();

        assert_eq!(
            err,
            AuthError::Rejected {
                message: "bad credentials".to_string()
            }
        );
        assert_eq!(store.current(), SessionState::anonymous());
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn failed_relogin_keeps_existing_session() {
        let (store, _storage) = memory_store().await;
        let auth = FakeAuthenticator::new();
        let session = store.login(&auth, "teacher", "secret").await.unwrap();

        store.login(&auth, "admin", "wrong").await.unwrap_err();

        assert_eq!(store.current(), SessionState::Authenticated(session));
    }

    #[tokio::test]
    async fn failed_login_after_rejection_keeps_end_reason() {
        let (store, _storage) = memory_store().await;
        let auth = FakeAuthenticator::new();
        store.login(&auth, "teacher", "secret").await.unwrap();
        let credential = store.credential().unwrap();
        store
            .invalidate_credential(&credential, EndReason::Unauthorized)
            .await;

        store.login(&auth, "teacher", "wrong").await.unwrap_err();

        assert_eq!(
            store.current(),
            SessionState::Anonymous {
                ended: Some(EndReason::Unauthorized)
            }
        );
    }

    #[tokio::test]
    async fn blank_token_is_an_invalid_grant() {
        let (store, storage) = memory_store().await;
        let auth = FakeAuthenticator::new();

        let err = store.login(&auth, "blank", "x").await.unwrap_err();

        assert!(matches!(err, AuthError::InvalidGrant { .. }));
        assert!(!store.current().is_authenticated());
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn logout_clears_state_and_storage() {
        let (store, storage) = memory_store().await;
        let auth = FakeAuthenticator::new();
        store.login(&auth, "admin", "secret").await.unwrap();

        store.logout().await;

        assert_eq!(
            store.current(),
            SessionState::Anonymous {
                ended: Some(EndReason::LoggedOut)
            }
        );
        assert!(!store.is_admin());
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn logout_when_anonymous_is_noop() {
        let (store, _storage) = memory_store().await;
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.logout().await;

        assert_eq!(store.current(), SessionState::anonymous());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn invalidate_credential_ignores_stale_credential() {
        let (store, _storage) = memory_store().await;
        let auth = FakeAuthenticator::new();
        store.login(&auth, "teacher", "secret").await.unwrap();
        let old = store.credential().unwrap();
        store.logout().await;
        let session = store.login(&auth, "admin", "secret").await.unwrap();

        let ended = store
            .invalidate_credential(&old, EndReason::Unauthorized)
            .await;

        assert!(!ended);
        assert_eq!(store.current(), SessionState::Authenticated(session));
    }

    #[tokio::test]
    async fn invalidate_credential_ends_matching_session() {
        let (store, storage) = memory_store().await;
        let auth = FakeAuthenticator::new();
        store.login(&auth, "teacher", "secret").await.unwrap();
        let current = store.credential().unwrap();

        let ended = store
            .invalidate_credential(&current, EndReason::Unauthorized)
            .await;

        assert!(ended);
        assert_eq!(store.current().user(), None);
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let (store, _storage) = memory_store().await;
        let auth = FakeAuthenticator::new();
        let mut rx = store.subscribe();

        store.login(&auth, "admin", "secret").await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_admin());

        store.expire().await;
        rx.changed().await.unwrap();
        assert_eq!(
            *rx.borrow_and_update(),
            SessionState::Anonymous {
                ended: Some(EndReason::Expired)
            }
        );
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn rehydrate_restores_complete_pair() {
        let user = serde_json::to_string(&UserIdentity::new("ms.lee", Role::Teacher)).unwrap();
        let storage = Arc::new(MemoryStorage::with_entries([
            (TOKEN_KEY, "tok_saved".to_string()),
            (USER_KEY, user),
        ]));
        let store = SessionStore::new(storage);
        assert_eq!(store.current(), SessionState::Rehydrating);

        store.rehydrate().await;

        let state = store.current();
        assert_eq!(state.credential().map(Credential::as_str), Some("tok_saved"));
        assert_eq!(state.user().map(|u| u.role), Some(Role::Teacher));
    }

    #[tokio::test]
    async fn rehydrate_with_token_only_fails_closed() {
        let storage = Arc::new(MemoryStorage::with_entries([(TOKEN_KEY, "tok_orphan")]));
        let store = SessionStore::open(storage.clone()).await;

        assert_eq!(store.current(), SessionState::anonymous());
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn rehydrate_with_user_only_fails_closed() {
        let storage = Arc::new(MemoryStorage::with_entries([(
            USER_KEY,
            r#"{"username":"x","role":"ADMIN"}"#,
        )]));
        let store = SessionStore::open(storage.clone()).await;

        assert_eq!(store.current(), SessionState::anonymous());
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn rehydrate_with_malformed_user_fails_closed() {
        let storage = Arc::new(MemoryStorage::with_entries([
            (TOKEN_KEY, "tok"),
            (USER_KEY, r#"{"username":"x","role":"JANITOR"}"#),
        ]));
        let store = SessionStore::open(storage.clone()).await;

        assert!(!store.current().is_authenticated());
        assert!(storage.snapshot().is_empty());
    }

    #[tokio::test]
    async fn rehydrate_after_login_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(storage);
        let auth = FakeAuthenticator::new();
        let session = store.login(&auth, "admin", "secret").await.unwrap();

        store.rehydrate().await;

        assert_eq!(store.current(), SessionState::Authenticated(session));
    }

    #[tokio::test]
    async fn session_survives_restart_with_file_storage() {
        let dir = tempfile::tempdir().unwrap();
        let auth = FakeAuthenticator::new();
        {
            let storage = Arc::new(crate::storage::FileStorage::new(dir.path()));
            let store = SessionStore::open(storage).await;
            store.login(&auth, "admin", "secret").await.unwrap();
        }

        let storage = Arc::new(crate::storage::FileStorage::new(dir.path()));
        let store = SessionStore::open(storage).await;

        assert!(store.is_admin());
        assert_eq!(store.credential(), Some(Credential::new("tok_admin")));
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        LoginAdmin,
        LoginTeacher,
        LoginBad,
        Logout,
        Unauthorized,
        Expire,
    }

    const OPS: [Op; 6] = [
        Op::LoginAdmin,
        Op::LoginTeacher,
        Op::LoginBad,
        Op::Logout,
        Op::Unauthorized,
        Op::Expire,
    ];

    async fn apply(store: &SessionStore, auth: &FakeAuthenticator, op: Op) {
        match op {
            Op::LoginAdmin => {
                let _ = store.login(auth, "admin", "secret").await;
            }
            Op::LoginTeacher => {
                let _ = store.login(auth, "teacher", "secret").await;
            }
            Op::LoginBad => {
                let _ = store.login(auth, "admin", "nope").await;
            }
            Op::Logout => store.logout().await,
            Op::Unauthorized => {
                if let Some(credential) = store.credential() {
                    store
                        .invalidate_credential(&credential, EndReason::Unauthorized)
                        .await;
                }
            }
            Op::Expire => store.expire().await,
        }
    }

    #[tokio::test]
    async fn user_present_iff_credential_present_for_all_sequences() {
        const DEPTH: u32 = 4;
        let total = OPS.len().pow(DEPTH);

        for mut n in 0..total {
            let (store, storage) = memory_store().await;
            let auth = FakeAuthenticator::new();
            let mut trace = Vec::new();

            for _ in 0..DEPTH {
                let op = OPS[n % OPS.len()];
                n /= OPS.len();
                trace.push(op);
                apply(&store, &auth, op).await;

                let state = store.current();
                assert_eq!(
                    state.user().is_some(),
                    state.credential().is_some(),
                    "in-memory halves diverged after {trace:?}"
                );

                let persisted = storage.snapshot();
                assert_eq!(
                    persisted.contains_key(TOKEN_KEY),
                    persisted.contains_key(USER_KEY),
                    "persisted halves diverged after {trace:?}"
                );
                assert_eq!(
                    persisted.contains_key(TOKEN_KEY),
                    state.is_authenticated(),
                    "storage out of sync with state after {trace:?}"
                );
            }
        }
    }
}
