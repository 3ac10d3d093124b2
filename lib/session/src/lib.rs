//! Session lifecycle and route authorization for the registrar console.
//!
//! This crate provides:
//! - Identity types (`Role`, `UserIdentity`, `Credential`, `Session`)
//! - The process-wide `SessionStore` with durable persistence
//! - The authorization guard consulted on every navigation
//!
//! # Access Control Model
//!
//! Every console route requires a signed-in user. Some routes are further
//! restricted to administrators; teachers hitting those are sent back to the
//! default route instead of the login page.
//!
//! # Example
//!
//! ```
//! use registrar_session::{
//!     Credential, GuardDecision, Role, Session, SessionState, UserIdentity, decide,
//! };
//!
//! let session = Session::new(
//!     Credential::new("opaque-token"),
//!     UserIdentity::new("ms.lee", Role::Teacher),
//! );
//! let state = SessionState::Authenticated(session);
//!
//! assert_eq!(decide(&state, false), GuardDecision::Render);
//! assert_eq!(decide(&state, true), GuardDecision::RedirectToDefault);
//! ```

pub mod error;
pub mod guard;
pub mod role;
pub mod session;
pub mod storage;
pub mod store;

// Re-export main types at crate root
pub use error::{AuthError, StorageError};
pub use guard::{GuardDecision, Navigator, Redirect, Route, RouteAccess, decide};
pub use role::Role;
pub use session::{Credential, EndReason, Session, SessionState, UserIdentity};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, TOKEN_KEY, USER_KEY};
pub use store::{Authenticator, LoginGrant, SessionStore};
