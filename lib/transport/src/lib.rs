//! Authenticated HTTP transport for the registrar console.
//!
//! Every request to the student-records backend goes through [`Transport`]:
//! it attaches the session's bearer credential, bounds the call with a
//! timeout, and classifies failures before they reach a page. A 401 on any
//! request other than login ends the session and emits
//! [`Redirect::ToLogin`](registrar_session::Redirect) on the redirect
//! channel; every other failure is informational to the caller.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod login;
pub mod sender;

pub use client::Transport;
pub use config::TransportConfig;
pub use envelope::{ApiResponse, Envelope};
pub use error::TransportError;
pub use sender::{HttpRequest, HttpResponse, HttpSender, ReqwestSender, SendFailure};
