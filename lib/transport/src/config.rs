//! Transport configuration.
//!
//! Supplied once at startup and immutable afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the backend connection.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Base address of the REST API, e.g. "https://registrar.example.edu/api".
    base_url: String,
    /// Per-request timeout in seconds.
    /// Default: 10
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    /// Headers sent with every request.
    #[serde(default)]
    default_headers: HashMap<String, String>,
    /// Path of the login endpoint, relative to the base address.
    /// Default: "/login"
    #[serde(default = "default_login_path")]
    login_path: String,
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_login_path() -> String {
    "/login".to_string()
}

impl TransportConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: default_timeout_seconds(),
            default_headers: HashMap::new(),
            login_path: default_login_path(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Adds a default header.
    #[must_use]
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Sets the login endpoint path.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Returns the API base address.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Returns the headers sent with every request.
    #[must_use]
    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    /// Returns the login endpoint path.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}
