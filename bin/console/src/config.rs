//! Console configuration.
//!
//! Loaded once at startup via the `config` crate: an optional TOML file,
//! overridden by `REGISTRAR__`-prefixed environment variables such as
//! `REGISTRAR__TRANSPORT__BASE_URL`.

use registrar_transport::TransportConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// File read when no `--config` is given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "registrar.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    /// Backend connection.
    pub transport: TransportConfig,

    /// Where the session is persisted between runs.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Route paths used for redirects.
    #[serde(default)]
    pub routes: RouteConfig,
}

/// Session persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the session entries.
    /// Default: ".registrar"
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from(".registrar")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

/// Redirect targets.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "default_login_route")]
    pub login: String,
    /// Where users land after signing in, or when their role is too low.
    #[serde(default = "default_route")]
    pub default: String,
}

fn default_login_route() -> String {
    "/login".to_string()
}

fn default_route() -> String {
    "/".to_string()
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login: default_login_route(),
            default: default_route(),
        }
    }
}

impl ConsoleConfig {
    /// Loads the file at `path` (or [`DEFAULT_CONFIG_FILE`]) and the
    /// environment on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("REGISTRAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
