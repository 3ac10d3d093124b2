//! Errors surfaced to the console user.

use std::fmt;

/// Why a console command failed.
#[derive(Debug)]
pub enum ConsoleError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The transport could not be built.
    Transport { details: String },
    /// The server refused the login or could not be reached.
    Login { details: String },
    /// No one is signed in.
    NotSignedIn,
    /// The signed-in role may not open this resource.
    AdminRequired { resource: String },
    /// Unknown resource name on the command line.
    UnknownResource { name: String },
    /// Loading the list failed.
    List { details: String },
    /// A row could not be printed.
    Output { details: String },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Transport { details } => write!(f, "cannot reach backend: {details}"),
            Self::Login { details } => write!(f, "login failed: {details}"),
            Self::NotSignedIn => write!(f, "not signed in; run `login` first"),
            Self::AdminRequired { resource } => {
                write!(f, "'{resource}' is restricted to administrators")
            }
            Self::UnknownResource { name } => write!(f, "unknown resource '{name}'"),
            Self::List { details } => write!(f, "could not load list: {details}"),
            Self::Output { details } => write!(f, "could not print row: {details}"),
        }
    }
}

impl std::error::Error for ConsoleError {}
