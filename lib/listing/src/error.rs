//! List loading errors.

use registrar_transport::TransportError;
use std::fmt;

/// Why a load produced no page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// The fetch failed; the previous page is still shown.
    Transport(TransportError),
    /// A newer load was issued before this one finished; its result was
    /// discarded.
    Superseded { sequence: u64 },
}

impl ListError {
    /// Returns true if the load was discarded in favour of a newer one.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}

impl fmt::Display for ListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(error) => write!(f, "list request failed: {error}"),
            Self::Superseded { sequence } => {
                write!(f, "load {sequence} superseded by a newer request")
            }
        }
    }
}

impl std::error::Error for ListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(error) => Some(error),
            Self::Superseded { .. } => None,
        }
    }
}

impl From<TransportError> for ListError {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}
