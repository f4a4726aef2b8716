use std::fmt;
use std::time::Duration;

use gm_core::CoreError;

/// Transport-level failures. Callers of [`crate::GraphSession::fetch_graph`]
/// never see these; they are logged and turned into "no data".
#[derive(Debug)]
pub enum SessionError {
    Unavailable,
    Timeout(Duration),
    Transport(String),
    Protocol(serde_json::Error),
    Config(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unavailable => write!(f, "graph socket unavailable"),
            SessionError::Timeout(d) => write!(f, "no graph response within {}ms", d.as_millis()),
            SessionError::Transport(msg) => write!(f, "socket error: {msg}"),
            SessionError::Protocol(e) => write!(f, "malformed message: {e}"),
            SessionError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Protocol(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failure of a full annotation load.
#[derive(Debug)]
pub enum LoadError {
    Derivation(CoreError),
    Cancelled,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Derivation(e) => write!(f, "derivation failed: {e}"),
            LoadError::Cancelled => write!(f, "annotation load cancelled"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Derivation(e) => Some(e),
            LoadError::Cancelled => None,
        }
    }
}

impl From<CoreError> for LoadError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Cancelled => LoadError::Cancelled,
            other => LoadError::Derivation(other),
        }
    }
}
