//! Error types for the relay core.
//!
//! Resolution failures carry the label and match count so that callers can
//! log "nothing found" and "too many found" as distinct conditions.

use thiserror::Error;

/// Error type for identity resolution failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No directory match for '{label}'")]
    NotFound { label: String },

    #[error("Ambiguous directory match for '{label}': {matches} candidates")]
    Ambiguous { label: String, matches: usize },

    #[error("Directory lookup failed: {0}")]
    Lookup(String),
}

impl ResolutionError {
    pub fn label(&self) -> Option<&str> {
        match self {
            ResolutionError::NotFound { label } | ResolutionError::Ambiguous { label, .. } => {
                Some(label)
            }
            ResolutionError::Lookup(_) => None,
        }
    }

    /// Number of directory candidates that caused the failure (0 for not found).
    pub fn match_count(&self) -> usize {
        match self {
            ResolutionError::NotFound { .. } | ResolutionError::Lookup(_) => 0,
            ResolutionError::Ambiguous { matches, .. } => *matches,
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Malformed command: {0}")]
    Malformed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl From<toml::de::Error> for RelayError {
    fn from(e: toml::de::Error) -> Self {
        RelayError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Transport(format!("JSON error: {}", e))
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(e: redis::RedisError) -> Self {
        RelayError::Store(e.to_string())
    }
}

pub type RelayResult<T> = Result<T, RelayError>;
