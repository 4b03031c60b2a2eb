use thiserror::Error;

use crate::domain::types::Height;

/// Represents errors that can occur while fetching chain data
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// Network failure or timeout, worth retrying
    #[error("Transient source error: {0}")]
    Transient(String),
    /// Requested height is above the chain head
    #[error("Height {0} not found")]
    NotFound(Height),
    /// Worker answered with something we cannot decode
    #[error("Malformed source response: {0}")]
    Decode(String),
    /// Client could not be built
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            SourceError::Decode(error.to_string())
        } else {
            SourceError::Transient(error.to_string())
        }
    }
}
