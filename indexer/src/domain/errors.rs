use thiserror::Error;

use crate::domain::types::Height;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::source::SourceError;

/// Error decoding an event or system event payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("incompatible event type: {section}.{method}")]
    IncompatibleType { section: String, method: String },
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Error type for the indexing pipeline
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Block source error: {0}")]
    Source(#[from] SourceError),
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Invariant violated at height {height}: {reason}")]
    Invariant { height: Height, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("run cancelled")]
    Cancelled,
    #[error("run interrupted before completion")]
    Interrupted,
}

impl IndexerError {
    pub fn invariant(height: Height, reason: impl Into<String>) -> Self {
        IndexerError::Invariant {
            height,
            reason: reason.into(),
        }
    }

    /// Fatal errors abort the whole run; everything else only fails one height
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexerError::Db(_) | IndexerError::Invariant { .. } | IndexerError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_invariant_and_cancel_are_fatal() {
        assert!(IndexerError::invariant(5, "boom").is_fatal());
        assert!(IndexerError::Db(DbError::Other("down".into())).is_fatal());
        assert!(IndexerError::Cancelled.is_fatal());
        assert!(!IndexerError::Interrupted.is_fatal());
        assert!(!IndexerError::Validation("bad".into()).is_fatal());
        assert!(!IndexerError::Source(SourceError::Transient("timeout".into())).is_fatal());
        assert!(!IndexerError::Decode(DecodeError::MissingField("AccountId".into())).is_fatal());
    }
}
