//! Common error types for the league service

use thiserror::Error;

/// Common result type for league operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the league crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding of persisted columns
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested participant or resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Optimistic concurrency check failed on a ledger write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A bulk rollover is already running
    #[error("Rollover already in progress for period {0}")]
    RolloverInProgress(String),

    /// A bulk rollover stopped partway; the journal allows resumption
    #[error("Rollover incomplete: {processed} of {total} participants processed ({reason})")]
    RolloverIncomplete {
        processed: usize,
        total: usize,
        reason: String,
    },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable name used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(_) => "Database",
            Error::Io(_) => "Io",
            Error::Serialization(_) => "Serialization",
            Error::Config(_) => "Config",
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Conflict(_) => "Conflict",
            Error::RolloverInProgress(_) => "RolloverInProgress",
            Error::RolloverIncomplete { .. } => "RolloverIncomplete",
            Error::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollover_incomplete_message_reports_progress() {
        let err = Error::RolloverIncomplete {
            processed: 3,
            total: 10,
            reason: "disk full".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Rollover incomplete: 3 of 10 participants processed (disk full)"
        );
        assert_eq!(err.kind(), "RolloverIncomplete");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Error::NotFound("x".into()).kind(), "NotFound");
        assert_eq!(Error::InvalidInput("x".into()).kind(), "InvalidInput");
        assert_eq!(Error::RolloverInProgress("2026-W01".into()).kind(), "RolloverInProgress");
    }
}
