//! Error types for the ledger
//!
//! Business errors are ordinary control flow for callers; system errors
//! indicate a store-level failure and are never reclassified as business
//! errors (or vice versa).

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Account id already taken
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// Account not found
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Participant not registered in the directory
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Applying the amount would drive a non-negative account below zero
    #[error(
        "Insufficient funds in account {account_id}: balance {balance}, attempted {amount}"
    )]
    InsufficientFunds {
        /// First offending account, in caller-supplied entry order
        account_id: String,
        /// Balance before the attempted posting
        balance: i64,
        /// The signed amount that was attempted
        amount: i64,
    },

    /// Malformed request (empty entries, non-positive amount, overflow)
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Persisted record could not be normalized to the current shape
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Unit of work did not commit within the configured bound
    #[error("Commit timed out: {0}")]
    CommitTimeout(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is a caller-correctable business error
    ///
    /// Boundary layers map business errors to specific human-readable
    /// messages and system errors to a generic diagnostic.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Error::AlreadyExists(_)
                | Error::NotFound(_)
                | Error::ParticipantNotFound(_)
                | Error::InsufficientFunds { .. }
                | Error::InvalidTransaction(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_classification() {
        assert!(Error::AlreadyExists("alice".to_string()).is_business());
        assert!(Error::NotFound("alice".to_string()).is_business());
        assert!(Error::ParticipantNotFound("acme".to_string()).is_business());
        assert!(Error::InsufficientFunds {
            account_id: "alice".to_string(),
            balance: 100,
            amount: -500,
        }
        .is_business());
        assert!(Error::InvalidTransaction("empty".to_string()).is_business());

        assert!(!Error::Storage("io".to_string()).is_business());
        assert!(!Error::SchemaMismatch("v0".to_string()).is_business());
        assert!(!Error::CommitTimeout("5s".to_string()).is_business());
        assert!(!Error::Concurrency("closed".to_string()).is_business());
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = Error::InsufficientFunds {
            account_id: "alice".to_string(),
            balance: 100,
            amount: -500,
        };
        let msg = err.to_string();
        assert!(msg.contains("alice"));
        assert!(msg.contains("100"));
        assert!(msg.contains("-500"));
    }
}
