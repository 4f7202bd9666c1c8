//! Error types for credential-ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Target level is locked: {0}")]
    TargetLocked(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(diesel::result::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// True for the access-denial family (self-review, role, target lock).
    pub fn is_forbidden(&self) -> bool {
        matches!(self, LedgerError::Forbidden(_) | LedgerError::TargetLocked(_))
    }
}

// Lets `?` propagate Diesel errors out of transaction closures while keeping
// the taxonomy: row misses surface as NotFound and unique-key violations as
// Conflict instead of leaking storage detail.
impl From<diesel::result::Error> for LedgerError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::NotFound => LedgerError::NotFound("record not found".to_string()),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                LedgerError::Conflict(info.message().to_string())
            }
            other => LedgerError::Database(other),
        }
    }
}
