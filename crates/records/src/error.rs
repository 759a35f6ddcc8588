//! Records Error Types

use derive_more::{Display, Error};

/// A records error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for records operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No record has the requested identity.
    #[display("record not found")]
    RecordNotFound,
    /// The query itself is malformed; asking again won't help.
    #[display("invalid query: {_0}")]
    InvalidQuery(#[error(not(source))] String),
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A value can't be represented in (or was corrupted by) storage.
    #[display("invalid record data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // SQLITE_BUSY outlasting the busy timeout is the only transient case.
        matches!(self, Self::Database)
    }
}
