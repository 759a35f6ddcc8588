//! Index Error Types
//!
//! Everything here wraps a failure from one of the collaborators, so the
//! variants say which one gave up. The underlying error stays attached as
//! the child of the [`Exn`](exn::Exn) tree.

use derive_more::{Display, Error};

/// An indexing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for indexing operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The build store could not list or open a build's packages.
    #[display("build store error")]
    Storage,
    /// A package archive could not be read or its entries normalized.
    #[display("package extraction error")]
    Extract,
    /// The content file repository rejected a read or write.
    #[display("content file records error")]
    Records,
    /// The statistics cache could not be read or written.
    #[display("cache error")]
    Cache,
    /// A background task panicked or was cancelled.
    #[display("background task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Records | Self::Cache)
    }
}
