//! Extraction Error Types
//!
//! Errors raised while parsing identifiers or walking a binary package. They
//! are all tied to the bytes in front of us, so none of them are retryable.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The container holds members, but not the `<pv>-<build_id>/gpkg-1`
    /// marker (or the marker only appears after the image).
    #[display("missing package identifier: expected {_0}")]
    MissingPackageIdentifier(#[error(not(source))] String),
    /// The outer container or inner image is not a readable tar archive.
    #[display("malformed archive")]
    Archive,
    /// The image member could not be decompressed.
    #[display("unreadable image compression")]
    Compression,
    /// A `<category>/<package>-<version>-<build_id>` string is malformed.
    #[display("invalid cpvb: {_0}")]
    InvalidCpvb(#[error(not(source))] String),
    /// A `<machine>/<build_id>/<category>/<package>-<version>-<build_id>` string is malformed.
    #[display("invalid package spec: {_0}")]
    InvalidPkgSpec(#[error(not(source))] String),
    /// A `<machine>.<build_id>` string is malformed.
    #[display("invalid build: {_0}")]
    InvalidBuild(#[error(not(source))] String),
    /// A value is outside the range the data model can represent.
    #[display("invalid data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The archive is either readable or it isn't; reading it again
        // won't change that.
        false
    }
}
