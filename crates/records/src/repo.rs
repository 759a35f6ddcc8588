//! The repository contract every backend implements.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use gbpfl_extract::models::{Build, ContentFile};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use time::OffsetDateTime;

pub type ContentFileStream<'a> = Pin<Box<dyn Stream<Item = Result<ContentFile>> + Send + 'a>>;

/// Fields to replace when [saving](ContentFiles::save) a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOverrides {
    pub path: Option<PathBuf>,
    pub size: Option<u64>,
    pub timestamp: Option<OffsetDateTime>,
}
impl FileOverrides {
    pub fn apply(self, mut file: ContentFile) -> ContentFile {
        if let Some(path) = self.path {
            file.path = path;
        }
        if let Some(size) = self.size {
            file.size = size;
        }
        if let Some(timestamp) = self.timestamp {
            file.timestamp = timestamp;
        }
        file
    }
}

/// Storage and queries for [`ContentFile`] records.
///
/// A record's identity is `(machine, build_id, cpvb, path)`. All operations
/// are safe to call concurrently; the streaming queries are lazy and hold
/// whatever the backend needs (a connection, a snapshot) until dropped.
#[async_trait]
pub trait ContentFiles: Send + Sync {
    /// Name of the backend, for logging.
    fn name(&self) -> &str;

    /// Store `file` with `overrides` applied, replacing the record that had
    /// `file`'s identity if there was one. Returns what was stored.
    async fn save(&self, file: &ContentFile, overrides: FileOverrides) -> Result<ContentFile>;

    /// Store many records in one transaction. Existing records with the same
    /// identity are replaced, so indexing the same package twice is harmless.
    async fn bulk_save(&self, files: &[ContentFile]) -> Result<()>;

    /// Fails with [`RecordNotFound`](crate::error::ErrorKind::RecordNotFound).
    async fn get(&self, machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<ContentFile>;

    /// Fails with [`RecordNotFound`](crate::error::ErrorKind::RecordNotFound).
    async fn delete(&self, file: &ContentFile) -> Result<()>;

    /// Remove every record of a build, returning how many there were.
    /// Removing a build that has no records is not an error.
    async fn deindex_build(&self, machine: &str, build_id: &str) -> Result<u64>;

    async fn exists(&self, machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<bool>;

    /// Count records, narrowed left to right by machine, build and package.
    ///
    /// Returns [`InvalidQuery`](crate::error::ErrorKind::InvalidQuery) when a
    /// level is given without the one before it (see [`CountFilter`](crate::CountFilter)).
    async fn count(&self, machine: Option<&str>, build_id: Option<&str>, cpvb: Option<&str>) -> Result<u64>;

    fn for_package<'a>(&'a self, machine: &'a str, build_id: &'a str, cpvb: &'a str) -> ContentFileStream<'a>;

    fn for_build<'a>(&'a self, machine: &'a str, build_id: &'a str) -> ContentFileStream<'a>;

    fn for_machine<'a>(&'a self, machine: &'a str) -> ContentFileStream<'a>;

    /// Every build with at least one record.
    async fn get_builds(&self) -> Result<HashSet<Build>>;

    /// Search records by path or basename; see [`SearchKey`](crate::SearchKey)
    /// for the key syntax. `machines`, when given, restricts results to those
    /// machines.
    fn search<'a>(&'a self, key: &'a str, machines: Option<&'a [String]>) -> ContentFileStream<'a>;
}
