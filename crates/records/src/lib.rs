//! Storage and queries for the files installed by binary packages.
//!
//! Every file found in a package's image becomes one [`ContentFile`] record,
//! identified by `(machine, build_id, cpvb, path)`. This crate stores those
//! records behind the [`ContentFiles`] trait, with two backends:
//!
//! - [`SqliteRepository`]: a SQLite database (WAL mode, embedded migrations),
//!   the one to use for anything that should survive a restart.
//! - [`MemoryRepository`]: a sorted map, for tests and throwaway runs.
//!
//! Both order their streaming results by `(machine, build_id, cpvb, path)`
//! and agree on the meaning of [count filters](CountFilter) and
//! [search keys](SearchKey).
//!
//! [`ContentFile`]: gbpfl_extract::models::ContentFile

mod backend;
mod db;
pub mod error;
mod filter;
mod models;
mod repo;

pub use crate::backend::{MAX_BATCH_SIZE, MemoryRepository, SqliteRepository};
pub use crate::db::Database;
pub use crate::filter::{CountFilter, SearchKey};
pub use crate::repo::{ContentFileStream, ContentFiles, FileOverrides};
use crate::error::Result;
use gbpfl_config::{RecordsBackend, RecordsConfig};
use std::sync::Arc;

/// A shared, type-erased repository.
pub type RepositoryHandle = Arc<dyn ContentFiles + Send + Sync>;

/// Construct the repository selected by `config`.
///
/// For SQLite, the database's parent directory is created if needed.
pub async fn open(config: &RecordsConfig) -> Result<RepositoryHandle> {
    let repo: RepositoryHandle = match config.backend {
        RecordsBackend::Memory => Arc::new(MemoryRepository::default()),
        RecordsBackend::Sqlite => {
            let db = Database::connect(&config.database, config.max_connections).await?;
            Arc::new(SqliteRepository::new(db, config.bulk_batch_size))
        },
    };
    tracing::debug!(backend = repo.name(), "opened content file records");
    Ok(repo)
}
