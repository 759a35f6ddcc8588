//! Keeping the content file index in step with the build publisher.
//!
//! - [`Indexer`] extracts a build's packages into the repository, and
//!   removes them again when the build goes away.
//! - [`signals`] turns pulled/deleted announcements into indexing tasks.
//! - [`checks`] compares what the store has with what is indexed.
//! - [`stats`] counts what is indexed, behind a [`cache`].

pub mod cache;
pub mod checks;
pub mod error;
mod index;
pub mod signals;
pub mod stats;

pub use crate::index::{DEFAULT_CONCURRENCY, IndexEvent, IndexReport, Indexer};
pub use crate::stats::{FileStats, MachineStats, Stats};
