//! Read-only access to builds held by the build publisher.
//!
//! The indexer never writes here: it asks a [`BuildStore`] which builds
//! exist, which packages a build contains, and for a reader over each
//! package archive.

pub mod backend;
pub mod error;
mod packages;
mod path;

pub use crate::backend::BuildStore;
pub use crate::packages::parse as parse_packages;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type StoreHandle = Arc<dyn BuildStore + Send + Sync>;
