//! [`ContentFiles`](crate::ContentFiles) implementations.

mod memory;
mod sqlite;

pub use self::memory::MemoryRepository;
pub use self::sqlite::{MAX_BATCH_SIZE, SqliteRepository};
