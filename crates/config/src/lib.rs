//! Configuration loading and validation.
//!
//! Settings are layered with [`figment`], later sources overriding earlier ones:
//!
//! 1. Built-in defaults ([`Settings::default`]).
//! 2. A TOML file: the path given on the command line, or else
//!    `config.toml` in the platform configuration directory (optional).
//! 3. Environment variables prefixed with `GBP_FL_`, using `__` to descend
//!    into sections (`GBP_FL_RECORDS__BACKEND=memory`).
//!
//! ```toml
//! [records]
//! backend = "sqlite"
//! database = "/var/lib/gbp-fl/files.sqlite"
//! bulk_batch_size = 100
//! max_connections = 5
//!
//! [storage]
//! root = "/var/lib/gentoo-build-publisher"
//!
//! [index]
//! concurrency = 8
//!
//! [stats]
//! ttl_secs = 3600
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "GBP_FL_";
const CONFIG_FILE_NAME: &str = "config.toml";
const DATABASE_FILE_NAME: &str = "gbp-fl.sqlite";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "gbp-fl")
}

/// Location of the configuration file consulted when none is given explicitly.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Which [`ContentFiles`](https://docs.rs/gbpfl-records) implementation to
/// construct at start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordsBackend {
    /// Persistent SQLite database at [`RecordsConfig::database`].
    #[default]
    Sqlite,
    /// Volatile in-process storage; everything is lost on exit.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    pub backend: RecordsBackend,
    /// SQLite database file (created if missing). Ignored by the memory backend.
    pub database: PathBuf,
    /// Number of records per multi-row `INSERT` during bulk saves.
    pub bulk_batch_size: usize,
    /// Size of the SQLite connection pool.
    pub max_connections: u32,
}
impl Default for RecordsConfig {
    fn default() -> Self {
        let database = project_dirs()
            .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME));
        Self { backend: RecordsBackend::default(), database, bulk_batch_size: 100, max_connections: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the build publisher's storage (contains `binpkgs/`).
    pub root: PathBuf,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("/var/lib/gentoo-build-publisher") }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Maximum number of packages extracted at the same time for one build.
    pub concurrency: usize,
}
impl Default for IndexConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// How long computed file statistics stay cached.
    pub ttl_secs: u64,
}
impl Default for StatsConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}
impl StatsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub records: RecordsConfig,
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub stats: StatsConfig,
}
impl Settings {
    /// Build the layered [`Figment`] without extracting it.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Settings::default()));
        let figment = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => figment.merge(Toml::file(path)),
            None => match default_config_path() {
                Some(default) => figment.merge(Toml::file(default)),
                None => figment,
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings: Settings = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        tracing::debug!(?settings, "configuration loaded");
        Ok(settings)
    }

    /// Reject values that would make the indexer or repository unusable.
    pub fn validate(&self) -> Result<()> {
        if self.records.bulk_batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("records.bulk_batch_size must be at least 1".to_string()));
        }
        if self.records.max_connections == 0 {
            exn::bail!(ErrorKind::Invalid("records.max_connections must be at least 1".to_string()));
        }
        if self.index.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("index.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}
