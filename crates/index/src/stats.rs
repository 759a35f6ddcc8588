//! File counts per machine, computed from the repository and cached.
//!
//! Counting every record is a full scan on large indexes, so [`Stats`]
//! keeps the last result in a [`CacheStore`](crate::cache::CacheStore) for a
//! configurable TTL. Indexing and deindexing invalidate it; until then a
//! stale figure is acceptable.

use crate::cache::CacheHandle;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use gbpfl_records::{ContentFiles, RepositoryHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::instrument;

/// Key under which [`FileStats`] are cached, JSON-encoded.
pub const STATS_CACHE_KEY: &str = "gbp-fl-stats";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStats {
    pub total: u64,
    pub build_count: u64,
    /// `total / build_count`, rounded down; zero without builds.
    pub per_build: u64,
}
impl MachineStats {
    fn new(total: u64, build_count: u64) -> Self {
        let per_build = total.checked_div(build_count).unwrap_or(0);
        Self { total, build_count, per_build }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub total: u64,
    pub by_machine: BTreeMap<String, MachineStats>,
}

/// Count the records in `repo`, overall and for every machine that has at
/// least one indexed build.
#[instrument(skip_all, fields(repo = repo.name()))]
pub async fn compute(repo: &dyn ContentFiles) -> Result<FileStats> {
    let mut build_counts: BTreeMap<String, u64> = BTreeMap::new();
    for build in repo.get_builds().await.or_raise(|| ErrorKind::Records)? {
        *build_counts.entry(build.machine).or_default() += 1;
    }
    let total = repo.count(None, None, None).await.or_raise(|| ErrorKind::Records)?;
    let mut by_machine = BTreeMap::new();
    for (machine, build_count) in build_counts {
        let files = repo.count(Some(&machine), None, None).await.or_raise(|| ErrorKind::Records)?;
        by_machine.insert(machine, MachineStats::new(files, build_count));
    }
    Ok(FileStats { total, by_machine })
}

/// Cache-aside access to [`FileStats`].
pub struct Stats {
    repo: RepositoryHandle,
    cache: CacheHandle,
    ttl: Duration,
}
impl Stats {
    pub fn new(repo: RepositoryHandle, cache: CacheHandle, ttl: Duration) -> Self {
        Self { repo, cache, ttl }
    }

    /// Cached stats if there are any, otherwise freshly computed (and cached).
    ///
    /// The cache is an optimisation: if it can't be read or written the
    /// stats are still returned, and the failure is only logged.
    pub async fn get(&self) -> Result<FileStats> {
        match self.cache.get(STATS_CACHE_KEY).await {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(stats) => return Ok(stats),
                Err(err) => tracing::warn!(%err, "discarding unreadable cached stats"),
            },
            Ok(None) => {},
            Err(err) => tracing::warn!(error = ?err, "stats cache unavailable"),
        }
        let stats = compute(self.repo.as_ref()).await?;
        let encoded = serde_json::to_string(&stats).or_raise(|| ErrorKind::Cache)?;
        if let Err(err) = self.cache.set(STATS_CACHE_KEY, encoded, self.ttl).await {
            tracing::warn!(error = ?err, "could not cache stats");
        }
        Ok(stats)
    }

    /// Stats of one machine; zero for machines with nothing indexed.
    pub async fn machine(&self, machine: &str) -> Result<MachineStats> {
        Ok(self.get().await?.by_machine.get(machine).copied().unwrap_or_default())
    }

    pub async fn invalidate(&self) -> Result<()> {
        self.cache.delete(STATS_CACHE_KEY).await
    }
}
