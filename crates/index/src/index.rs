//! Turning a build's package archives into content file records.

use crate::error::{Error, ErrorKind, Result};
use crate::stats::Stats;
use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt, TryStreamExt};
use gbpfl_extract::models::{Build, ContentFile, Package};
use gbpfl_extract::{Normalizer, extract};
use gbpfl_records::RepositoryHandle;
use gbpfl_storage::StoreHandle;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::Arc;
use tracing::instrument;

/// Packages extracted at the same time when not configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Progress of [`Indexer::index_stream`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`PackagesDiscovered`](Self::PackagesDiscovered), exactly once.
/// 3. [`PackageIndexed`](Self::PackageIndexed) or
///    [`PackageFailed`](Self::PackageFailed), once per package, in
///    completion order.
/// 4. [`Complete`](Self::Complete), exactly once.
///
/// Only a failure to list the build's packages ends the stream early.
#[derive(Debug)]
pub enum IndexEvent {
    Started,
    PackagesDiscovered(u64),
    PackageIndexed { package: Package, files: u64 },
    PackageFailed { package: Package, error: Error },
    Complete,
}

/// Summary of indexing one build.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Packages listed for the build.
    pub packages: u64,
    /// Packages whose files were all saved.
    pub indexed: u64,
    /// Files saved, across all indexed packages.
    pub files: u64,
    /// Packages that saved nothing, with the reason.
    pub failed: Vec<(Package, Error)>,
}

/// Indexes and deindexes builds.
pub struct Indexer {
    store: StoreHandle,
    repo: RepositoryHandle,
    concurrency: usize,
    stats: Option<Arc<Stats>>,
}
impl Indexer {
    pub fn new(store: StoreHandle, repo: RepositoryHandle) -> Self {
        Self { store, repo, concurrency: DEFAULT_CONCURRENCY, stats: None }
    }

    /// At most `concurrency` packages are extracted at once (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Invalidate these stats whenever a build is indexed or deindexed.
    pub fn with_stats(mut self, stats: Arc<Stats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn repo(&self) -> &RepositoryHandle {
        &self.repo
    }

    /// Extract one package of `build` and save all of its files.
    ///
    /// The files are collected before anything is written, so a package that
    /// fails part way through leaves no records behind. Returns the number of
    /// files saved.
    #[instrument(skip_all, fields(%build, cpv = %package.cpv, files))]
    pub async fn index_package(&self, build: &Build, package: Package) -> Result<u64> {
        let normalizer = Normalizer::new(build, &package).or_raise(|| ErrorKind::Extract)?;
        let reader = self.store.reader(build, &package).await.or_raise(|| ErrorKind::Storage)?;
        let files: Vec<ContentFile> = extract(reader, package)
            .map(|entry| entry.and_then(|entry| normalizer.normalize(entry)))
            .try_collect()
            .await
            .or_raise(|| ErrorKind::Extract)?;
        self.repo.bulk_save(&files).await.or_raise(|| ErrorKind::Records)?;
        let saved = files.len() as u64;
        tracing::Span::current().record("files", saved);
        Ok(saved)
    }

    async fn index_one(&self, build: &Build, package: Package) -> IndexEvent {
        match self.index_package(build, package.clone()).await {
            Ok(files) => IndexEvent::PackageIndexed { package, files },
            Err(error) => {
                tracing::error!(%build, cpv = %package.cpv, error = ?error, "failed to index package");
                IndexEvent::PackageFailed { package, error }
            },
        }
    }

    /// Index every package of `build`, reporting progress as it goes.
    ///
    /// Packages are indexed concurrently, up to the configured limit, and
    /// independently: one package failing doesn't stop the others. A build
    /// the store doesn't know has no packages to index.
    pub fn index_stream<'a>(&'a self, build: &'a Build) -> impl Stream<Item = Result<IndexEvent>> + Send + 'a {
        stream!({
            yield Ok(IndexEvent::Started);

            let packages = match self.store.packages(build).await {
                Ok(packages) => packages,
                Err(err) if err.is_lookup() => {
                    tracing::warn!(%build, store = self.store.name(), "build not found, nothing to index");
                    Vec::new()
                },
                Err(err) => {
                    yield Err(err).or_raise(|| ErrorKind::Storage);
                    return;
                },
            };
            yield Ok(IndexEvent::PackagesDiscovered(packages.len() as u64));

            let mut pending: VecDeque<_> = packages.into_iter().map(|package| self.index_one(build, package)).collect();
            let mut processing = FuturesUnordered::new();
            processing.extend(pending.drain(..self.concurrency.min(pending.len())));
            while let Some(event) = processing.next().await {
                yield Ok(event);
                if let Some(next) = pending.pop_front() {
                    processing.push(next);
                }
            }

            self.invalidate_stats().await;
            yield Ok(IndexEvent::Complete);
        })
    }

    /// Index every package of `build`; see [`index_stream`](Self::index_stream).
    #[instrument(skip(self), fields(%build))]
    pub async fn index(&self, build: &Build) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        let mut events = pin!(self.index_stream(build));
        while let Some(event) = events.next().await {
            match event? {
                IndexEvent::Started | IndexEvent::Complete => {},
                IndexEvent::PackagesDiscovered(packages) => report.packages = packages,
                IndexEvent::PackageIndexed { files, .. } => {
                    report.indexed += 1;
                    report.files += files;
                },
                IndexEvent::PackageFailed { package, error } => report.failed.push((package, error)),
            }
        }
        tracing::info!(
            packages = report.packages,
            files = report.files,
            failed = report.failed.len(),
            "indexed build"
        );
        Ok(report)
    }

    /// Remove every record of `build`. Deindexing a build that isn't
    /// indexed does nothing.
    #[instrument(skip(self), fields(%build))]
    pub async fn deindex(&self, build: &Build) -> Result<u64> {
        let removed =
            self.repo.deindex_build(&build.machine, &build.build_id).await.or_raise(|| ErrorKind::Records)?;
        self.invalidate_stats().await;
        tracing::info!(removed, "deindexed build");
        Ok(removed)
    }

    async fn invalidate_stats(&self) {
        if let Some(stats) = &self.stats
            && let Err(err) = stats.invalidate().await
        {
            tracing::warn!(error = ?err, "could not invalidate stats");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use gbpfl_compress::Compression;
    use gbpfl_extract::fixtures::{GpkgBuilder, package};
    use gbpfl_records::{ContentFiles, MemoryRepository};
    use gbpfl_storage::backend::MockStore;
    use std::path::Path;
    use std::time::Duration;

    const MTIME: u64 = 1_739_000_123;

    fn build() -> Build {
        Build::new("lighthouse", "34")
    }

    fn bash() -> (Package, Vec<u8>) {
        let bash = package("app-shells/bash-5.2_p37", 1);
        let archive = GpkgBuilder::new(&bash)
            .compression(Compression::Xz)
            .dir("image/bin")
            .file("image/bin/bash", b"\x7fELF", MTIME)
            .file("image/usr/bin/bashbug", b"#!/bin/sh", MTIME)
            .file("image/etc/skel/.bashrc", b"", MTIME)
            .build();
        (bash, archive)
    }

    fn tar_without_identifier() -> (Package, Vec<u8>) {
        let tar = package("app-arch/tar-1.35", 1);
        let archive = GpkgBuilder::new(&tar).without_identifier().file("image/bin/gtar", b"\x7fELF", MTIME).build();
        (tar, archive)
    }

    fn indexer(packages: impl IntoIterator<Item = (Package, Vec<u8>)>) -> Indexer {
        let store = MockStore::default().with_build(build(), packages);
        Indexer::new(Arc::new(store), Arc::new(MemoryRepository::default()))
    }

    #[tokio::test]
    async fn test_index_package() {
        let (bash, archive) = bash();
        let indexer = indexer([(bash.clone(), archive)]);
        assert_eq!(indexer.index_package(&build(), bash).await.unwrap(), 3);
        let file = indexer
            .repo()
            .get("lighthouse", "34", "app-shells/bash-5.2_p37-1", Path::new("/usr/bin/bashbug"))
            .await
            .unwrap();
        assert_eq!(file.size, 9);
        assert_eq!(file.timestamp.unix_timestamp(), MTIME as i64);
    }

    #[tokio::test]
    async fn test_failed_package_is_isolated() {
        let (tar, _) = tar_without_identifier();
        let indexer = indexer([bash(), tar_without_identifier()]).with_concurrency(2);
        let report = indexer.index(&build()).await.unwrap();
        assert_eq!((report.packages, report.indexed, report.files), (2, 1, 3));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, tar);
        assert_eq!(*report.failed[0].1, ErrorKind::Extract);

        let repo = indexer.repo();
        assert_eq!(repo.count(Some("lighthouse"), Some("34"), Some("app-shells/bash-5.2_p37-1")).await.unwrap(), 3);
        assert_eq!(repo.count(Some("lighthouse"), Some("34"), Some("app-arch/tar-1.35-1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_event_order() {
        let indexer = indexer([bash(), tar_without_identifier()]).with_concurrency(1);
        let events: Vec<_> = indexer.index_stream(&build()).try_collect().await.unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], IndexEvent::Started));
        assert!(matches!(events[1], IndexEvent::PackagesDiscovered(2)));
        assert!(matches!(events[2], IndexEvent::PackageIndexed { files: 3, .. }));
        assert!(matches!(events[3], IndexEvent::PackageFailed { .. }));
        assert!(matches!(events[4], IndexEvent::Complete));
    }

    #[tokio::test]
    async fn test_unknown_build_indexes_nothing() {
        let indexer = indexer([bash()]);
        let report = indexer.index(&Build::new("polaris", "26")).await.unwrap();
        assert_eq!((report.packages, report.files), (0, 0));
        assert!(report.failed.is_empty());
        assert_eq!(indexer.repo().count(None, None, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let indexer = indexer([bash()]);
        indexer.index(&build()).await.unwrap();
        indexer.index(&build()).await.unwrap();
        assert_eq!(indexer.repo().count(None, None, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_deindex() {
        let indexer = indexer([bash()]);
        indexer.index(&build()).await.unwrap();
        assert_eq!(indexer.deindex(&build()).await.unwrap(), 3);
        assert_eq!(indexer.deindex(&build()).await.unwrap(), 0);
        assert_eq!(indexer.repo().count(None, None, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_indexing_invalidates_stats() {
        let repo: RepositoryHandle = Arc::new(MemoryRepository::default());
        let stats = Arc::new(Stats::new(repo.clone(), Arc::new(MemoryCache::default()), Duration::from_secs(3600)));
        let store = MockStore::default().with_build(build(), [bash()]);
        let indexer = Indexer::new(Arc::new(store), repo).with_stats(stats.clone());

        assert_eq!(stats.get().await.unwrap().total, 0);
        indexer.index(&build()).await.unwrap();
        assert_eq!(stats.get().await.unwrap().total, 3);
        indexer.deindex(&build()).await.unwrap();
        assert_eq!(stats.get().await.unwrap().total, 0);
    }
}
