//! Reacting to the build publisher's lifecycle events.
//!
//! The publisher announces that a build was pulled or deleted; the
//! [`Handler`] turns each announcement into indexing work and hands it to a
//! [`TaskRunner`], so the announcer never waits for extraction.

use crate::error::{ErrorKind, Result};
use crate::index::Indexer;
use async_trait::async_trait;
use exn::ResultExt;
use gbpfl_extract::models::Build;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

/// Anything that names a build.
pub trait BuildLike {
    fn machine(&self) -> &str;
    fn build_id(&self) -> &str;
}
impl BuildLike for Build {
    fn machine(&self) -> &str {
        &self.machine
    }

    fn build_id(&self) -> &str {
        &self.build_id
    }
}

/// Convert a foreign build identity into a [`Build`]. Nothing past this
/// point ever sees the foreign type.
pub fn to_build(build: &impl BuildLike) -> Build {
    Build::new(build.machine(), build.build_id())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// The build's packages are now available.
    Pulled(Build),
    /// The build is gone.
    Deleted(Build),
}
impl BuildEvent {
    pub fn pulled(build: &impl BuildLike) -> Self {
        Self::Pulled(to_build(build))
    }

    pub fn deleted(build: &impl BuildLike) -> Self {
        Self::Deleted(to_build(build))
    }

    pub fn build(&self) -> &Build {
        match self {
            Self::Pulled(build) | Self::Deleted(build) => build,
        }
    }
}

pub type Task = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Runs work in the background.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Start `task` without waiting for it. `name` is for logging.
    async fn run(&self, name: String, task: Task);
}

/// Runs tasks on the current Tokio runtime.
///
/// Finished tasks are reaped whenever another is started, so results don't
/// accumulate between calls to [`wait()`](Self::wait).
#[derive(Debug, Default)]
pub struct TokioRunner {
    tasks: Mutex<JoinSet<Result<()>>>,
    // Failures reaped since the last `wait()`.
    failed: AtomicUsize,
}
impl TokioRunner {
    /// Wait until no task is running, including tasks started while
    /// waiting, and return how many failed since the last call. Failures are
    /// logged as they are collected.
    ///
    /// The lock is not held while waiting, so [`run()`](TaskRunner::run)
    /// never blocks on it. Dropping a pending `wait()` aborts the tasks it
    /// had taken over.
    pub async fn wait(&self) -> usize {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock().await);
            if tasks.is_empty() {
                break;
            }
            while let Some(joined) = tasks.join_next().await {
                self.reap(joined);
            }
        }
        self.failed.swap(0, Ordering::Relaxed)
    }

    fn reap(&self, joined: std::result::Result<Result<()>, JoinError>) {
        if let Err(err) = joined.or_raise(|| ErrorKind::Task).and_then(|outcome| outcome) {
            tracing::error!(error = ?err, "background task failed");
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[async_trait]
impl TaskRunner for TokioRunner {
    async fn run(&self, name: String, task: Task) {
        let span = tracing::info_span!("task", %name);
        let mut tasks = self.tasks.lock().await;
        while let Some(joined) = tasks.try_join_next() {
            self.reap(joined);
        }
        tasks.spawn(task.instrument(span));
    }
}

/// Dispatches [`BuildEvent`]s to an [`Indexer`] via a [`TaskRunner`].
#[derive(Clone)]
pub struct Handler {
    indexer: Arc<Indexer>,
    runner: Arc<dyn TaskRunner>,
}
impl Handler {
    pub fn new(indexer: Arc<Indexer>, runner: Arc<dyn TaskRunner>) -> Self {
        Self { indexer, runner }
    }

    /// Submit the work for `event`; returns once it has been handed over.
    pub async fn dispatch(&self, event: BuildEvent) {
        let indexer = Arc::clone(&self.indexer);
        tracing::debug!(?event, "dispatching");
        match event {
            BuildEvent::Pulled(build) => {
                let name = format!("index {build}");
                self.runner.run(name, Box::pin(async move { indexer.index(&build).await.map(drop) })).await;
            },
            BuildEvent::Deleted(build) => {
                let name = format!("deindex {build}");
                self.runner.run(name, Box::pin(async move { indexer.deindex(&build).await.map(drop) })).await;
            },
        }
    }

    pub async fn build_pulled(&self, build: &impl BuildLike) {
        self.dispatch(BuildEvent::pulled(build)).await;
    }

    pub async fn build_deleted(&self, build: &impl BuildLike) {
        self.dispatch(BuildEvent::deleted(build)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use gbpfl_extract::fixtures::{GpkgBuilder, package};
    use gbpfl_records::{ContentFiles, MemoryRepository, RepositoryHandle};
    use gbpfl_storage::StoreHandle;
    use gbpfl_storage::backend::MockStore;
    use std::time::Duration;
    use tokio::time::Instant;

    /// A build identity as some other system might hand it over.
    struct PublisherBuild {
        machine: String,
        build_id: String,
    }
    impl BuildLike for PublisherBuild {
        fn machine(&self) -> &str {
            &self.machine
        }

        fn build_id(&self) -> &str {
            &self.build_id
        }
    }

    fn publisher_build() -> PublisherBuild {
        PublisherBuild { machine: "lighthouse".to_string(), build_id: "34".to_string() }
    }

    #[test]
    fn test_to_build() {
        assert_eq!(to_build(&publisher_build()), Build::new("lighthouse", "34"));
        assert_eq!(BuildEvent::deleted(&publisher_build()).build(), &Build::new("lighthouse", "34"));
    }

    #[tokio::test]
    async fn test_pulled_then_deleted() {
        let build = Build::new("lighthouse", "34");
        let bash = package("app-shells/bash-5.2_p37", 1);
        let archive = GpkgBuilder::new(&bash).file("image/bin/bash", b"#!", 1_739_000_123).build();
        let store: StoreHandle = Arc::new(MockStore::default().with_build(build.clone(), [(bash, archive)]));
        let repo: RepositoryHandle = Arc::new(MemoryRepository::default());
        let runner = Arc::new(TokioRunner::default());
        let handler = Handler::new(Arc::new(Indexer::new(store, repo.clone())), runner.clone());

        handler.build_pulled(&publisher_build()).await;
        assert_eq!(runner.wait().await, 0);
        assert_eq!(repo.count(Some("lighthouse"), Some("34"), None).await.unwrap(), 1);

        handler.build_deleted(&publisher_build()).await;
        assert_eq!(runner.wait().await, 0);
        assert_eq!(repo.count(None, None, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_task_is_counted() {
        let runner = TokioRunner::default();
        runner.run("doomed".to_string(), Box::pin(async { Err::<(), Error>(ErrorKind::Records.into()) })).await;
        runner.run("fine".to_string(), Box::pin(async { Ok::<(), Error>(()) })).await;
        assert_eq!(runner.wait().await, 1);
        assert_eq!(runner.wait().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_does_not_block_on_wait() {
        let runner = Arc::new(TokioRunner::default());
        let slow = Box::pin(async {
            tokio::time::sleep(Duration::from_millis(450)).await;
            Ok::<(), Error>(())
        });
        runner.run("slow".to_string(), slow).await;
        let waiting = tokio::spawn({
            let runner = runner.clone();
            async move { runner.wait().await }
        });
        tokio::task::yield_now().await;

        let started = Instant::now();
        runner.run("quick".to_string(), Box::pin(async { Err::<(), Error>(ErrorKind::Records.into()) })).await;
        assert!(started.elapsed() < Duration::from_millis(100));
        // The waiter also collects the task started after it began.
        assert_eq!(waiting.await.unwrap(), 1);
        assert!(runner.tasks.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_tasks_are_reaped_on_run() {
        let runner = TokioRunner::default();
        runner.run("first".to_string(), Box::pin(async { Err::<(), Error>(ErrorKind::Records.into()) })).await;
        // Paused time only advances once every task is idle.
        tokio::time::sleep(Duration::from_millis(1)).await;
        runner.run("second".to_string(), Box::pin(async { Ok::<(), Error>(()) })).await;
        assert_eq!(runner.tasks.lock().await.len(), 1);
        assert_eq!(runner.wait().await, 1);
    }
}
