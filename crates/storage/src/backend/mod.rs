//! Build store trait and implementations.
//!
//! A build store is the build publisher's side of the fence: it knows which
//! builds exist for which machines, whether a build's packages are on disk,
//! and where each package archive lives. This crate only ever reads from it.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalStore;
#[cfg(feature = "mock")]
pub use self::mock::MockStore;
use crate::error::Result;
use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use gbpfl_extract::models::{Build, Package};
use std::cmp::Ordering;
use std::io::Read;
use std::path::PathBuf;
use std::pin::Pin;

type BuildStream<'a> = Pin<Box<dyn Stream<Item = Result<Build>> + Send + 'a>>;
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;

/// Numeric build ids sort numerically (`9` before `10`), anything else
/// lexically after them.
fn compare_build_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub(crate) fn sort_builds(builds: &mut [Build]) {
    builds.sort_by(|a, b| a.machine.cmp(&b.machine).then_with(|| compare_build_ids(&a.build_id, &b.build_id)));
}

/// Read access to published builds.
///
/// # Examples
///
/// ```no_run
/// use gbpfl_extract::models::Build;
/// # use gbpfl_storage::{backend::BuildStore, error::Result};
/// # async fn example(store: &dyn BuildStore) -> Result<()> {
/// let build = Build::new("lighthouse", "34");
/// if store.pulled(&build).await? {
///     for package in store.packages(&build).await? {
///         println!("{}: {}", package.cpv, store.package_path(&build, &package)?.display());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Name of the store, for logging.
    fn name(&self) -> &str;

    /// Every machine with at least one build, sorted.
    async fn list_machines(&self) -> Result<Vec<String>>;

    /// Builds of one machine, oldest first. Unknown machines have no builds.
    async fn builds(&self, machine: &str) -> Result<Vec<Build>>;

    /// Stream every build of every machine.
    ///
    /// The default implementation walks [`list_machines()`](Self::list_machines)
    /// and asks [`builds()`](Self::builds) for each. A machine whose builds
    /// can't be listed yields an error and the walk carries on.
    fn all_builds_stream(&self) -> BuildStream<'_> {
        Box::pin(stream! {
            let machines = match self.list_machines().await {
                Ok(machines) => machines,
                Err(err) => {
                    yield Err(err);
                    return;
                },
            };
            for machine in machines {
                match self.builds(&machine).await {
                    Ok(builds) => for build in builds {
                        yield Ok(build);
                    },
                    Err(err) => yield Err(err),
                }
            }
        })
    }

    /// Collects [`all_builds_stream()`](Self::all_builds_stream), failing on
    /// the first error.
    async fn all_builds(&self) -> Result<Vec<Build>> {
        self.all_builds_stream().try_collect().await
    }

    /// Whether the build's packages are available locally.
    async fn pulled(&self, build: &Build) -> Result<bool>;

    /// The packages of a build, as listed in its `Packages` index.
    ///
    /// Returns [`BuildNotFound`](crate::error::ErrorKind::BuildNotFound) when
    /// the store has no such build, or no index for it.
    async fn packages(&self, build: &Build) -> Result<Vec<Package>>;

    /// Where the package's archive lives.
    fn package_path(&self, build: &Build, package: &Package) -> Result<PathBuf>;

    /// Open the package's archive for reading.
    ///
    /// The returned reader is blocking and `'static`, meant to be moved into
    /// [`spawn_blocking`](tokio::task::spawn_blocking) (which is what
    /// [`gbpfl_extract::extract`] does with it).
    async fn reader(&self, build: &Build, package: &Package) -> Result<BoxSyncRead>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_builds() {
        let mut builds = vec![
            Build::new("polaris", "10"),
            Build::new("lighthouse", "latest"),
            Build::new("polaris", "9"),
            Build::new("lighthouse", "34"),
        ];
        sort_builds(&mut builds);
        let display: Vec<_> = builds.iter().map(ToString::to_string).collect();
        assert_eq!(display, ["lighthouse.34", "lighthouse.latest", "polaris.9", "polaris.10"]);
    }
}
