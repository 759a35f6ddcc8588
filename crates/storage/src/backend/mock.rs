//! In-memory build store for testing.

use super::{BoxSyncRead, sort_builds};
use crate::BuildStore;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use gbpfl_extract::models::{Build, Package};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::PathBuf;
use tokio::sync::RwLock;

type Archives = Vec<(Package, Vec<u8>)>;

/// In-memory build store for testing.
///
/// Builds and their package archives live in a [`BTreeMap`] behind a
/// [`RwLock`], so builds can be added or deleted while an indexer holds a
/// handle to the store.
///
/// # Examples
///
/// ```
/// use gbpfl_extract::models::Build;
/// use gbpfl_storage::backend::{BuildStore, MockStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MockStore::default().with_build(Build::new("lighthouse", "34"), []);
/// assert!(store.pulled(&Build::new("lighthouse", "34")).await?);
/// assert_eq!(store.list_machines().await?, ["lighthouse"]);
/// # Ok(())
/// # }
/// ```
pub struct MockStore {
    builds: RwLock<BTreeMap<Build, Archives>>,
}
impl MockStore {
    /// Add a build with its packages and their archive bytes.
    pub fn with_build(mut self, build: Build, packages: impl IntoIterator<Item = (Package, Vec<u8>)>) -> Self {
        self.builds.get_mut().insert(build, packages.into_iter().collect());
        self
    }

    /// Add (or replace) a build while the store is shared.
    pub async fn add_build(&self, build: Build, packages: impl IntoIterator<Item = (Package, Vec<u8>)>) {
        self.builds.write().await.insert(build, packages.into_iter().collect());
    }

    /// Forget a build, as if it had been purged from the publisher.
    pub async fn delete_build(&self, build: &Build) -> bool {
        self.builds.write().await.remove(build).is_some()
    }
}
impl Default for MockStore {
    fn default() -> Self {
        Self { builds: RwLock::new(BTreeMap::new()) }
    }
}

#[async_trait]
impl BuildStore for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_machines(&self) -> Result<Vec<String>> {
        let guard = self.builds.read().await;
        let machines: BTreeSet<&String> = guard.keys().map(|build| &build.machine).collect();
        Ok(machines.into_iter().cloned().collect())
    }

    async fn builds(&self, machine: &str) -> Result<Vec<Build>> {
        let mut builds: Vec<Build> =
            self.builds.read().await.keys().filter(|build| build.machine == machine).cloned().collect();
        sort_builds(&mut builds);
        Ok(builds)
    }

    async fn pulled(&self, build: &Build) -> Result<bool> {
        Ok(self.builds.read().await.contains_key(build))
    }

    async fn packages(&self, build: &Build) -> Result<Vec<Package>> {
        match self.builds.read().await.get(build) {
            Some(archives) => Ok(archives.iter().map(|(package, _)| package.clone()).collect()),
            None => exn::bail!(ErrorKind::BuildNotFound(build.clone())),
        }
    }

    fn package_path(&self, build: &Build, package: &Package) -> Result<PathBuf> {
        Ok(PathBuf::from("binpkgs").join(build.to_string()).join(&package.path))
    }

    async fn reader(&self, build: &Build, package: &Package) -> Result<BoxSyncRead> {
        let guard = self.builds.read().await;
        let bytes = guard
            .get(build)
            .and_then(|archives| archives.iter().find(|(candidate, _)| candidate.path == package.path))
            .map(|(_, bytes)| bytes.clone());
        match bytes {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes))),
            None => exn::bail!(ErrorKind::NotFound(self.package_path(build, package)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbpfl_extract::fixtures::package;

    #[tokio::test]
    async fn test_packages() {
        let build = Build::new("lighthouse", "34");
        let bash = package("app-shells/bash-5.2_p37", 1);
        let store = MockStore::default().with_build(build.clone(), [(bash.clone(), Vec::new())]);
        assert_eq!(store.packages(&build).await.unwrap(), [bash]);
    }

    #[tokio::test]
    async fn test_unknown_build() {
        let store = MockStore::default();
        let err = store.packages(&Build::new("lighthouse", "34")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::BuildNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_build() {
        let build = Build::new("lighthouse", "34");
        let store = MockStore::default().with_build(build.clone(), []);
        assert!(store.delete_build(&build).await);
        assert!(!store.pulled(&build).await.unwrap());
        assert!(store.list_machines().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reader_missing_archive() {
        let build = Build::new("lighthouse", "34");
        let store = MockStore::default().with_build(build.clone(), []);
        let err = store.reader(&build, &package("app-shells/bash-5.2_p37", 1)).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
