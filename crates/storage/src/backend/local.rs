//! Build store over the build publisher's on-disk layout.
//!
//! ```text
//! <root>/binpkgs/<machine>.<build_id>/Packages
//! <root>/binpkgs/<machine>.<build_id>/<PATH from Packages>
//! ```
//!
//! A build is "pulled" exactly when its binpkgs directory exists.

use super::{BoxSyncRead, sort_builds};
use crate::error::{ErrorKind, Result};
use crate::{BuildStore, packages, path::validate as validate_path};
use async_trait::async_trait;
use gbpfl_extract::models::{Build, Package};
use std::collections::BTreeSet;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::instrument;

const BINPKGS: &str = "binpkgs";
const PACKAGES_INDEX: &str = "Packages";

/// Local filesystem build store.
///
/// # Examples
///
/// ```no_run
/// use gbpfl_storage::backend::LocalStore;
///
/// # fn example() -> gbpfl_storage::error::Result<()> {
/// let store = LocalStore::new("local", "/var/lib/gentoo-build-publisher")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalStore {
    name: String,
    root: PathBuf,
}
impl LocalStore {
    /// Create a store rooted at `root`, which must be absolute.
    ///
    /// The directory is not created: a missing root is simply a store
    /// without any builds.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || (root.exists() && !root.is_dir()) {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root })
    }

    fn binpkgs(&self) -> PathBuf {
        self.root.join(BINPKGS)
    }

    /// `<root>/binpkgs/<machine>.<build_id>`, refusing identities that would
    /// resolve to some other directory.
    fn build_dir(&self, build: &Build) -> Result<PathBuf> {
        let name = build.to_string();
        let validated = validate_path(&name)?;
        if validated.as_os_str() != name.as_str() || validated.components().count() != 1 {
            exn::bail!(ErrorKind::InvalidPath(PathBuf::from(name)));
        }
        Ok(self.binpkgs().join(validated))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Every `<machine>.<build_id>` directory under `binpkgs/`.
    async fn scan(&self) -> Result<Vec<Build>> {
        let binpkgs = self.binpkgs();
        let mut entries = match fs::read_dir(&binpkgs).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(Self::map_io_error(err, &binpkgs)),
        };
        let mut builds = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &binpkgs))? {
            let path = entry.path();
            if !entry.file_type().await.map_err(|e| Self::map_io_error(e, &path))?.is_dir() {
                continue;
            }
            match entry.file_name().to_str().map(str::parse::<Build>) {
                Some(Ok(build)) => builds.push(build),
                _ => tracing::debug!(path = %path.display(), "ignoring unrecognised binpkgs directory"),
            }
        }
        sort_builds(&mut builds);
        Ok(builds)
    }
}

#[async_trait]
impl BuildStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_machines(&self) -> Result<Vec<String>> {
        let machines: BTreeSet<String> = self.scan().await?.into_iter().map(|build| build.machine).collect();
        Ok(machines.into_iter().collect())
    }

    async fn builds(&self, machine: &str) -> Result<Vec<Build>> {
        Ok(self.scan().await?.into_iter().filter(|build| build.machine == machine).collect())
    }

    async fn pulled(&self, build: &Build) -> Result<bool> {
        let dir = self.build_dir(build)?;
        Ok(fs::try_exists(&dir).await.map_err(ErrorKind::Io)?)
    }

    #[instrument(skip_all, fields(store = %self.name, %build))]
    async fn packages(&self, build: &Build) -> Result<Vec<Package>> {
        let index = self.build_dir(build)?.join(PACKAGES_INDEX);
        let text = match fs::read_to_string(&index).await {
            Ok(text) => text,
            // Never pulled, or pulled without an index: either way there is nothing to list.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::BuildNotFound(build.clone()))
            },
            Err(err) => exn::bail!(Self::map_io_error(err, &index)),
        };
        let packages = packages::parse(&text)?;
        tracing::debug!(packages = packages.len(), "read Packages index");
        Ok(packages)
    }

    fn package_path(&self, build: &Build, package: &Package) -> Result<PathBuf> {
        Ok(self.build_dir(build)?.join(validate_path(&package.path)?))
    }

    async fn reader(&self, build: &Build, package: &Package) -> Result<BoxSyncRead> {
        let path = self.package_path(build, package)?;
        let file = fs::File::open(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        Ok(Box::new(BufReader::new(file.into_std().await)))
    }
}
