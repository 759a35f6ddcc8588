//! Reconciliation between the build store and the index.
//!
//! Both checks only read. Anything that goes wrong while reading is counted
//! as an error in the result instead of being returned.

use futures::StreamExt;
use gbpfl_extract::models::Build;
use gbpfl_records::ContentFiles;
use gbpfl_storage::BuildStore;
use std::collections::HashSet;

/// Outcome of a check: how many problems, and a line describing each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    pub errors: u64,
    pub warnings: u64,
    pub messages: Vec<String>,
}
impl CheckResult {
    fn error(&mut self, message: String) {
        self.errors += 1;
        self.messages.push(message);
    }

    fn warning(&mut self, message: String) {
        self.warnings += 1;
        self.messages.push(message);
    }

    /// Fold another result into this one.
    pub fn merge(&mut self, other: CheckResult) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.messages.extend(other.messages);
    }
}

/// Warn about every build in the store that has no indexed files.
pub async fn all_builds_have_indices(store: &dyn BuildStore, repo: &dyn ContentFiles) -> CheckResult {
    let mut result = CheckResult::default();
    let indexed: HashSet<Build> = match repo.get_builds().await {
        Ok(builds) => builds,
        Err(err) => {
            result.error(format!("Error: could not list indexed builds: {}", *err));
            return result;
        },
    };
    let mut builds = store.all_builds_stream();
    while let Some(build) = builds.next().await {
        match build {
            Ok(build) if !indexed.contains(&build) => {
                result.warning(format!("Warning: build {build} is not indexed."));
            },
            Ok(_) => {},
            Err(err) => result.error(format!("Error: could not list builds in {}: {}", store.name(), *err)),
        }
    }
    result
}

/// Warn about every indexed build the store no longer has.
pub async fn all_indices_have_builds(store: &dyn BuildStore, repo: &dyn ContentFiles) -> CheckResult {
    let mut result = CheckResult::default();
    let mut indexed: Vec<Build> = match repo.get_builds().await {
        Ok(builds) => builds.into_iter().collect(),
        Err(err) => {
            result.error(format!("Error: could not list indexed builds: {}", *err));
            return result;
        },
    };
    indexed.sort();
    for build in indexed {
        match store.pulled(&build).await {
            Ok(true) => {},
            Ok(false) => result.warning(format!("Warning: an index exists for build {build} that does not exist.")),
            Err(err) => result.error(format!("Error: could not look up build {build}: {}", *err)),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbpfl_extract::models::{BinPkg, ContentFile};
    use gbpfl_records::MemoryRepository;
    use gbpfl_storage::backend::MockStore;
    use std::path::PathBuf;
    use time::OffsetDateTime;

    fn file(build: &Build) -> ContentFile {
        let epoch = OffsetDateTime::from_unix_timestamp(1_739_000_000).unwrap();
        ContentFile {
            binpkg: BinPkg {
                build: build.clone(),
                cpvb: "app-shells/bash-5.2_p37-1".parse().unwrap(),
                repo: "gentoo".to_string(),
                build_time: epoch,
            },
            path: PathBuf::from("/bin/bash"),
            timestamp: epoch,
            size: 1_142_024,
        }
    }

    async fn fixture() -> (MockStore, MemoryRepository) {
        let store = MockStore::default()
            .with_build(Build::new("lighthouse", "34"), [])
            .with_build(Build::new("polaris", "26"), []);
        let repo = MemoryRepository::default();
        repo.bulk_save(&[file(&Build::new("polaris", "26")), file(&Build::new("polaris", "25"))]).await.unwrap();
        (store, repo)
    }

    #[tokio::test]
    async fn test_all_builds_have_indices() {
        let (store, repo) = fixture().await;
        let result = all_builds_have_indices(&store, &repo).await;
        assert_eq!(
            result,
            CheckResult {
                errors: 0,
                warnings: 1,
                messages: vec!["Warning: build lighthouse.34 is not indexed.".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_all_indices_have_builds() {
        let (store, repo) = fixture().await;
        let result = all_indices_have_builds(&store, &repo).await;
        assert_eq!(
            result,
            CheckResult {
                errors: 0,
                warnings: 1,
                messages: vec!["Warning: an index exists for build polaris.25 that does not exist.".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_store_changes_after_indexing() {
        let (store, repo) = fixture().await;
        assert!(store.delete_build(&Build::new("polaris", "26")).await);
        store.add_build(Build::new("polaris", "25"), []).await;
        repo.bulk_save(&[file(&Build::new("lighthouse", "34"))]).await.unwrap();

        let mut result = all_builds_have_indices(&store, &repo).await;
        result.merge(all_indices_have_builds(&store, &repo).await);
        assert_eq!(
            result,
            CheckResult {
                errors: 0,
                warnings: 1,
                messages: vec!["Warning: an index exists for build polaris.26 that does not exist.".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_consistent() {
        let build = Build::new("lighthouse", "34");
        let store = MockStore::default().with_build(build.clone(), []);
        let repo = MemoryRepository::default();
        repo.bulk_save(&[file(&build)]).await.unwrap();
        let mut result = all_builds_have_indices(&store, &repo).await;
        result.merge(all_indices_have_builds(&store, &repo).await);
        assert_eq!(result, CheckResult::default());
    }
}
