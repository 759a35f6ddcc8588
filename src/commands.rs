//! Command implementations.
//!
//! Output goes to the writers handed in, so the commands can be run against
//! in-memory collaborators and their output compared.

use crate::cli::Command;
use futures::TryStreamExt;
use gbpfl_config::Settings;
use gbpfl_extract::models::{Build, ContentFile, PkgSpec};
use gbpfl_index::cache::MemoryCache;
use gbpfl_index::checks::{CheckResult, all_builds_have_indices, all_indices_have_builds};
use gbpfl_index::{Indexer, Stats};
use gbpfl_records::RepositoryHandle;
use gbpfl_storage::StoreHandle;
use gbpfl_storage::backend::LocalStore;
use miette::{IntoDiagnostic, Result};
use std::fmt::Debug;
use std::io::Write;
use std::sync::Arc;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[month]/[day]/[year repr:last_two] [hour]:[minute]:[second]");

pub const SUCCESS: u8 = 0;
pub const FAILURE: u8 = 1;

fn report(err: impl Debug) -> miette::Report {
    miette::miette!("{err:?}")
}

/// `1234567` as `1,234,567`.
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Everything a command needs, built once from the settings.
pub struct App {
    pub store: StoreHandle,
    pub repo: RepositoryHandle,
    pub stats: Arc<Stats>,
    pub concurrency: usize,
    /// Timestamps are shown in this offset.
    pub offset: UtcOffset,
}
impl App {
    pub async fn open(settings: &Settings, offset: UtcOffset) -> Result<Self> {
        let store = LocalStore::new("local", &settings.storage.root).map_err(report)?;
        let repo = gbpfl_records::open(&settings.records).await.map_err(report)?;
        let stats = Stats::new(repo.clone(), Arc::new(MemoryCache::default()), settings.stats.ttl());
        tracing::debug!(root = %settings.storage.root.display(), repo = repo.name(), "opened build store and index");
        Ok(Self {
            store: Arc::new(store),
            repo,
            stats: Arc::new(stats),
            concurrency: settings.index.concurrency,
            offset,
        })
    }

    fn indexer(&self) -> Indexer {
        Indexer::new(self.store.clone(), self.repo.clone())
            .with_concurrency(self.concurrency)
            .with_stats(self.stats.clone())
    }

    fn timestamp(&self, file: &ContentFile) -> Result<String> {
        file.timestamp.to_offset(self.offset).format(TIMESTAMP_FORMAT).into_diagnostic()
    }

    /// Run `command`, returning the process exit status.
    pub async fn run(&self, command: Command, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
        match command {
            Command::Index { machine, build_id } => self.index(&Build::new(machine, build_id), out, err).await,
            Command::Deindex { machine, build_id } => self.deindex(&Build::new(machine, build_id), out).await,
            Command::Search { machines, key } => self.search(&key, &machines, out).await,
            Command::Ls { long, pkgspec } => self.ls(&pkgspec, long, out, err).await,
            Command::Stats => self.stats(out).await,
            Command::Check => self.check(out, err).await,
        }
    }

    async fn index(&self, build: &Build, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
        let summary = self.indexer().index(build).await.map_err(report)?;
        for (package, error) in &summary.failed {
            writeln!(err, "failed: {}-{}: {error:?}", package.cpv, package.build_id).into_diagnostic()?;
        }
        writeln!(
            out,
            "{build}: indexed {} files from {} of {} packages",
            thousands(summary.files),
            summary.indexed,
            summary.packages
        )
        .into_diagnostic()?;
        Ok(SUCCESS)
    }

    async fn deindex(&self, build: &Build, out: &mut dyn Write) -> Result<u8> {
        let removed = self.indexer().deindex(build).await.map_err(report)?;
        writeln!(out, "{build}: removed {} files", thousands(removed)).into_diagnostic()?;
        Ok(SUCCESS)
    }

    async fn search(&self, key: &str, machines: &[String], out: &mut dyn Write) -> Result<u8> {
        let machines = (!machines.is_empty()).then_some(machines);
        let files: Vec<ContentFile> = self.repo.search(key, machines).try_collect().await.map_err(report)?;
        let width = files.iter().map(|file| file.size.to_string().len()).max().unwrap_or(0);
        for file in &files {
            writeln!(
                out,
                "{:>width$} {} {}/{}/{} {}",
                file.size,
                self.timestamp(file)?,
                file.machine(),
                file.build_id(),
                file.binpkg.cpvb,
                file.path.display(),
            )
            .into_diagnostic()?;
        }
        Ok(SUCCESS)
    }

    async fn ls(&self, pkgspec: &str, long: bool, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
        let Ok(spec) = pkgspec.parse::<PkgSpec>() else {
            writeln!(err, "Invalid specifier: {pkgspec}").into_diagnostic()?;
            return Ok(FAILURE);
        };
        let files: Vec<ContentFile> = self
            .repo
            .for_package(&spec.build.machine, &spec.build.build_id, spec.cpvb.as_str())
            .try_collect()
            .await
            .map_err(report)?;
        let width = files.iter().map(|file| file.size.to_string().len()).max().unwrap_or(0);
        for file in &files {
            let written = match long {
                true => writeln!(out, "{:>width$} {} {}", file.size, self.timestamp(file)?, file.path.display()),
                false => writeln!(out, "{}", file.path.display()),
            };
            written.into_diagnostic()?;
        }
        Ok(SUCCESS)
    }

    async fn stats(&self, out: &mut dyn Write) -> Result<u8> {
        let stats = self.stats.get().await.map_err(report)?;
        let mut machines: Vec<_> = stats.by_machine.iter().collect();
        machines.sort_by(|(a_name, a), (b_name, b)| b.total.cmp(&a.total).then_with(|| a_name.cmp(b_name)));
        let name_width = machines.iter().map(|(name, _)| name.len()).chain(["Machine".len()]).max().unwrap_or(0);
        writeln!(out, "{} Files", thousands(stats.total)).into_diagnostic()?;
        writeln!(out, "{:<name_width$} {:>13} {:>13}", "Machine", "Files", "Per Build").into_diagnostic()?;
        for (name, machine) in machines {
            writeln!(out, "{name:<name_width$} {:>13} {:>13}", thousands(machine.total), thousands(machine.per_build))
                .into_diagnostic()?;
        }
        Ok(SUCCESS)
    }

    async fn check(&self, out: &mut dyn Write, err: &mut dyn Write) -> Result<u8> {
        let mut result = CheckResult::default();
        result.merge(all_builds_have_indices(self.store.as_ref(), self.repo.as_ref()).await);
        result.merge(all_indices_have_builds(self.store.as_ref(), self.repo.as_ref()).await);
        for message in &result.messages {
            writeln!(err, "{message}").into_diagnostic()?;
        }
        writeln!(out, "{} errors, {} warnings", result.errors, result.warnings).into_diagnostic()?;
        Ok(if result.errors > 0 { FAILURE } else { SUCCESS })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbpfl_extract::fixtures::{GpkgBuilder, package};
    use gbpfl_records::MemoryRepository;
    use gbpfl_storage::backend::MockStore;
    use rstest::rstest;
    use std::time::Duration;

    const MTIME: u64 = 1_739_000_040;

    async fn app() -> App {
        let bash = package("app-shells/bash-5.2_p37", 1);
        let archive = GpkgBuilder::new(&bash)
            .file("image/bin/bash", &vec![0; 1_142_024], MTIME)
            .file("image/usr/bin/bashbug", b"#!/bin/sh\n", MTIME + 1)
            .build();
        let store = MockStore::default()
            .with_build(Build::new("lighthouse", "34"), [(bash.clone(), archive.clone())])
            .with_build(Build::new("polaris", "26"), [(bash, archive)]);
        let repo: RepositoryHandle = Arc::new(MemoryRepository::default());
        let stats = Stats::new(repo.clone(), Arc::new(MemoryCache::default()), Duration::from_secs(60));
        App { store: Arc::new(store), repo, stats: Arc::new(stats), concurrency: 2, offset: UtcOffset::UTC }
    }

    async fn run(app: &App, command: Command) -> (u8, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let status = app.run(command, &mut out, &mut err).await.unwrap();
        (status, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    fn index(machine: &str, build_id: &str) -> Command {
        Command::Index { machine: machine.to_string(), build_id: build_id.to_string() }
    }

    #[rstest]
    #[case(0, "0")]
    #[case(999, "999")]
    #[case(1_000, "1,000")]
    #[case(19_146_145, "19,146,145")]
    fn test_thousands(#[case] n: u64, #[case] expected: &str) {
        assert_eq!(thousands(n), expected);
    }

    #[tokio::test]
    async fn test_index_then_ls() {
        let app = app().await;
        let (status, out, _) = run(&app, index("lighthouse", "34")).await;
        assert_eq!(status, SUCCESS);
        assert_eq!(out, "lighthouse.34: indexed 2 files from 1 of 1 packages\n");

        let ls = |long| Command::Ls { long, pkgspec: "lighthouse/34/app-shells/bash-5.2_p37-1".to_string() };
        let (_, out, _) = run(&app, ls(false)).await;
        assert_eq!(out, "/bin/bash\n/usr/bin/bashbug\n");
        let (_, out, _) = run(&app, ls(true)).await;
        assert_eq!(out, "1142024 02/08/25 07:34:00 /bin/bash\n     10 02/08/25 07:34:01 /usr/bin/bashbug\n");
    }

    #[tokio::test]
    async fn test_ls_invalid_spec() {
        let app = app().await;
        let (status, out, err) = run(&app, Command::Ls { long: false, pkgspec: "lighthouse/34/bash-5.2_p37-1".into() }).await;
        assert_eq!(status, FAILURE);
        assert_eq!(out, "");
        assert_eq!(err, "Invalid specifier: lighthouse/34/bash-5.2_p37-1\n");
    }

    #[tokio::test]
    async fn test_search() {
        let app = app().await;
        run(&app, index("lighthouse", "34")).await;
        run(&app, index("polaris", "26")).await;
        let search = |machines: &[&str]| Command::Search {
            machines: machines.iter().map(ToString::to_string).collect(),
            key: "bash".to_string(),
        };
        let (_, out, _) = run(&app, search(&[])).await;
        assert_eq!(
            out,
            "1142024 02/08/25 07:34:00 lighthouse/34/app-shells/bash-5.2_p37-1 /bin/bash\n\
             1142024 02/08/25 07:34:00 polaris/26/app-shells/bash-5.2_p37-1 /bin/bash\n"
        );
        let (_, out, _) = run(&app, search(&["polaris"])).await;
        assert_eq!(out.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_stats_and_deindex() {
        let app = app().await;
        run(&app, index("lighthouse", "34")).await;
        run(&app, index("polaris", "26")).await;
        let (_, out, _) = run(&app, Command::Stats).await;
        assert_eq!(
            out,
            "4 Files\n\
             Machine            Files     Per Build\n\
             lighthouse             2             2\n\
             polaris                2             2\n"
        );
        let (_, out, _) = run(&app, Command::Deindex { machine: "polaris".into(), build_id: "26".into() }).await;
        assert_eq!(out, "polaris.26: removed 2 files\n");
        let (_, out, _) = run(&app, Command::Stats).await;
        assert!(out.starts_with("2 Files\n"));
    }

    #[tokio::test]
    async fn test_check() {
        let app = app().await;
        run(&app, index("lighthouse", "34")).await;
        let (status, out, err) = run(&app, Command::Check).await;
        assert_eq!(status, SUCCESS);
        assert_eq!(out, "0 errors, 1 warnings\n");
        assert_eq!(err, "Warning: build polaris.26 is not indexed.\n");
    }
}
