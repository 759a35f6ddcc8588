use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::filter::{CountFilter, SearchKey};
use crate::models::{ContentFileRow, path_str};
use crate::repo::{ContentFileStream, ContentFiles, FileOverrides};
use async_stream::stream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use futures::{Stream, StreamExt};
use gbpfl_extract::models::{Build, ContentFile};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use tracing::instrument;

const SELECT_COLUMNS: &str =
    "SELECT machine, build_id, cpvb, path, basename, repo, size, timestamp, build_time FROM content_files";
const INSERT_COLUMNS: &str =
    "INSERT INTO content_files (machine, build_id, cpvb, path, basename, repo, size, timestamp, build_time) ";
const ON_CONFLICT: &str = " ON CONFLICT (machine, build_id, cpvb, path) DO UPDATE SET basename = excluded.basename, \
    repo = excluded.repo, size = excluded.size, timestamp = excluded.timestamp, build_time = excluded.build_time";

// SQLite's default SQLITE_MAX_VARIABLE_NUMBER, and the binds per row.
const MAX_VARIABLES: usize = 32_766;
const ROW_VARIABLES: usize = 9;
/// Largest `batch_size` whose multi-row `INSERT` stays within SQLite's bind limit.
pub const MAX_BATCH_SIZE: usize = MAX_VARIABLES / ROW_VARIABLES;

fn records<'a>(rows: impl Stream<Item = sqlx::Result<ContentFileRow>> + Send + 'a) -> ContentFileStream<'a> {
    Box::pin(rows.map(|row| row.or_raise(|| ErrorKind::Database).and_then(ContentFile::try_from)))
}

/// Records kept in a SQLite [`Database`].
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    batch_size: usize,
}
impl SqliteRepository {
    /// `batch_size` is the number of rows per multi-row `INSERT` in
    /// [`bulk_save`](ContentFiles::bulk_save), clamped to `1..=`[`MAX_BATCH_SIZE`].
    pub fn new(db: Database, batch_size: usize) -> Self {
        if batch_size > MAX_BATCH_SIZE {
            tracing::warn!(batch_size, max = MAX_BATCH_SIZE, "bulk batch size clamped");
        }
        Self { pool: db.pool().clone(), batch_size: batch_size.clamp(1, MAX_BATCH_SIZE) }
    }
}

#[async_trait]
impl ContentFiles for SqliteRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn save(&self, file: &ContentFile, overrides: FileOverrides) -> Result<ContentFile> {
        let saved = overrides.apply(file.clone());
        let row = ContentFileRow::try_from(&saved)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../../queries/delete_file.sql"))
            .bind(file.machine())
            .bind(file.build_id())
            .bind(file.binpkg.cpvb.as_str())
            .bind(path_str(&file.path)?)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../../queries/upsert_file.sql"))
            .bind(row.machine)
            .bind(row.build_id)
            .bind(row.cpvb)
            .bind(row.path)
            .bind(row.basename)
            .bind(row.repo)
            .bind(row.size)
            .bind(row.timestamp)
            .bind(row.build_time)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(saved)
    }

    #[instrument(skip_all, fields(files = files.len()))]
    async fn bulk_save(&self, files: &[ContentFile]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let rows = files.iter().map(ContentFileRow::try_from).collect::<Result<Vec<_>>>()?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for chunk in rows.chunks(self.batch_size) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(INSERT_COLUMNS);
            query.push_values(chunk.iter().cloned(), |mut values, row| {
                values
                    .push_bind(row.machine)
                    .push_bind(row.build_id)
                    .push_bind(row.cpvb)
                    .push_bind(row.path)
                    .push_bind(row.basename)
                    .push_bind(row.repo)
                    .push_bind(row.size)
                    .push_bind(row.timestamp)
                    .push_bind(row.build_time);
            });
            query.push(ON_CONFLICT);
            query.build().execute(&mut *tx).await.or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(batches = rows.len().div_ceil(self.batch_size), "saved content files");
        Ok(())
    }

    async fn get(&self, machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<ContentFile> {
        let row: Option<ContentFileRow> = sqlx::query_as(include_str!("../../queries/get_file.sql"))
            .bind(machine)
            .bind(build_id)
            .bind(cpvb)
            .bind(path_str(path)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.ok_or_raise(|| ErrorKind::RecordNotFound)?.try_into()
    }

    async fn delete(&self, file: &ContentFile) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/delete_file.sql"))
            .bind(file.machine())
            .bind(file.build_id())
            .bind(file.binpkg.cpvb.as_str())
            .bind(path_str(&file.path)?)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::RecordNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deindex_build(&self, machine: &str, build_id: &str) -> Result<u64> {
        let result = sqlx::query(include_str!("../../queries/deindex_build.sql"))
            .bind(machine)
            .bind(build_id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }

    async fn exists(&self, machine: &str, build_id: &str, cpvb: &str, path: &Path) -> Result<bool> {
        sqlx::query_scalar(include_str!("../../queries/exists.sql"))
            .bind(machine)
            .bind(build_id)
            .bind(cpvb)
            .bind(path_str(path)?)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    async fn count(&self, machine: Option<&str>, build_id: Option<&str>, cpvb: Option<&str>) -> Result<u64> {
        let query = match CountFilter::new(machine, build_id, cpvb)? {
            CountFilter::All => sqlx::query_scalar(include_str!("../../queries/count_all.sql")),
            CountFilter::Machine(machine) => {
                sqlx::query_scalar(include_str!("../../queries/count_machine.sql")).bind(machine)
            },
            CountFilter::Build(machine, build_id) => {
                sqlx::query_scalar(include_str!("../../queries/count_build.sql")).bind(machine).bind(build_id)
            },
            CountFilter::Package(machine, build_id, cpvb) => {
                sqlx::query_scalar(include_str!("../../queries/count_package.sql"))
                    .bind(machine)
                    .bind(build_id)
                    .bind(cpvb)
            },
        };
        let count: i64 = query.fetch_one(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    fn for_package<'a>(&'a self, machine: &'a str, build_id: &'a str, cpvb: &'a str) -> ContentFileStream<'a> {
        records(
            sqlx::query_as(include_str!("../../queries/for_package.sql"))
                .bind(machine)
                .bind(build_id)
                .bind(cpvb)
                .fetch(&self.pool),
        )
    }

    fn for_build<'a>(&'a self, machine: &'a str, build_id: &'a str) -> ContentFileStream<'a> {
        records(
            sqlx::query_as(include_str!("../../queries/for_build.sql"))
                .bind(machine)
                .bind(build_id)
                .fetch(&self.pool),
        )
    }

    fn for_machine<'a>(&'a self, machine: &'a str) -> ContentFileStream<'a> {
        records(sqlx::query_as(include_str!("../../queries/for_machine.sql")).bind(machine).fetch(&self.pool))
    }

    async fn get_builds(&self) -> Result<HashSet<Build>> {
        let rows: Vec<(String, String)> = sqlx::query_as(include_str!("../../queries/get_builds.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(rows.into_iter().map(|(machine, build_id)| Build::new(machine, build_id)).collect())
    }

    fn search<'a>(&'a self, key: &'a str, machines: Option<&'a [String]>) -> ContentFileStream<'a> {
        let key = SearchKey::parse(key);
        if key == SearchKey::Nothing || machines.is_some_and(<[String]>::is_empty) {
            return Box::pin(futures::stream::empty());
        }
        Box::pin(stream! {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
            query.push(" WHERE ");
            // Comparisons are exact; LIKE and GLOB would fold case or treat
            // the key's characters as wildcards.
            match key {
                SearchKey::Nothing => {},
                SearchKey::Path(path) => {
                    query.push("path = ").push_bind(path);
                },
                SearchKey::Contains(part) if part.is_empty() => {
                    query.push("1");
                },
                SearchKey::Contains(part) => {
                    query.push("instr(basename, ").push_bind(part).push(") > 0");
                },
                SearchKey::EndsWith(suffix) => {
                    query
                        .push("substr(basename, -length(")
                        .push_bind(suffix.clone())
                        .push(")) = ")
                        .push_bind(suffix);
                },
                SearchKey::StartsWith(prefix) => {
                    query
                        .push("substr(basename, 1, length(")
                        .push_bind(prefix.clone())
                        .push(")) = ")
                        .push_bind(prefix);
                },
                SearchKey::Basename(name) => {
                    query.push("basename = ").push_bind(name);
                },
            }
            if let Some(machines) = machines {
                query.push(" AND machine IN (");
                let mut separated = query.separated(", ");
                for machine in machines {
                    separated.push_bind(machine.as_str());
                }
                separated.push_unseparated(")");
            }
            query.push(" ORDER BY machine, build_id, cpvb, path");
            let mut rows = query.build_query_as::<ContentFileRow>().fetch(&self.pool);
            while let Some(row) = rows.next().await {
                yield row.or_raise(|| ErrorKind::Database).and_then(ContentFile::try_from);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbpfl_extract::models::BinPkg;
    use rstest::rstest;
    use std::path::PathBuf;
    use time::OffsetDateTime;

    fn firmware(n: usize) -> ContentFile {
        ContentFile {
            binpkg: BinPkg {
                build: Build::new("babette", "1505"),
                cpvb: "sys-kernel/linux-firmware-20250211-1".parse().unwrap(),
                repo: "gentoo".to_string(),
                build_time: OffsetDateTime::from_unix_timestamp(1_739_000_000).unwrap(),
            },
            path: PathBuf::from(format!("/lib/firmware/{n}")),
            timestamp: OffsetDateTime::from_unix_timestamp(1_739_000_000).unwrap(),
            size: 4096,
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(100, 100)]
    #[case(MAX_BATCH_SIZE, MAX_BATCH_SIZE)]
    #[case(4000, MAX_BATCH_SIZE)]
    #[tokio::test]
    async fn test_batch_size_is_clamped(#[case] requested: usize, #[case] expected: usize) {
        let repo = SqliteRepository::new(Database::connect_in_memory().await.unwrap(), requested);
        assert_eq!(repo.batch_size, expected);
    }

    #[tokio::test]
    async fn test_bulk_save_with_oversized_batch() {
        let repo = SqliteRepository::new(Database::connect_in_memory().await.unwrap(), 4000);
        let files: Vec<_> = (0..4000).map(firmware).collect();
        repo.bulk_save(&files).await.unwrap();
        assert_eq!(repo.count(Some("babette"), Some("1505"), None).await.unwrap(), 4000);
    }
}
