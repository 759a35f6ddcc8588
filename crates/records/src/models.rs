use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use gbpfl_extract::models::{BinPkg, Build, ContentFile, Cpvb};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub(crate) fn path_str(path: &Path) -> Result<&str, Error> {
    path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))
}

fn nanos(datetime: OffsetDateTime, field: &'static str) -> Result<i64, Error> {
    i64::try_from(datetime.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData(field))
}

fn from_nanos(nanos: i64, field: &'static str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).or_raise(|| ErrorKind::InvalidData(field))
}

/// A `content_files` row.
///
/// Timestamps are stored as nanoseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub(crate) struct ContentFileRow {
    pub machine: String,
    pub build_id: String,
    pub cpvb: String,
    pub path: String,
    pub basename: String,
    pub repo: String,
    pub size: i64,
    pub timestamp: i64,
    pub build_time: i64,
}
impl TryFrom<&ContentFile> for ContentFileRow {
    type Error = Error;
    fn try_from(file: &ContentFile) -> Result<Self, Self::Error> {
        Ok(Self {
            machine: file.machine().to_string(),
            build_id: file.build_id().to_string(),
            cpvb: file.binpkg.cpvb.to_string(),
            path: path_str(&file.path)?.to_string(),
            basename: file.basename().to_string(),
            repo: file.binpkg.repo.clone(),
            size: i64::try_from(file.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            timestamp: nanos(file.timestamp, "timestamp")?,
            build_time: nanos(file.binpkg.build_time, "build time")?,
        })
    }
}
impl TryFrom<ContentFileRow> for ContentFile {
    type Error = Error;
    fn try_from(row: ContentFileRow) -> Result<Self, Self::Error> {
        let binpkg = BinPkg {
            build: Build::new(row.machine, row.build_id),
            cpvb: row.cpvb.parse::<Cpvb>().or_raise(|| ErrorKind::InvalidData("cpvb"))?,
            repo: row.repo,
            build_time: from_nanos(row.build_time, "build time")?,
        };
        Ok(ContentFile {
            binpkg,
            path: PathBuf::from(row.path),
            timestamp: from_nanos(row.timestamp, "timestamp")?,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ContentFileRow {
        ContentFileRow {
            machine: "lighthouse".to_string(),
            build_id: "34".to_string(),
            cpvb: "app-shells/bash-5.2_p37-1".to_string(),
            path: "/bin/bash".to_string(),
            basename: "bash".to_string(),
            repo: "gentoo".to_string(),
            size: 1_142_024,
            timestamp: 1_739_000_123_500_000_000,
            build_time: 1_739_000_000_000_000_000,
        }
    }

    #[test]
    fn test_row_to_model_and_back() {
        let file = ContentFile::try_from(row()).unwrap();
        assert_eq!(file.binpkg.cpvb.build_id(), 1);
        assert_eq!(file.path, Path::new("/bin/bash"));
        assert_eq!(ContentFileRow::try_from(&file).unwrap(), row());
    }

    #[test]
    fn test_row_keeps_subsecond_timestamp() {
        let file = ContentFile::try_from(row()).unwrap();
        assert_eq!(file.timestamp.unix_timestamp(), 1_739_000_123);
        assert_eq!(file.timestamp.millisecond(), 500);
    }

    #[test]
    fn test_timestamp_beyond_storable_range() {
        let mut file = ContentFile::try_from(row()).unwrap();
        file.timestamp = OffsetDateTime::from_unix_timestamp(10_000_000_000).unwrap();
        let err = ContentFileRow::try_from(&file).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("timestamp"));
    }

    #[test]
    fn test_row_with_bad_cpvb() {
        let row = ContentFileRow { cpvb: "app-shells/bash".to_string(), ..row() };
        let err = ContentFile::try_from(row).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("cpvb"));
    }

    #[test]
    fn test_row_with_negative_size() {
        let row = ContentFileRow { size: -1, ..row() };
        let err = ContentFile::try_from(row).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("size"));
    }
}
