use crate::error::{ErrorKind, Result};
use crate::models::{BinPkg, Build, ContentFile, FileEntry, Package};
use exn::{OptionExt, ResultExt};
use time::OffsetDateTime;

fn timestamp(seconds: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData("timestamp out of range"))
}

/// The [`BinPkg`] a package becomes once attached to a build.
pub fn make_binpkg(build: &Build, package: &Package) -> Result<BinPkg> {
    Ok(BinPkg {
        build: build.clone(),
        cpvb: package.cpvb()?,
        repo: package.repo.clone(),
        build_time: timestamp(package.build_time)?,
    })
}

/// Turns the image entries of one package into [`ContentFile`]s.
///
/// The [`BinPkg`] is derived once and shared by every file.
#[derive(Debug, Clone)]
pub struct Normalizer {
    binpkg: BinPkg,
}
impl Normalizer {
    pub fn new(build: &Build, package: &Package) -> Result<Self> {
        Ok(Self { binpkg: make_binpkg(build, package)? })
    }

    pub fn binpkg(&self) -> &BinPkg {
        &self.binpkg
    }

    pub fn normalize(&self, entry: FileEntry) -> Result<ContentFile> {
        let mtime = i64::try_from(entry.mtime).ok().ok_or_raise(|| ErrorKind::InvalidData("mtime out of range"))?;
        Ok(ContentFile { binpkg: self.binpkg.clone(), path: entry.path(), timestamp: timestamp(mtime)?, size: entry.size })
    }
}

/// One-off form of [`Normalizer::normalize`].
pub fn normalize(build: &Build, package: &Package, entry: FileEntry) -> Result<ContentFile> {
    Normalizer::new(build, package)?.normalize(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::package;
    use std::path::PathBuf;

    #[test]
    fn test_normalize() {
        let build = Build::new("lighthouse", "34");
        let entry = FileEntry { name: "image/bin/bash".to_string(), mtime: 1_739_000_123, size: 1_142_024 };
        let file = normalize(&build, &package("app-shells/bash-5.2_p37", 1), entry).unwrap();
        assert_eq!(file.binpkg.build, build);
        assert_eq!(file.binpkg.cpvb.as_str(), "app-shells/bash-5.2_p37-1");
        assert_eq!(file.binpkg.repo, "gentoo");
        assert_eq!(file.binpkg.build_time.unix_timestamp(), 1_739_000_000);
        assert_eq!(file.path, PathBuf::from("/bin/bash"));
        assert_eq!(file.basename(), "bash");
        assert_eq!(file.timestamp.unix_timestamp(), 1_739_000_123);
        assert_eq!(file.size, 1_142_024);
    }

    #[test]
    fn test_normalize_mtime_out_of_range() {
        let build = Build::new("lighthouse", "34");
        let entry = FileEntry { name: "image/bin/bash".to_string(), mtime: u64::MAX, size: 0 };
        let err = normalize(&build, &package("app-shells/bash-5.2_p37", 1), entry).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData(_)));
    }
}
