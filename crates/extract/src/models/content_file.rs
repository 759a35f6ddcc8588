use super::BinPkg;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One installed file of a binary package, within one build.
///
/// Identity is `(machine, build_id, cpvb, path)`; there is no separate key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFile {
    pub binpkg: BinPkg,
    /// Absolute path of the file on the installed system (`/bin/bash`).
    pub path: PathBuf,
    /// Modification time recorded in the image.
    pub timestamp: OffsetDateTime,
    /// Size in bytes.
    pub size: u64,
}
impl ContentFile {
    pub fn machine(&self) -> &str {
        &self.binpkg.build.machine
    }

    pub fn build_id(&self) -> &str {
        &self.binpkg.build.build_id
    }

    /// Final path component, or an empty string for `/`.
    pub fn basename(&self) -> &str {
        self.path.file_name().and_then(|name| name.to_str()).unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
