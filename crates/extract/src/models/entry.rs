use std::path::PathBuf;

const IMAGE_PREFIX: &str = "image";

/// A regular, link, or device member of a package's image archive.
///
/// `name` is the raw member name, still carrying the `image/` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Seconds since the epoch.
    pub mtime: u64,
    pub size: u64,
}
impl FileEntry {
    /// The installed path: `image/bin/bash` becomes `/bin/bash`.
    pub fn path(&self) -> PathBuf {
        let path = self.name.strip_prefix(IMAGE_PREFIX).unwrap_or(&self.name);
        if path.starts_with('/') { PathBuf::from(path) } else { PathBuf::from(format!("/{path}")) }
    }
}
