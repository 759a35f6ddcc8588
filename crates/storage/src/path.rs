//! Validation of paths taken from `Packages` indexes.
//!
//! A `PATH` entry is data read from disk, and it gets joined onto the
//! build's binpkgs directory. It must not be able to point anywhere else.

use crate::error::{ErrorKind, Result};
use std::path::{Component, Path, PathBuf};

/// Normalise a relative path, refusing anything that would leave the
/// directory it is joined onto.
///
/// `.` and repeated separators are dropped, `..` is resolved as long as it
/// stays inside, and a leading `/` is ignored. Null bytes, Windows prefixes,
/// and paths that normalise to nothing are [`InvalidPath`](ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use gbpfl_storage::validate_path;
///
/// assert_eq!(
///     validate_path("app-shells/bash/./bash-5.2_p37-1.gpkg.tar").unwrap(),
///     Path::new("app-shells/bash/bash-5.2_p37-1.gpkg.tar"),
/// );
/// assert!(validate_path("../../etc/shadow").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(path.to_path_buf());
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                // Would be silently truncated by the OS.
                if part.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(part);
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(invalid());
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("app-shells/bash/bash-5.2_p37-1.gpkg.tar", "app-shells/bash/bash-5.2_p37-1.gpkg.tar")]
    #[case("app-shells//bash/bash-5.2_p37-1.gpkg.tar", "app-shells/bash/bash-5.2_p37-1.gpkg.tar")]
    #[case("/app-shells/bash/bash-5.2_p37-1.gpkg.tar", "app-shells/bash/bash-5.2_p37-1.gpkg.tar")]
    #[case("app-shells/zsh/../bash/bash-5.2_p37-1.gpkg.tar", "app-shells/bash/bash-5.2_p37-1.gpkg.tar")]
    #[case("bash-5.2_p37-1.gpkg.tar/", "bash-5.2_p37-1.gpkg.tar")]
    fn test_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../Packages")]
    #[case("app-shells/../../Packages")]
    #[case("..")]
    #[case("")]
    #[case("./.")]
    #[case("//")]
    #[case("app-shells/ba\0sh")]
    fn test_invalid(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
