//! Query parameters shared by every backend.
//!
//! Parsing lives here so that both backends agree on what a count filter or
//! a search key means; each backend only decides how to execute it.

use crate::error::{ErrorKind, Result};
use gbpfl_extract::models::ContentFile;

/// Scope of a [`count`](crate::ContentFiles::count).
///
/// Each level requires the one before it: a build id means nothing without
/// its machine, a cpvb nothing without its build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFilter<'a> {
    All,
    Machine(&'a str),
    Build(&'a str, &'a str),
    Package(&'a str, &'a str, &'a str),
}
impl<'a> CountFilter<'a> {
    /// Validate an optional `(machine, build_id, cpvb)` triple. Empty strings
    /// count as not supplied.
    ///
    /// ```
    /// use gbpfl_records::CountFilter;
    ///
    /// let filter = CountFilter::new(Some("polaris"), Some("26"), None).unwrap();
    /// assert_eq!(filter, CountFilter::Build("polaris", "26"));
    /// assert!(CountFilter::new(None, Some("26"), None).is_err());
    /// ```
    pub fn new(machine: Option<&'a str>, build_id: Option<&'a str>, cpvb: Option<&'a str>) -> Result<Self> {
        let supplied = |value: Option<&'a str>| value.filter(|value| !value.is_empty());
        match (supplied(machine), supplied(build_id), supplied(cpvb)) {
            (None, None, None) => Ok(Self::All),
            (Some(machine), None, None) => Ok(Self::Machine(machine)),
            (Some(machine), Some(build_id), None) => Ok(Self::Build(machine, build_id)),
            (Some(machine), Some(build_id), Some(cpvb)) => Ok(Self::Package(machine, build_id, cpvb)),
            (None, Some(_), _) => exn::bail!(ErrorKind::InvalidQuery("must supply machine if supplying build_id".into())),
            (_, None, Some(_)) => exn::bail!(ErrorKind::InvalidQuery("must supply build_id if supplying cpvb".into())),
        }
    }

    pub fn matches(&self, file: &ContentFile) -> bool {
        match *self {
            Self::All => true,
            Self::Machine(machine) => file.machine() == machine,
            Self::Build(machine, build_id) => file.machine() == machine && file.build_id() == build_id,
            Self::Package(machine, build_id, cpvb) => {
                file.machine() == machine && file.build_id() == build_id && file.binpkg.cpvb.as_str() == cpvb
            },
        }
    }
}

/// How a search key is matched against file records.
///
/// | key          | matches                                  |
/// |--------------|------------------------------------------|
/// | `""`         | nothing                                  |
/// | `bin/bash`   | path exactly `/bin/bash` (contains `/`)  |
/// | `*ash*`      | basename contains `ash`                  |
/// | `*ash`       | basename ends with `ash`                 |
/// | `bash*`      | basename starts with `bash`              |
/// | `bash`       | basename exactly `bash`                  |
///
/// Keys made only of asterisks become a [`Contains`](Self::Contains) of the
/// empty string and so match every basename. An asterisk anywhere other than
/// the ends is taken literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    Nothing,
    Path(String),
    Contains(String),
    EndsWith(String),
    StartsWith(String),
    Basename(String),
}
impl SearchKey {
    pub fn parse(key: &str) -> Self {
        if key.is_empty() {
            return Self::Nothing;
        }
        if key.contains('/') {
            return match key.starts_with('/') {
                true => Self::Path(key.to_string()),
                false => Self::Path(format!("/{key}")),
            };
        }
        match (key.starts_with('*'), key.ends_with('*')) {
            (true, true) => Self::Contains(key.trim_matches('*').to_string()),
            (true, false) => Self::EndsWith(key.trim_start_matches('*').to_string()),
            (false, true) => Self::StartsWith(key.trim_end_matches('*').to_string()),
            (false, false) => Self::Basename(key.to_string()),
        }
    }

    pub fn matches(&self, file: &ContentFile) -> bool {
        let basename = file.basename();
        match self {
            Self::Nothing => false,
            Self::Path(path) => file.path.to_str() == Some(path.as_str()),
            Self::Contains(part) => basename.contains(part.as_str()),
            Self::EndsWith(suffix) => basename.ends_with(suffix.as_str()),
            Self::StartsWith(prefix) => basename.starts_with(prefix.as_str()),
            Self::Basename(name) => basename == name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, None, CountFilter::All)]
    #[case(Some("polaris"), None, None, CountFilter::Machine("polaris"))]
    #[case(Some("polaris"), Some("26"), None, CountFilter::Build("polaris", "26"))]
    #[case(Some("polaris"), Some("26"), Some("app-arch/tar-1.35-1"), CountFilter::Package("polaris", "26", "app-arch/tar-1.35-1"))]
    #[case(Some(""), Some(""), Some(""), CountFilter::All)]
    #[case(Some("polaris"), Some(""), None, CountFilter::Machine("polaris"))]
    fn test_count_filter(
        #[case] machine: Option<&str>,
        #[case] build_id: Option<&str>,
        #[case] cpvb: Option<&str>,
        #[case] expected: CountFilter,
    ) {
        assert_eq!(CountFilter::new(machine, build_id, cpvb).unwrap(), expected);
    }

    #[rstest]
    #[case(None, Some("34"), None)]
    #[case(None, None, Some("app-arch/tar-1.35-1"))]
    #[case(Some("polaris"), None, Some("app-arch/tar-1.35-1"))]
    #[case(None, Some("34"), Some("app-arch/tar-1.35-1"))]
    #[case(Some(""), Some("34"), None)]
    fn test_count_filter_invalid(#[case] machine: Option<&str>, #[case] build_id: Option<&str>, #[case] cpvb: Option<&str>) {
        let err = CountFilter::new(machine, build_id, cpvb).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidQuery(_)));
    }

    #[rstest]
    #[case("", SearchKey::Nothing)]
    #[case("/bin/bash", SearchKey::Path("/bin/bash".into()))]
    #[case("bin/bash", SearchKey::Path("/bin/bash".into()))]
    #[case("*/bash*", SearchKey::Path("/*/bash*".into()))]
    #[case("*ash*", SearchKey::Contains("ash".into()))]
    #[case("*ash", SearchKey::EndsWith("ash".into()))]
    #[case("**ash", SearchKey::EndsWith("ash".into()))]
    #[case("bash*", SearchKey::StartsWith("bash".into()))]
    #[case("bash", SearchKey::Basename("bash".into()))]
    #[case("b*sh", SearchKey::Basename("b*sh".into()))]
    #[case("*", SearchKey::Contains("".into()))]
    fn test_search_key(#[case] key: &str, #[case] expected: SearchKey) {
        assert_eq!(SearchKey::parse(key), expected);
    }
}
