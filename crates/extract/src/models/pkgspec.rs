use super::{Build, Cpvb};
use crate::error::{Error, ErrorKind};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static PKGSPEC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<machine>[^/\s]+)/(?P<build_id>[^/\s]+)/(?P<cpvb>[^/\s]+/[^/\s]+-[0-9][^/\s]*-[0-9]+)$")
        .expect("pkgspec pattern compiles")
});

/// A fully qualified package reference,
/// `<machine>/<build_id>/<category>/<package>-<version>-<build_id>`,
/// as accepted by `gbp-fl ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgSpec {
    pub build: Build,
    pub cpvb: Cpvb,
}

impl FromStr for PkgSpec {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(captures) = PKGSPEC_REGEX.captures(s) else {
            exn::bail!(ErrorKind::InvalidPkgSpec(s.to_string()));
        };
        Ok(Self {
            build: Build::new(&captures["machine"], &captures["build_id"]),
            cpvb: captures["cpvb"].parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse() {
        let spec: PkgSpec = "lighthouse/34/app-shells/bash-5.2_p37-1".parse().unwrap();
        assert_eq!(spec.build, Build::new("lighthouse", "34"));
        assert_eq!(spec.cpvb.as_str(), "app-shells/bash-5.2_p37-1");
    }

    #[rstest]
    #[case("lighthouse/34/app-shells/bash-5.2_p37")]
    #[case("lighthouse/app-shells/bash-5.2_p37-1")]
    #[case("app-shells/bash-5.2_p37-1")]
    #[case("lighthouse/34/app-shells/bash-5.2_p37-1/extra")]
    fn test_parse_invalid(#[case] input: &str) {
        let err = input.parse::<PkgSpec>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPkgSpec(_)));
    }
}
