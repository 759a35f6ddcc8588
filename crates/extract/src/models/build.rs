use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// One published build of a machine's package set.
///
/// Identity is the `(machine, build_id)` pair. Neither half is interpreted:
/// `build_id` is usually a number but is kept as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Build {
    pub machine: String,
    pub build_id: String,
}
impl Build {
    pub fn new(machine: impl Into<String>, build_id: impl Into<String>) -> Self {
        Self { machine: machine.into(), build_id: build_id.into() }
    }
}

impl Display for Build {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}", self.machine, self.build_id)
    }
}

/// Parses the `<machine>.<build_id>` form used on the command line. Machine
/// names may themselves contain dots, so the split happens on the last one.
impl FromStr for Build {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('.') {
            Some((machine, build_id)) if !machine.is_empty() && !build_id.is_empty() => {
                Ok(Self::new(machine, build_id))
            },
            _ => exn::bail!(ErrorKind::InvalidBuild(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("babette.1505", "babette", "1505")]
    #[case("web.server.7", "web.server", "7")]
    fn test_parse(#[case] input: &str, #[case] machine: &str, #[case] build_id: &str) {
        let build: Build = input.parse().unwrap();
        assert_eq!(build, Build::new(machine, build_id));
        assert_eq!(build.to_string(), input);
    }

    #[rstest]
    #[case("babette")]
    #[case(".1505")]
    #[case("babette.")]
    #[case("")]
    fn test_parse_invalid(#[case] input: &str) {
        let err = input.parse::<Build>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidBuild(_)));
    }
}
