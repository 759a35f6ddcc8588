//! Parser for Portage's `Packages` index.
//!
//! The file is a sequence of stanzas separated by blank lines, each made of
//! `KEY: value` lines. The first stanza describes the repository as a whole
//! and is skipped; every following stanza describes one binary package.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use gbpfl_extract::models::Package;
use std::collections::HashMap;

fn stanzas(text: &str) -> impl Iterator<Item = HashMap<&str, &str>> {
    text.split("\n\n")
        .map(|stanza| {
            stanza
                .lines()
                .filter_map(|line| line.split_once(':'))
                .map(|(key, value)| (key.trim(), value.trim()))
                .collect::<HashMap<_, _>>()
        })
        .filter(|fields| !fields.is_empty())
}

fn required<'a>(fields: &HashMap<&str, &'a str>, key: &'static str, cpv: &str) -> Result<&'a str> {
    match fields.get(key).copied() {
        Some(value) => Ok(value),
        None => exn::bail!(ErrorKind::InvalidIndex(format!("{cpv}: missing {key}"))),
    }
}

fn number<T: std::str::FromStr>(fields: &HashMap<&str, &str>, key: &'static str, cpv: &str) -> Result<T> {
    let value = required(fields, key, cpv)?;
    match value.parse() {
        Ok(number) => Ok(number),
        Err(_) => exn::bail!(ErrorKind::InvalidIndex(format!("{cpv}: {key} is not a number: {value}"))),
    }
}

/// Parse the packages listed in a `Packages` index, in file order.
///
/// Stanzas without a `PATH` (packages only present in the legacy `.tbz2`
/// layout) are skipped.
pub fn parse(text: &str) -> Result<Vec<Package>> {
    let text = text.replace("\r\n", "\n");
    let mut packages = Vec::new();
    for fields in stanzas(&text).skip(1) {
        let Some(cpv) = fields.get("CPV").copied() else {
            exn::bail!(ErrorKind::InvalidIndex("package stanza without CPV".to_string()));
        };
        let Some(path) = fields.get("PATH") else {
            tracing::trace!(cpv, "skipping package without PATH");
            continue;
        };
        packages.push(Package {
            cpv: cpv.to_string(),
            repo: required(&fields, "REPO", cpv)?.to_string(),
            path: validate_path(path)?,
            build_id: number(&fields, "BUILD_ID", cpv)?,
            build_time: number(&fields, "BUILD_TIME", cpv)?,
        });
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const PACKAGES: &str = "\
ACCEPT_KEYWORDS: amd64
ARCH: amd64
PACKAGES: 3
TIMESTAMP: 1739000000
VERSION: 0

BUILD_ID: 1
BUILD_TIME: 1738990000
CPV: app-shells/bash-5.2_p37
DEFINED_PHASES: compile configure install
MD5: 1f0ba3c45bd6f4a2c4e4a18c0a0f2a3b
PATH: app-shells/bash/bash-5.2_p37-1.gpkg.tar
REPO: gentoo
SIZE: 1843200

BUILD_ID: 3
BUILD_TIME: 1738991234
CPV: sys-libs/ncurses-6.5_p20250125
REPO: gentoo

BUILD_ID: 2
BUILD_TIME: 1738992000
CPV: x11-apps/xhost-1.0.10
PATH: x11-apps/xhost/xhost-1.0.10-2.gpkg.tar
REPO: marduk
";

    #[test]
    fn test_parse() {
        let packages = parse(PACKAGES).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].cpv, "app-shells/bash-5.2_p37");
        assert_eq!(packages[0].repo, "gentoo");
        assert_eq!(packages[0].path, Path::new("app-shells/bash/bash-5.2_p37-1.gpkg.tar"));
        assert_eq!(packages[0].build_id, 1);
        assert_eq!(packages[0].build_time, 1_738_990_000);
        assert_eq!(packages[1].cpv, "x11-apps/xhost-1.0.10");
        assert_eq!(packages[1].repo, "marduk");
        assert_eq!(packages[1].build_id, 2);
    }

    #[test]
    fn test_parse_header_only() {
        assert!(parse("VERSION: 0\nPACKAGES: 0\n").unwrap().is_empty());
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_bad_build_id() {
        let text = "VERSION: 0\n\nBUILD_ID: one\nBUILD_TIME: 0\nCPV: a/b-1\nPATH: a/b/b-1-1.gpkg.tar\nREPO: gentoo\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidIndex(_)));
    }

    #[test]
    fn test_parse_path_escape() {
        let text = "VERSION: 0\n\nBUILD_ID: 1\nBUILD_TIME: 0\nCPV: a/b-1\nPATH: ../../b-1-1.gpkg.tar\nREPO: gentoo\n";
        let err = parse(text).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
