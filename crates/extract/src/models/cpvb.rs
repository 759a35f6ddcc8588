use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A package atom with its binary build number appended:
/// `<category>/<package>-<version>-<build_id>`, e.g. `app-shells/bash-5.2_p37-1`.
///
/// The trailing `-<digits>` is validated on construction so the accessors
/// below never have to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cpvb {
    value: String,
    // Byte offset of the dash separating the cpv from the build id.
    split: usize,
    build_id: u64,
}
impl Cpvb {
    /// Assemble from a cpv and its build id.
    pub fn new(cpv: impl AsRef<str>, build_id: u64) -> Result<Self, Error> {
        format!("{}-{}", cpv.as_ref(), build_id).parse()
    }

    /// `<category>/<package>-<version>`
    pub fn cpv(&self) -> &str {
        &self.value[..self.split]
    }

    pub fn build_id(&self) -> u64 {
        self.build_id
    }

    /// `<package>-<version>`, the cpv without its category.
    pub fn pv(&self) -> &str {
        let cpv = self.cpv();
        cpv.split_once('/').map_or(cpv, |(_, pv)| pv)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl FromStr for Cpvb {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ErrorKind::InvalidCpvb(s.to_string());
        let Some((cpv, build_id)) = s.rsplit_once('-') else {
            exn::bail!(invalid());
        };
        if cpv.is_empty() || build_id.is_empty() || !build_id.bytes().all(|b| b.is_ascii_digit()) {
            exn::bail!(invalid());
        }
        let Ok(build_id) = build_id.parse::<u64>() else {
            exn::bail!(invalid());
        };
        Ok(Self { value: s.to_string(), split: cpv.len(), build_id })
    }
}
impl TryFrom<String> for Cpvb {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
impl AsRef<str> for Cpvb {
    fn as_ref(&self) -> &str {
        &self.value
    }
}
impl Display for Cpvb {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.value)
    }
}
