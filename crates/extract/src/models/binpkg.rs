use super::{Build, Cpvb};
use time::OffsetDateTime;

/// A binary package as it belongs to a specific build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinPkg {
    pub build: Build,
    pub cpvb: Cpvb,
    /// Repository the package was built from (`gentoo`, `marduk`, ...).
    pub repo: String,
    pub build_time: OffsetDateTime,
}
impl BinPkg {
    pub fn cpv(&self) -> &str {
        self.cpvb.cpv()
    }

    pub fn build_id(&self) -> u64 {
        self.cpvb.build_id()
    }
}
