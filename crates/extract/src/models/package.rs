use super::Cpvb;
use crate::error::Result;
use std::path::PathBuf;

/// A package entry as listed in a build's `Packages` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// `<category>/<package>-<version>`
    pub cpv: String,
    pub repo: String,
    /// Location of the `.gpkg.tar` relative to the build's binpkg directory.
    pub path: PathBuf,
    pub build_id: u64,
    /// Seconds since the epoch.
    pub build_time: i64,
}
impl Package {
    pub fn cpvb(&self) -> Result<Cpvb> {
        Cpvb::new(&self.cpv, self.build_id)
    }

    /// `<package>-<version>`: the cpv without its category.
    pub fn pv(&self) -> &str {
        self.cpv.split_once('/').map_or(self.cpv.as_str(), |(_, pv)| pv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpvb() {
        let package = Package {
            cpv: "app-shells/bash-5.2_p37".to_string(),
            repo: "gentoo".to_string(),
            path: PathBuf::from("app-shells/bash/bash-5.2_p37-1.gpkg.tar"),
            build_id: 1,
            build_time: 1_739_000_000,
        };
        assert_eq!(package.pv(), "bash-5.2_p37");
        assert_eq!(package.cpvb().unwrap().as_str(), "app-shells/bash-5.2_p37-1");
    }
}
