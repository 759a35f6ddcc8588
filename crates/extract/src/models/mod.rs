mod binpkg;
mod build;
mod content_file;
mod cpvb;
mod entry;
mod package;
mod pkgspec;

pub use self::binpkg::BinPkg;
pub use self::build::Build;
pub use self::content_file::ContentFile;
pub use self::cpvb::Cpvb;
pub use self::entry::FileEntry;
pub use self::package::Package;
pub use self::pkgspec::PkgSpec;
