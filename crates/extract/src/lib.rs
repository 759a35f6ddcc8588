//! Data model and file-manifest extraction for GLEP 78 binary packages.
//!
//! Given the bytes of a `.gpkg.tar` and the [`Package`](models::Package)
//! entry describing it, [`extract`] lazily streams every file the package
//! installs. [`Normalizer`] then attaches those entries to a
//! [`Build`](models::Build), producing [`ContentFile`](models::ContentFile)
//! records ready for storage.
//!
//! ```no_run
//! use futures::StreamExt;
//! use gbpfl_extract::models::{Build, Package};
//! use gbpfl_extract::{Normalizer, extract};
//!
//! # async fn example(package: Package) -> gbpfl_extract::error::Result<()> {
//! let build = Build::new("lighthouse", "34");
//! let normalizer = Normalizer::new(&build, &package)?;
//! let file = std::fs::File::open(&package.path).unwrap();
//! let mut entries = std::pin::pin!(extract(file, package));
//! while let Some(entry) = entries.next().await {
//!     println!("{}", normalizer.normalize(entry?)?.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
mod gpkg;
pub mod models;
mod normalize;

pub use crate::gpkg::{IDENTIFIER, Layout, extract, walk};
pub use crate::normalize::{Normalizer, make_binpkg, normalize};
