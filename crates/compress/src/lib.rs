//! Compression detection and decompression for package image archives.
//!
//! A GLEP 78 binary package stores its installed file tree as a nested
//! `image.tar[.<ext>]` member, compressed with whatever the building host was
//! configured to use. This crate wraps the supported codecs behind a single
//! [`Compression`] enum, providing:
//!
//! - **Format detection** from member names ([`Compression::from_path`]) or
//!   magic bytes ([`Compression::from_magic_bytes`]), and a combined
//!   [`Compression::detect`] that prefers the magic bytes when they disagree
//! - **Streaming** decompression via wrapped readers ([`Compression::wrap_reader`])
//! - **In-memory** compression ([`Compression::compress`]), for building test
//!   fixtures
//!
//! Bzip2 and Gzip are always available. LZ4, XZ and Zstd are behind (default)
//! feature flags. Portage can also write lzip, lzop and brotli images; those
//! are reported as [`UnsupportedFormat`](error::ErrorKind::UnsupportedFormat)
//! rather than misread as plain tar.

mod construct;
pub mod error;
mod ops;
mod util;

pub use crate::construct::MAGIC_BYTES_LEN;

/// A supported compression format.
///
/// Variants gated behind feature flags (`xz`, `zstd`) are only available when
/// the corresponding feature is enabled. Defaults to [`None`](Self::None)
/// (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// LZ4 frame compression (.lz4)
    #[cfg(feature = "lz4")]
    Lz4,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
    /// Zstd compression (.zst)
    #[cfg(feature = "zstd")]
    Zstd,
}
