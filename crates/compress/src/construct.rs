use crate::Compression;
use crate::error::{Error, ErrorKind, Result};
use std::{path::Path, str::FromStr};

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
#[cfg(feature = "lz4")]
const LZ4_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];
#[cfg(feature = "xz")]
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
#[cfg(feature = "zstd")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Number of leading bytes needed to recognise every supported format.
pub const MAGIC_BYTES_LEN: usize = 6;

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "none" | "tar" => Ok(Compression::None),
            "bz2" | "bzip2" => Ok(Compression::Bzip2),
            "gz" | "gzip" => Ok(Compression::Gzip),
            #[cfg(feature = "lz4")]
            "lz4" => Ok(Compression::Lz4),
            #[cfg(not(feature = "lz4"))]
            "lz4" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "xz")]
            "xz" | "lzma" => Ok(Compression::Xz),
            #[cfg(not(feature = "xz"))]
            "xz" | "lzma" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "zstd")]
            "zst" | "zstd" => Ok(Compression::Zstd),
            #[cfg(not(feature = "zstd"))]
            "zst" | "zstd" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}
impl Compression {
    /// Detect compression from a file (or archive member) extension.
    ///
    /// Unknown extensions are treated as uncompressed.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or(Compression::None)
    }

    /// Detect compression format from magic bytes.
    ///
    /// Returns the `None` variant if no magic bytes match or if the input is
    /// too short to detect any format.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Compression::Bzip2;
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Compression::Gzip;
        }
        #[cfg(feature = "lz4")]
        if bytes.starts_with(&LZ4_MAGIC) {
            return Compression::Lz4;
        }
        #[cfg(feature = "xz")]
        if bytes.starts_with(&XZ_MAGIC) {
            return Compression::Xz;
        }
        #[cfg(feature = "zstd")]
        if bytes.starts_with(&ZSTD_MAGIC) {
            return Compression::Zstd;
        }
        Compression::None
    }

    /// Detect the compression of an archive member from its name and the
    /// first [`MAGIC_BYTES_LEN`] bytes of its contents.
    ///
    /// The magic bytes win whenever they identify a format. Otherwise the
    /// extension decides, and an extension naming a format we don't support
    /// (`image.tar.lz`) is an error rather than being silently read as a
    /// plain tarball. An extension claiming a supported compression whose
    /// magic bytes are absent is [`InvalidData`](ErrorKind::InvalidData).
    pub fn detect(path: impl AsRef<Path>, head: &[u8]) -> Result<Self> {
        let by_magic = Self::from_magic_bytes(head);
        if by_magic != Compression::None {
            return Ok(by_magic);
        }
        let Some(ext) = path.as_ref().extension().and_then(|ext| ext.to_str()) else {
            return Ok(Compression::None);
        };
        match ext.parse::<Compression>()? {
            Compression::None => Ok(Compression::None),
            _ => exn::bail!(ErrorKind::InvalidData),
        }
    }
}
