//! Compression Operations

use crate::Compression;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
#[cfg(feature = "lz4")]
use lz4_flex::frame::{FrameDecoder as Lz4Decoder, FrameEncoder as Lz4Encoder};
use std::io::{Read, Write};
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Portage's defaults. Only relevant when building archives (fixtures); reading
// doesn't care which level was used.
const BZIP2_LEVEL: BzCompression = BzCompression::new(9);
const GZIP_LEVEL: GzCompression = GzCompression::new(6);
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 6;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

impl Compression {
    /// Compress a byte slice in memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use gbpfl_compress::Compression;
    ///
    /// let compressed = Compression::Gzip.compress(b"image/bin/bash").unwrap();
    /// assert_eq!(Compression::from_magic_bytes(&compressed), Compression::Gzip);
    /// ```
    #[instrument(skip(input), fields(format = %self, input_size = input.len()))]
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        {
            let mut encoder = self.wrap_writer(&mut output)?;
            encoder.write_all(input).or_raise(|| ErrorKind::Io)?;
            encoder.flush().or_raise(|| ErrorKind::Io)?;
        }
        Ok(output)
    }

    /// Wrap a reader with the appropriate decompression layer.
    ///
    /// This is how the inner image archive of a package is read: the outer
    /// tar entry is handed in as-is, and whatever comes out is a plain tar
    /// stream. Nothing is buffered beyond what the decoder itself needs.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::{Cursor, Read};
    /// use gbpfl_compress::Compression;
    ///
    /// let compressed = Compression::Gzip.compress(b"Hello, world!").unwrap();
    /// let mut reader = Compression::Gzip.wrap_reader(Cursor::new(compressed)).unwrap();
    /// let mut decompressed = Vec::new();
    /// reader.read_to_end(&mut decompressed).unwrap();
    /// assert_eq!(decompressed, b"Hello, world!");
    /// ```
    pub fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(reader),
            Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
            Compression::Gzip => Box::new(GzDecoder::new(reader)),
            #[cfg(feature = "lz4")]
            Compression::Lz4 => Box::new(Lz4Decoder::new(reader)),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }

    /// Wrap a writer with the appropriate compression layer.
    ///
    /// The returned writer finishes the compressed stream when dropped.
    pub fn wrap_writer<'a, W: Write + 'a>(&self, writer: W) -> Result<Box<dyn Write + 'a>> {
        Ok(match self {
            Compression::None => Box::new(writer),
            Compression::Bzip2 => Box::new(BzEncoder::new(writer, BZIP2_LEVEL)),
            Compression::Gzip => Box::new(GzEncoder::new(writer, GZIP_LEVEL)),
            #[cfg(feature = "lz4")]
            Compression::Lz4 => Box::new(Lz4Encoder::new(writer).auto_finish()),
            #[cfg(feature = "xz")]
            Compression::Xz => Box::new(XzEncoder::new(writer, XZ_LEVEL)),
            #[cfg(feature = "zstd")]
            Compression::Zstd => {
                Box::new(ZstdEncoder::new(writer, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?.auto_finish())
            },
        })
    }
}
