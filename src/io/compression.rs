//! Stream codecs for the supported compression formats.
//!
//! Each [`CompressionFormat`] maps to a pair of stream wrappers:
//! - [`wrap_reader`] turns a compressed byte stream into plain bytes
//! - [`wrap_writer`] turns plain bytes into a compressed byte stream
//!
//! ## Built-in Codecs
//!
//! When enabled via feature flags, the following codecs are available:
//! - **Gzip** (`.gz`) - via `flate2` crate (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) - via `zstd` crate (feature: `compression-zstd`)
//! - **Bzip2** (`.bz2`) - via `bzip2` crate (feature: `compression-bzip2`)
//! - **Xz** (`.xz`) - via `xz2` crate (feature: `compression-xz`)
//!
//! [`CompressionFormat::None`] is an identity pass-through. Asking for a codec
//! whose feature is disabled fails with [`ErrorKind::Unsupported`].
//!
//! ## Zip
//!
//! Zip is a container, not a stream codec: a zip file's member list *is* the
//! dataset's file list. Wrapping a stream with [`CompressionFormat::Zip`] is
//! therefore rejected; the builder routes zip requests to
//! [`ZipArchiveDataSource`](crate::datasource::archive::zip::ZipArchiveDataSource).
//!
//! ## Concatenated streams
//!
//! Appending to a compressed file writes a second compressed stream after the
//! first one. The gzip, bzip2 and xz readers are multi-stream decoders and zstd
//! decodes consecutive frames natively, so appended members read back whole.
//!
//! ## Explicit finish
//!
//! Compressors buffer data and write trailers when finished. [`Encoder::finish`]
//! surfaces trailer write errors instead of swallowing them on drop, which the
//! archive rewrite path relies on before it swaps files.
//!
//! [`ErrorKind::Unsupported`]: crate::error::ErrorKind::Unsupported

use crate::error::DataSourceError;
use crate::format::CompressionFormat;
use anyhow::Result;
use std::io::{self, Read, Write};

/// Human-readable codec name.
#[must_use]
pub fn codec_name(format: CompressionFormat) -> &'static str {
    match format {
        CompressionFormat::None => "identity",
        CompressionFormat::Gzip => "gzip",
        CompressionFormat::Bzip2 => "bzip2",
        CompressionFormat::Xz => "xz",
        CompressionFormat::Zip => "zip",
        CompressionFormat::Zstd => "zstd",
    }
}

/// Magic byte signature at the start of a stream of this format.
#[must_use]
pub fn magic_bytes(format: CompressionFormat) -> Option<&'static [u8]> {
    match format {
        CompressionFormat::None => None,
        CompressionFormat::Gzip => Some(&[0x1f, 0x8b]),
        CompressionFormat::Bzip2 => Some(b"BZh"),
        CompressionFormat::Xz => Some(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]),
        CompressionFormat::Zip => Some(&[0x50, 0x4b, 0x03, 0x04]),
        CompressionFormat::Zstd => Some(&[0x28, 0xb5, 0x2f, 0xfd]),
    }
}

/// Detect a compression format from the first bytes of a stream.
///
/// Returns `None` when no known signature matches, which usually means the
/// bytes are uncompressed.
#[must_use]
pub fn sniff_compression(head: &[u8]) -> Option<CompressionFormat> {
    CompressionFormat::COMPRESSED.into_iter().find(|format| {
        magic_bytes(*format).is_some_and(|magic| head.starts_with(magic))
    })
}

/// Whether `format` can wrap a single stream in this build.
#[must_use]
pub fn is_available(format: CompressionFormat) -> bool {
    match format {
        CompressionFormat::None => true,
        CompressionFormat::Zip => false,
        CompressionFormat::Gzip => cfg!(feature = "compression-gzip"),
        CompressionFormat::Zstd => cfg!(feature = "compression-zstd"),
        CompressionFormat::Bzip2 => cfg!(feature = "compression-bzip2"),
        CompressionFormat::Xz => cfg!(feature = "compression-xz"),
    }
}

#[cfg(not(all(
    feature = "compression-gzip",
    feature = "compression-zstd",
    feature = "compression-bzip2",
    feature = "compression-xz"
)))]
fn not_compiled_in(format: CompressionFormat, feature: &str) -> anyhow::Error {
    anyhow::Error::new(DataSourceError::unsupported(format!(
        "{} codec is not available (enable feature `{feature}`)",
        codec_name(format)
    )))
}

fn zip_is_an_archive() -> anyhow::Error {
    anyhow::Error::new(DataSourceError::unsupported(
        "zip is an archive format and cannot wrap a single stream",
    ))
}

/// Wrap a reader with decompression for `format`.
///
/// # Errors
/// Returns an [`Unsupported`](crate::error::ErrorKind::Unsupported) error for
/// [`CompressionFormat::Zip`] or a codec whose feature is disabled, and an I/O
/// error if the decoder cannot be initialized.
pub fn wrap_reader<R: Read + Send + 'static>(
    format: CompressionFormat,
    reader: R,
) -> Result<Box<dyn Read + Send>> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Zip => Err(zip_is_an_archive()),
        #[cfg(feature = "compression-gzip")]
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
        #[cfg(not(feature = "compression-gzip"))]
        CompressionFormat::Gzip => Err(not_compiled_in(format, "compression-gzip")),
        #[cfg(feature = "compression-zstd")]
        CompressionFormat::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(reader)?)),
        #[cfg(not(feature = "compression-zstd"))]
        CompressionFormat::Zstd => Err(not_compiled_in(format, "compression-zstd")),
        #[cfg(feature = "compression-bzip2")]
        CompressionFormat::Bzip2 => Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader))),
        #[cfg(not(feature = "compression-bzip2"))]
        CompressionFormat::Bzip2 => Err(not_compiled_in(format, "compression-bzip2")),
        #[cfg(feature = "compression-xz")]
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
        #[cfg(not(feature = "compression-xz"))]
        CompressionFormat::Xz => Err(not_compiled_in(format, "compression-xz")),
    }
}

/// Wrap a writer with compression for `format`.
///
/// # Errors
/// Same conditions as [`wrap_reader`].
pub fn wrap_writer<W: Write>(format: CompressionFormat, writer: W) -> Result<Encoder<W>> {
    Encoder::new(format, writer)
}

/// A writer that compresses into `W`.
///
/// Call [`finish`](Encoder::finish) to write the stream trailer and get the
/// inner writer back. Dropping an unfinished encoder may leave a truncated
/// stream behind.
pub enum Encoder<W: Write> {
    Identity(W),
    #[cfg(feature = "compression-gzip")]
    Gzip(flate2::write::GzEncoder<W>),
    #[cfg(feature = "compression-zstd")]
    Zstd(zstd::stream::write::Encoder<'static, W>),
    #[cfg(feature = "compression-bzip2")]
    Bzip2(bzip2::write::BzEncoder<W>),
    #[cfg(feature = "compression-xz")]
    Xz(xz2::write::XzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Wrap `writer` with compression for `format`.
    ///
    /// # Errors
    /// Same conditions as [`wrap_reader`].
    pub fn new(format: CompressionFormat, writer: W) -> Result<Self> {
        match format {
            CompressionFormat::None => Ok(Self::Identity(writer)),
            CompressionFormat::Zip => Err(zip_is_an_archive()),
            #[cfg(feature = "compression-gzip")]
            CompressionFormat::Gzip => Ok(Self::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            ))),
            #[cfg(not(feature = "compression-gzip"))]
            CompressionFormat::Gzip => Err(not_compiled_in(format, "compression-gzip")),
            #[cfg(feature = "compression-zstd")]
            CompressionFormat::Zstd => {
                Ok(Self::Zstd(zstd::stream::write::Encoder::new(writer, 3)?))
            }
            #[cfg(not(feature = "compression-zstd"))]
            CompressionFormat::Zstd => Err(not_compiled_in(format, "compression-zstd")),
            #[cfg(feature = "compression-bzip2")]
            CompressionFormat::Bzip2 => Ok(Self::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::default(),
            ))),
            #[cfg(not(feature = "compression-bzip2"))]
            CompressionFormat::Bzip2 => Err(not_compiled_in(format, "compression-bzip2")),
            #[cfg(feature = "compression-xz")]
            CompressionFormat::Xz => Ok(Self::Xz(xz2::write::XzEncoder::new(writer, 6))),
            #[cfg(not(feature = "compression-xz"))]
            CompressionFormat::Xz => Err(not_compiled_in(format, "compression-xz")),
        }
    }

    /// Write any pending data and the stream trailer, then return the inner writer.
    ///
    /// # Errors
    /// Propagates write errors from the codec or the inner writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Self::Identity(writer) => Ok(writer),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip(encoder) => encoder.finish(),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd(encoder) => encoder.finish(),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2(encoder) => encoder.finish(),
            #[cfg(feature = "compression-xz")]
            Self::Xz(encoder) => encoder.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Identity(writer) => writer.write(buf),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip(encoder) => encoder.write(buf),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd(encoder) => encoder.write(buf),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2(encoder) => encoder.write(buf),
            #[cfg(feature = "compression-xz")]
            Self::Xz(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Identity(writer) => writer.flush(),
            #[cfg(feature = "compression-gzip")]
            Self::Gzip(encoder) => encoder.flush(),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd(encoder) => encoder.flush(),
            #[cfg(feature = "compression-bzip2")]
            Self::Bzip2(encoder) => encoder.flush(),
            #[cfg(feature = "compression-xz")]
            Self::Xz(encoder) => encoder.flush(),
        }
    }
}
