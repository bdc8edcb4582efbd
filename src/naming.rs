//! File name decomposition.
//!
//! Dataset files follow the convention
//! `<base><suffix>.<ext>[.<cmp>][.tar[.<cmp>]]`. [`FileInformation::parse`]
//! reads a name right to left and splits it into its base name, source format,
//! compression and archive parts:
//!
//! ```
//! use gridsource::format::{ArchiveFormat, CompressionFormat};
//! use gridsource::naming::FileInformation;
//!
//! let info = FileInformation::parse("net.xiidm.tar.gz");
//! assert_eq!(info.base_name(), "net");
//! assert_eq!(info.source_format(), ".xiidm");
//! assert_eq!(info.compression_format(), CompressionFormat::Gzip);
//! assert_eq!(info.archive_format(), ArchiveFormat::Tar);
//! ```
//!
//! Parsing never fails. Tokens that are not compression or archive extensions
//! simply end up in the source format or the base name.

use crate::format::{ArchiveFormat, CompressionFormat};

/// The parts of a dataset file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInformation {
    base_name: String,
    source_format: String,
    compression_format: CompressionFormat,
    archive_format: ArchiveFormat,
}

impl FileInformation {
    /// Decompose `file_name` into its parts.
    ///
    /// 1. A trailing compression token (`gz`, `bz2`, `xz`, `zip`, `zst`) is consumed.
    /// 2. Unless that token was `zip` (which already means a zip archive), a
    ///    trailing `tar` token marks a tar archive and is consumed.
    /// 3. The last remaining extension, dot included, is the source format;
    ///    everything before it is the base name.
    #[must_use]
    pub fn parse(file_name: &str) -> Self {
        let mut rest = file_name;

        let mut compression_format = CompressionFormat::None;
        if let Some((stem, token)) = rest.rsplit_once('.')
            && let Some(format) = CompressionFormat::from_extension(token)
        {
            compression_format = format;
            rest = stem;
        }

        let mut archive_format = ArchiveFormat::None;
        if compression_format == CompressionFormat::Zip {
            archive_format = ArchiveFormat::Zip;
        } else if let Some((stem, "tar")) = rest.rsplit_once('.') {
            archive_format = ArchiveFormat::Tar;
            rest = stem;
        }

        let (base_name, source_format) = match rest.rfind('.') {
            Some(dot) => rest.split_at(dot),
            None => (rest, ""),
        };

        if source_format.is_empty() {
            log::debug!("no source format found in file name {file_name:?}");
        }

        Self {
            base_name: base_name.to_string(),
            source_format: source_format.to_string(),
            compression_format,
            archive_format,
        }
    }

    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Source format with its leading dot (`".xiidm"`), or an empty string.
    #[must_use]
    pub fn source_format(&self) -> &str {
        &self.source_format
    }

    /// Source format without the leading dot (`"xiidm"`), as used by
    /// [`DataSourceConfig`](crate::builder::DataSourceConfig).
    #[must_use]
    pub fn data_extension(&self) -> &str {
        self.source_format.strip_prefix('.').unwrap_or(&self.source_format)
    }

    #[must_use]
    pub fn compression_format(&self) -> CompressionFormat {
        self.compression_format
    }

    #[must_use]
    pub fn archive_format(&self) -> ArchiveFormat {
        self.archive_format
    }
}

/// Build a member name from its parts: `base + suffix + "." + ext`.
///
/// No dot is added when `ext` is empty.
#[must_use]
pub fn file_name(base_name: &str, suffix: &str, ext: &str) -> String {
    if ext.is_empty() {
        format!("{base_name}{suffix}")
    } else {
        format!("{base_name}{suffix}.{ext}")
    }
}

/// Base name of a dataset file name, see [`FileInformation::parse`].
#[must_use]
pub fn base_name(file_name: &str) -> String {
    FileInformation::parse(file_name).base_name
}
