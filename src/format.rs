//! Compression and archive format descriptors.
//!
//! Both enums carry the canonical extension token used in file names
//! (`net.xiidm.gz`, `net.tar.zst`, `net.zip`). [`CompressionFormat::Zip`] is
//! special: a zip file is a compressed *container*, so asking for zip
//! compression always means a zip archive whose member list is the dataset's
//! file list.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compression applied to a single file or to a whole tar archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    #[default]
    None,
    Gzip,
    Bzip2,
    Xz,
    Zip,
    Zstd,
}

impl CompressionFormat {
    /// Every format with a file extension, in probing order.
    pub const COMPRESSED: [Self; 5] = [Self::Gzip, Self::Bzip2, Self::Xz, Self::Zip, Self::Zstd];

    /// Canonical extension token, without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
            Self::Zip => "zip",
            Self::Zstd => "zst",
        }
    }

    /// Parse an extension token (`"gz"`, `"zst"`, ...). Matching is exact.
    #[must_use]
    pub fn from_extension(token: &str) -> Option<Self> {
        Self::COMPRESSED
            .into_iter()
            .find(|format| format.extension() == token)
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }

    /// Append `.<ext>` to `name`, or return it unchanged for [`CompressionFormat::None`].
    #[must_use]
    pub fn decorate(self, name: &str) -> String {
        if self.is_none() {
            name.to_string()
        } else {
            format!("{name}.{}", self.extension())
        }
    }

    /// Strip a trailing `.<ext>` from `name`, if present.
    #[must_use]
    pub fn strip<'a>(self, name: &'a str) -> Option<&'a str> {
        if self.is_none() {
            return Some(name);
        }
        name.strip_suffix(self.extension())
            .and_then(|rest| rest.strip_suffix('.'))
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zip => "zip",
            Self::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Container layout holding several members in one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    None,
    Zip,
    Tar,
}

impl ArchiveFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Zip => "zip",
            Self::Tar => "tar",
        }
    }

    #[must_use]
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            other => other.extension(),
        })
    }
}
