//! Building a data source from configuration.
//!
//! [`DataSourceBuilder`] validates a set of storage parameters and picks the
//! backend that implements them:
//!
//! | compression | archive | backend |
//! |---|---|---|
//! | any / `Zip` | `Zip` / none | [`ZipArchiveDataSource`] (when either knob says zip) |
//! | any | `Tar` | [`TarArchiveDataSource`], compression applied to the whole tar |
//! | `Gzip`, `Bzip2`, `Xz`, `Zstd` | none | compressed [`DirectoryDataSource`] |
//! | none | none | plain [`DirectoryDataSource`] |
//!
//! Parameters can also be loaded from JSON through [`DataSourceConfig`]:
//!
//! ```
//! use gridsource::builder::DataSourceConfig;
//! use gridsource::format::{ArchiveFormat, CompressionFormat};
//!
//! let config: DataSourceConfig = serde_json::from_str(
//!     r#"{
//!         "directory": "/data",
//!         "base_name": "net",
//!         "compression_format": "gzip",
//!         "archive_format": "tar"
//!     }"#,
//! )?;
//! assert_eq!(config.compression_format, CompressionFormat::Gzip);
//! assert_eq!(config.archive_format, ArchiveFormat::Tar);
//! # Ok::<(), serde_json::Error>(())
//! ```

use crate::datasource::archive::tar::TarArchiveDataSource;
use crate::datasource::archive::zip::ZipArchiveDataSource;
use crate::datasource::directory::DirectoryDataSource;
use crate::datasource::{DataSource, DataSourceObserver, MemberWriter, ReadOnlyDataSource};
use crate::error::DataSourceError;
use crate::format::{ArchiveFormat, CompressionFormat};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage parameters of a data source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub directory: PathBuf,
    /// Required; an empty base name is allowed.
    pub base_name: Option<String>,
    /// Archive file name inside `directory`. Derived from the base name when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_file_name: Option<String>,
    pub compression_format: CompressionFormat,
    pub archive_format: ArchiveFormat,
    /// Source format without the leading dot, e.g. `xiidm`.
    pub source_format_extension: String,
}

impl DataSourceConfig {
    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }

    fn uses_zip(&self) -> bool {
        self.archive_format == ArchiveFormat::Zip
            || self.compression_format == CompressionFormat::Zip
    }

    fn uses_archive(&self) -> bool {
        self.uses_zip() || self.archive_format == ArchiveFormat::Tar
    }
}

/// Validates storage parameters and builds the matching [`Backend`].
#[derive(Clone, Default)]
pub struct DataSourceBuilder {
    config: DataSourceConfig,
    observer: Option<Arc<dyn DataSourceObserver>>,
}

impl DataSourceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_config(config: DataSourceConfig) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.directory = directory.into();
        self
    }

    #[must_use]
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.config.base_name = Some(base_name.into());
        self
    }

    #[must_use]
    pub fn with_archive_file_name(mut self, archive_file_name: impl Into<String>) -> Self {
        self.config.archive_file_name = Some(archive_file_name.into());
        self
    }

    #[must_use]
    pub fn with_compression_format(mut self, format: CompressionFormat) -> Self {
        self.config.compression_format = format;
        self
    }

    #[must_use]
    pub fn with_archive_format(mut self, format: ArchiveFormat) -> Self {
        self.config.archive_format = format;
        self
    }

    #[must_use]
    pub fn with_source_format_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.source_format_extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DataSourceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    /// Validate the parameters and build the backend.
    ///
    /// Checks run in this order, the first failure wins:
    /// 1. compression and archive formats are compatible (no disk access)
    /// 2. a base name is set
    /// 3. an archive file name is only given for an archive layout
    /// 4. the directory exists and is a directory
    ///
    /// # Errors
    /// Every validation failure is a
    /// [`Configuration`](crate::error::ErrorKind::Configuration) error.
    pub fn build(&self) -> Result<Backend> {
        let config = &self.config;
        check_pairing(config.compression_format, config.archive_format)?;
        let base_name = config
            .base_name
            .as_deref()
            .ok_or_else(|| DataSourceError::configuration("a base name is required"))?;
        if let Some(archive_file_name) = &config.archive_file_name
            && !config.uses_archive()
        {
            return Err(DataSourceError::configuration(format!(
                "archive file name {archive_file_name:?} given without an archive format"
            ))
            .into());
        }
        check_directory(&config.directory)?;

        let directory = config.directory.clone();
        let extension = config.source_format_extension.as_str();
        let backend = if config.uses_zip() {
            let source = match &config.archive_file_name {
                Some(name) => ZipArchiveDataSource::new(directory, name.as_str(), base_name)
                    .with_source_format_extension(extension),
                None => ZipArchiveDataSource::for_base_name(directory, base_name, extension),
            };
            Backend::Zip(match &self.observer {
                Some(observer) => source.with_observer(Arc::clone(observer)),
                None => source,
            })
        } else if config.archive_format == ArchiveFormat::Tar {
            let compression = config.compression_format;
            let source = match &config.archive_file_name {
                Some(name) => {
                    TarArchiveDataSource::new(directory, name.as_str(), base_name, compression)
                        .with_source_format_extension(extension)
                }
                None => TarArchiveDataSource::for_base_name(
                    directory,
                    base_name,
                    extension,
                    compression,
                ),
            };
            Backend::Tar(match &self.observer {
                Some(observer) => source.with_observer(Arc::clone(observer)),
                None => source,
            })
        } else {
            let source =
                DirectoryDataSource::compressed(directory, base_name, config.compression_format)
                    .with_source_format_extension(extension);
            Backend::Directory(match &self.observer {
                Some(observer) => source.with_observer(Arc::clone(observer)),
                None => source,
            })
        };

        log::debug!(
            "built {} data source for {:?} in {}",
            backend.kind(),
            base_name,
            config.directory.display()
        );
        Ok(backend)
    }
}

/// Only zip may be named by both knobs; any other pair of non-none formats conflicts.
fn check_pairing(compression: CompressionFormat, archive: ArchiveFormat) -> Result<()> {
    let compatible = compression.is_none()
        || archive.is_none()
        || (compression == CompressionFormat::Zip && archive == ArchiveFormat::Zip)
        || (archive == ArchiveFormat::Tar && compression != CompressionFormat::Zip);
    if compatible {
        Ok(())
    } else {
        Err(DataSourceError::configuration(format!(
            "incompatible compression format {compression} and archive format {archive}"
        ))
        .into())
    }
}

fn check_directory(directory: &Path) -> Result<()> {
    match fs::metadata(directory) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(DataSourceError::configuration(format!(
            "{} is not a directory",
            directory.display()
        ))
        .into()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(DataSourceError::configuration(
            format!("directory {} does not exist", directory.display()),
        )
        .into()),
        Err(err) => Err(err).with_context(|| format!("stat {}", directory.display())),
    }
}

/// The backend picked by [`DataSourceBuilder::build`].
pub enum Backend {
    Directory(DirectoryDataSource),
    Zip(ZipArchiveDataSource),
    Tar(TarArchiveDataSource),
}

impl Backend {
    /// Short backend name for messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Directory(_) => "directory",
            Self::Zip(_) => "zip",
            Self::Tar(_) => "tar",
        }
    }

    fn inner(&self) -> &dyn DataSource {
        match self {
            Self::Directory(source) => source,
            Self::Zip(source) => source,
            Self::Tar(source) => source,
        }
    }
}

impl ReadOnlyDataSource for Backend {
    fn base_name(&self) -> &str {
        self.inner().base_name()
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        self.inner().exists(file_name)
    }

    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        self.inner().new_input_stream(file_name)
    }

    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>> {
        self.inner().list_names(regex)
    }
}

impl DataSource for Backend {
    fn new_output_stream(&self, file_name: &str, append: bool) -> Result<Box<dyn MemberWriter>> {
        self.inner().new_output_stream(file_name, append)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_pairing() {
        assert!(check_pairing(CompressionFormat::Zip, ArchiveFormat::Zip).is_ok());
        assert!(check_pairing(CompressionFormat::Gzip, ArchiveFormat::Tar).is_ok());
        assert!(check_pairing(CompressionFormat::None, ArchiveFormat::Zip).is_ok());
        assert!(check_pairing(CompressionFormat::Zstd, ArchiveFormat::None).is_ok());

        for (compression, archive) in [
            (CompressionFormat::Gzip, ArchiveFormat::Zip),
            (CompressionFormat::Zip, ArchiveFormat::Tar),
        ] {
            let err = check_pairing(compression, archive).err().unwrap();
            assert_eq!(ErrorKind::of(&err), Some(ErrorKind::Configuration));
        }
    }

    #[test]
    fn test_missing_base_name() {
        let err = DataSourceBuilder::new()
            .with_directory(std::env::temp_dir())
            .build()
            .err()
            .unwrap();
        assert_eq!(ErrorKind::of(&err), Some(ErrorKind::Configuration));
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: DataSourceConfig =
            serde_json::from_str(r#"{"directory": "/tmp", "base_name": "net"}"#).unwrap();
        assert_eq!(config.compression_format, CompressionFormat::None);
        assert_eq!(config.archive_format, ArchiveFormat::None);
        assert!(config.archive_file_name.is_none());
        assert!(config.source_format_extension.is_empty());
    }
}
