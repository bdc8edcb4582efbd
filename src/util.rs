//! Entry points that infer the storage layout from a path or a file name.

use crate::builder::{Backend, DataSourceBuilder};
use crate::datasource::DataSourceObserver;
use crate::error::DataSourceError;
use crate::format::CompressionFormat;
use crate::naming::FileInformation;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Data source for the file `file_name` in `directory`.
///
/// `net.xiidm` and `net.xiidm.gz` give directory sources with base name `net`
/// and source format `xiidm`. Archives (`net.zip`, `net.tar.zst`, ...) give an
/// archive source with an empty base name, so member names are not tied to
/// the archive's name.
///
/// # Errors
/// Returns a [`Configuration`](crate::error::ErrorKind::Configuration) error
/// when `directory` is not an existing directory.
pub fn create_data_source(
    directory: &Path,
    file_name: &str,
    observer: Option<Arc<dyn DataSourceObserver>>,
) -> Result<Backend> {
    let info = FileInformation::parse(file_name);
    let builder = DataSourceBuilder::new()
        .with_directory(directory)
        .with_compression_format(info.compression_format())
        .with_archive_format(info.archive_format());
    let builder = if info.archive_format().is_none() {
        builder
            .with_base_name(info.base_name())
            .with_source_format_extension(info.data_extension())
    } else {
        builder.with_base_name("").with_archive_file_name(file_name)
    };
    with_observer(builder, observer).build()
}

/// Data source for an existing directory or file.
///
/// A directory gives a plain directory source whose base name is the
/// directory's own name; a file is handled by [`create_data_source`].
///
/// # Errors
/// Returns a [`Configuration`](crate::error::ErrorKind::Configuration) error
/// when `path` does not exist.
pub fn create_data_source_from_path(
    path: &Path,
    observer: Option<Arc<dyn DataSourceObserver>>,
) -> Result<Backend> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(DataSourceError::configuration(format!(
                "{} does not exist",
                path.display()
            ))
            .into());
        }
        Err(err) => return Err(err).with_context(|| format!("stat {}", path.display())),
    };

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    if metadata.is_dir() {
        let builder = DataSourceBuilder::new()
            .with_directory(path)
            .with_base_name(file_name);
        return with_observer(builder, observer).build();
    }

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_data_source(directory, &file_name, observer)
}

/// Archive data source for `archive_path`, whose name must end in `.zip` or
/// `.tar[.<compression-ext>]`.
///
/// # Errors
/// Returns a [`Configuration`](crate::error::ErrorKind::Configuration) error
/// when the name carries no archive extension or the parent directory does
/// not exist.
pub fn create_archive_data_source(
    archive_path: &Path,
    base_name: &str,
    source_format_extension: &str,
    observer: Option<Arc<dyn DataSourceObserver>>,
) -> Result<Backend> {
    let archive_file_name = archive_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let info = FileInformation::parse(&archive_file_name);
    if info.archive_format().is_none() {
        return Err(DataSourceError::configuration(format!(
            "{} is not a zip or tar archive",
            archive_path.display()
        ))
        .into());
    }
    let directory = match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let builder = DataSourceBuilder::new()
        .with_directory(directory)
        .with_base_name(base_name)
        .with_archive_file_name(archive_file_name.as_str())
        .with_compression_format(info.compression_format())
        .with_archive_format(info.archive_format())
        .with_source_format_extension(source_format_extension);
    with_observer(builder, observer).build()
}

/// Directory data source, each member optionally compressed on its own.
///
/// [`CompressionFormat::Zip`] still yields a zip archive source, see
/// [`DataSourceBuilder::build`].
///
/// # Errors
/// Returns a [`Configuration`](crate::error::ErrorKind::Configuration) error
/// when `directory` is not an existing directory.
pub fn create_directory_data_source(
    directory: &Path,
    base_name: &str,
    source_format_extension: &str,
    compression: CompressionFormat,
    observer: Option<Arc<dyn DataSourceObserver>>,
) -> Result<Backend> {
    let builder = DataSourceBuilder::new()
        .with_directory(directory)
        .with_base_name(base_name)
        .with_source_format_extension(source_format_extension)
        .with_compression_format(compression);
    with_observer(builder, observer).build()
}

fn with_observer(
    builder: DataSourceBuilder,
    observer: Option<Arc<dyn DataSourceObserver>>,
) -> DataSourceBuilder {
    match observer {
        Some(observer) => builder.with_observer(observer),
        None => builder,
    }
}
