//! Loose files in a directory, optionally compressed one by one.
//!
//! Member `net.xiidm` of a gzip-compressed directory source is stored as
//! `<directory>/net.xiidm.gz`; callers always read and write uncompressed
//! bytes. Plain files support true appends; compressed files append a new
//! compressed stream, which the multi-stream decoders read back as one.

use crate::datasource::{
    DataSource, DataSourceObserver, MemberWriter, NameFilter, ReadOnlyDataSource,
};
use crate::format::CompressionFormat;
use crate::io::compression::{Encoder, codec_name, sniff_compression, wrap_reader};
use crate::io::observed::{observe_reader, observe_writer};
use anyhow::{Context, Result, anyhow};
use glob::{Pattern, glob};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Data source over the files of one directory.
pub struct DirectoryDataSource {
    directory: PathBuf,
    base_name: String,
    source_format_extension: String,
    compression: CompressionFormat,
    observer: Option<Arc<dyn DataSourceObserver>>,
}

impl DirectoryDataSource {
    /// Plain, uncompressed files.
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self::compressed(directory, base_name, CompressionFormat::None)
    }

    /// Every member stored as its own `<name>.<compression-ext>` file.
    pub fn compressed(
        directory: impl Into<PathBuf>,
        base_name: impl Into<String>,
        compression: CompressionFormat,
    ) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
            source_format_extension: String::new(),
            compression,
            observer: None,
        }
    }

    #[must_use]
    pub fn with_source_format_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_format_extension = extension.into();
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DataSourceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn compression_format(&self) -> CompressionFormat {
        self.compression
    }

    #[must_use]
    pub fn source_format_extension(&self) -> &str {
        &self.source_format_extension
    }

    /// Physical path of a member, compression extension included.
    #[must_use]
    pub fn storage_path(&self, file_name: &str) -> PathBuf {
        self.directory.join(self.compression.decorate(file_name))
    }

    fn warn_on_signature_mismatch(&self, reader: &mut BufReader<File>, path: &Path) {
        if let Ok(head) = reader.fill_buf()
            && !head.is_empty()
            && sniff_compression(head) != Some(self.compression)
        {
            log::warn!(
                "{} does not start with a {} signature",
                path.display(),
                codec_name(self.compression)
            );
        }
    }
}

impl ReadOnlyDataSource for DirectoryDataSource {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        let path = self.storage_path(file_name);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("stat {}", path.display())),
        }
    }

    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        if !self.exists(file_name)? {
            return Ok(None);
        }
        let path = self.storage_path(file_name);
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let mut reader = BufReader::new(file);
        if !self.compression.is_none() {
            self.warn_on_signature_mismatch(&mut reader, &path);
        }
        let stream = wrap_reader(self.compression, reader)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        log::debug!("opened {} for reading", path.display());
        Ok(Some(observe_reader(
            stream,
            path.display().to_string(),
            self.observer.as_ref(),
        )))
    }

    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>> {
        let filter = NameFilter::new(&self.base_name, regex)?;
        let pattern = format!(
            "{}/{}*",
            Pattern::escape(&self.directory.to_string_lossy()),
            Pattern::escape(&self.base_name)
        );
        let entries = glob(&pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

        let mut names = BTreeSet::new();
        for entry in entries {
            let path =
                entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
            if !path.is_file() {
                continue;
            }
            let Some(stored_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if let Some(name) = self.compression.strip(stored_name)
                && filter.accepts(name)
            {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }
}

impl DataSource for DirectoryDataSource {
    fn new_output_stream(&self, file_name: &str, append: bool) -> Result<Box<dyn MemberWriter>> {
        let path = self.storage_path(file_name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .with_context(|| format!("create {}", path.display()))?;
        let encoder = Encoder::new(self.compression, BufWriter::new(file))
            .with_context(|| format!("setup compression for {}", path.display()))?;
        log::debug!("opened {} for writing (append: {append})", path.display());
        let writer = FileMemberWriter {
            path: path.clone(),
            encoder: Some(encoder),
        };
        Ok(observe_writer(
            Box::new(writer),
            path.display().to_string(),
            self.observer.as_ref(),
        ))
    }
}

/// Writes straight to the member's file; close finishes the compressed stream.
struct FileMemberWriter {
    path: PathBuf,
    encoder: Option<Encoder<BufWriter<File>>>,
}

impl FileMemberWriter {
    fn encoder_mut(&mut self) -> io::Result<&mut Encoder<BufWriter<File>>> {
        self.encoder
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is already closed", self.path.display())))
    }
}

impl Write for FileMemberWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder_mut()?.flush()
    }
}

impl MemberWriter for FileMemberWriter {
    fn close(mut self: Box<Self>) -> Result<()> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| anyhow!("{} is already closed", self.path.display()))?;
        let writer = encoder
            .finish()
            .with_context(|| format!("finish {}", self.path.display()))?;
        writer
            .into_inner()
            .map_err(io::IntoInnerError::into_error)
            .with_context(|| format!("flush {}", self.path.display()))?;
        Ok(())
    }
}

impl Drop for FileMemberWriter {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take()
            && let Err(err) = encoder.finish().and_then(|mut writer| writer.flush())
        {
            log::warn!("failed to finish {} on drop: {err}", self.path.display());
        }
    }
}
