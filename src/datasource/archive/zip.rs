//! Members stored as entries of a zip file.
//!
//! Entries are deflated individually, so the zip file itself is never wrapped
//! in another codec. Reads spool the requested entry to an anonymous temp file
//! so the returned stream does not borrow the archive.

use super::{
    ArchiveLayout, ArchiveMemberWriter, archive_present, is_top_level, member_label, spool,
    sync_file,
};
use crate::datasource::{
    DataSource, DataSourceObserver, MemberWriter, NameFilter, ReadOnlyDataSource,
};
use crate::error::DataSourceError;
use crate::format::{ArchiveFormat, CompressionFormat};
use crate::io::observed::{observe_reader, observe_writer};
use crate::naming::file_name;
use ::zip::result::ZipError;
use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entries at or above this size need the zip64 extensions.
const ZIP64_THRESHOLD: u64 = 0xFFFF_FFFF;

/// Data source over the entries of one zip file.
pub struct ZipArchiveDataSource {
    directory: PathBuf,
    archive_file_name: String,
    base_name: String,
    source_format_extension: String,
    observer: Option<Arc<dyn DataSourceObserver>>,
}

impl ZipArchiveDataSource {
    pub fn new(
        directory: impl Into<PathBuf>,
        archive_file_name: impl Into<String>,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            archive_file_name: archive_file_name.into(),
            base_name: base_name.into(),
            source_format_extension: String::new(),
            observer: None,
        }
    }

    /// Archive named `<base>[.<ext>].zip`.
    pub fn for_base_name(
        directory: impl Into<PathBuf>,
        base_name: &str,
        source_format_extension: &str,
    ) -> Self {
        let archive_file_name = file_name(base_name, "", source_format_extension);
        Self::new(
            directory,
            format!("{archive_file_name}.{}", ArchiveFormat::Zip.extension()),
            base_name,
        )
        .with_source_format_extension(source_format_extension)
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
    pub fn archive_path(&self) -> PathBuf {
        self.directory.join(&self.archive_file_name)
    }

    #[must_use]
    pub fn source_format_extension(&self) -> &str {
        &self.source_format_extension
    }

    fn open_archive(&self) -> Result<Option<ZipArchive<BufReader<File>>>> {
        let path = self.archive_path();
        if !archive_present(&path)? {
            return Ok(None);
        }
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("read zip archive {}", path.display()))?;
        Ok(Some(archive))
    }
}

impl ReadOnlyDataSource for ZipArchiveDataSource {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        let Some(mut archive) = self.open_archive()? else {
            return Ok(false);
        };
        let Some(index) = archive.index_for_name(file_name) else {
            return Ok(false);
        };
        let entry = archive.by_index_raw(index).with_context(|| {
            format!("read {file_name} from {}", self.archive_path().display())
        })?;
        Ok(!entry.is_dir())
    }

    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let Some(mut archive) = self.open_archive()? else {
            return Ok(None);
        };
        let path = self.archive_path();
        let mut entry = match archive.by_name(file_name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read {file_name} from {}", path.display()));
            }
        };
        if entry.is_dir() {
            return Ok(None);
        }
        let stream = spool(&mut entry)
            .with_context(|| format!("extract {file_name} from {}", path.display()))?;
        Ok(Some(observe_reader(
            stream,
            member_label(&path, file_name),
            self.observer.as_ref(),
        )))
    }

    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>> {
        let filter = NameFilter::new(&self.base_name, regex)?;
        let Some(archive) = self.open_archive()? else {
            return Ok(BTreeSet::new());
        };
        Ok(archive
            .file_names()
            .filter(|name| is_top_level(name) && filter.accepts(name))
            .map(str::to_string)
            .collect())
    }
}

impl DataSource for ZipArchiveDataSource {
    fn new_output_stream(&self, file_name: &str, append: bool) -> Result<Box<dyn MemberWriter>> {
        if append {
            return Err(DataSourceError::unsupported(format!(
                "cannot append to {file_name}: zip archive members can only be replaced"
            ))
            .into());
        }
        let path = self.archive_path();
        let writer = ArchiveMemberWriter::create(ZipLayout, path.clone(), file_name)?;
        Ok(observe_writer(
            Box::new(writer),
            member_label(&path, file_name),
            self.observer.as_ref(),
        ))
    }
}

/// Options of a freshly written member of `size` bytes.
fn member_options(size: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(needs_zip64(size))
}

fn needs_zip64(size: u64) -> bool {
    size >= ZIP64_THRESHOLD
}

struct ZipLayout;

impl ArchiveLayout for ZipLayout {
    fn whole_archive_compression(&self) -> CompressionFormat {
        CompressionFormat::None
    }

    fn rebuild(
        &self,
        previous: Option<&Path>,
        target: &Path,
        member: &str,
        content: &Path,
    ) -> Result<()> {
        let output = File::create(target).with_context(|| format!("create {}", target.display()))?;
        let mut writer = ZipWriter::new(BufWriter::new(output));

        let mut input = File::open(content).with_context(|| format!("open {}", content.display()))?;
        let size = input.metadata()?.len();
        writer
            .start_file(member, member_options(size))
            .with_context(|| format!("add {member} to {}", target.display()))?;
        io::copy(&mut input, &mut writer)
            .with_context(|| format!("write {member} to {}", target.display()))?;

        if let Some(previous) = previous {
            let file =
                File::open(previous).with_context(|| format!("open {}", previous.display()))?;
            let mut old = ZipArchive::new(BufReader::new(file))
                .with_context(|| format!("read zip archive {}", previous.display()))?;
            for index in 0..old.len() {
                let entry = old
                    .by_index_raw(index)
                    .with_context(|| format!("read entry {index} of {}", previous.display()))?;
                if entry.name() == member {
                    continue;
                }
                let name = entry.name().to_string();
                writer
                    .raw_copy_file(entry)
                    .with_context(|| format!("copy {name} into {}", target.display()))?;
            }
        }

        let output = writer
            .finish()
            .with_context(|| format!("finish {}", target.display()))?;
        sync_file(output, target)
    }
}
