//! Members stored as entries of a tar file, optionally compressed as a whole.
//!
//! `net.tar` is read with seeks into the file; `net.tar.gz` and the other
//! compressed variants are decompressed sequentially and the requested entry
//! is spooled to a temp file. Rewrites emit ustar headers with pax extension
//! records for names longer than the ustar fields and for sizes above 8 GiB.

use super::{
    ArchiveLayout, ArchiveMemberWriter, archive_present, is_top_level, member_label, spool,
    sync_file,
};
use crate::datasource::{
    DataSource, DataSourceObserver, MemberWriter, NameFilter, ReadOnlyDataSource,
};
use crate::error::DataSourceError;
use crate::format::{ArchiveFormat, CompressionFormat};
use crate::io::compression::wrap_reader;
use crate::io::observed::{observe_reader, observe_writer};
use crate::naming::file_name;
use ::tar::{Archive, Builder, Entry, EntryType, Header};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Largest size the 11 octal digits of a ustar size field can hold.
const MAX_USTAR_SIZE: u64 = 0o777_7777_7777;

type EntryReader = Box<dyn Read + Send>;

/// Data source over the entries of one tar file.
pub struct TarArchiveDataSource {
    directory: PathBuf,
    archive_file_name: String,
    base_name: String,
    source_format_extension: String,
    compression: CompressionFormat,
    observer: Option<Arc<dyn DataSourceObserver>>,
}

impl TarArchiveDataSource {
    /// `compression` applies to the whole tar file, e.g. `Gzip` for `net.tar.gz`.
    pub fn new(
        directory: impl Into<PathBuf>,
        archive_file_name: impl Into<String>,
        base_name: impl Into<String>,
        compression: CompressionFormat,
    ) -> Self {
        Self {
            directory: directory.into(),
            archive_file_name: archive_file_name.into(),
            base_name: base_name.into(),
            source_format_extension: String::new(),
            compression,
            observer: None,
        }
    }

    /// Archive named `<base>[.<ext>].tar[.<compression-ext>]`.
    pub fn for_base_name(
        directory: impl Into<PathBuf>,
        base_name: &str,
        source_format_extension: &str,
        compression: CompressionFormat,
    ) -> Self {
        let tar_name = format!(
            "{}.{}",
            file_name(base_name, "", source_format_extension),
            ArchiveFormat::Tar.extension()
        );
        Self::new(directory, compression.decorate(&tar_name), base_name, compression)
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
    pub fn compression_format(&self) -> CompressionFormat {
        self.compression
    }

    #[must_use]
    pub fn source_format_extension(&self) -> &str {
        &self.source_format_extension
    }

    fn open_archive(&self) -> Result<Option<Archive<EntryReader>>> {
        let path = self.archive_path();
        if !archive_present(&path)? {
            return Ok(None);
        }
        Ok(Some(open_tar(&path, self.compression)?))
    }

    /// Visit regular-file entries until `visit` returns a value.
    fn find_entry<T>(
        &self,
        mut visit: impl FnMut(&str, &mut Entry<'_, EntryReader>) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let Some(mut archive) = self.open_archive()? else {
            return Ok(None);
        };
        let path = self.archive_path();
        let entries = archive
            .entries()
            .with_context(|| format!("read tar archive {}", path.display()))?;
        for entry in entries {
            let mut entry =
                entry.with_context(|| format!("read tar entry in {}", path.display()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry_name(&entry);
            if let Some(found) = visit(&name, &mut entry)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

impl ReadOnlyDataSource for TarArchiveDataSource {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        let found = self.find_entry(|name, _| Ok((name == file_name).then_some(())))?;
        Ok(found.is_some())
    }

    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let path = self.archive_path();
        let stream = self.find_entry(|name, entry| {
            if name != file_name {
                return Ok(None);
            }
            let stream: EntryReader = if self.compression.is_none() {
                let mut file =
                    File::open(&path).with_context(|| format!("open {}", path.display()))?;
                file.seek(SeekFrom::Start(entry.raw_file_position()))?;
                Box::new(BufReader::new(file).take(entry.size()))
            } else {
                spool(entry)
                    .with_context(|| format!("extract {file_name} from {}", path.display()))?
            };
            Ok(Some(stream))
        })?;
        Ok(stream.map(|stream| {
            observe_reader(stream, member_label(&path, file_name), self.observer.as_ref())
        }))
    }

    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>> {
        let filter = NameFilter::new(&self.base_name, regex)?;
        let mut names = BTreeSet::new();
        self.find_entry::<()>(|name, _| {
            if is_top_level(name) && filter.accepts(name) {
                names.insert(name.to_string());
            }
            Ok(None)
        })?;
        Ok(names)
    }
}

impl DataSource for TarArchiveDataSource {
    fn new_output_stream(&self, file_name: &str, append: bool) -> Result<Box<dyn MemberWriter>> {
        if append {
            return Err(DataSourceError::unsupported(format!(
                "cannot append to {file_name}: tar archive members can only be replaced"
            ))
            .into());
        }
        let path = self.archive_path();
        let layout = TarLayout {
            compression: self.compression,
        };
        let writer = ArchiveMemberWriter::create(layout, path.clone(), file_name)?;
        Ok(observe_writer(
            Box::new(writer),
            member_label(&path, file_name),
            self.observer.as_ref(),
        ))
    }
}

fn open_tar(path: &Path, compression: CompressionFormat) -> Result<Archive<EntryReader>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = wrap_reader(compression, BufReader::new(file))
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    Ok(Archive::new(reader))
}

/// Full entry name, honoring GNU long names and pax `path` records.
fn entry_name<R: Read>(entry: &Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

struct TarLayout {
    compression: CompressionFormat,
}

impl ArchiveLayout for TarLayout {
    fn whole_archive_compression(&self) -> CompressionFormat {
        self.compression
    }

    fn rebuild(
        &self,
        previous: Option<&Path>,
        target: &Path,
        member: &str,
        content: &Path,
    ) -> Result<()> {
        let output = File::create(target).with_context(|| format!("create {}", target.display()))?;
        let mut builder = Builder::new(BufWriter::new(output));

        let input = File::open(content).with_context(|| format!("open {}", content.display()))?;
        let size = input.metadata()?.len();
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_mtime(now_seconds());
        append_entry(&mut builder, header, member, None, size, BufReader::new(input))
            .with_context(|| format!("add {member} to {}", target.display()))?;

        if let Some(previous) = previous {
            let mut old = open_tar(previous, self.compression)?;
            let entries = old
                .entries()
                .with_context(|| format!("read tar archive {}", previous.display()))?;
            for entry in entries {
                let entry =
                    entry.with_context(|| format!("read tar entry in {}", previous.display()))?;
                if entry.header().entry_type().is_pax_global_extensions() {
                    continue;
                }
                let name = entry_name(&entry);
                if name == member {
                    continue;
                }
                let link_name = entry
                    .link_name_bytes()
                    .map(|link| String::from_utf8_lossy(&link).into_owned());
                let header = header_template(entry.header());
                let size = entry.size();
                append_entry(&mut builder, header, &name, link_name.as_deref(), size, entry)
                    .with_context(|| format!("copy {name} into {}", target.display()))?;
            }
        }

        let output = builder
            .into_inner()
            .with_context(|| format!("finish {}", target.display()))?;
        sync_file(output, target)
    }
}

/// Fresh ustar header carrying over the metadata worth keeping.
fn header_template(old: &Header) -> Header {
    let mut header = Header::new_ustar();
    header.set_entry_type(old.entry_type());
    header.set_mode(old.mode().unwrap_or(0o644));
    header.set_mtime(old.mtime().unwrap_or(0));
    header.set_uid(old.uid().unwrap_or(0));
    header.set_gid(old.gid().unwrap_or(0));
    header
}

/// Append one entry, spilling values that do not fit the ustar fields into a
/// pax extended header placed right before it.
fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    mut header: Header,
    name: &str,
    link_name: Option<&str>,
    size: u64,
    data: impl Read,
) -> Result<()> {
    let pax = fill_header(&mut header, name, link_name, size);
    if !pax.is_empty() {
        builder.append_pax_extensions(pax.iter().map(|(key, value)| (*key, value.as_slice())))?;
    }
    header.set_cksum();
    builder.append(&header, data)?;
    Ok(())
}

/// Store name, link name and size in `header`, returning the pax records
/// needed for the values the ustar fields cannot hold.
fn fill_header(
    header: &mut Header,
    name: &str,
    link_name: Option<&str>,
    size: u64,
) -> Vec<(&'static str, Vec<u8>)> {
    let mut pax = Vec::new();

    if header.set_path(name).is_err() {
        pax.push(("path", name.as_bytes().to_vec()));
        if let Some(ustar) = header.as_ustar_mut() {
            ustar.prefix.fill(0);
        }
        copy_truncated(&mut header.as_old_mut().name, name.as_bytes());
    }
    if let Some(link_name) = link_name
        && header.set_link_name(link_name).is_err()
    {
        pax.push(("linkpath", link_name.as_bytes().to_vec()));
        copy_truncated(&mut header.as_old_mut().linkname, link_name.as_bytes());
    }
    if size > MAX_USTAR_SIZE {
        pax.push(("size", size.to_string().into_bytes()));
    }
    header.set_size(size);
    pax
}

fn copy_truncated(field: &mut [u8], value: &[u8]) {
    field.fill(0);
    let len = value.len().min(field.len());
    field[..len].copy_from_slice(&value[..len]);
}

fn now_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
