//! Shared machinery for archive-backed data sources.
//!
//! Archives are immutable blobs: a member cannot be patched in place. Writing
//! a member therefore rebuilds the whole archive next to the original and
//! swaps it in with a single rename:
//!
//! 1. The member's bytes are written to a spool file of its own,
//!    `tmp_stream_<archive>.<random>.stream`, created exclusively so that two
//!    open writers never share it.
//! 2. On [`close`](crate::datasource::MemberWriter::close) a new archive is
//!    built in `tmp_<archive>`: the member first, then every other entry of the
//!    current archive, skipping the entries the member replaces.
//! 3. If the layout compresses the archive as a whole (`.tar.gz` and friends),
//!    `tmp_<archive>` is compressed into `tmp_comp_<archive>`.
//! 4. The finished temp file is renamed onto the archive path.
//!
//! The archive path is only touched by step 4, so a failure or a crash at any
//! earlier point leaves the previous archive intact. Temp files of a failed
//! attempt are removed on a best-effort basis; leftovers from a crash are a
//! recovery concern.
//!
//! The staging paths of steps 2 and 3 are deterministic siblings of the
//! archive. Writers closed one after the other each rebuild from the archive
//! left by the previous one, so every committed member survives. Closing from
//! several threads at once races on the staging paths; serializing those
//! closes is up to the caller.

pub mod tar;
pub mod zip;

use crate::datasource::MemberWriter;
use crate::format::CompressionFormat;
use crate::io::compression::Encoder;
use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// File name prefix of the spool files receiving members' bytes until their
/// writers are closed. Each writer adds a random part and `.stream`.
#[must_use]
pub fn stream_temp_prefix(archive: &Path) -> String {
    format!("tmp_stream_{}.", archive_file_name(archive))
}

/// Temp file receiving the rebuilt, uncompressed archive.
#[must_use]
pub fn staging_temp_path(archive: &Path) -> PathBuf {
    sibling(archive, "tmp_", "")
}

/// Temp file receiving the compressed form of the rebuilt archive.
#[must_use]
pub fn compressed_temp_path(archive: &Path) -> PathBuf {
    sibling(archive, "tmp_comp_", "")
}

fn sibling(archive: &Path, prefix: &str, suffix: &str) -> PathBuf {
    archive.with_file_name(format!("{prefix}{}{suffix}", archive_file_name(archive)))
}

fn archive_file_name(archive: &Path) -> String {
    archive
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory holding the archive; `.` for a bare file name.
fn archive_directory(archive: &Path) -> &Path {
    match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// How a concrete archive format rebuilds itself.
pub(crate) trait ArchiveLayout: Send + 'static {
    /// Compression applied to the rebuilt archive as a whole.
    fn whole_archive_compression(&self) -> CompressionFormat;

    /// Write a complete archive to `target`: `member` first with the bytes of
    /// `content`, then every entry of `previous` not named `member`.
    fn rebuild(&self, previous: Option<&Path>, target: &Path, member: &str, content: &Path)
    -> Result<()>;
}

/// Rebuild `archive` with `member` replaced by the bytes in `content`, then
/// atomically swap the result in.
pub(crate) fn rewrite_archive<L: ArchiveLayout>(
    layout: &L,
    archive: &Path,
    member: &str,
    content: &Path,
) -> Result<()> {
    let staging = staging_temp_path(archive);
    let compressed = compressed_temp_path(archive);
    let outcome = rebuild_and_swap(layout, archive, member, content, &staging, &compressed);
    if outcome.is_err() {
        remove_quietly(&staging);
        remove_quietly(&compressed);
    }
    outcome
}

fn rebuild_and_swap<L: ArchiveLayout>(
    layout: &L,
    archive: &Path,
    member: &str,
    content: &Path,
    staging: &Path,
    compressed: &Path,
) -> Result<()> {
    let previous = if archive_present(archive)? {
        Some(archive)
    } else {
        None
    };
    layout
        .rebuild(previous, staging, member, content)
        .with_context(|| format!("rebuild {} into {}", archive.display(), staging.display()))?;

    let finished = match layout.whole_archive_compression() {
        CompressionFormat::None => staging,
        format => {
            compress_file(format, staging, compressed)?;
            remove_quietly(staging);
            compressed
        }
    };

    fs::rename(finished, archive)
        .with_context(|| format!("move {} to {}", finished.display(), archive.display()))?;
    log::debug!("rewrote {} with member {member}", archive.display());
    Ok(())
}

fn compress_file(format: CompressionFormat, source: &Path, target: &Path) -> Result<()> {
    let mut input =
        BufReader::new(File::open(source).with_context(|| format!("open {}", source.display()))?);
    let output = File::create(target).with_context(|| format!("create {}", target.display()))?;
    let mut encoder = Encoder::new(format, BufWriter::new(output))?;
    io::copy(&mut input, &mut encoder)
        .with_context(|| format!("compress {} into {}", source.display(), target.display()))?;
    let writer = encoder
        .finish()
        .with_context(|| format!("finish {}", target.display()))?;
    sync_file(writer, target)
}

/// Flush a buffered file and make its content durable before it is renamed.
pub(crate) fn sync_file(writer: BufWriter<File>, path: &Path) -> Result<()> {
    let file = writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)
        .with_context(|| format!("flush {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("sync {}", path.display()))
}

/// Whether the archive file exists. Absence is not an error.
pub(crate) fn archive_present(archive: &Path) -> Result<bool> {
    match fs::metadata(archive) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("stat {}", archive.display())),
    }
}

/// Copy an entry into an anonymous temp file and return a reader over it.
pub(crate) fn spool(entry: &mut impl Read) -> Result<Box<dyn Read + Send>> {
    let mut file = tempfile::tempfile().context("create spool file")?;
    io::copy(entry, &mut file).context("spool archive entry")?;
    file.seek(SeekFrom::Start(0))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Entries nested in a sub-directory are not dataset members.
pub(crate) fn is_top_level(name: &str) -> bool {
    !name.is_empty() && !name.contains('/')
}

/// Observer label of an archive member.
pub(crate) fn member_label(archive: &Path, member: &str) -> String {
    format!("{}:{member}", archive.display())
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => log::warn!("could not remove temp file {}: {err}", path.display()),
    }
}

/// Buffers a member in its own spool file and rewrites the archive on close.
///
/// The spool file is deleted when the writer goes away, whether it was
/// closed or dropped.
pub(crate) struct ArchiveMemberWriter<L: ArchiveLayout> {
    layout: L,
    archive: PathBuf,
    member: String,
    content_path: TempPath,
    content: Option<BufWriter<File>>,
}

impl<L: ArchiveLayout> ArchiveMemberWriter<L> {
    pub(crate) fn create(layout: L, archive: PathBuf, member: &str) -> Result<Self> {
        let directory = archive_directory(&archive);
        let (file, content_path) = tempfile::Builder::new()
            .prefix(&stream_temp_prefix(&archive))
            .suffix(".stream")
            .tempfile_in(directory)
            .with_context(|| {
                format!("create spool file for {member} in {}", directory.display())
            })?
            .into_parts();
        log::debug!(
            "buffering {} for {} in {}",
            member,
            archive.display(),
            content_path.display()
        );
        Ok(Self {
            layout,
            archive,
            member: member.to_string(),
            content_path,
            content: Some(BufWriter::new(file)),
        })
    }

    fn content_mut(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.content
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is already closed", self.member)))
    }
}

impl<L: ArchiveLayout> Write for ArchiveMemberWriter<L> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.content_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.content_mut()?.flush()
    }
}

impl<L: ArchiveLayout> MemberWriter for ArchiveMemberWriter<L> {
    fn close(mut self: Box<Self>) -> Result<()> {
        let content = self
            .content
            .take()
            .ok_or_else(|| anyhow!("{} is already closed", self.member))?;
        sync_file(content, &self.content_path).and_then(|()| {
            rewrite_archive(&self.layout, &self.archive, &self.member, &self.content_path)
        })
    }
}

impl<L: ArchiveLayout> Drop for ArchiveMemberWriter<L> {
    fn drop(&mut self) {
        if self.content.take().is_some() {
            log::debug!(
                "discarded unclosed write of {} to {}",
                self.member,
                self.archive.display()
            );
        }
    }
}
