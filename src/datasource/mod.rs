//! The data source capability contract and its backends.
//!
//! A data source is a named collection of *members* (files) sharing a base
//! name. Consumers only ever see the traits in this module, so a serializer
//! writes `net.xiidm` the same way whether it ends up as a loose file, a gzip
//! file, a zip entry or a member of a `.tar.zst`.
//!
//! ## Traits
//!
//! - [`ReadOnlyDataSource`] - existence checks, input streams and listing
//! - [`DataSource`] - adds output streams
//! - [`MemberWriter`] - an output stream with an explicit, fallible commit
//! - [`DataSourceObserver`] - receives open/close events for every stream
//!
//! ## Backends
//!
//! - [`directory::DirectoryDataSource`] - loose files, optionally compressed one by one
//! - [`archive::zip::ZipArchiveDataSource`] - entries of a zip file
//! - [`archive::tar::TarArchiveDataSource`] - entries of a tar file, optionally compressed as a
//!   whole
//! - [`memory::InMemoryDataSource`] - a name to bytes map
//! - [`probing::ProbingDataSource`] - first-match delegation over several read-only sources
//!
//! ## Not found is not an error
//!
//! [`ReadOnlyDataSource::exists`] returns `Ok(false)` and
//! [`ReadOnlyDataSource::new_input_stream`] returns `Ok(None)` for absent
//! members. Errors are reserved for I/O failures and capability mismatches.
//!
//! ## Writers commit on close
//!
//! Data written to a [`MemberWriter`] becomes visible when
//! [`MemberWriter::close`] succeeds. For archive backends this is where the
//! whole archive is rebuilt and swapped in; for the memory backend this is
//! where the buffer is published. A writer dropped without `close` abandons
//! its content on those backends.

pub mod archive;
pub mod directory;
pub mod memory;
pub mod probing;

use crate::error::DataSourceError;
use crate::naming::file_name;
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{Read, Write};

/// Receives an `opened` and a `closed` event for every stream a data source hands out.
///
/// Intended for tracing and leak detection. Names are backend specific: a
/// file path for directories, `<archive path>:<member>` for archives and the
/// member name for memory sources.
pub trait DataSourceObserver: Send + Sync {
    fn opened(&self, name: &str);

    fn closed(&self, name: &str);
}

/// An output stream whose content is committed by [`close`](MemberWriter::close).
pub trait MemberWriter: Write + Send {
    /// Flush and commit the written content.
    ///
    /// # Errors
    /// Returns an error if flushing, compressing or (for archives) rebuilding
    /// and swapping the archive fails. A failed close never leaves a partially
    /// updated archive behind.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Read access to the members of a dataset.
pub trait ReadOnlyDataSource: Send + Sync {
    /// Base name shared by the dataset's members (may be empty).
    fn base_name(&self) -> &str;

    /// Check whether a member exists.
    ///
    /// # Errors
    /// Only for I/O failures unrelated to the member's absence.
    fn exists(&self, file_name: &str) -> Result<bool>;

    /// Check whether `<base_name><suffix>.<ext>` exists.
    ///
    /// # Errors
    /// See [`exists`](ReadOnlyDataSource::exists).
    fn exists_ext(&self, suffix: &str, ext: &str) -> Result<bool> {
        self.exists(&file_name(self.base_name(), suffix, ext))
    }

    /// Open a member for reading, returning `Ok(None)` when it does not exist.
    ///
    /// The returned stream yields uncompressed bytes regardless of storage.
    ///
    /// # Errors
    /// Only for I/O failures unrelated to the member's absence.
    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>>;

    /// Open `<base_name><suffix>.<ext>` for reading.
    ///
    /// # Errors
    /// See [`new_input_stream`](ReadOnlyDataSource::new_input_stream).
    fn new_input_stream_ext(
        &self,
        suffix: &str,
        ext: &str,
    ) -> Result<Option<Box<dyn Read + Send>>> {
        self.new_input_stream(&file_name(self.base_name(), suffix, ext))
    }

    /// List top-level member names starting with the base name and fully
    /// matching `regex`. Compression suffixes are stripped.
    ///
    /// # Errors
    /// Returns an [`InvalidInput`](crate::error::ErrorKind::InvalidInput) error
    /// for a malformed pattern, or an I/O error.
    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>>;
}

/// Read and write access to the members of a dataset.
pub trait DataSource: ReadOnlyDataSource {
    /// Open a member for writing.
    ///
    /// With `append = false` the member is replaced. `append = true` is only
    /// honored by backends that can append bytes in place.
    ///
    /// # Errors
    /// Returns an [`Unsupported`](crate::error::ErrorKind::Unsupported) error
    /// when the backend cannot append, or an I/O error.
    fn new_output_stream(&self, file_name: &str, append: bool) -> Result<Box<dyn MemberWriter>>;

    /// Open `<base_name><suffix>.<ext>` for writing.
    ///
    /// # Errors
    /// See [`new_output_stream`](DataSource::new_output_stream).
    fn new_output_stream_ext(
        &self,
        suffix: &str,
        ext: &str,
        append: bool,
    ) -> Result<Box<dyn MemberWriter>> {
        self.new_output_stream(&file_name(self.base_name(), suffix, ext), append)
    }
}

/// Membership test shared by every `list_names` implementation.
///
/// A name is listed when it starts with the base name and the whole name
/// matches the pattern.
pub(crate) struct NameFilter<'a> {
    base_name: &'a str,
    pattern: Regex,
}

impl<'a> NameFilter<'a> {
    pub(crate) fn new(base_name: &'a str, regex: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("^(?:{regex})$")).map_err(|err| {
            DataSourceError::invalid_input(format!("invalid name pattern {regex:?}: {err}"))
        })?;
        Ok(Self { base_name, pattern })
    }

    pub(crate) fn accepts(&self, name: &str) -> bool {
        name.starts_with(self.base_name) && self.pattern.is_match(name)
    }
}
