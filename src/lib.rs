//! # Gridsource
//!
//! A **storage-agnostic data source** for grid model exports. A data source is
//! a named set of files (*members*) sharing a base name, such as `net.xiidm`,
//! `net_mapping.csv` and `net_actions.json`. Importers and exporters read and
//! write members through one contract whether they live as loose files, as
//! individually compressed files, or inside a zip or (compressed) tar archive.
//!
//! ## Key Features
//!
//! - **One contract, many layouts** - directory, compressed directory, zip, tar, tar.gz/.bz2/.xz/.zst, memory
//! - **File name decomposition** - `net.xiidm.tar.gz` splits into base name, source format, compression and archive
//! - **Crash-safe archive updates** - archives are rebuilt next to the original and swapped in with a rename
//! - **Tar edge cases** - pax headers for long names and large sizes, entry replacement
//! - **Observers** - open/close events for every stream, for tracing and leak detection
//! - **Codecs behind feature flags** - gzip, bzip2, xz and zstd
//!
//! ## Quick Start
//!
//! ```no_run
//! use gridsource::*;
//! use std::io::{Read, Write};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let source = DataSourceBuilder::new()
//!     .with_directory("/data/exports")
//!     .with_base_name("net")
//!     .with_source_format_extension("xiidm")
//!     .with_archive_format(ArchiveFormat::Tar)
//!     .with_compression_format(CompressionFormat::Gzip)
//!     .build()?;
//!
//! // Writes go to /data/exports/net.xiidm.tar.gz
//! let mut writer = source.new_output_stream("net.xiidm", false)?;
//! writer.write_all(b"<network/>")?;
//! writer.close()?;
//!
//! if let Some(mut stream) = source.new_input_stream("net.xiidm")? {
//!     let mut xml = String::new();
//!     stream.read_to_string(&mut xml)?;
//! }
//! let names = source.list_names(r".*\.xiidm")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Members and base names
//!
//! Member names follow `<base><suffix>.<ext>`. The `*_ext` trait methods build
//! that name from the source's base name, and
//! [`list_names`](ReadOnlyDataSource::list_names) only reports members whose
//! name starts with the base name.
//!
//! ### Not found is not an error
//!
//! [`exists`](ReadOnlyDataSource::exists) returns `Ok(false)` and
//! [`new_input_stream`](ReadOnlyDataSource::new_input_stream) returns
//! `Ok(None)` for absent members, including members of an archive that does
//! not exist yet.
//!
//! ### Writers commit on close
//!
//! [`MemberWriter::close`] is the commit point. Archive backends rebuild and
//! swap the archive there and report any failure; the archive file is never
//! left half written. Append mode is only available on directory and memory
//! sources.
//!
//! ### Errors
//!
//! Every fallible call returns [`anyhow::Result`]. Failures callers need to
//! tell apart carry a [`DataSourceError`], classified with [`ErrorKind::of`]:
//! incoherent configuration, unsupported operations and invalid patterns.
//!
//! ## Feature Flags
//!
//! - `compression-gzip` - gzip (`.gz`) via `flate2`
//! - `compression-bzip2` - bzip2 (`.bz2`) via `bzip2`
//! - `compression-xz` - xz (`.xz`) via `xz2`
//! - `compression-zstd` - zstd (`.zst`) via `zstd`
//!
//! All four are enabled by default. Zip and uncompressed tar are always available.
//!
//! ## Module Overview
//!
//! - [`format`] - compression and archive format descriptors
//! - [`naming`] - file name decomposition
//! - [`datasource`] - the capability contract and its backends
//! - [`io`] - stream codecs and observer decorators
//! - [`builder`] - configuration, validation and backend selection
//! - [`util`] - entry points inferring the layout from a path
//! - [`error`] - typed error kinds
//! - [`testing`] - helpers for tests built on data sources

pub mod builder;
pub mod datasource;
pub mod error;
pub mod format;
pub mod io;
pub mod naming;
pub mod testing;
pub mod util;

// General re-exports
pub use builder::{Backend, DataSourceBuilder, DataSourceConfig};
pub use datasource::archive::tar::TarArchiveDataSource;
pub use datasource::archive::zip::ZipArchiveDataSource;
pub use datasource::directory::DirectoryDataSource;
pub use datasource::memory::InMemoryDataSource;
pub use datasource::probing::ProbingDataSource;
pub use datasource::{DataSource, DataSourceObserver, MemberWriter, ReadOnlyDataSource};
pub use error::{DataSourceError, ErrorKind};
pub use format::{ArchiveFormat, CompressionFormat};
pub use naming::FileInformation;
pub use util::{
    create_archive_data_source, create_data_source, create_data_source_from_path,
    create_directory_data_source,
};
