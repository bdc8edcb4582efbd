//! Testing utilities for code built on data sources.
//!
//! - [`TempDirPath`]: a temporary directory removed on drop
//! - [`RecordingObserver`]: a [`DataSourceObserver`] that records every event
//! - [`write_member`] / [`read_member`]: one-call member I/O
//! - [`sample_members`]: a small dataset of typical member files
//!
//! # Example
//!
//! ```
//! use gridsource::datasource::memory::InMemoryDataSource;
//! use gridsource::testing::{read_member, write_member};
//!
//! # fn main() -> anyhow::Result<()> {
//! let source = InMemoryDataSource::new("net");
//! write_member(&source, "net.xiidm", b"<network/>")?;
//! assert_eq!(read_member(&source, "net.xiidm")?, Some(b"<network/>".to_vec()));
//! # Ok(())
//! # }
//! ```

use crate::datasource::{DataSource, DataSourceObserver, ReadOnlyDataSource};
use anyhow::Result;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::TempDir;

/// A temporary directory that is automatically deleted when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// Create a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    /// Get the path to the temporary directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a file path within this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }

    /// Sorted names of the entries of this directory starting with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn file_names_starting_with(&self, prefix: &str) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// One observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Opened(String),
    Closed(String),
}

/// Observer recording every event in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received so far.
    #[must_use]
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `opened` events minus number of `closed` events.
    #[must_use]
    pub fn open_streams(&self) -> usize {
        let events = self.events();
        let opened = events
            .iter()
            .filter(|event| matches!(event, StreamEvent::Opened(_)))
            .count();
        opened.saturating_sub(events.len() - opened)
    }

    fn record(&self, event: StreamEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl DataSourceObserver for RecordingObserver {
    fn opened(&self, name: &str) {
        self.record(StreamEvent::Opened(name.to_string()));
    }

    fn closed(&self, name: &str) {
        self.record(StreamEvent::Closed(name.to_string()));
    }
}

/// Replace `file_name` with `data` and commit it.
///
/// # Errors
///
/// Returns an error if opening, writing or closing the member fails.
pub fn write_member(
    source: &(impl DataSource + ?Sized),
    file_name: &str,
    data: &[u8],
) -> Result<()> {
    let mut writer = source.new_output_stream(file_name, false)?;
    writer.write_all(data)?;
    writer.close()
}

/// Read `file_name` whole, or `None` when it does not exist.
///
/// # Errors
///
/// Returns an error if opening or reading the member fails.
pub fn read_member(
    source: &(impl ReadOnlyDataSource + ?Sized),
    file_name: &str,
) -> Result<Option<Vec<u8>>> {
    let Some(mut stream) = source.new_input_stream(file_name)? else {
        return Ok(None);
    };
    let mut data = Vec::new();
    stream.read_to_end(&mut data)?;
    Ok(Some(data))
}

/// Typical members of a dataset with base name `net`.
///
/// # Example
///
/// ```
/// use gridsource::testing::sample_members;
///
/// assert!(sample_members().iter().all(|(name, _)| name.starts_with("net")));
/// ```
#[must_use]
pub fn sample_members() -> Vec<(&'static str, &'static [u8])> {
    vec![
        (
            "net.xiidm",
            b"<network id=\"net\" caseDate=\"2024-01-01T00:00:00Z\"/>".as_slice(),
        ),
        ("net_mapping.csv", b"id,alias\nGEN1,G1\nLOAD1,L1\n".as_slice()),
        ("net_actions.json", b"{\"version\":\"1.0\",\"actions\":[]}".as_slice()),
    ]
}
