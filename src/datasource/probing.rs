//! Read-only delegation over several candidate data sources.
//!
//! Importers often do not know how a dataset was stored. A
//! [`ProbingDataSource`] asks its candidates in priority order and reads from
//! the first one that has the requested member.

use crate::datasource::archive::tar::TarArchiveDataSource;
use crate::datasource::archive::zip::ZipArchiveDataSource;
use crate::datasource::ReadOnlyDataSource;
use crate::datasource::directory::DirectoryDataSource;
use crate::format::CompressionFormat;
use crate::io::compression::is_available;
use anyhow::Result;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

/// First-match delegation over an ordered list of read-only sources.
pub struct ProbingDataSource {
    base_name: String,
    candidates: Vec<Box<dyn ReadOnlyDataSource>>,
}

impl ProbingDataSource {
    /// Probe `candidates` in order. The base name is taken from the first one.
    pub fn new(candidates: Vec<Box<dyn ReadOnlyDataSource>>) -> Self {
        let base_name = candidates
            .first()
            .map(|candidate| candidate.base_name().to_string())
            .unwrap_or_default();
        Self {
            base_name,
            candidates,
        }
    }

    /// The usual layouts of a dataset in `directory`: loose files (plain, then
    /// each compiled-in codec), then `<base>.zip`, then `<base>.tar` and its
    /// compressed variants.
    pub fn for_base_name(directory: &Path, base_name: &str) -> Self {
        let codecs: Vec<CompressionFormat> = [
            CompressionFormat::Gzip,
            CompressionFormat::Bzip2,
            CompressionFormat::Xz,
            CompressionFormat::Zstd,
        ]
        .into_iter()
        .filter(|format| is_available(*format))
        .collect();

        let mut candidates: Vec<Box<dyn ReadOnlyDataSource>> =
            vec![Box::new(DirectoryDataSource::new(directory, base_name))];
        for &format in &codecs {
            candidates.push(Box::new(DirectoryDataSource::compressed(
                directory, base_name, format,
            )));
        }
        candidates.push(Box::new(ZipArchiveDataSource::for_base_name(
            directory, base_name, "",
        )));
        for format in std::iter::once(CompressionFormat::None).chain(codecs) {
            candidates.push(Box::new(TarArchiveDataSource::for_base_name(
                directory, base_name, "", format,
            )));
        }
        Self {
            base_name: base_name.to_string(),
            candidates,
        }
    }

    #[must_use]
    pub fn candidates(&self) -> &[Box<dyn ReadOnlyDataSource>] {
        &self.candidates
    }
}

impl ReadOnlyDataSource for ProbingDataSource {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        for candidate in &self.candidates {
            if candidate.exists(file_name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        for (index, candidate) in self.candidates.iter().enumerate() {
            if let Some(stream) = candidate.new_input_stream(file_name)? {
                log::debug!("{file_name} found in candidate {index}");
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for candidate in &self.candidates {
            names.extend(candidate.list_names(regex)?);
        }
        Ok(names)
    }
}
