//! A data source backed by a name to bytes map.

use crate::datasource::{
    DataSource, DataSourceObserver, MemberWriter, NameFilter, ReadOnlyDataSource,
};
use crate::io::observed::{observe_reader, observe_writer};
use anyhow::{Result, anyhow};
use std::collections::{BTreeSet, HashMap};
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

type Store = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// In-memory data source, mainly for tests and for staging data between
/// importers and exporters.
///
/// Writers publish their buffer on close. Clones share the same store.
#[derive(Clone, Default)]
pub struct InMemoryDataSource {
    base_name: String,
    store: Store,
    observer: Option<Arc<dyn DataSourceObserver>>,
}

impl InMemoryDataSource {
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn DataSourceObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Store `data` under `file_name`, replacing any previous content.
    pub fn put_data(&self, file_name: impl Into<String>, data: impl Into<Vec<u8>>) {
        lock(&self.store).insert(file_name.into(), data.into());
    }

    /// Copy of the bytes stored under `file_name`.
    #[must_use]
    pub fn get_data(&self, file_name: &str) -> Option<Vec<u8>> {
        lock(&self.store).get(file_name).cloned()
    }

    /// Every stored name, in order.
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        lock(&self.store).keys().cloned().collect()
    }
}

// Entries are inserted whole, so a poisoned store is still consistent.
fn lock(store: &Store) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
    store.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl ReadOnlyDataSource for InMemoryDataSource {
    fn base_name(&self) -> &str {
        &self.base_name
    }

    fn exists(&self, file_name: &str) -> Result<bool> {
        Ok(lock(&self.store).contains_key(file_name))
    }

    fn new_input_stream(&self, file_name: &str) -> Result<Option<Box<dyn Read + Send>>> {
        Ok(self.get_data(file_name).map(|data| {
            observe_reader(Box::new(Cursor::new(data)), file_name, self.observer.as_ref())
        }))
    }

    fn list_names(&self, regex: &str) -> Result<BTreeSet<String>> {
        let filter = NameFilter::new(&self.base_name, regex)?;
        Ok(lock(&self.store)
            .keys()
            .filter(|name| filter.accepts(name))
            .cloned()
            .collect())
    }
}

impl DataSource for InMemoryDataSource {
    fn new_output_stream(&self, file_name: &str, append: bool) -> Result<Box<dyn MemberWriter>> {
        let buffer = if append {
            self.get_data(file_name).unwrap_or_default()
        } else {
            Vec::new()
        };
        let writer = MemoryMemberWriter {
            name: file_name.to_string(),
            buffer: Some(buffer),
            store: Arc::clone(&self.store),
        };
        Ok(observe_writer(Box::new(writer), file_name, self.observer.as_ref()))
    }
}

struct MemoryMemberWriter {
    name: String,
    buffer: Option<Vec<u8>>,
    store: Store,
}

impl MemoryMemberWriter {
    fn buffer_mut(&mut self) -> io::Result<&mut Vec<u8>> {
        self.buffer
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is already closed", self.name)))
    }
}

impl Write for MemoryMemberWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl MemberWriter for MemoryMemberWriter {
    fn close(mut self: Box<Self>) -> Result<()> {
        let buffer = self
            .buffer
            .take()
            .ok_or_else(|| anyhow!("{} is already closed", self.name))?;
        lock(&self.store).insert(std::mem::take(&mut self.name), buffer);
        Ok(())
    }
}
