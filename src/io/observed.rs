//! Stream decorators that report open/close events to a [`DataSourceObserver`].
//!
//! `opened` fires when the decorator is built and `closed` fires exactly once
//! when it goes away, whether the stream was closed normally, failed while
//! closing, or was simply dropped.

use crate::datasource::{DataSourceObserver, MemberWriter};
use anyhow::Result;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Reader wrapper firing `opened` on creation and `closed` on drop.
pub struct ObservedReader {
    inner: Box<dyn Read + Send>,
    name: String,
    observer: Arc<dyn DataSourceObserver>,
}

impl ObservedReader {
    pub fn new(
        inner: Box<dyn Read + Send>,
        name: impl Into<String>,
        observer: Arc<dyn DataSourceObserver>,
    ) -> Self {
        let name = name.into();
        observer.opened(&name);
        Self {
            inner,
            name,
            observer,
        }
    }
}

impl Read for ObservedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for ObservedReader {
    fn drop(&mut self) {
        self.observer.closed(&self.name);
    }
}

/// Writer wrapper firing `opened` on creation and `closed` once the wrapped
/// writer has been closed or dropped.
pub struct ObservedWriter {
    inner: Option<Box<dyn MemberWriter>>,
    name: String,
    observer: Arc<dyn DataSourceObserver>,
}

impl ObservedWriter {
    pub fn new(
        inner: Box<dyn MemberWriter>,
        name: impl Into<String>,
        observer: Arc<dyn DataSourceObserver>,
    ) -> Self {
        let name = name.into();
        observer.opened(&name);
        Self {
            inner: Some(inner),
            name,
            observer,
        }
    }

    fn inner_mut(&mut self) -> io::Result<&mut Box<dyn MemberWriter>> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::other(format!("{} is already closed", self.name)))
    }
}

impl Write for ObservedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner_mut()?.flush()
    }
}

impl MemberWriter for ObservedWriter {
    fn close(mut self: Box<Self>) -> Result<()> {
        // `closed` fires from Drop once `self` goes out of scope, after the commit.
        match self.inner.take() {
            Some(inner) => inner.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ObservedWriter {
    fn drop(&mut self) {
        // Release the inner writer first so its own cleanup runs before `closed`.
        drop(self.inner.take());
        self.observer.closed(&self.name);
    }
}

/// Decorate `reader` when an observer is attached.
pub fn observe_reader(
    reader: Box<dyn Read + Send>,
    name: impl Into<String>,
    observer: Option<&Arc<dyn DataSourceObserver>>,
) -> Box<dyn Read + Send> {
    match observer {
        Some(observer) => Box::new(ObservedReader::new(reader, name, Arc::clone(observer))),
        None => reader,
    }
}

/// Decorate `writer` when an observer is attached.
pub fn observe_writer(
    writer: Box<dyn MemberWriter>,
    name: impl Into<String>,
    observer: Option<&Arc<dyn DataSourceObserver>>,
) -> Box<dyn MemberWriter> {
    match observer {
        Some(observer) => Box::new(ObservedWriter::new(writer, name, Arc::clone(observer))),
        None => writer,
    }
}
