//! Typed error kinds for data source operations.
//!
//! Every fallible operation in this crate returns [`anyhow::Result`]. Plain I/O
//! failures travel as the underlying [`std::io::Error`] (or archive library error)
//! with path context attached. The few failures a caller has to tell apart are
//! raised as a [`DataSourceError`] so they can be recovered with
//! [`ErrorKind::of`]:
//!
//! ```
//! use gridsource::error::{DataSourceError, ErrorKind};
//!
//! let err = anyhow::Error::new(DataSourceError::unsupported("append on a zip archive"));
//! assert_eq!(ErrorKind::of(&err), Some(ErrorKind::Unsupported));
//! ```
//!
//! A member that does not exist is never an error: reads report it as `Ok(None)`
//! and existence checks as `Ok(false)`.

use std::error::Error;
use std::fmt;

/// Classification of a [`DataSourceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Incoherent builder parameters or an unusable target directory.
    Configuration,
    /// The backend cannot perform the requested operation (e.g. append on an archive).
    Unsupported,
    /// A caller-supplied argument is malformed (e.g. an invalid name pattern).
    InvalidInput,
}

impl ErrorKind {
    /// Find the first [`DataSourceError`] in the error chain and return its kind.
    ///
    /// Returns `None` for errors that did not originate from a capability check,
    /// such as plain I/O failures.
    #[must_use]
    pub fn of(err: &anyhow::Error) -> Option<Self> {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<DataSourceError>())
            .map(DataSourceError::kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration error",
            Self::Unsupported => "unsupported operation",
            Self::InvalidInput => "invalid input",
        };
        f.write_str(label)
    }
}

/// Error raised by capability and configuration checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceError {
    kind: ErrorKind,
    message: String,
}

impl DataSourceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for DataSourceError {}
