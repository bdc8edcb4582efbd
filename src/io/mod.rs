//! Stream-level building blocks shared by every backend.
//!
//! - [`compression`] - codec wrappers for gzip, bzip2, xz and zstd streams
//! - [`observed`] - open/close event decorators for observers

pub mod compression;
pub mod observed;
