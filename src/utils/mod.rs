//! Utility functions shared by the table writer and reader.
//!
//! ## Modules
//!
//! - [`encoding`] - Little-endian integer helpers for streams and block buffers
//! - [`progress`] - Progress bar that degrades to a no-op without the `progress` feature

pub mod encoding;
pub mod progress;

pub use encoding::*;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Append `.{ext}` to a path prefix without touching any existing extension.
///
/// `tables/run.v2` with `key` becomes `tables/run.v2.key`.
pub fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut name: OsString = prefix.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
