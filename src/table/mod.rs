//! Disk-resident digest → password hash table.
//!
//! A table lives in two files next to its path prefix:
//!
//! - `<prefix>.key` - 64-byte [`TableHeader`] followed by the bucket directory,
//!   one `(head, tail)` pair of block offsets per bucket
//! - `<prefix>.data` - fixed-size blocks, each holding up to `block_capacity`
//!   records and a pointer to the next block of the same bucket
//!
//! [`DiskHashTable`] builds a table, [`TableReader`] reads a closed one, and
//! [`build`] drives a [`crate::rules::Rule`] through a digest into a table.

pub mod build;
pub mod hash;
pub mod reader;
pub mod types;
pub mod writer;

pub use build::{GenerationMode, PopulateReport, PopulatorState, TablePopulator};
pub use hash::BucketHash;
pub use reader::{TableReader, TableSummary};
pub use types::*;
pub use writer::{DiskHashTable, Insertion, WriteStats};

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' already exists; refusing to overwrite a table", .path.display())]
    AlreadyExists { path: PathBuf },

    #[error("invalid table header in {}: {reason}", .path.display())]
    BadHeader { path: PathBuf, reason: String },

    #[error("{} is {actual} bytes, expected {expected} for its bucket count", .path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("corrupt block at offset {offset} in {}", .path.display())]
    CorruptBlock { path: PathBuf, offset: u64 },

    #[error("invalid table layout: {reason}")]
    InvalidLayout { reason: &'static str },

    #[error("value of {len} bytes does not fit the table's {width}-byte value slots")]
    ValueTooLong { len: usize, width: u32 },

    #[error("key of {len} bytes is longer than the 65535-byte limit")]
    KeyTooLong { len: usize },
}

impl StorageError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Errors caused by the requested layout rather than by the disk
    pub fn is_layout(&self) -> bool {
        matches!(self, StorageError::InvalidLayout { .. })
    }
}
