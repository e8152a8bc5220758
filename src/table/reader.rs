use super::types::*;
use super::StorageError;
use crate::utils::{get_u64_le, with_suffix};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Aggregate shape of a closed table
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub records: u64,
    pub blocks: u64,
    pub used_buckets: u64,
    /// Record count of the longest chain
    pub longest_chain: u64,
}

/// Read-only view of a closed table, both files memory-mapped
pub struct TableReader {
    data_path: PathBuf,
    header: TableHeader,
    keys: Mmap,
    /// `None` for a table with no blocks
    data: Option<Mmap>,
}

impl TableReader {
    pub fn open(prefix: &Path) -> Result<Self, StorageError> {
        let key_path = with_suffix(prefix, "key");
        let data_path = with_suffix(prefix, "data");

        let keys = map_file(&key_path)?.ok_or_else(|| StorageError::BadHeader {
            path: key_path.clone(),
            reason: "key file is empty".to_string(),
        })?;
        let header = TableHeader::decode(&keys).map_err(|reason| StorageError::BadHeader {
            path: key_path.clone(),
            reason,
        })?;

        let layout = header.layout;
        if keys.len() as u64 != layout.key_file_len() {
            return Err(StorageError::SizeMismatch {
                path: key_path,
                expected: layout.key_file_len(),
                actual: keys.len() as u64,
            });
        }

        let data = map_file(&data_path)?;
        let data_len = data.as_ref().map_or(0, |m| m.len() as u64);
        if data_len % layout.block_size() != 0 {
            return Err(StorageError::SizeMismatch {
                path: data_path,
                expected: data_len - data_len % layout.block_size(),
                actual: data_len,
            });
        }

        debug!(
            path = %key_path.display(),
            buckets = layout.bucket_count,
            blocks = data_len / layout.block_size(),
            "opened table"
        );
        Ok(Self {
            data_path,
            header,
            keys,
            data,
        })
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn layout(&self) -> &TableLayout {
        &self.header.layout
    }

    pub fn bucket_count(&self) -> usize {
        self.header.layout.bucket_count as usize
    }

    pub fn block_count(&self) -> u64 {
        self.data_bytes().len() as u64 / self.header.layout.block_size()
    }

    pub fn bucket_index_of(&self, key: &[u8]) -> usize {
        (self.header.bucket_hash.hash(key) % self.header.layout.bucket_count as u64) as usize
    }

    /// Directory entry of `bucket`, `None` if out of range
    pub fn dir_entry(&self, bucket: usize) -> Option<DirEntry> {
        if bucket >= self.bucket_count() {
            return None;
        }
        let start = self.header.layout.dir_entry_offset(bucket) as usize;
        Some(DirEntry::decode(&self.keys[start..start + DIR_ENTRY_SIZE as usize]))
    }

    /// Records of one bucket in insertion order.
    ///
    /// # Panics
    ///
    /// If `bucket >= bucket_count()`.
    pub fn chain(&self, bucket: usize) -> ChainIter<'_> {
        let entry = self
            .dir_entry(bucket)
            .unwrap_or_else(|| panic!("bucket {bucket} out of range"));
        ChainIter {
            reader: self,
            offset: entry.head,
            index: 0,
            hops: 0,
            done: false,
        }
    }

    /// Values of every record whose stored key prefix and length match `key`
    pub fn lookup(&self, key: &[u8]) -> Result<Vec<&[u8]>, StorageError> {
        let mut values = Vec::new();
        for record in self.chain(self.bucket_index_of(key)) {
            let record = record?;
            if record.matches_key(key) {
                values.push(record.value);
            }
        }
        Ok(values)
    }

    /// Walk every chain, counting records and occupancy
    pub fn summary(&self) -> Result<TableSummary, StorageError> {
        let mut summary = TableSummary {
            blocks: self.block_count(),
            ..TableSummary::default()
        };
        for bucket in 0..self.bucket_count() {
            let mut len = 0u64;
            for record in self.chain(bucket) {
                record?;
                len += 1;
            }
            if len > 0 {
                summary.used_buckets += 1;
            }
            summary.records += len;
            summary.longest_chain = summary.longest_chain.max(len);
        }
        Ok(summary)
    }

    fn data_bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// The block at `offset`, if it is aligned and in bounds
    fn block(&self, offset: u64) -> Option<&[u8]> {
        let size = self.header.layout.block_size();
        let data = self.data_bytes();
        if offset % size != 0 || offset.checked_add(size)? > data.len() as u64 {
            return None;
        }
        Some(&data[offset as usize..(offset + size) as usize])
    }
}

/// Iterator over one bucket's records, following `next` pointers.
///
/// Yields a single `CorruptBlock` error and stops on an out-of-bounds
/// pointer, an impossible record count, or a cycle.
pub struct ChainIter<'a> {
    reader: &'a TableReader,
    offset: u64,
    index: u32,
    hops: u64,
    done: bool,
}

impl ChainIter<'_> {
    fn fail(&mut self) -> StorageError {
        self.done = true;
        StorageError::CorruptBlock {
            path: self.reader.data_path.clone(),
            offset: self.offset,
        }
    }
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = Result<RecordRef<'a>, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader;
        let layout = reader.header.layout;
        loop {
            if self.done || self.offset == NO_BLOCK {
                return None;
            }
            let Some(block) = reader.block(self.offset) else {
                return Some(Err(self.fail()));
            };
            let count = block_count(block);
            if count > layout.block_capacity {
                return Some(Err(self.fail()));
            }

            if self.index < count {
                let start = layout.slot_offset(self.index);
                self.index += 1;
                return match RecordRef::decode(&layout, &block[start..start + layout.slot_size()]) {
                    Some(record) => Some(Ok(record)),
                    None => Some(Err(self.fail())),
                };
            }

            self.offset = get_u64_le(block, layout.next_offset());
            self.index = 0;
            self.hops += 1;
            if self.hops > reader.block_count() {
                return Some(Err(self.fail()));
            }
        }
    }
}

fn map_file(path: &Path) -> Result<Option<Mmap>, StorageError> {
    let file = File::open(path).map_err(|source| StorageError::io("open", path, source))?;
    let len = file
        .metadata()
        .map_err(|source| StorageError::io("stat", path, source))?
        .len();
    if len == 0 {
        return Ok(None);
    }
    // Tables are immutable once closed
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| StorageError::io("map", path, source))?;
    Ok(Some(mmap))
}
