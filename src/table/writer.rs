use super::types::*;
use super::{BucketHash, StorageError};
use crate::digest::DigestAlgorithm;
use crate::utils::{
    get_u64_le, put_u64_le, read_u32_le, read_u64_le, with_suffix, write_u32_le, write_u64_le,
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of [`DiskHashTable::insert_unique`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Inserted,
    /// A record with the same stored key prefix and length was already present
    Skipped,
}

/// Running counters of a table being built
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub records: u64,
    pub skipped: u64,
    pub blocks: u64,
}

/// Writer side of a disk hash table.
///
/// Chains are append-only: records are never moved or deleted, and within a
/// bucket they stay in insertion order. Once [`load_directory_cache`] has run,
/// the in-memory directory is authoritative and reaches disk only in
/// [`close`]; a table dropped without `close` is invalid.
///
/// [`load_directory_cache`]: DiskHashTable::load_directory_cache
/// [`close`]: DiskHashTable::close
pub struct DiskHashTable {
    key_path: PathBuf,
    data_path: PathBuf,
    key_file: File,
    data_file: File,
    header: TableHeader,
    directory: Option<Vec<DirEntry>>,
    /// End of the block store, where the next block is allocated
    data_len: u64,
    /// Scratch buffer of one block
    block: Vec<u8>,
    stats: WriteStats,
}

impl DiskHashTable {
    /// Create `<prefix>.key` and `<prefix>.data` holding an empty table.
    ///
    /// Fails if either file already exists.
    pub fn create(
        prefix: &Path,
        layout: TableLayout,
        digest: DigestAlgorithm,
        bucket_hash: BucketHash,
    ) -> Result<Self, StorageError> {
        layout.validate()?;

        let key_path = with_suffix(prefix, "key");
        let data_path = with_suffix(prefix, "data");
        for path in [&key_path, &data_path] {
            if path.exists() {
                return Err(StorageError::AlreadyExists { path: path.clone() });
            }
        }

        let key_file = create_new(&key_path)?;
        let data_file = match create_new(&data_path) {
            Ok(file) => file,
            Err(e) => {
                let _ = fs::remove_file(&key_path);
                return Err(e);
            }
        };

        let header = TableHeader {
            layout,
            digest,
            bucket_hash,
        };
        let table = Self {
            key_path,
            data_path,
            key_file,
            data_file,
            header,
            directory: None,
            data_len: 0,
            block: vec![0u8; layout.block_size() as usize],
            stats: WriteStats::default(),
        };

        write_at(&table.key_file, &table.key_path, 0, &header.encode())?;
        write_directory(
            &table.key_file,
            std::iter::repeat_n(DirEntry::EMPTY, layout.bucket_count as usize),
        )
        .map_err(|source| StorageError::io("write directory", &table.key_path, source))?;

        info!(
            path = %table.key_path.display(),
            buckets = layout.bucket_count,
            block_capacity = layout.block_capacity,
            key_prefix_width = layout.key_prefix_width,
            value_width = layout.value_width,
            digest = %digest,
            bucket_hash = %bucket_hash,
            "created empty table"
        );
        Ok(table)
    }

    /// Read the whole directory into memory.
    ///
    /// Afterwards inserts touch only the block store until [`close`] writes
    /// the directory back.
    ///
    /// [`close`]: DiskHashTable::close
    pub fn load_directory_cache(&mut self) -> Result<(), StorageError> {
        let layout = self.header.layout;

        let key_len = file_len(&self.key_file, &self.key_path)?;
        if key_len != layout.key_file_len() {
            return Err(StorageError::SizeMismatch {
                path: self.key_path.clone(),
                expected: layout.key_file_len(),
                actual: key_len,
            });
        }
        let data_len = file_len(&self.data_file, &self.data_path)?;
        if data_len % layout.block_size() != 0 {
            return Err(StorageError::SizeMismatch {
                path: self.data_path.clone(),
                expected: data_len - data_len % layout.block_size(),
                actual: data_len,
            });
        }

        let directory = read_directory(&self.key_file, layout.bucket_count as usize)
            .map_err(|source| StorageError::io("read directory", &self.key_path, source))?;
        self.directory = Some(directory);
        self.data_len = data_len;

        debug!(buckets = layout.bucket_count, "directory cache loaded");
        Ok(())
    }

    /// Bucket a key belongs to
    pub fn bucket_index_of(&self, key: &[u8]) -> usize {
        (self.header.bucket_hash.hash(key) % self.header.layout.bucket_count as u64) as usize
    }

    /// Append a record to the tail of its bucket's chain, without checking
    /// for duplicates.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.check_record(key, value)?;
        let bucket = self.bucket_index_of(key);
        let entry = self.dir_entry(bucket)?;
        self.push_record(bucket, entry, None, key, value)
    }

    /// Append a record unless its bucket already holds one whose stored key
    /// prefix and key length match.
    ///
    /// Walks the whole chain, so the cost grows with the chain length.
    pub fn insert_unique(&mut self, key: &[u8], value: &[u8]) -> Result<Insertion, StorageError> {
        self.check_record(key, value)?;
        let layout = self.header.layout;
        let slot_size = layout.slot_size();
        let bucket = self.bucket_index_of(key);
        let entry = self.dir_entry(bucket)?;

        let mut offset = entry.head;
        let mut tail_count = None;
        while offset != NO_BLOCK {
            self.read_block(offset)?;
            let count = block_count(&self.block);
            if count > layout.block_capacity {
                return Err(StorageError::CorruptBlock {
                    path: self.data_path.clone(),
                    offset,
                });
            }

            for i in 0..count {
                let start = layout.slot_offset(i);
                if slot_matches_key(&layout, &self.block[start..start + slot_size], key) {
                    self.stats.skipped += 1;
                    return Ok(Insertion::Skipped);
                }
            }

            let next = get_u64_le(&self.block, layout.next_offset());
            if next == NO_BLOCK {
                tail_count = Some(count);
            }
            offset = next;
        }

        self.push_record(bucket, entry, tail_count, key, value)?;
        Ok(Insertion::Inserted)
    }

    /// Flush the directory cache and both files, releasing the handles.
    ///
    /// Every directory entry is rewritten, touched or not.
    pub fn close(self) -> Result<WriteStats, StorageError> {
        if let Some(directory) = &self.directory {
            write_directory(&self.key_file, directory.iter().copied())
                .map_err(|source| StorageError::io("write directory", &self.key_path, source))?;
        }
        self.key_file
            .sync_all()
            .map_err(|source| StorageError::io("sync", &self.key_path, source))?;
        self.data_file
            .sync_all()
            .map_err(|source| StorageError::io("sync", &self.data_path, source))?;

        info!(
            records = self.stats.records,
            skipped = self.stats.skipped,
            blocks = self.stats.blocks,
            "table closed"
        );
        Ok(self.stats)
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn layout(&self) -> &TableLayout {
        &self.header.layout
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    pub fn is_cached(&self) -> bool {
        self.directory.is_some()
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn check_record(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        if key.len() > u16::MAX as usize {
            return Err(StorageError::KeyTooLong { len: key.len() });
        }
        let width = self.header.layout.value_width;
        if value.len() > width as usize {
            return Err(StorageError::ValueTooLong {
                len: value.len(),
                width,
            });
        }
        Ok(())
    }

    /// Store a record at the tail of `bucket`, whose directory entry is
    /// `entry`. `tail_count` is the tail block's record count when the
    /// caller already knows it.
    fn push_record(
        &mut self,
        bucket: usize,
        mut entry: DirEntry,
        tail_count: Option<u32>,
        key: &[u8],
        value: &[u8],
    ) -> Result<(), StorageError> {
        let layout = self.header.layout;

        if !entry.is_empty() {
            let count = match tail_count {
                Some(count) => count,
                None => self.read_count(entry.tail)?,
            };
            if count < layout.block_capacity {
                let slot = &mut self.block[..layout.slot_size()];
                encode_record(&layout, slot, key, value);
                let slot_at = entry.tail + layout.slot_offset(count) as u64;
                write_at(&self.data_file, &self.data_path, slot_at, slot)?;
                self.write_count(entry.tail, count + 1)?;
                self.stats.records += 1;
                return Ok(());
            }
        }

        let offset = self.allocate_block(key, value)?;
        if entry.is_empty() {
            entry.head = offset;
        } else {
            let link_at = entry.tail + layout.next_offset() as u64;
            write_at(&self.data_file, &self.data_path, link_at, &offset.to_le_bytes())?;
        }
        entry.tail = offset;
        self.set_dir_entry(bucket, entry)?;
        self.stats.records += 1;
        Ok(())
    }

    /// Write a fresh block holding one record at the end of the block store
    fn allocate_block(&mut self, key: &[u8], value: &[u8]) -> Result<u64, StorageError> {
        let layout = self.header.layout;
        let offset = self.data_len;

        self.block.fill(0);
        set_block_count(&mut self.block, 1);
        let start = layout.slot_offset(0);
        encode_record(&layout, &mut self.block[start..start + layout.slot_size()], key, value);
        put_u64_le(&mut self.block, layout.next_offset(), NO_BLOCK);
        write_at(&self.data_file, &self.data_path, offset, &self.block)?;

        self.data_len += layout.block_size();
        self.stats.blocks += 1;
        Ok(offset)
    }

    fn read_block(&mut self, offset: u64) -> Result<(), StorageError> {
        if offset.checked_add(self.header.layout.block_size()).is_none_or(|end| end > self.data_len) {
            return Err(StorageError::CorruptBlock {
                path: self.data_path.clone(),
                offset,
            });
        }
        read_at(&self.data_file, &self.data_path, offset, &mut self.block)
    }

    fn read_count(&self, offset: u64) -> Result<u32, StorageError> {
        let mut file = &self.data_file;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| read_u32_le(&mut file))
            .map_err(|source| StorageError::io("read", &self.data_path, source))
    }

    fn write_count(&self, offset: u64, count: u32) -> Result<(), StorageError> {
        let mut file = &self.data_file;
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| write_u32_le(&mut file, count))
            .map_err(|source| StorageError::io("write", &self.data_path, source))
    }

    fn dir_entry(&self, bucket: usize) -> Result<DirEntry, StorageError> {
        if let Some(directory) = &self.directory {
            return Ok(directory[bucket]);
        }
        let mut buf = [0u8; DIR_ENTRY_SIZE as usize];
        let offset = self.header.layout.dir_entry_offset(bucket);
        read_at(&self.key_file, &self.key_path, offset, &mut buf)?;
        Ok(DirEntry::decode(&buf))
    }

    fn set_dir_entry(&mut self, bucket: usize, entry: DirEntry) -> Result<(), StorageError> {
        match &mut self.directory {
            Some(directory) => {
                directory[bucket] = entry;
                Ok(())
            }
            None => {
                let offset = self.header.layout.dir_entry_offset(bucket);
                write_at(&self.key_file, &self.key_path, offset, &entry.encode())
            }
        }
    }
}

fn create_new(path: &Path) -> Result<File, StorageError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                path: path.to_path_buf(),
            },
            _ => StorageError::io("create", path, source),
        })
}

fn file_len(file: &File, path: &Path) -> Result<u64, StorageError> {
    file.metadata()
        .map(|m| m.len())
        .map_err(|source| StorageError::io("stat", path, source))
}

fn read_at(mut file: &File, path: &Path, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
    file.seek(SeekFrom::Start(offset))
        .and_then(|_| file.read_exact(buf))
        .map_err(|source| StorageError::io("read", path, source))
}

fn write_at(mut file: &File, path: &Path, offset: u64, buf: &[u8]) -> Result<(), StorageError> {
    file.seek(SeekFrom::Start(offset))
        .and_then(|_| file.write_all(buf))
        .map_err(|source| StorageError::io("write", path, source))
}

fn write_directory(mut file: &File, entries: impl Iterator<Item = DirEntry>) -> io::Result<()> {
    file.seek(SeekFrom::Start(HEADER_SIZE))?;
    let mut writer = BufWriter::new(file);
    for entry in entries {
        write_u64_le(&mut writer, entry.head)?;
        write_u64_le(&mut writer, entry.tail)?;
    }
    writer.flush()
}

fn read_directory(mut file: &File, bucket_count: usize) -> io::Result<Vec<DirEntry>> {
    file.seek(SeekFrom::Start(HEADER_SIZE))?;
    let mut reader = BufReader::new(file);
    let mut directory = Vec::with_capacity(bucket_count);
    for _ in 0..bucket_count {
        let head = read_u64_le(&mut reader)?;
        let tail = read_u64_le(&mut reader)?;
        directory.push(DirEntry { head, tail });
    }
    Ok(directory)
}
