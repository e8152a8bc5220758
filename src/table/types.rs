use super::{BucketHash, StorageError};
use crate::digest::DigestAlgorithm;
use crate::utils::{get_u16_le, get_u32_le, get_u64_le, put_u16_le, put_u32_le, put_u64_le};
use serde::{Deserialize, Serialize};

/// File magic at offset 0 of the key file
pub const MAGIC: [u8; 8] = *b"PWTABLE\0";

/// On-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header that precedes the directory
pub const HEADER_SIZE: u64 = 64;

/// Size of one directory entry: head and tail block offsets
pub const DIR_ENTRY_SIZE: u64 = 16;

/// Sentinel block offset meaning "no block"
pub const NO_BLOCK: u64 = u64::MAX;

/// Width of the NUL-padded name fields in the header
pub const NAME_FIELD_LEN: usize = 16;

/// Longest key prefix a table may store per record
pub const MAX_KEY_PREFIX: u32 = 64;

/// Upper bound on a single block, keeps per-block buffers sane
pub const MAX_BLOCK_SIZE: u64 = 16 * 1024 * 1024;

/// Block header: record count (u32) + reserved (u32)
const BLOCK_HEADER_SIZE: usize = 8;
/// Record slot header: full key length (u16) + value length (u16)
const SLOT_HEADER_SIZE: usize = 4;

/// The four numeric parameters fixed when a table is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Number of directory buckets (M)
    pub bucket_count: u32,
    /// Records per block (P)
    pub block_capacity: u32,
    /// Key bytes stored verbatim per record (K)
    pub key_prefix_width: u32,
    /// Maximum value bytes per record (V)
    pub value_width: u32,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            bucket_count: 65536,
            block_capacity: 10,
            key_prefix_width: 8,
            value_width: 64,
        }
    }
}

impl TableLayout {
    pub fn validate(&self) -> Result<(), StorageError> {
        let reason = if self.bucket_count == 0 {
            "bucket count must be non-zero"
        } else if self.block_capacity == 0 {
            "block capacity must be non-zero"
        } else if self.key_prefix_width == 0 || self.key_prefix_width > MAX_KEY_PREFIX {
            "key prefix width must be between 1 and 64 bytes"
        } else if self.value_width == 0 || self.value_width > u16::MAX as u32 {
            "value width must be between 1 and 65535 bytes"
        } else if self.block_size() > MAX_BLOCK_SIZE {
            "block size exceeds 16 MiB"
        } else {
            return Ok(());
        };
        Err(StorageError::InvalidLayout { reason })
    }

    /// Bytes per record slot
    pub fn slot_size(&self) -> usize {
        self.key_prefix_width as usize + SLOT_HEADER_SIZE + self.value_width as usize
    }

    /// Bytes per block
    pub fn block_size(&self) -> u64 {
        BLOCK_HEADER_SIZE as u64 + self.block_capacity as u64 * self.slot_size() as u64 + 8
    }

    /// Offset of slot `index` within a block
    pub fn slot_offset(&self, index: u32) -> usize {
        BLOCK_HEADER_SIZE + index as usize * self.slot_size()
    }

    /// Offset of the next-block pointer within a block
    pub fn next_offset(&self) -> usize {
        self.slot_offset(self.block_capacity)
    }

    /// Byte offset of a bucket's directory entry in the key file
    pub fn dir_entry_offset(&self, bucket: usize) -> u64 {
        HEADER_SIZE + bucket as u64 * DIR_ENTRY_SIZE
    }

    /// Exact size of a well-formed key file
    pub fn key_file_len(&self) -> u64 {
        self.dir_entry_offset(self.bucket_count as usize)
    }
}

/// Everything a reader must agree on before trusting the table body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub layout: TableLayout,
    pub digest: DigestAlgorithm,
    pub bucket_hash: BucketHash,
}

impl TableHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..8].copy_from_slice(&MAGIC);
        put_u32_le(&mut buf, 8, FORMAT_VERSION);
        put_u32_le(&mut buf, 12, self.layout.bucket_count);
        put_u32_le(&mut buf, 16, self.layout.block_capacity);
        put_u32_le(&mut buf, 20, self.layout.key_prefix_width);
        put_u32_le(&mut buf, 24, self.layout.value_width);
        write_name(&mut buf[32..48], self.digest.name());
        write_name(&mut buf[48..64], self.bucket_hash.name());
        buf
    }

    /// Decode and validate a header, describing the first problem found
    pub fn decode(buf: &[u8]) -> Result<Self, String> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(format!("header is {} bytes, expected {}", buf.len(), HEADER_SIZE));
        }
        if buf[..8] != MAGIC {
            return Err("bad magic".to_string());
        }
        let version = get_u32_le(buf, 8);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }

        let layout = TableLayout {
            bucket_count: get_u32_le(buf, 12),
            block_capacity: get_u32_le(buf, 16),
            key_prefix_width: get_u32_le(buf, 20),
            value_width: get_u32_le(buf, 24),
        };
        layout.validate().map_err(|e| e.to_string())?;

        let digest_name = read_name(&buf[32..48])?;
        let digest = DigestAlgorithm::from_name(digest_name)
            .ok_or_else(|| format!("unknown digest algorithm {digest_name:?}"))?;
        let hash_name = read_name(&buf[48..64])?;
        let bucket_hash = BucketHash::from_name(hash_name)
            .ok_or_else(|| format!("unknown bucket hash {hash_name:?}"))?;

        Ok(Self {
            layout,
            digest,
            bucket_hash,
        })
    }
}

fn write_name(field: &mut [u8], name: &str) {
    let n = name.len().min(NAME_FIELD_LEN);
    field[..n].copy_from_slice(&name.as_bytes()[..n]);
}

fn read_name(field: &[u8]) -> Result<&str, String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end]).map_err(|_| "name field is not UTF-8".to_string())
}

/// A bucket's chain: first and last block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub head: u64,
    pub tail: u64,
}

impl DirEntry {
    pub const EMPTY: DirEntry = DirEntry {
        head: NO_BLOCK,
        tail: NO_BLOCK,
    };

    pub fn is_empty(&self) -> bool {
        self.head == NO_BLOCK
    }

    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE as usize] {
        let mut buf = [0u8; DIR_ENTRY_SIZE as usize];
        put_u64_le(&mut buf, 0, self.head);
        put_u64_le(&mut buf, 8, self.tail);
        buf
    }

    pub fn decode(buf: &[u8]) -> Self {
        Self {
            head: get_u64_le(buf, 0),
            tail: get_u64_le(buf, 8),
        }
    }
}

/// Block count field
#[inline]
pub fn block_count(block: &[u8]) -> u32 {
    get_u32_le(block, 0)
}

#[inline]
pub fn set_block_count(block: &mut [u8], count: u32) {
    put_u32_le(block, 0, count);
}

/// Write one record into a zeroed-or-stale slot
pub fn encode_record(layout: &TableLayout, slot: &mut [u8], key: &[u8], value: &[u8]) {
    let k = layout.key_prefix_width as usize;
    slot.fill(0);
    let n = key.len().min(k);
    slot[..n].copy_from_slice(&key[..n]);
    put_u16_le(slot, k, key.len() as u16);
    put_u16_le(slot, k + 2, value.len() as u16);
    slot[k + SLOT_HEADER_SIZE..k + SLOT_HEADER_SIZE + value.len()].copy_from_slice(value);
}

/// A record as stored in a block slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef<'a> {
    /// Stored key prefix, zero padded to the table's key prefix width
    pub key_prefix: &'a [u8],
    /// Length of the full key at insertion time
    pub key_len: u16,
    pub value: &'a [u8],
}

impl<'a> RecordRef<'a> {
    /// Decode a slot; `None` if its value length exceeds the slot
    pub fn decode(layout: &TableLayout, slot: &'a [u8]) -> Option<Self> {
        let k = layout.key_prefix_width as usize;
        let key_len = get_u16_le(slot, k);
        let value_len = get_u16_le(slot, k + 2) as usize;
        if value_len > layout.value_width as usize {
            return None;
        }
        let value_start = k + SLOT_HEADER_SIZE;
        Some(Self {
            key_prefix: &slot[..k],
            key_len,
            value: &slot[value_start..value_start + value_len],
        })
    }

    /// Prefix-and-length comparison: keys differing only beyond the stored
    /// prefix compare equal.
    pub fn matches_key(&self, key: &[u8]) -> bool {
        if self.key_len as usize != key.len() {
            return false;
        }
        let n = key.len().min(self.key_prefix.len());
        self.key_prefix[..n] == key[..n]
    }
}

/// Slot-level comparison used while walking a chain, without building a `RecordRef`
#[inline]
pub fn slot_matches_key(layout: &TableLayout, slot: &[u8], key: &[u8]) -> bool {
    let k = layout.key_prefix_width as usize;
    if get_u16_le(slot, k) as usize != key.len() {
        return false;
    }
    let n = key.len().min(k);
    slot[..n] == key[..n]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TableLayout {
        TableLayout {
            bucket_count: 16,
            block_capacity: 3,
            key_prefix_width: 4,
            value_width: 8,
        }
    }

    #[test]
    fn test_layout_geometry() {
        let layout = layout();
        assert_eq!(layout.slot_size(), 4 + 4 + 8);
        assert_eq!(layout.block_size(), 8 + 3 * 16 + 8);
        assert_eq!(layout.slot_offset(0), 8);
        assert_eq!(layout.slot_offset(2), 8 + 32);
        assert_eq!(layout.next_offset(), 8 + 48);
        assert_eq!(layout.key_file_len(), 64 + 16 * 16);
    }

    #[test]
    fn test_layout_validation() {
        assert!(TableLayout::default().validate().is_ok());

        let bad = [
            TableLayout { bucket_count: 0, ..layout() },
            TableLayout { block_capacity: 0, ..layout() },
            TableLayout { key_prefix_width: 0, ..layout() },
            TableLayout { key_prefix_width: 65, ..layout() },
            TableLayout { value_width: 0, ..layout() },
            TableLayout { value_width: 70_000, ..layout() },
            TableLayout { block_capacity: 1_000_000, value_width: 1000, ..layout() },
        ];
        for layout in bad {
            assert!(
                matches!(layout.validate(), Err(StorageError::InvalidLayout { .. })),
                "{layout:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_header_round_trip() {
        let header = TableHeader {
            layout: layout(),
            digest: DigestAlgorithm::Sha256,
            bucket_hash: BucketHash::DigestPrefix,
        };
        let buf = header.encode();
        assert_eq!(&buf[..8], b"PWTABLE\0");
        assert_eq!(&buf[32..38], b"SHA256");
        assert_eq!(TableHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_garbage() {
        let header = TableHeader {
            layout: layout(),
            digest: DigestAlgorithm::Md5,
            bucket_hash: BucketHash::Fx,
        };

        let mut buf = header.encode();
        buf[0] = b'X';
        assert_eq!(TableHeader::decode(&buf).unwrap_err(), "bad magic");

        let mut buf = header.encode();
        put_u32_le(&mut buf, 8, 9);
        assert!(TableHeader::decode(&buf).unwrap_err().contains("version 9"));

        let mut buf = header.encode();
        buf[32..48].fill(0);
        buf[32..35].copy_from_slice(b"CRC");
        assert!(TableHeader::decode(&buf).unwrap_err().contains("CRC"));

        let mut buf = header.encode();
        put_u32_le(&mut buf, 12, 0);
        assert!(TableHeader::decode(&buf).is_err());

        assert!(TableHeader::decode(&buf[..10]).is_err());
    }

    #[test]
    fn test_dir_entry_encoding() {
        let entry = DirEntry { head: 0, tail: 4096 };
        assert_eq!(DirEntry::decode(&entry.encode()), entry);
        assert!(DirEntry::decode(&DirEntry::EMPTY.encode()).is_empty());
        assert!(!entry.is_empty());
    }

    #[test]
    fn test_record_slot() {
        let layout = layout();
        let mut slot = vec![0xAAu8; layout.slot_size()];
        encode_record(&layout, &mut slot, b"abcdefgh", b"secret");

        let record = RecordRef::decode(&layout, &slot).unwrap();
        assert_eq!(record.key_prefix, b"abcd");
        assert_eq!(record.key_len, 8);
        assert_eq!(record.value, b"secret");

        // Only the prefix and the length take part in the comparison
        assert!(record.matches_key(b"abcdefgh"));
        assert!(record.matches_key(b"abcdXXXX"));
        assert!(!record.matches_key(b"abcdefg"));
        assert!(!record.matches_key(b"abcXefgh"));
        assert!(slot_matches_key(&layout, &slot, b"abcdZZZZ"));
        assert!(!slot_matches_key(&layout, &slot, b"zbcdefgh"));
    }

    #[test]
    fn test_short_key_is_zero_padded() {
        let layout = layout();
        let mut slot = vec![0xFFu8; layout.slot_size()];
        encode_record(&layout, &mut slot, b"ab", b"");

        let record = RecordRef::decode(&layout, &slot).unwrap();
        assert_eq!(record.key_prefix, b"ab\0\0");
        assert!(record.matches_key(b"ab"));
        assert!(record.value.is_empty());
    }

    #[test]
    fn test_corrupt_value_length() {
        let layout = layout();
        let mut slot = vec![0u8; layout.slot_size()];
        put_u16_le(&mut slot, 6, 9);
        assert!(RecordRef::decode(&layout, &slot).is_none());
    }
}
