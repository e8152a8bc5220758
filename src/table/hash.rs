use rustc_hash::FxHasher;
use std::fmt;
use std::hash::Hasher;

/// How a key is mapped to a bucket.
///
/// Only the name is stored in the table header; a reader must pick the same
/// variant to find anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BucketHash {
    /// FxHash over the whole key
    #[default]
    Fx,
    /// The key's first eight bytes as a little-endian integer.
    /// Digests are already uniform, so this costs nothing and spreads well.
    DigestPrefix,
}

impl BucketHash {
    pub const ALL: [BucketHash; 2] = [Self::Fx, Self::DigestPrefix];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fx" => Some(Self::Fx),
            "digest-prefix" | "prefix" => Some(Self::DigestPrefix),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fx => "fx",
            Self::DigestPrefix => "digest-prefix",
        }
    }

    #[inline]
    pub fn hash(self, key: &[u8]) -> u64 {
        match self {
            Self::Fx => {
                let mut hasher = FxHasher::default();
                hasher.write(key);
                hasher.finish()
            }
            Self::DigestPrefix => {
                let mut bytes = [0u8; 8];
                let n = key.len().min(8);
                bytes[..n].copy_from_slice(&key[..n]);
                u64::from_le_bytes(bytes)
            }
        }
    }
}

impl fmt::Display for BucketHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
