//! Digest primitives a table can be built with.
//!
//! The set is closed: a table persists only the algorithm's name, and a
//! reader maps that name back to the same variant.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;

/// Largest candidate the primitives accept, in bytes
pub const MAX_INPUT_LEN: usize = 4096;

/// Largest digest any supported algorithm produces
pub const MAX_DIGEST_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("{algorithm} input of {len} bytes exceeds the {MAX_INPUT_LEN}-byte limit")]
    InputTooLong { algorithm: DigestAlgorithm, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 3] = [Self::Md5, Self::Sha1, Self::Sha256];

    /// Resolve a configured name (`MD5`, `SHA1`, `SHA-256`, ...), ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "SHA1" | "SHA-1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Canonical name, as written into the table header
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Digest `input` into a stack buffer
    pub fn digest(self, input: &[u8]) -> Result<DigestOutput, DigestError> {
        if input.len() > MAX_INPUT_LEN {
            return Err(DigestError::InputTooLong {
                algorithm: self,
                len: input.len(),
            });
        }

        let mut out = DigestOutput {
            bytes: [0u8; MAX_DIGEST_LEN],
            len: self.output_len(),
        };
        match self {
            Self::Md5 => out.bytes[..16].copy_from_slice(&Md5::digest(input)),
            Self::Sha1 => out.bytes[..20].copy_from_slice(&Sha1::digest(input)),
            Self::Sha256 => out.bytes.copy_from_slice(&Sha256::digest(input)),
        }
        Ok(out)
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A computed digest, held inline
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DigestOutput {
    bytes: [u8; MAX_DIGEST_LEN],
    len: usize,
}

impl DigestOutput {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl AsRef<[u8]> for DigestOutput {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for DigestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestOutput({})", self.to_hex())
    }
}
