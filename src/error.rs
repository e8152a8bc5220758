//! Crate-level error type.
//!
//! Each layer owns a typed error (`ParseError`, `RuleError`, `DigestError`,
//! `StorageError`, `ConfigError`). They fold into [`Error`], which sorts them
//! into the three families a build can die of.

use crate::config::ConfigError;
use crate::digest::DigestError;
use crate::rules::{ParseError, RuleError};
use crate::table::StorageError;

/// Coarse classification of a fatal build error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed rule, bad configuration file, unusable table layout
    Configuration,
    /// Digest computation failed for a candidate
    Primitive,
    /// File creation, read, write or seek failure, or a corrupt table
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Digest(#[from] DigestError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Parse(_) | Error::Rule(_) => ErrorKind::Configuration,
            Error::Digest(_) => ErrorKind::Primitive,
            Error::Storage(e) if e.is_layout() => ErrorKind::Configuration,
            Error::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
