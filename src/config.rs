//! Generator configuration, read from `<prefix>.json`.
//!
//! ```json
//! {
//!   "rule": "@2&#3",
//!   "lexicon": "words.txt",
//!   "hash": "SHA1",
//!   "flag": "all",
//!   "stop_at_limit": true,
//!   "table": { "bucket_count": 65536, "block_capacity": 10, "key_prefix_width": 8, "bucket_hash": "fx" }
//! }
//! ```
//!
//! Everything but `rule` has a default. The table's value width is not
//! configurable; it is the rule's longest password.

use crate::digest::{DigestAlgorithm, MAX_INPUT_LEN};
use crate::error::Result;
use crate::rules::{Lexicon, Rule, parse_rule};
use crate::table::{BucketHash, GenerationMode, TableLayout};
use crate::utils::with_suffix;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown digest algorithm '{0}' (expected MD5, SHA1 or SHA256)")]
    UnknownDigest(String),

    #[error("unknown bucket hash '{0}' (expected fx or digest-prefix)")]
    UnknownBucketHash(String),

    #[error("invalid generation flag '{0}' (expected \"all\" or a record count)")]
    InvalidFlag(String),

    #[error("rule uses word terms but no lexicon is configured")]
    MissingLexicon,

    #[error("passwords of up to {0} bytes do not fit a table value slot")]
    PasswordTooLong(usize),

    #[error("passwords of up to {0} bytes exceed the {MAX_INPUT_LEN}-byte digest input limit")]
    DigestInputTooLong(usize),
}

/// How many passwords to generate: `"all"` or a record count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationFlag {
    Count(u64),
    Keyword(String),
}

impl Default for GenerationFlag {
    fn default() -> Self {
        GenerationFlag::Keyword("all".to_string())
    }
}

/// Table geometry and bucket hash, all optional in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    pub bucket_count: u32,
    pub block_capacity: u32,
    pub key_prefix_width: u32,
    pub bucket_hash: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        let layout = TableLayout::default();
        Self {
            bucket_count: layout.bucket_count,
            block_capacity: layout.block_capacity,
            key_prefix_width: layout.key_prefix_width,
            bucket_hash: BucketHash::default().name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    pub rule: String,

    /// Word list for `$` terms, relative to the config file
    #[serde(default)]
    pub lexicon: Option<PathBuf>,

    #[serde(default = "default_hash")]
    pub hash: String,

    #[serde(default)]
    pub flag: GenerationFlag,

    /// In limited mode, stop once `flag` records were inserted instead of
    /// walking the whole rule
    #[serde(default = "default_stop_at_limit")]
    pub stop_at_limit: bool,

    #[serde(default)]
    pub table: TableSettings,
}

fn default_hash() -> String {
    DigestAlgorithm::Sha1.name().to_string()
}

fn default_stop_at_limit() -> bool {
    true
}

/// Everything needed to create and populate one table
#[derive(Debug)]
pub struct BuildPlan {
    pub rule: Rule,
    pub digest: DigestAlgorithm,
    pub mode: GenerationMode,
    pub layout: TableLayout,
    pub bucket_hash: BucketHash,
}

/// Config file belonging to a table prefix
pub fn config_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, "json")
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn digest(&self) -> Result<DigestAlgorithm, ConfigError> {
        DigestAlgorithm::from_name(&self.hash).ok_or_else(|| ConfigError::UnknownDigest(self.hash.clone()))
    }

    pub fn bucket_hash(&self) -> Result<BucketHash, ConfigError> {
        let name = &self.table.bucket_hash;
        BucketHash::from_name(name).ok_or_else(|| ConfigError::UnknownBucketHash(name.clone()))
    }

    pub fn generation_mode(&self) -> Result<GenerationMode, ConfigError> {
        let count = match &self.flag {
            GenerationFlag::Count(count) => *count,
            GenerationFlag::Keyword(word) => {
                let word = word.trim();
                if word.eq_ignore_ascii_case("all") {
                    return Ok(GenerationMode::Exhaustive);
                }
                word.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidFlag(word.to_string()))?
            }
        };
        Ok(GenerationMode::Limited {
            count,
            stop_at_limit: self.stop_at_limit,
        })
    }

    /// Lexicon path resolved against `base_dir`
    pub fn lexicon_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.lexicon.as_ref().map(|path| base_dir.join(path))
    }

    /// Parse the rule, load the lexicon and derive the table layout.
    ///
    /// `base_dir` is the directory relative lexicon paths resolve against.
    pub fn plan(&self, base_dir: &Path) -> Result<BuildPlan> {
        let digest = self.digest()?;
        let bucket_hash = self.bucket_hash()?;
        let mode = self.generation_mode()?;

        let spec = parse_rule(&self.rule)?;
        let lexicon = match self.lexicon_path(base_dir) {
            Some(path) => {
                let lexicon = Lexicon::load(&path)?;
                debug!(path = %path.display(), words = lexicon.len(), "loaded lexicon");
                lexicon
            }
            None if spec.uses_lexicon() => return Err(ConfigError::MissingLexicon.into()),
            None => Lexicon::empty(),
        };
        let rule = Rule::build(&spec, Arc::new(lexicon))?;
        if rule.max_len() > MAX_INPUT_LEN {
            return Err(ConfigError::DigestInputTooLong(rule.max_len()).into());
        }

        let value_width = u32::try_from(rule.max_len())
            .ok()
            .filter(|&width| width <= u16::MAX as u32)
            .ok_or(ConfigError::PasswordTooLong(rule.max_len()))?;
        let layout = TableLayout {
            bucket_count: self.table.bucket_count,
            block_capacity: self.table.block_capacity,
            key_prefix_width: self.table.key_prefix_width,
            value_width,
        };
        layout.validate()?;

        Ok(BuildPlan {
            rule,
            digest,
            mode,
            layout,
            bucket_hash,
        })
    }
}
