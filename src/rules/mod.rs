//! Password-space enumeration.
//!
//! A [`Rule`] is a union of [`Pattern`]s, each a concatenation of [`Term`]s.
//! Every password the rule can produce has a rank in `[0, rule.size())`, and
//! [`Rule::kth`] renders any rank directly, so the space is never
//! materialized. [`RuleCursor`] walks the ranks in order.
//!
//! ```
//! use pwtable::rules::{parse_rule, Lexicon, Rule};
//! use std::sync::Arc;
//!
//! let spec = parse_rule("@1&#2").unwrap();
//! let rule = Rule::build(&spec, Arc::new(Lexicon::empty())).unwrap();
//! assert_eq!(rule.size(), 26 + 100);
//!
//! let mut out = Vec::new();
//! rule.kth(26, &mut out, false).unwrap();
//! assert_eq!(out, b"00");
//! ```

pub mod lexicon;
pub mod parser;
pub mod pattern;
pub mod rule;
pub mod term;

pub use lexicon::Lexicon;
pub use parser::{ParseError, ParseErrorKind, RuleSpec, TermSpec, parse_rule};
pub use pattern::Pattern;
pub use rule::{Rule, RuleCursor};
pub use term::{CharClass, Term};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule has no patterns")]
    NoPatterns,

    #[error("pattern has no terms")]
    EmptyPattern,

    #[error("rule uses a word term but the lexicon is empty")]
    EmptyLexicon,

    #[error("term {}{repeat} has more than 2^64 values", .class.symbol())]
    TermOverflow { class: CharClass, repeat: u32 },

    #[error("pattern has more than 2^64 combinations")]
    PatternOverflow,

    #[error("rule has more than 2^64 passwords")]
    RuleOverflow,

    #[error("rule can only produce the empty password")]
    OnlyEmptyPasswords,

    #[error("patterns {first} and {second} both produce only the empty password")]
    AdjacentEmptyPatterns { first: usize, second: usize },

    #[error("rank {rank} is outside the password space of size {size}")]
    RankOutOfRange { rank: u64, size: u64 },

    #[error("ranks {rank} and its successor both render the empty password")]
    EmptyPassword { rank: u64 },
}
