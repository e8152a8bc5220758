use super::{Lexicon, RuleError};
use std::fmt;
use std::sync::Arc;

pub const DIGITS: &[u8] = b"0123456789";
pub const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
/// Every printable ASCII byte, space through tilde
pub static PRINTABLE: [u8; 95] = printable_ascii();

const fn printable_ascii() -> [u8; 95] {
    let mut out = [0u8; 95];
    let mut i = 0;
    while i < 95 {
        out[i] = b' ' + i as u8;
        i += 1;
    }
    out
}

/// Character class of a run term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Digit,
    Letter,
    Ascii,
}

impl CharClass {
    pub fn alphabet(self) -> &'static [u8] {
        match self {
            CharClass::Digit => DIGITS,
            CharClass::Letter => LETTERS,
            CharClass::Ascii => &PRINTABLE,
        }
    }

    /// Rule syntax symbol introducing this class
    pub fn symbol(self) -> char {
        match self {
            CharClass::Digit => '#',
            CharClass::Letter => '@',
            CharClass::Ascii => '.',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '#' => Some(CharClass::Digit),
            '@' => Some(CharClass::Letter),
            '.' => Some(CharClass::Ascii),
            _ => None,
        }
    }
}

/// One atomic component of a pattern
#[derive(Debug, Clone)]
pub enum Term {
    /// `repeat` characters drawn from `class`
    Chars {
        class: CharClass,
        repeat: u32,
        size: u64,
    },
    /// One whole word of the lexicon
    Word { lexicon: Arc<Lexicon> },
}

impl Term {
    pub fn chars(class: CharClass, repeat: u32) -> Result<Self, RuleError> {
        let base = class.alphabet().len() as u64;
        let size = base
            .checked_pow(repeat)
            .ok_or(RuleError::TermOverflow { class, repeat })?;
        Ok(Term::Chars { class, repeat, size })
    }

    pub fn word(lexicon: Arc<Lexicon>) -> Result<Self, RuleError> {
        if lexicon.is_empty() {
            return Err(RuleError::EmptyLexicon);
        }
        Ok(Term::Word { lexicon })
    }

    /// Number of distinct values this term renders
    pub fn size(&self) -> u64 {
        match self {
            Term::Chars { size, .. } => *size,
            Term::Word { lexicon } => lexicon.len() as u64,
        }
    }

    /// Upper bound on the bytes one rendering produces
    pub fn max_len(&self) -> usize {
        match self {
            Term::Chars { repeat, .. } => *repeat as usize,
            Term::Word { lexicon } => lexicon.longest(),
        }
    }

    /// Append the rendering of `rank` to `out`, returning the bytes written.
    ///
    /// # Panics
    ///
    /// If `rank >= self.size()`.
    pub fn render(&self, rank: u64, out: &mut Vec<u8>) -> usize {
        assert!(
            rank < self.size(),
            "term rank {rank} out of range (size {})",
            self.size()
        );

        match self {
            Term::Chars { class, repeat, .. } => {
                let alphabet = class.alphabet();
                let base = alphabet.len() as u64;
                let start = out.len();
                out.resize(start + *repeat as usize, 0);

                // Most significant digit first
                let mut rest = rank;
                for slot in out[start..].iter_mut().rev() {
                    *slot = alphabet[(rest % base) as usize];
                    rest /= base;
                }
                *repeat as usize
            }
            Term::Word { lexicon } => {
                let word = lexicon.word(rank as usize);
                out.extend_from_slice(word);
                word.len()
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Chars { class, repeat, .. } => write!(f, "{}{}", class.symbol(), repeat),
            Term::Word { .. } => f.write_str("$"),
        }
    }
}
