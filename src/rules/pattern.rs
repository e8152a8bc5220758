use super::{RuleError, Term};
use std::fmt;

/// An ordered concatenation of terms.
///
/// A rank decodes as a mixed-radix number whose digits are the terms' local
/// ranks, the last term being the least significant digit. Rank order is
/// therefore lexicographic over the terms' own orderings.
#[derive(Debug, Clone)]
pub struct Pattern {
    terms: Vec<Term>,
    /// Place value of each term: product of the sizes of the terms after it
    place: Vec<u64>,
    size: u64,
    max_len: usize,
}

impl Pattern {
    pub fn new(terms: Vec<Term>) -> Result<Self, RuleError> {
        if terms.is_empty() {
            return Err(RuleError::EmptyPattern);
        }

        let mut place = vec![0u64; terms.len()];
        let mut size: u64 = 1;
        for (i, term) in terms.iter().enumerate().rev() {
            place[i] = size;
            size = size.checked_mul(term.size()).ok_or(RuleError::PatternOverflow)?;
        }
        let max_len = terms.iter().map(Term::max_len).sum();

        Ok(Self {
            terms,
            place,
            size,
            max_len,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// True when every rank renders the empty string
    pub fn is_empty_only(&self) -> bool {
        self.max_len == 0
    }

    /// Append the rendering of `rank` to `out`, returning the bytes written.
    ///
    /// # Panics
    ///
    /// If `rank >= self.size()`.
    pub fn render(&self, rank: u64, out: &mut Vec<u8>) -> usize {
        assert!(
            rank < self.size,
            "pattern rank {rank} out of range (size {})",
            self.size
        );

        let mut rest = rank;
        let mut written = 0;
        for (term, &place) in self.terms.iter().zip(&self.place) {
            let local = rest / place;
            rest %= place;
            written += term.render(local, out);
        }
        debug_assert_eq!(rest, 0, "mixed-radix decode left a remainder");

        written
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for term in &self.terms {
            write!(f, "{}", term)?;
        }
        Ok(())
    }
}
