use super::parser::{RuleSpec, TermSpec};
use super::{Lexicon, Pattern, RuleError, Term};
use std::fmt;
use std::sync::Arc;

/// A password space: the ordered union of independent patterns.
///
/// Global ranks `[offsets[i], offsets[i + 1])` belong to pattern `i`.
#[derive(Debug, Clone)]
pub struct Rule {
    patterns: Vec<Pattern>,
    offsets: Vec<u64>,
    max_len: usize,
}

impl Rule {
    pub fn new(patterns: Vec<Pattern>) -> Result<Self, RuleError> {
        if patterns.is_empty() {
            return Err(RuleError::NoPatterns);
        }
        if patterns.iter().all(Pattern::is_empty_only) {
            return Err(RuleError::OnlyEmptyPasswords);
        }
        // An empty-only pattern has size 1, so its retry lands on the first
        // rank of the next pattern (wrapping to pattern 0)
        let count = patterns.len();
        for first in 0..count {
            let second = (first + 1) % count;
            if patterns[first].is_empty_only() && patterns[second].is_empty_only() {
                return Err(RuleError::AdjacentEmptyPatterns { first, second });
            }
        }

        let mut offsets = Vec::with_capacity(patterns.len() + 1);
        let mut total: u64 = 0;
        offsets.push(total);
        for pattern in &patterns {
            total = total.checked_add(pattern.size()).ok_or(RuleError::RuleOverflow)?;
            offsets.push(total);
        }
        let max_len = patterns.iter().map(Pattern::max_len).max().unwrap_or(0);

        Ok(Self {
            patterns,
            offsets,
            max_len,
        })
    }

    /// Instantiate a parsed rule against a loaded lexicon
    pub fn build(spec: &RuleSpec, lexicon: Arc<Lexicon>) -> Result<Self, RuleError> {
        let mut patterns = Vec::with_capacity(spec.patterns.len());
        for pattern in &spec.patterns {
            let terms = pattern
                .terms
                .iter()
                .map(|term| match *term {
                    TermSpec::Chars { class, repeat } => Term::chars(class, repeat),
                    TermSpec::Word => Term::word(Arc::clone(&lexicon)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            patterns.push(Pattern::new(terms)?);
        }
        Self::new(patterns)
    }

    /// Total number of ranks
    pub fn size(&self) -> u64 {
        self.offsets[self.patterns.len()]
    }

    /// Longest password any rank can render
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Route a global rank to `(pattern index, rank within that pattern)`
    pub fn locate(&self, rank: u64) -> Option<(usize, u64)> {
        if rank >= self.size() {
            return None;
        }
        // First offset strictly greater than rank, minus one
        let index = self.offsets.partition_point(|&offset| offset <= rank) - 1;
        Some((index, rank - self.offsets[index]))
    }

    /// Render the password at `rank` into `out` (cleared first).
    ///
    /// With `allow_empty == false` an empty rendering is retried once at the
    /// following rank, wrapping around the end of the space.
    pub fn kth(&self, rank: u64, out: &mut Vec<u8>, allow_empty: bool) -> Result<usize, RuleError> {
        let len = self.render_at(rank, out)?;
        if len > 0 || allow_empty {
            return Ok(len);
        }

        let retry = (rank + 1) % self.size();
        let len = self.render_at(retry, out)?;
        if len == 0 {
            return Err(RuleError::EmptyPassword { rank });
        }
        Ok(len)
    }

    fn render_at(&self, rank: u64, out: &mut Vec<u8>) -> Result<usize, RuleError> {
        let (index, local) = self.locate(rank).ok_or(RuleError::RankOutOfRange {
            rank,
            size: self.size(),
        })?;
        out.clear();
        Ok(self.patterns[index].render(local, out))
    }

    /// Sequential cursor starting at rank 0
    pub fn cursor(&self) -> RuleCursor<'_> {
        RuleCursor {
            rule: self,
            position: 0,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pattern) in self.patterns.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}", pattern)?;
        }
        Ok(())
    }
}

/// Walks a rule's ranks in order.
///
/// The position is the only state, so saving it and calling
/// [`RuleCursor::seek`] later resumes exactly where the walk stopped.
#[derive(Debug, Clone)]
pub struct RuleCursor<'r> {
    rule: &'r Rule,
    position: u64,
}

impl<'r> RuleCursor<'r> {
    /// Render the next non-empty password into `out`.
    ///
    /// Returns `Ok(None)` once the space is exhausted.
    pub fn next_password(&mut self, out: &mut Vec<u8>) -> Result<Option<usize>, RuleError> {
        if self.position >= self.rule.size() {
            return Ok(None);
        }
        let len = self.rule.kth(self.position, out, false)?;
        self.position += 1;
        Ok(Some(len))
    }

    /// Rank the next call will render
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn seek(&mut self, position: u64) {
        self.position = position.min(self.rule.size());
    }

    pub fn remaining(&self) -> u64 {
        self.rule.size() - self.position
    }

    pub fn rule(&self) -> &'r Rule {
        self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CharClass, parse_rule};

    fn rule(text: &str) -> Rule {
        rule_with(text, Lexicon::empty())
    }

    fn rule_with(text: &str, lexicon: Lexicon) -> Rule {
        let spec = parse_rule(text).unwrap();
        Rule::build(&spec, Arc::new(lexicon)).unwrap()
    }

    fn kth(rule: &Rule, rank: u64) -> String {
        let mut out = Vec::new();
        rule.kth(rank, &mut out, false).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_union_routing() {
        let rule = rule("@1&#1");
        assert_eq!(rule.size(), 36);
        assert_eq!(rule.offsets(), &[0, 26, 36]);
        assert_eq!(kth(&rule, 0), "a");
        assert_eq!(kth(&rule, 25), "z");
        assert_eq!(kth(&rule, 26), "0");
        assert_eq!(kth(&rule, 35), "9");
    }

    #[test]
    fn test_size_is_sum_of_patterns_and_locate_respects_offsets() {
        let rule = rule("#2&@1#1&.1");
        let sum: u64 = rule.patterns().iter().map(Pattern::size).sum();
        assert_eq!(rule.size(), sum);
        assert_eq!(rule.size(), 100 + 260 + 95);

        for rank in 0..rule.size() {
            let (i, local) = rule.locate(rank).unwrap();
            let offsets = rule.offsets();
            assert!(offsets[i] <= rank);
            assert!(rank < offsets[i] + rule.patterns()[i].size());
            assert_eq!(local, rank - offsets[i]);
        }
        assert_eq!(rule.locate(rule.size()), None);
    }

    #[test]
    fn test_kth_out_of_range() {
        let rule = rule("#1");
        let mut out = Vec::new();
        let err = rule.kth(10, &mut out, true).unwrap_err();
        assert!(matches!(err, RuleError::RankOutOfRange { rank: 10, size: 10 }));
    }

    #[test]
    fn test_empty_password_skips_to_next_rank() {
        let rule = rule("#0&@1");
        assert_eq!(rule.size(), 27);

        let mut out = Vec::new();
        assert_eq!(rule.kth(0, &mut out, true).unwrap(), 0);
        assert_eq!(kth(&rule, 0), "a");
        assert_eq!(kth(&rule, 1), "a");
    }

    #[test]
    fn test_empty_password_retry_wraps() {
        let rule = rule("@1&#0");
        assert_eq!(kth(&rule, 26), "a");
    }

    #[test]
    fn test_adjacent_empty_patterns_rejected() {
        let spec = parse_rule("#0&#0&@1").unwrap();
        let err = Rule::build(&spec, Arc::new(Lexicon::empty())).unwrap_err();
        assert!(matches!(err, RuleError::AdjacentEmptyPatterns { first: 0, second: 1 }));

        let spec = parse_rule("#0&@1&#0").unwrap();
        let err = Rule::build(&spec, Arc::new(Lexicon::empty())).unwrap_err();
        assert!(matches!(err, RuleError::AdjacentEmptyPatterns { first: 2, second: 0 }));
    }

    #[test]
    fn test_separated_empty_patterns_render_every_rank() {
        let rule = rule("#0&@1&#0&#1");
        let mut out = Vec::new();
        for rank in 0..rule.size() {
            assert!(rule.kth(rank, &mut out, false).unwrap() > 0, "rank {rank}");
        }
        assert_eq!(kth(&rule, 27), "0");
    }

    #[test]
    fn test_only_empty_rule_rejected() {
        let spec = parse_rule("#0&@0").unwrap();
        let err = Rule::build(&spec, Arc::new(Lexicon::empty())).unwrap_err();
        assert!(matches!(err, RuleError::OnlyEmptyPasswords));
    }

    #[test]
    fn test_word_rule_requires_lexicon() {
        let spec = parse_rule("$#1").unwrap();
        let err = Rule::build(&spec, Arc::new(Lexicon::empty())).unwrap_err();
        assert!(matches!(err, RuleError::EmptyLexicon));
    }

    #[test]
    fn test_lexicon_shared_across_patterns() {
        let rule = rule_with("$&$#1", Lexicon::from_words(["hi", "there"]));
        assert_eq!(rule.size(), 2 + 20);
        assert_eq!(rule.max_len(), 6);
        assert_eq!(kth(&rule, 1), "there");
        assert_eq!(kth(&rule, 2), "hi0");
        assert_eq!(kth(&rule, 21), "there9");
    }

    #[test]
    fn test_rule_overflow_rejected() {
        let big = Pattern::new(vec![Term::chars(CharClass::Digit, 19).unwrap()]).unwrap();
        let err = Rule::new(vec![big.clone(), big]).unwrap_err();
        assert!(matches!(err, RuleError::RuleOverflow));
    }

    #[test]
    fn test_cursor_walks_every_rank() {
        let rule = rule("@1&#1");
        let mut cursor = rule.cursor();
        let mut out = Vec::new();
        let mut seen = Vec::new();
        while let Some(len) = cursor.next_password(&mut out).unwrap() {
            assert_eq!(len, out.len());
            seen.push(String::from_utf8(out.clone()).unwrap());
        }
        assert_eq!(seen.len(), 36);
        assert_eq!(seen.first().map(String::as_str), Some("a"));
        assert_eq!(seen.last().map(String::as_str), Some("9"));
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.next_password(&mut out).unwrap(), None);
    }

    #[test]
    fn test_cursor_resume() {
        let rule = rule("#2");
        let mut cursor = rule.cursor();
        let mut out = Vec::new();
        for _ in 0..42 {
            cursor.next_password(&mut out).unwrap();
        }
        let saved = cursor.position();
        assert_eq!(saved, 42);

        let mut resumed = rule.cursor();
        resumed.seek(saved);
        resumed.next_password(&mut out).unwrap();
        assert_eq!(out, b"42");
        assert_eq!(resumed.remaining(), 57);

        resumed.seek(u64::MAX);
        assert_eq!(resumed.position(), 100);
    }

    #[test]
    fn test_display_round_trip() {
        let rule = rule("@2 #3 & .1");
        assert_eq!(rule.to_string(), "@2#3&.1");
    }
}
