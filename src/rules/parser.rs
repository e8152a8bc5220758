use super::CharClass;
use std::fmt;

/// Largest repeat count a run term may carry
pub const MAX_REPEAT: u32 = 64;

/// Parsed rule text, before any lexicon is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub patterns: Vec<PatternSpec>,
}

impl RuleSpec {
    /// Whether any pattern contains a `$` term
    pub fn uses_lexicon(&self) -> bool {
        self.patterns
            .iter()
            .flat_map(|p| &p.terms)
            .any(|t| matches!(t, TermSpec::Word))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub terms: Vec<TermSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermSpec {
    /// `#N`, `@N` or `.N`
    Chars { class: CharClass, repeat: u32 },
    /// `$`
    Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedChar(char),
    EmptyPattern,
    RepeatTooLarge(u64),
}

/// Rule syntax error with the byte offset it was detected at
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rule at offset {position}: {kind}")]
pub struct ParseError {
    pub position: usize,
    pub kind: ParseErrorKind,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedChar(c) => {
                write!(f, "unexpected character {c:?} (expected one of # @ . $ &)")
            }
            ParseErrorKind::EmptyPattern => f.write_str("pattern has no terms"),
            ParseErrorKind::RepeatTooLarge(n) => {
                write!(f, "repeat count {n} exceeds the maximum of {MAX_REPEAT}")
            }
        }
    }
}

/// Parse rule text such as `@4#2&$.1`.
///
/// Patterns are separated by `&`. Inside a pattern, `#N` is N digits, `@N`
/// is N lowercase letters, `.N` is N printable ASCII characters and `$` is
/// one lexicon word. A missing count means 1; whitespace between terms is
/// ignored.
pub fn parse_rule(input: &str) -> Result<RuleSpec, ParseError> {
    let mut parser = RuleParser::new(input);
    parser.parse()
}

struct RuleParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> RuleParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> Result<RuleSpec, ParseError> {
        let mut patterns = vec![self.parse_pattern()?];

        while self.consume_char('&') {
            patterns.push(self.parse_pattern()?);
        }

        Ok(RuleSpec { patterns })
    }

    fn parse_pattern(&mut self) -> Result<PatternSpec, ParseError> {
        let mut terms = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None | Some('&') => break,
                Some(_) => terms.push(self.parse_term()?),
            }
        }

        if terms.is_empty() {
            return Err(self.error(ParseErrorKind::EmptyPattern));
        }
        Ok(PatternSpec { terms })
    }

    fn parse_term(&mut self) -> Result<TermSpec, ParseError> {
        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Err(self.error(ParseErrorKind::EmptyPattern)),
        };

        if ch == '$' {
            self.advance();
            return Ok(TermSpec::Word);
        }

        let class = CharClass::from_symbol(ch)
            .ok_or_else(|| self.error(ParseErrorKind::UnexpectedChar(ch)))?;
        self.advance();
        let repeat = self.parse_count()?;
        Ok(TermSpec::Chars { class, repeat })
    }

    fn parse_count(&mut self) -> Result<u32, ParseError> {
        let start = self.pos;
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let digits = &self.input[start..self.pos];
        if digits.is_empty() {
            return Ok(1);
        }

        // Saturate so absurd counts still report as too large
        let value = digits
            .bytes()
            .fold(0u64, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as u64));
        if value > MAX_REPEAT as u64 {
            return Err(ParseError {
                position: start,
                kind: ParseErrorKind::RepeatTooLarge(value),
            });
        }
        Ok(value as u32)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            position: self.pos,
            kind,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn consume_char(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_ascii_whitespace()) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(class: CharClass, repeat: u32) -> TermSpec {
        TermSpec::Chars { class, repeat }
    }

    #[test]
    fn test_single_pattern() {
        let spec = parse_rule("@4#2").unwrap();
        assert_eq!(spec.patterns.len(), 1);
        assert_eq!(
            spec.patterns[0].terms,
            vec![chars(CharClass::Letter, 4), chars(CharClass::Digit, 2)]
        );
        assert!(!spec.uses_lexicon());
    }

    #[test]
    fn test_union_and_word() {
        let spec = parse_rule("$#1 & .3").unwrap();
        assert_eq!(spec.patterns.len(), 2);
        assert_eq!(spec.patterns[0].terms, vec![TermSpec::Word, chars(CharClass::Digit, 1)]);
        assert_eq!(spec.patterns[1].terms, vec![chars(CharClass::Ascii, 3)]);
        assert!(spec.uses_lexicon());
    }

    #[test]
    fn test_default_and_zero_counts() {
        let spec = parse_rule("@#0.").unwrap();
        assert_eq!(
            spec.patterns[0].terms,
            vec![
                chars(CharClass::Letter, 1),
                chars(CharClass::Digit, 0),
                chars(CharClass::Ascii, 1),
            ]
        );
    }

    #[test]
    fn test_whitespace_is_ignored() {
        assert_eq!(parse_rule("  @2  #1 ").unwrap(), parse_rule("@2#1").unwrap());
    }

    #[test]
    fn test_unknown_symbol() {
        let err = parse_rule("@2x").unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar('x'));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(parse_rule("").unwrap_err().kind, ParseErrorKind::EmptyPattern);
        assert_eq!(parse_rule("   ").unwrap_err().kind, ParseErrorKind::EmptyPattern);

        let err = parse_rule("#1&&@1").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyPattern);
        assert_eq!(err.position, 3);

        let err = parse_rule("#1&").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::EmptyPattern);
    }

    #[test]
    fn test_repeat_limit() {
        assert!(parse_rule("#64").is_ok());
        let err = parse_rule("@2#65").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::RepeatTooLarge(65));
        assert_eq!(err.position, 3);

        let err = parse_rule("#99999999999999999999999").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::RepeatTooLarge(u64::MAX));
    }

    #[test]
    fn test_non_ascii_input() {
        let err = parse_rule("@1é").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedChar('é'));
    }

    #[test]
    fn test_error_display() {
        let err = parse_rule("#1?").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid rule at offset 2: unexpected character '?' (expected one of # @ . $ &)"
        );
    }
}
