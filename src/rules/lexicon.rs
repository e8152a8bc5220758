use crate::table::StorageError;
use std::fs;
use std::path::Path;

/// Word list shared read-only by every `$` term of a rule.
///
/// Words are raw bytes; the list is never reordered after loading, so word
/// `i` is stable for the lifetime of a build.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: Vec<Box<[u8]>>,
    longest: usize,
}

impl Lexicon {
    /// A lexicon with no words, for rules without `$` terms
    pub fn empty() -> Self {
        Self::default()
    }

    /// Split a newline-separated word list.
    ///
    /// A trailing `\r` is stripped from each line and empty lines are skipped,
    /// so a word term never renders an empty slice.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut words = Vec::new();
        let mut longest = 0;
        let mut start = 0;

        let ends = memchr::memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
        for end in ends {
            let mut line = &bytes[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if !line.is_empty() {
                longest = longest.max(line.len());
                words.push(Box::from(line));
            }
            start = end + 1;
        }

        Self { words, longest }
    }

    pub fn from_words<I, W>(words: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: AsRef<[u8]>,
    {
        let words: Vec<Box<[u8]>> = words
            .into_iter()
            .map(|w| Box::from(w.as_ref()))
            .filter(|w: &Box<[u8]>| !w.is_empty())
            .collect();
        let longest = words.iter().map(|w| w.len()).max().unwrap_or(0);
        Self { words, longest }
    }

    /// Load a word list file
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let bytes = fs::read(path).map_err(|source| StorageError::io("read lexicon", path, source))?;
        Ok(Self::from_bytes(&bytes))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Length in bytes of the longest word
    pub fn longest(&self) -> usize {
        self.longest
    }

    pub fn word(&self, index: usize) -> &[u8] {
        &self.words[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_skips_blank_lines() {
        let lex = Lexicon::from_bytes(b"alpha\r\n\nbeta\ngamma-delta\n\n");
        assert_eq!(lex.len(), 3);
        assert_eq!(lex.word(0), b"alpha");
        assert_eq!(lex.word(1), b"beta");
        assert_eq!(lex.word(2), b"gamma-delta");
        assert_eq!(lex.longest(), 11);
    }

    #[test]
    fn test_from_bytes_without_trailing_newline() {
        let lex = Lexicon::from_bytes(b"one\ntwo");
        assert_eq!(lex.len(), 2);
        assert_eq!(lex.word(1), b"two");
    }

    #[test]
    fn test_empty_input() {
        assert!(Lexicon::from_bytes(b"").is_empty());
        assert!(Lexicon::from_bytes(b"\n\r\n").is_empty());
        assert_eq!(Lexicon::empty().longest(), 0);
    }

    #[test]
    fn test_from_words() {
        let lex = Lexicon::from_words(["sun", "", "moonlight"]);
        assert_eq!(lex.len(), 2);
        assert_eq!(lex.longest(), 9);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Lexicon::load(Path::new("/nonexistent/pwtable/words.txt")).unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
