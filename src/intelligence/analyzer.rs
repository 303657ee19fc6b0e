/// Text statistics for a prompt body
///
/// Shown in the status line while a prompt is being edited.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

// Rough words-to-tokens ratio for English prose
const TOKENS_PER_WORD: f64 = 1.3;

fn sentence_end_regex() -> &'static Regex {
    static SENTENCE_END: OnceLock<Regex> = OnceLock::new();
    SENTENCE_END.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence pattern is valid"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub chars: usize,
    pub words: usize,
    pub sentences: usize,
    pub lines: usize,
    pub tokens: usize,
}

impl TextStats {
    /// Count characters, words, sentences, lines and approximate tokens
    ///
    /// Empty text is all zeros, not one empty line.
    pub fn compute(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }

        let words = text.split_whitespace().count();

        Self {
            chars: text.chars().count(),
            words,
            // A run like "?!" or "..." ends one sentence
            sentences: sentence_end_regex().find_iter(text).count(),
            lines: text.matches('\n').count() + 1,
            tokens: (words as f64 * TOKENS_PER_WORD) as usize,
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "Char: {} | Word: {} | Sentence: {} | Line: {} | Tokens: {}",
            self.chars, self.words, self.sentences, self.lines, self.tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(TextStats::compute(""), TextStats::default());
    }

    #[test]
    fn test_counts() {
        let stats = TextStats::compute("Hello there. How are you?!\nFine...");

        assert_eq!(stats.chars, 34);
        assert_eq!(stats.words, 6);
        assert_eq!(stats.sentences, 3);
        assert_eq!(stats.lines, 2);
        // 6 * 1.3 = 7.8, truncated
        assert_eq!(stats.tokens, 7);
    }

    #[test]
    fn test_chars_are_not_bytes() {
        let stats = TextStats::compute("café");
        assert_eq!(stats.chars, 4);
        assert_eq!(stats.sentences, 0);
    }

    #[test]
    fn test_trailing_newline_counts_a_line() {
        assert_eq!(TextStats::compute("one\n").lines, 2);
    }

    #[test]
    fn test_status_line() {
        let line = TextStats::compute("two words").status_line();
        assert_eq!(line, "Char: 9 | Word: 2 | Sentence: 0 | Line: 1 | Tokens: 2");
    }
}
