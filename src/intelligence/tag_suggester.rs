// Suggests tags from the words a prompt uses most
//
// Nothing clever: lowercase the body, drop short words and a few fillers,
// and take the most frequent ones.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

// How many suggestions the editor has room for
pub const MAX_SUGGESTIONS: usize = 7;

const STOP_WORDS: &[&str] = &["the", "and", "for", "with", "this", "that", "are", "was"];

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b\w{3,}\b").expect("word pattern is valid"))
}

/// Most frequent words of three or more characters, best first
///
/// Ties go to the word that appears first in the text.
pub fn suggest_tags(text: &str) -> Vec<String> {
    suggest_tags_limit(text, MAX_SUGGESTIONS)
}

pub fn suggest_tags_limit(text: &str, limit: usize) -> Vec<String> {
    let lowered = text.to_lowercase();

    // word -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, word) in word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| !STOP_WORDS.contains(word))
        .enumerate()
    {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(word, _, _)| word.to_string())
        .collect()
}
