//! Review text cleaning and tokenization.

use std::collections::HashSet;

use regex::Regex;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can",
    "to", "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "it", "its",
    "and", "but", "if", "or", "because", "so", "than", "too", "very", "just", "not", "no",
    "this", "that", "these", "those", "i", "me", "my", "we", "our", "you", "your", "he",
    "she", "they", "them", "their", "what", "which", "who", "am", "app", "also", "all",
    "get", "got", "even", "when", "there", "here", "one", "please", "any", "only", "now",
];

pub struct TextCleaner {
    whitespace_regex: Regex,
    word_regex: Regex,
    stop_words: HashSet<&'static str>,
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCleaner {
    pub fn new() -> Self {
        Self {
            whitespace_regex: Regex::new(r"\s+").expect("valid whitespace pattern"),
            word_regex: Regex::new(r"[\p{L}][\p{L}']*").expect("valid word pattern"),
            stop_words: STOP_WORDS.iter().copied().collect(),
        }
    }

    /// Collapse whitespace runs to a single space and trim.
    pub fn clean(&self, text: &str) -> String {
        self.whitespace_regex.replace_all(text, " ").trim().to_string()
    }

    /// Lowercase, clean whitespace and collapse runs of the same punctuation
    /// mark ("!!!" becomes "!"). Not reversible.
    pub fn normalize(&self, text: &str) -> String {
        let cleaned = self.clean(text).to_lowercase();
        let mut normalized = String::with_capacity(cleaned.len());
        let mut previous: Option<char> = None;

        for c in cleaned.chars() {
            if previous == Some(c) && is_punctuation(c) {
                continue;
            }
            normalized.push(c);
            previous = Some(c);
        }

        normalized
    }

    /// Lowercase content words with stop words and very short tokens removed.
    pub fn keywords<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        self.word_regex
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|w| w.chars().count() >= 3 && !self.stop_words.contains(w.as_str()))
    }
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '…' | '¡' | '¿' | '፡' | '።')
}
