//! Word tokenization and frequency counting for page text
//!
//! Tokens are lower-cased ASCII words, contractions (`can't`) and hyphenated
//! compounds (`quick-witted`). English stop-words and tokens shorter than the
//! configured minimum are dropped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::WordFrequencies;

static RE_TOKEN: OnceLock<Regex> = OnceLock::new();

/// English stop-words
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can't", "cannot", "could", "couldn't", "did", "didn't", "do", "does", "doesn't",
    "doing", "don't", "down", "during", "each", "few", "for", "from", "further", "had", "hadn't",
    "has", "hasn't", "have", "haven't", "having", "he", "he'd", "he'll", "he's", "her", "here",
    "here's", "hers", "herself", "him", "himself", "his", "how", "how's", "i", "i'd", "i'll",
    "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "let's",
    "me", "more", "most", "mustn't", "my", "myself", "no", "nor", "not", "of", "off", "on",
    "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over", "own",
    "same", "shan't", "she", "she'd", "she'll", "she's", "should", "shouldn't", "so", "some",
    "such", "than", "that", "that's", "the", "their", "theirs", "them", "themselves", "then",
    "there", "there's", "these", "they", "they'd", "they'll", "they're", "they've", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "wasn't", "we",
    "we'd", "we'll", "we're", "we've", "were", "weren't", "what", "what's", "when", "when's",
    "where", "where's", "which", "while", "who", "who's", "whom", "why", "why's", "with",
    "won't", "would", "wouldn't", "you", "you'd", "you'll", "you're", "you've", "your", "yours",
    "yourself", "yourselves",
];

/// Boilerplate words added by the refined stop-list
const REFINED_STOP_WORDS: &[&str] = &["com", "use", "will"];

/// Tokenizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Minimum token length in characters
    pub min_token_len: usize,
    /// Also drop the refined boilerplate words
    pub refined_stop_words: bool,
    /// Additional stop-words
    pub extra_stop_words: Vec<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_token_len: 3,
            refined_stop_words: true,
            extra_stop_words: Vec::new(),
        }
    }
}

/// Splits page text into tokens
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
    min_token_len: usize,
}

impl Tokenizer {
    /// Create a tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let mut stop_words: HashSet<String> = STOP_WORDS.iter().map(|w| w.to_string()).collect();
        if config.refined_stop_words {
            stop_words.extend(REFINED_STOP_WORDS.iter().map(|w| w.to_string()));
        }
        stop_words.extend(config.extra_stop_words.iter().map(|w| w.to_lowercase()));

        Self {
            stop_words,
            min_token_len: config.min_token_len,
        }
    }

    /// Create a tokenizer with an explicit stop-word set
    pub fn with_stop_words<I, S>(stop_words: I, min_token_len: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            stop_words: stop_words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            min_token_len,
        }
    }

    /// Tokenize text, preserving order of appearance
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let re = RE_TOKEN.get_or_init(|| {
            Regex::new(r"[a-z0-9]+(?:'[a-z0-9]+)?(?:-[a-z0-9]+)*").expect("valid token pattern")
        });

        let lowered = text.to_lowercase();
        re.find_iter(lowered.trim_end())
            .map(|m| m.as_str())
            .filter(|word| word.chars().count() >= self.min_token_len)
            .filter(|word| !self.stop_words.contains(*word))
            .map(str::to_string)
            .collect()
    }

    /// Check if a word is a stop-word
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

/// Tally token occurrences
pub fn compute_frequencies<S: AsRef<str>>(tokens: &[S]) -> WordFrequencies {
    let mut frequencies = WordFrequencies::with_capacity(tokens.len());
    for token in tokens {
        *frequencies.entry(token.as_ref().to_string()).or_insert(0) += 1;
    }
    frequencies
}
