//! Core types for the crawl decision core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Word → occurrence count for a page's visible text
pub type WordFrequencies = HashMap<String, u32>;

// ============================================================================
// Content Identity Types
// ============================================================================

/// Exact content hash using SHA256 (64-character hex string)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA256 hash of content
    pub fn compute(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let result = hasher.finalize();
        ContentHash(hex::encode(result))
    }

    /// Get the underlying string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

/// Key of a page record in the history store: xxh3 of the request URL
pub fn page_key(request_url: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(request_url.as_bytes()))
}

// ============================================================================
// Page History
// ============================================================================

/// One accepted page in the crawl history. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL the page was requested under
    pub request_url: String,
    /// Resolved URL after redirects
    pub canonical_url: String,
    /// Number of outbound links extracted from the page
    pub outlink_count: usize,
    /// Token counts of the visible text
    pub word_frequencies: WordFrequencies,
    /// Hash of the visible text
    pub content_hash: ContentHash,
    /// When the page was accepted
    pub recorded_at: DateTime<Utc>,
}

impl PageRecord {
    /// Vocabulary of the page (words present, counts ignored)
    pub fn vocabulary(&self) -> HashSet<&str> {
        self.word_frequencies.keys().map(String::as_str).collect()
    }

    /// Total number of tokens on the page
    pub fn word_count(&self) -> u64 {
        self.word_frequencies.values().map(|&c| c as u64).sum()
    }
}

// ============================================================================
// Fetch Layer Input
// ============================================================================

/// A page as handed over by the fetch layer
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL used for the request
    pub request_url: String,
    /// Actual URL of the response (post-redirect)
    pub response_url: String,
    /// HTTP status code
    pub status: u16,
    /// Raw response body, absent when the fetch failed
    pub body: Option<Vec<u8>>,
}

impl FetchedPage {
    /// Create a page whose response URL equals the request URL
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        Self {
            request_url: url.clone(),
            response_url: url,
            status,
            body: Some(body.into()),
        }
    }

    /// Set the post-redirect response URL
    pub fn with_response_url(mut self, response_url: impl Into<String>) -> Self {
        self.response_url = response_url.into();
        self
    }

    /// Page with no body, as produced by a failed fetch
    pub fn failed(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        Self {
            request_url: url.clone(),
            response_url: url,
            status,
            body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_compute() {
        let content = "hello world";
        let hash = ContentHash::compute(content);
        // SHA256 of "hello world"
        assert_eq!(
            hash.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_content_hash_differs_for_different_text() {
        assert_ne!(ContentHash::compute("page one"), ContentHash::compute("page two"));
    }

    #[test]
    fn test_page_key_is_stable_and_fixed_width() {
        let a = page_key("https://www.ics.uci.edu/about");
        let b = page_key("https://www.ics.uci.edu/about");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, page_key("https://www.ics.uci.edu/about/"));
    }

    #[test]
    fn test_page_record_vocabulary_ignores_counts() {
        let mut word_frequencies = WordFrequencies::new();
        word_frequencies.insert("crawler".to_string(), 4);
        word_frequencies.insert("index".to_string(), 1);

        let record = PageRecord {
            request_url: "https://www.ics.uci.edu/".to_string(),
            canonical_url: "https://www.ics.uci.edu/".to_string(),
            outlink_count: 0,
            word_frequencies,
            content_hash: ContentHash::compute("crawler index"),
            recorded_at: Utc::now(),
        };

        let vocab = record.vocabulary();
        assert_eq!(vocab.len(), 2);
        assert!(vocab.contains("crawler"));
        assert_eq!(record.word_count(), 5);
    }
}
