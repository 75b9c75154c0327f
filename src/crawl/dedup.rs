//! Exact and near-duplicate content detection over the crawl history
//!
//! Two levels, both against every page accepted so far:
//! - Exact: SHA256 of the visible text, looked up in a hash set
//! - Near: Jaccard similarity of vocabularies (word presence, counts
//!   ignored), found through an inverted word index
//!
//! The indexes live in memory and are rebuilt from the page store on load.
//! [`DuplicateDetector::is_near_duplicate_exhaustive`] scans the store
//! directly and gives the same answers as the indexed check.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::info;

use crate::error::FilterError;
use crate::store::PageStore;
use crate::types::{ContentHash, PageRecord, WordFrequencies};

/// Deduplication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Jaccard similarity at or above which a page is a near-duplicate
    pub near_duplicate_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            near_duplicate_threshold: 0.9,
        }
    }
}

/// Result of trying to add a page to the history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Page was new and has been recorded
    Recorded,
    /// Same visible text as a recorded page
    ExactDuplicate,
    /// Vocabulary too similar to a recorded page
    NearDuplicate,
    /// A record already exists under this key
    AlreadyRecorded,
}

/// Jaccard similarity of two vocabularies; `None` when both are empty
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> Option<f64> {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return None;
    }
    Some(intersection as f64 / union as f64)
}

/// In-memory indexes over the page history
#[derive(Default)]
struct HistoryIndex {
    content_hashes: HashSet<ContentHash>,
    /// Vocabulary size per page ordinal
    vocab_sizes: Vec<usize>,
    /// word -> page ordinals containing it
    postings: HashMap<String, Vec<u32>>,
}

impl HistoryIndex {
    fn add(&mut self, record: &PageRecord) {
        self.content_hashes.insert(record.content_hash.clone());

        let ordinal = self.vocab_sizes.len() as u32;
        self.vocab_sizes.push(record.word_frequencies.len());
        for word in record.word_frequencies.keys() {
            self.postings.entry(word.clone()).or_default().push(ordinal);
        }
    }

    fn contains_hash(&self, hash: &ContentHash) -> bool {
        self.content_hashes.contains(hash)
    }

    /// Check for a page with vocabulary Jaccard >= threshold
    fn has_near_duplicate(&self, frequencies: &WordFrequencies, threshold: f64) -> bool {
        let candidate_size = frequencies.len();
        if candidate_size == 0 {
            // Empty vs empty has no union; empty vs non-empty has similarity 0
            return false;
        }

        let mut overlaps: HashMap<u32, usize> = HashMap::new();
        for word in frequencies.keys() {
            if let Some(pages) = self.postings.get(word) {
                for &page in pages {
                    *overlaps.entry(page).or_insert(0) += 1;
                }
            }
        }

        overlaps.into_iter().any(|(page, intersection)| {
            let union = candidate_size + self.vocab_sizes[page as usize] - intersection;
            intersection as f64 / union as f64 >= threshold
        })
    }

    fn len(&self) -> usize {
        self.vocab_sizes.len()
    }
}

/// Duplicate detector backed by the durable page store
pub struct DuplicateDetector {
    index: RwLock<HistoryIndex>,
    store: PageStore,
    threshold: f64,
}

impl DuplicateDetector {
    /// Load the detector, rebuilding indexes from every stored page
    pub fn load(store: PageStore, config: &DedupConfig) -> Result<Self, FilterError> {
        let mut index = HistoryIndex::default();
        for (_, record) in store.entries()? {
            index.add(&record);
        }

        if index.len() > 0 {
            info!("Loaded page history with {} records", index.len());
        }

        Ok(Self {
            index: RwLock::new(index),
            store,
            threshold: config.near_duplicate_threshold,
        })
    }

    /// Check if the exact content has been accepted before
    pub fn is_exact_duplicate(&self, content_hash: &ContentHash) -> bool {
        self.index.read().contains_hash(content_hash)
    }

    /// Check if any accepted page's vocabulary is at least `threshold` similar
    pub fn is_near_duplicate(&self, frequencies: &WordFrequencies) -> bool {
        self.index.read().has_near_duplicate(frequencies, self.threshold)
    }

    /// Near-duplicate check by full scan of the page store
    pub fn is_near_duplicate_exhaustive(
        &self,
        frequencies: &WordFrequencies,
    ) -> Result<bool, FilterError> {
        let candidate: HashSet<&str> = frequencies.keys().map(String::as_str).collect();
        for (_, record) in self.store.entries()? {
            if let Some(similarity) = jaccard(&candidate, &record.vocabulary()) {
                if similarity >= self.threshold {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Check both duplicate levels and record the page if it is new.
    ///
    /// Holds the index write lock across check and insert so two workers
    /// cannot both admit the same content.
    pub fn admit(&self, key: &str, record: &PageRecord) -> Result<Admission, FilterError> {
        let mut index = self.index.write();

        if index.contains_hash(&record.content_hash) {
            return Ok(Admission::ExactDuplicate);
        }
        if index.has_near_duplicate(&record.word_frequencies, self.threshold) {
            return Ok(Admission::NearDuplicate);
        }
        if !self.store.insert_if_absent(key, record)? {
            return Ok(Admission::AlreadyRecorded);
        }

        index.add(record);
        Ok(Admission::Recorded)
    }

    /// Number of pages in the history
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Check if the history is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryTree;
    use chrono::Utc;
    use std::sync::Arc;

    fn freqs(words: &[&str]) -> WordFrequencies {
        words.iter().map(|w| (w.to_string(), 1)).collect()
    }

    fn record(url: &str, text: &str, words: &[&str]) -> PageRecord {
        PageRecord {
            request_url: url.to_string(),
            canonical_url: url.to_string(),
            outlink_count: 0,
            word_frequencies: freqs(words),
            content_hash: ContentHash::compute(text),
            recorded_at: Utc::now(),
        }
    }

    fn words(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("w{}", i)).collect()
    }

    fn detector() -> DuplicateDetector {
        DuplicateDetector::load(Arc::new(MemoryTree::new()), &DedupConfig::default()).unwrap()
    }

    #[test]
    fn test_jaccard() {
        let a: HashSet<&str> = ["a", "b", "c"].into_iter().collect();
        let b: HashSet<&str> = ["b", "c", "d"].into_iter().collect();
        assert_eq!(jaccard(&a, &b), Some(0.5));

        let empty: HashSet<&str> = HashSet::new();
        assert_eq!(jaccard(&empty, &empty), None);
        assert_eq!(jaccard(&a, &empty), Some(0.0));
    }

    #[test]
    fn test_exact_duplicate_after_admit() {
        let detector = detector();
        let page = record("https://www.ics.uci.edu/a", "same text", &["same", "text"]);

        assert!(!detector.is_exact_duplicate(&page.content_hash));
        assert_eq!(detector.admit("k1", &page).unwrap(), Admission::Recorded);
        assert!(detector.is_exact_duplicate(&page.content_hash));

        let copy = record("https://www.ics.uci.edu/b", "same text", &["other"]);
        assert_eq!(detector.admit("k2", &copy).unwrap(), Admission::ExactDuplicate);
        assert_eq!(detector.len(), 1);
    }

    #[test]
    fn test_near_duplicate_threshold_is_inclusive() {
        let detector = detector();
        let base = words(18);
        let base_refs: Vec<&str> = base.iter().map(String::as_str).collect();
        detector
            .admit("k1", &record("https://www.ics.uci.edu/a", "a", &base_refs))
            .unwrap();

        // 18 shared of 20 total = 0.9 exactly
        let mut at_threshold = base_refs.clone();
        at_threshold.push("extra1");
        at_threshold.push("extra2");
        assert!(detector.is_near_duplicate(&freqs(&at_threshold)));

        // 18 shared of 21 total < 0.9
        let mut below = at_threshold.clone();
        below.push("extra3");
        assert!(!detector.is_near_duplicate(&freqs(&below)));
    }

    #[test]
    fn test_counts_are_ignored() {
        let detector = detector();
        detector
            .admit("k1", &record("https://www.ics.uci.edu/a", "a", &["alpha", "beta"]))
            .unwrap();

        let mut candidate = freqs(&["alpha", "beta"]);
        candidate.insert("alpha".to_string(), 50);
        assert!(detector.is_near_duplicate(&candidate));
    }

    #[test]
    fn test_empty_vocabularies_are_not_duplicates() {
        let detector = detector();
        detector
            .admit("k1", &record("https://www.ics.uci.edu/a", "a", &[]))
            .unwrap();
        assert!(!detector.is_near_duplicate(&WordFrequencies::new()));
        assert!(!detector.is_near_duplicate_exhaustive(&WordFrequencies::new()).unwrap());
    }

    #[test]
    fn test_indexed_check_matches_exhaustive_scan() {
        let detector = detector();
        let pages: Vec<Vec<&str>> = vec![
            vec!["crawler", "index", "search", "engine", "rank"],
            vec!["faculty", "research", "machine", "learning"],
            vec!["course", "schedule", "fall", "winter", "spring", "summer"],
        ];
        for (i, page) in pages.iter().enumerate() {
            detector
                .admit(&format!("k{}", i), &record(&format!("https://x/{}", i), &i.to_string(), page))
                .unwrap();
        }

        let candidates: Vec<Vec<&str>> = vec![
            vec!["crawler", "index", "search", "engine", "rank"],
            vec!["crawler", "index", "search", "engine"],
            vec!["faculty", "research", "machine", "learning", "deep"],
            vec!["course", "schedule", "fall", "winter", "spring", "summer", "break"],
            vec!["unrelated"],
            vec![],
        ];
        for candidate in candidates {
            let f = freqs(&candidate);
            assert_eq!(
                detector.is_near_duplicate(&f),
                detector.is_near_duplicate_exhaustive(&f).unwrap(),
                "mismatch for {:?}",
                candidate
            );
        }
    }

    #[test]
    fn test_same_key_is_recorded_once() {
        let detector = detector();
        let first = record("https://www.ics.uci.edu/a", "first", &["first", "version"]);
        let second = record("https://www.ics.uci.edu/a", "second", &["totally", "different"]);

        assert_eq!(detector.admit("k", &first).unwrap(), Admission::Recorded);
        assert_eq!(detector.admit("k", &second).unwrap(), Admission::AlreadyRecorded);
        assert!(!detector.is_exact_duplicate(&second.content_hash));
    }

    #[test]
    fn test_load_rebuilds_indexes() {
        let store: PageStore = Arc::new(MemoryTree::new());
        let page = record("https://www.ics.uci.edu/a", "persisted", &["persisted", "page"]);
        store.put("k1", &page).unwrap();

        let detector = DuplicateDetector::load(store, &DedupConfig::default()).unwrap();
        assert_eq!(detector.len(), 1);
        assert!(detector.is_exact_duplicate(&page.content_hash));
        assert!(detector.is_near_duplicate(&freqs(&["persisted", "page"])));
    }
}
