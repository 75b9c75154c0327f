//! Page filtering pipeline
//!
//! Runs a fetched response through ordered gates. Cheap structural gates run
//! before the corpus-wide duplicate checks:
//!
//! 1. Status is accepted
//! 2. Body size is within the configured window
//! 3. Visible text is long enough
//! 4. The response URL is not a trap
//! 5. Visible text is not an exact duplicate
//! 6. Vocabulary is not a near-duplicate
//!
//! A page that passes every gate is recorded in the page history and its
//! outbound links are returned. A rejected page records nothing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::dedup::{Admission, DuplicateDetector};
use super::extractor::{extract_links, parse_html, visible_text};
use super::tokenizer::{compute_frequencies, Tokenizer};
use super::trap_detection::TrapDetector;
use crate::error::{parse_url, FilterError};
use crate::types::{page_key, ContentHash, FetchedPage, PageRecord};

/// Page filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFilterConfig {
    /// HTTP statuses whose pages are processed
    pub accepted_statuses: Vec<u16>,
    /// Smallest body accepted, in bytes
    pub min_body_bytes: usize,
    /// Largest body accepted, in bytes
    pub max_body_bytes: usize,
    /// Minimum visible text length in characters
    pub min_text_chars: usize,
}

impl Default for PageFilterConfig {
    fn default() -> Self {
        Self {
            accepted_statuses: vec![200],
            min_body_bytes: 200,
            max_body_bytes: 5 * 1024 * 1024,
            min_text_chars: 100,
        }
    }
}

/// Why a page was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Status(u16),
    BodySize(usize),
    EmptyText,
    Trap,
    ExactDuplicate,
    NearDuplicate,
    AlreadyRecorded,
}

/// Result of processing one fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page recorded under `key`; `links` are its unvalidated outlinks
    Accepted { key: String, links: Vec<String> },
    Rejected(RejectReason),
}

impl PageOutcome {
    /// Outlinks of an accepted page, empty for a rejection
    pub fn into_links(self) -> Vec<String> {
        match self {
            PageOutcome::Accepted { links, .. } => links,
            PageOutcome::Rejected(_) => Vec::new(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, PageOutcome::Accepted { .. })
    }
}

/// Pipeline counters
#[derive(Debug, Default)]
pub struct PipelineStats {
    pages_processed: AtomicU64,
    pages_accepted: AtomicU64,
    rejected_status: AtomicU64,
    rejected_size: AtomicU64,
    rejected_empty: AtomicU64,
    rejected_trap: AtomicU64,
    rejected_exact_duplicate: AtomicU64,
    rejected_near_duplicate: AtomicU64,
    rejected_already_recorded: AtomicU64,
    links_emitted: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    /// Total pages processed
    pub pages_processed: u64,
    /// Pages recorded in the history
    pub pages_accepted: u64,
    pub rejected_status: u64,
    pub rejected_size: u64,
    pub rejected_empty: u64,
    pub rejected_trap: u64,
    pub rejected_exact_duplicate: u64,
    pub rejected_near_duplicate: u64,
    /// Request URL already has a record, whatever its content
    pub rejected_already_recorded: u64,
    /// Validated links handed to the frontier
    pub links_emitted: u64,
}

impl PipelineStats {
    fn record_rejection(&self, reason: &RejectReason) {
        let counter = match reason {
            RejectReason::Status(_) => &self.rejected_status,
            RejectReason::BodySize(_) => &self.rejected_size,
            RejectReason::EmptyText => &self.rejected_empty,
            RejectReason::Trap => &self.rejected_trap,
            RejectReason::ExactDuplicate => &self.rejected_exact_duplicate,
            RejectReason::NearDuplicate => &self.rejected_near_duplicate,
            RejectReason::AlreadyRecorded => &self.rejected_already_recorded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_links_emitted(&self, count: usize) {
        self.links_emitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            pages_processed: self.pages_processed.load(Ordering::Relaxed),
            pages_accepted: self.pages_accepted.load(Ordering::Relaxed),
            rejected_status: self.rejected_status.load(Ordering::Relaxed),
            rejected_size: self.rejected_size.load(Ordering::Relaxed),
            rejected_empty: self.rejected_empty.load(Ordering::Relaxed),
            rejected_trap: self.rejected_trap.load(Ordering::Relaxed),
            rejected_exact_duplicate: self.rejected_exact_duplicate.load(Ordering::Relaxed),
            rejected_near_duplicate: self.rejected_near_duplicate.load(Ordering::Relaxed),
            rejected_already_recorded: self.rejected_already_recorded.load(Ordering::Relaxed),
            links_emitted: self.links_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Accept/reject state machine for fetched pages
pub struct PageFilterPipeline {
    config: PageFilterConfig,
    tokenizer: Tokenizer,
    traps: Arc<TrapDetector>,
    dedup: Arc<DuplicateDetector>,
    stats: PipelineStats,
}

impl PageFilterPipeline {
    pub fn new(
        config: PageFilterConfig,
        tokenizer: Tokenizer,
        traps: Arc<TrapDetector>,
        dedup: Arc<DuplicateDetector>,
    ) -> Self {
        Self {
            config,
            tokenizer,
            traps,
            dedup,
            stats: PipelineStats::default(),
        }
    }

    /// Process a fetched page.
    ///
    /// Errors only on malformed input (missing fields, unparsable URLs) or a
    /// store failure. Every policy decision is a [`PageOutcome`].
    pub fn process(&self, page: &FetchedPage) -> Result<PageOutcome, FilterError> {
        self.stats.pages_processed.fetch_add(1, Ordering::Relaxed);

        let outcome = self.run_gates(page)?;
        match &outcome {
            PageOutcome::Accepted { links, .. } => {
                self.stats.pages_accepted.fetch_add(1, Ordering::Relaxed);
                debug!("Accepted {} ({} links)", page.request_url, links.len());
            }
            PageOutcome::Rejected(reason) => {
                self.stats.record_rejection(reason);
                debug!("Rejected {}: {:?}", page.request_url, reason);
            }
        }
        Ok(outcome)
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn counters(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn dedup(&self) -> &DuplicateDetector {
        &self.dedup
    }

    fn run_gates(&self, page: &FetchedPage) -> Result<PageOutcome, FilterError> {
        if page.request_url.is_empty() {
            return Err(FilterError::MissingField("request_url"));
        }
        if page.response_url.is_empty() {
            return Err(FilterError::MissingField("response_url"));
        }
        let response_url = parse_url(&page.response_url)?;

        if !self.config.accepted_statuses.contains(&page.status) {
            return Ok(PageOutcome::Rejected(RejectReason::Status(page.status)));
        }

        let body = page.body.as_deref().ok_or(FilterError::MissingField("body"))?;
        if body.len() < self.config.min_body_bytes || body.len() > self.config.max_body_bytes {
            return Ok(PageOutcome::Rejected(RejectReason::BodySize(body.len())));
        }

        let document = parse_html(body);
        let text = visible_text(&document);
        if text.is_empty() || text.chars().count() < self.config.min_text_chars {
            return Ok(PageOutcome::Rejected(RejectReason::EmptyText));
        }

        if self.traps.inspect(&response_url)? {
            return Ok(PageOutcome::Rejected(RejectReason::Trap));
        }

        let content_hash = ContentHash::compute(&text);
        if self.dedup.is_exact_duplicate(&content_hash) {
            return Ok(PageOutcome::Rejected(RejectReason::ExactDuplicate));
        }

        let tokens = self.tokenizer.tokenize(&text);
        let word_frequencies = compute_frequencies(&tokens);
        if self.dedup.is_near_duplicate(&word_frequencies) {
            return Ok(PageOutcome::Rejected(RejectReason::NearDuplicate));
        }

        let links = extract_links(&document, &response_url);
        let key = page_key(&page.request_url);
        let record = PageRecord {
            request_url: page.request_url.clone(),
            canonical_url: response_url.to_string(),
            outlink_count: links.len(),
            word_frequencies,
            content_hash,
            recorded_at: Utc::now(),
        };

        // Rechecked under the history lock; a concurrent worker may have won
        let outcome = match self.dedup.admit(&key, &record)? {
            Admission::Recorded => PageOutcome::Accepted { key, links },
            Admission::ExactDuplicate => PageOutcome::Rejected(RejectReason::ExactDuplicate),
            Admission::NearDuplicate => PageOutcome::Rejected(RejectReason::NearDuplicate),
            Admission::AlreadyRecorded => PageOutcome::Rejected(RejectReason::AlreadyRecorded),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::dedup::DedupConfig;
    use crate::crawl::trap_detection::TrapDetectorConfig;
    use crate::store::{MemoryTree, PageStore};

    fn pipeline_with_store(store: PageStore) -> PageFilterPipeline {
        let traps = Arc::new(TrapDetector::new(
            Arc::new(MemoryTree::new()),
            TrapDetectorConfig::default(),
        ));
        let dedup = Arc::new(DuplicateDetector::load(store, &DedupConfig::default()).unwrap());
        PageFilterPipeline::new(PageFilterConfig::default(), Tokenizer::default(), traps, dedup)
    }

    fn pipeline() -> PageFilterPipeline {
        pipeline_with_store(Arc::new(MemoryTree::new()))
    }

    fn html(paragraph: &str, links: &[&str]) -> Vec<u8> {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">link</a>"#, href))
            .collect();
        format!(
            "<html><head><title>Page</title><script>var tracking = 1;</script></head>\
             <body><p>{}</p>{}</body></html>",
            paragraph, anchors
        )
        .into_bytes()
    }

    const RESEARCH: &str = "Our research group studies distributed systems, information \
        retrieval, compilers and programming languages, with projects spanning storage \
        engines, search infrastructure and verified software toolchains.";

    const COURSES: &str = "Undergraduate courses cover algorithms, data structures, \
        operating systems, databases and networks. Graduate seminars discuss recent \
        conference papers every quarter with invited speakers from industry.";

    #[test]
    fn test_accepts_new_page_and_returns_links() {
        let pipeline = pipeline();
        let page = FetchedPage::new(
            "https://www.ics.uci.edu/research",
            200,
            html(RESEARCH, &["/people", "projects.html#top", "/people"]),
        );

        let outcome = pipeline.process(&page).unwrap();
        let PageOutcome::Accepted { key, links } = outcome else {
            panic!("expected accept, got {:?}", outcome);
        };
        assert_eq!(key, page_key("https://www.ics.uci.edu/research"));
        assert_eq!(
            links,
            vec![
                "https://www.ics.uci.edu/people",
                "https://www.ics.uci.edu/projects.html",
            ]
        );
        assert_eq!(pipeline.dedup().len(), 1);
    }

    #[test]
    fn test_404_is_rejected_without_record() {
        let pipeline = pipeline();
        let page = FetchedPage::new("https://www.ics.uci.edu/missing", 404, html(RESEARCH, &["/a"]));

        let outcome = pipeline.process(&page).unwrap();
        assert_eq!(outcome, PageOutcome::Rejected(RejectReason::Status(404)));
        assert!(outcome.into_links().is_empty());
        assert!(pipeline.dedup().is_empty());
    }

    #[test]
    fn test_failed_fetch_with_rejected_status_is_not_an_error() {
        let pipeline = pipeline();
        let page = FetchedPage::failed("https://www.ics.uci.edu/down", 503);
        assert_eq!(
            pipeline.process(&page).unwrap(),
            PageOutcome::Rejected(RejectReason::Status(503))
        );
    }

    #[test]
    fn test_missing_body_on_accepted_status_is_an_error() {
        let pipeline = pipeline();
        let page = FetchedPage::failed("https://www.ics.uci.edu/odd", 200);
        assert!(matches!(
            pipeline.process(&page),
            Err(FilterError::MissingField("body"))
        ));
    }

    #[test]
    fn test_unparsable_response_url_is_an_error() {
        let pipeline = pipeline();
        let page = FetchedPage::new("https://www.ics.uci.edu/x", 200, html(RESEARCH, &[]))
            .with_response_url("::not a url::");
        assert!(matches!(
            pipeline.process(&page),
            Err(FilterError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_status_301_accepted_when_configured() {
        let traps = Arc::new(TrapDetector::new(
            Arc::new(MemoryTree::new()),
            TrapDetectorConfig::default(),
        ));
        let dedup = Arc::new(
            DuplicateDetector::load(Arc::new(MemoryTree::new()), &DedupConfig::default()).unwrap(),
        );
        let config = PageFilterConfig {
            accepted_statuses: vec![200, 301],
            ..Default::default()
        };
        let pipeline = PageFilterPipeline::new(config, Tokenizer::default(), traps, dedup);

        let page = FetchedPage::new("https://www.ics.uci.edu/moved", 301, html(RESEARCH, &[]));
        assert!(pipeline.process(&page).unwrap().is_accepted());
    }

    #[test]
    fn test_size_gate() {
        let pipeline = pipeline();
        let tiny = FetchedPage::new("https://www.ics.uci.edu/tiny", 200, "<p>hi</p>");
        assert!(matches!(
            pipeline.process(&tiny).unwrap(),
            PageOutcome::Rejected(RejectReason::BodySize(_))
        ));

        let huge = FetchedPage::new(
            "https://www.ics.uci.edu/huge",
            200,
            vec![b'a'; 5 * 1024 * 1024 + 1],
        );
        assert!(matches!(
            pipeline.process(&huge).unwrap(),
            PageOutcome::Rejected(RejectReason::BodySize(_))
        ));
    }

    #[test]
    fn test_script_only_page_is_empty() {
        let pipeline = pipeline();
        let body = format!(
            "<html><head><script>{}</script></head><body></body></html>",
            "x".repeat(500)
        );
        let page = FetchedPage::new("https://www.ics.uci.edu/app", 200, body);
        assert_eq!(
            pipeline.process(&page).unwrap(),
            PageOutcome::Rejected(RejectReason::EmptyText)
        );
    }

    #[test]
    fn test_trap_url_is_rejected() {
        let pipeline = pipeline();
        let page = FetchedPage::new("https://www.ics.uci.edu/a/b/a/b", 200, html(RESEARCH, &[]));
        assert_eq!(
            pipeline.process(&page).unwrap(),
            PageOutcome::Rejected(RejectReason::Trap)
        );
        assert!(pipeline.dedup().is_empty());
    }

    #[test]
    fn test_exact_duplicate_under_another_url() {
        let pipeline = pipeline();
        let first = FetchedPage::new("https://www.ics.uci.edu/a", 200, html(RESEARCH, &["/x"]));
        let second = FetchedPage::new("https://www.cs.uci.edu/b", 200, html(RESEARCH, &["/y"]));

        assert!(pipeline.process(&first).unwrap().is_accepted());
        assert_eq!(
            pipeline.process(&second).unwrap(),
            PageOutcome::Rejected(RejectReason::ExactDuplicate)
        );
    }

    #[test]
    fn test_near_duplicate_is_rejected() {
        let pipeline = pipeline();
        let first = FetchedPage::new("https://www.ics.uci.edu/a", 200, html(RESEARCH, &[]));
        // Same vocabulary, different text
        let reordered = format!("{} {}", RESEARCH, "Research systems storage.");
        let second = FetchedPage::new("https://www.ics.uci.edu/b", 200, html(&reordered, &[]));

        assert!(pipeline.process(&first).unwrap().is_accepted());
        assert_eq!(
            pipeline.process(&second).unwrap(),
            PageOutcome::Rejected(RejectReason::NearDuplicate)
        );
    }

    #[test]
    fn test_distinct_pages_are_both_accepted() {
        let pipeline = pipeline();
        let first = FetchedPage::new("https://www.ics.uci.edu/research", 200, html(RESEARCH, &[]));
        let second = FetchedPage::new("https://www.ics.uci.edu/courses", 200, html(COURSES, &[]));

        assert!(pipeline.process(&first).unwrap().is_accepted());
        assert!(pipeline.process(&second).unwrap().is_accepted());

        let stats = pipeline.stats();
        assert_eq!(stats.pages_processed, 2);
        assert_eq!(stats.pages_accepted, 2);
    }

    #[test]
    fn test_links_resolve_against_response_url() {
        let pipeline = pipeline();
        let page = FetchedPage::new("http://ics.uci.edu/old", 200, html(RESEARCH, &["next"]))
            .with_response_url("https://www.ics.uci.edu/new/index.html");

        let PageOutcome::Accepted { key, links } = pipeline.process(&page).unwrap() else {
            panic!("expected accept");
        };
        assert_eq!(key, page_key("http://ics.uci.edu/old"));
        assert_eq!(links, vec!["https://www.ics.uci.edu/new/next"]);
    }

    #[test]
    fn test_stats_count_rejections() {
        let pipeline = pipeline();
        pipeline
            .process(&FetchedPage::new("https://www.ics.uci.edu/a", 404, html(RESEARCH, &[])))
            .unwrap();
        pipeline
            .process(&FetchedPage::new("https://www.ics.uci.edu/b", 200, html(RESEARCH, &[])))
            .unwrap();
        pipeline
            .process(&FetchedPage::new("https://www.ics.uci.edu/c", 200, html(RESEARCH, &[])))
            .unwrap();

        let stats = pipeline.stats();
        assert_eq!(stats.pages_processed, 3);
        assert_eq!(stats.pages_accepted, 1);
        assert_eq!(stats.rejected_status, 1);
        assert_eq!(stats.rejected_exact_duplicate, 1);
    }

    #[test]
    fn test_same_request_url_is_counted_separately() {
        let pipeline = pipeline();
        let url = "https://www.ics.uci.edu/changing";
        assert!(pipeline
            .process(&FetchedPage::new(url, 200, html(RESEARCH, &[])))
            .unwrap()
            .is_accepted());
        assert_eq!(
            pipeline
                .process(&FetchedPage::new(url, 200, html(COURSES, &[])))
                .unwrap(),
            PageOutcome::Rejected(RejectReason::AlreadyRecorded)
        );

        let stats = pipeline.stats();
        assert_eq!(stats.rejected_already_recorded, 1);
        assert_eq!(stats.rejected_exact_duplicate, 0);
    }
}
