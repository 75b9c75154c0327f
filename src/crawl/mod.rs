//! Crawl decision core
//!
//! Decides, for every fetched page, whether it is worth keeping and which of
//! its outbound links may enter the frontier. Fetching and scheduling live
//! outside this module.
//!
//! Key components:
//! - `Tokenizer`: page text to words and word frequencies
//! - `RobotsCache`: per-host robots.txt policy, fetched once per host
//! - `TrapDetector`: structural traps and per-host query drift
//! - `DuplicateDetector`: exact (content hash) and near (vocabulary Jaccard)
//!   duplicates against the whole crawl history
//! - `PageFilterPipeline`: ordered accept/reject gates for a fetched page
//! - `UrlValidator`: per-link admission to the frontier
//! - `Scraper`: pipeline and validator composed into one call

pub mod dedup;
pub mod extractor;
pub mod pipeline;
pub mod robots;
pub mod scraper;
pub mod tokenizer;
pub mod trap_detection;
pub mod validator;

pub use dedup::{Admission, DuplicateDetector};
pub use extractor::{extract_links, visible_text};
pub use pipeline::{PageFilterPipeline, PageOutcome, PipelineStatsSnapshot, RejectReason};
pub use robots::{HttpRobotsFetcher, RobotsCache, RobotsFetcher, RobotsPolicy, RobotsResponse};
pub use scraper::Scraper;
pub use tokenizer::{compute_frequencies, Tokenizer};
pub use trap_detection::TrapDetector;
pub use validator::UrlValidator;
