//! crawlgate: page filtering core for a focused web crawler
//!
//! Sits between the fetcher and the frontier of a crawler restricted to a set
//! of academic domains, featuring:
//! - Ordered page gates (status, size, empty text, traps, duplicates)
//! - Exact and near-duplicate detection over the whole crawl history
//! - Polite crawling via a single-flight robots.txt cache
//! - Crawl trap detection (repeated segments, query drift with host bans)
//! - Durable crawl state in sled, surviving restarts

pub mod config;
pub mod crawl;
pub mod error;
pub mod store;
pub mod types;

pub use config::Config;
pub use crawl::Scraper;
pub use error::{FetchError, FilterError};
pub use store::CrawlStores;
pub use types::*;
