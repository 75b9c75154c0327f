//! Per-link admission decision
//!
//! Gates run in order and the first failure wins:
//! 1. Scheme is http or https
//! 2. Host is (a subdomain of) an allowed domain
//! 3. robots.txt permits the URL
//! 4. The URL is not a crawl trap
//! 5. The path does not end in a blocked file extension
//!
//! Verdicts are memoized per URL string, so asking twice about the same link
//! gives the same answer and does not count as a second trap observation.

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use tracing::debug;
use url::Url;

use super::robots::RobotsCache;
use super::trap_detection::TrapDetector;
use crate::error::{parse_url, FilterError};

static RE_BLOCKED_EXTENSION: OnceLock<Regex> = OnceLock::new();

const BLOCKED_EXTENSION_PATTERN: &str = concat!(
    r"\.(css|js|bmp|gif|jpe?g|ico|png|tiff?|mid|mp2|mp3|mp4",
    r"|wav|avi|mov|mpeg|ram|m4v|mkv|ogg|ogv|pdf",
    r"|ps|eps|tex|ppt|pptx|doc|docx|xls|xlsx|names",
    r"|data|dat|exe|bz2|tar|msi|bin|7z|psd|dmg|iso",
    r"|epub|dll|cnf|tgz|sha1|thmx|mso|arff|rtf|jar|csv",
    r"|rm|smil|wmv|swf|wma|zip|rar|gz)$",
);

/// URL validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlValidatorConfig {
    /// Registrable domains whose hosts may be crawled
    pub allowed_domains: Vec<String>,
    /// Number of URL verdicts remembered
    pub verdict_cache_size: usize,
}

impl Default for UrlValidatorConfig {
    fn default() -> Self {
        Self {
            allowed_domains: vec![
                "ics.uci.edu".to_string(),
                "cs.uci.edu".to_string(),
                "informatics.uci.edu".to_string(),
                "stat.uci.edu".to_string(),
            ],
            verdict_cache_size: 100_000,
        }
    }
}

/// Check if a path ends in a non-HTML file extension
pub fn has_blocked_extension(path: &str) -> bool {
    let re = RE_BLOCKED_EXTENSION
        .get_or_init(|| Regex::new(BLOCKED_EXTENSION_PATTERN).expect("valid extension pattern"));
    re.is_match(&path.to_lowercase())
}

/// Decides whether an extracted link should enter the frontier
pub struct UrlValidator {
    allowed_domains: Vec<String>,
    robots: Arc<RobotsCache>,
    traps: Arc<TrapDetector>,
    verdicts: Mutex<LruCache<String, bool>>,
}

impl UrlValidator {
    pub fn new(config: &UrlValidatorConfig, robots: Arc<RobotsCache>, traps: Arc<TrapDetector>) -> Self {
        let capacity = NonZeroUsize::new(config.verdict_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|d| d.trim_start_matches('.').to_lowercase())
                .collect(),
            robots,
            traps,
            verdicts: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Check if a URL may be crawled. Unparsable URLs are an error.
    ///
    /// A remembered `true` is rechecked against the trap detector's ban and
    /// structural rules, without recording another observation.
    pub async fn is_valid(&self, raw: &str) -> Result<bool, FilterError> {
        let url = parse_url(raw)?;

        let cached = self.verdicts.lock().get(raw).copied();
        match cached {
            Some(false) => return Ok(false),
            // A host ban can arrive after the verdict was cached
            Some(true) if self.traps.inspect(&url)? => {
                debug!("Rejected {}: host banned since last check", url);
                self.verdicts.lock().put(raw.to_string(), false);
                return Ok(false);
            }
            Some(true) => return Ok(true),
            None => {}
        }

        let verdict = self.evaluate(&url).await?;
        self.verdicts.lock().put(raw.to_string(), verdict);
        Ok(verdict)
    }

    /// Check if a hostname is one of the allowed domains or below one
    pub fn is_allowed_domain(&self, hostname: &str) -> bool {
        let hostname = hostname.trim_end_matches('.').to_lowercase();
        self.allowed_domains.iter().any(|domain| {
            hostname == *domain
                || hostname
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    async fn evaluate(&self, url: &Url) -> Result<bool, FilterError> {
        if !matches!(url.scheme(), "http" | "https") {
            debug!("Rejected {}: scheme {}", url, url.scheme());
            return Ok(false);
        }

        let Some(hostname) = url.host_str() else {
            debug!("Rejected {}: no host", url);
            return Ok(false);
        };
        if !self.is_allowed_domain(hostname) {
            debug!("Rejected {}: domain not allowed", url);
            return Ok(false);
        }

        if !self.robots.is_allowed(url).await? {
            debug!("Rejected {}: robots.txt", url);
            return Ok(false);
        }

        if self.traps.is_trap(url)? {
            debug!("Rejected {}: crawl trap", url);
            return Ok(false);
        }

        if has_blocked_extension(url.path()) {
            debug!("Rejected {}: blocked extension", url);
            return Ok(false);
        }

        Ok(true)
    }
}
