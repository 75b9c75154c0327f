//! Crawl trap detection
//!
//! Flags URLs that look like the output of an unbounded generator:
//! - Repeated path segments (e.g., /a/b/a/b)
//! - Excessive path depth or URL length
//! - Query drift: the same path requested over and over with near-identical
//!   query strings (session ids, sort keys, incrementing offsets)
//!
//! Query drift is tracked per host against the single most recent URL seen
//! for that host. A host that accumulates `ban_threshold` similar repeats is
//! rejected for the rest of the crawl.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use crate::error::FilterError;
use crate::store::TrapStore;

/// Configuration for crawl trap detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapDetectorConfig {
    /// Maximum URL path depth (number of segments)
    pub max_path_depth: usize,
    /// Maximum URL length in characters
    pub max_url_length: usize,
    /// Maximum number of times one segment value may appear in a path
    pub max_segment_occurrences: usize,
    /// Similarity at or above which two query fingerprints count as a repeat
    pub query_similarity_threshold: f64,
    /// Repeat count at which a host is banned
    pub ban_threshold: u32,
}

impl Default for TrapDetectorConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 15,
            max_url_length: 2048,
            max_segment_occurrences: 1,
            query_similarity_threshold: 0.9,
            ban_threshold: 100,
        }
    }
}

/// Per-host query-drift counter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostTrapStats {
    pub hostname: String,
    pub repeat_count: u32,
    pub last_url: Option<String>,
}

impl HostTrapStats {
    fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            ..Default::default()
        }
    }
}

/// Detect structural traps (length, depth, repeated segments)
pub fn is_structural_trap(url: &Url, config: &TrapDetectorConfig) -> bool {
    if url.as_str().len() > config.max_url_length {
        return true;
    }

    let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();

    if segments.len() > config.max_path_depth {
        return true;
    }

    has_repeated_segment(&segments, config.max_segment_occurrences)
}

fn has_repeated_segment(segments: &[&str], max_occurrences: usize) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::with_capacity(segments.len());
    for segment in segments {
        let count = counts.entry(segment).or_insert(0);
        *count += 1;
        if *count > max_occurrences {
            return true;
        }
    }
    false
}

/// Split a path into the path proper and its `;params` suffix
fn split_params(path: &str) -> (&str, &str) {
    let last_slash = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[last_slash..].find(';') {
        Some(i) => (&path[..last_slash + i], &path[last_slash + i + 1..]),
        None => (path, ""),
    }
}

/// Params and query of a URL, the part that drifts in session/sort traps
fn query_fingerprint(url: &Url) -> (String, String) {
    let (path, params) = split_params(url.path());
    let fingerprint = format!("{}{}", params, url.query().unwrap_or(""));
    (path.to_string(), fingerprint)
}

/// Similarity ratio of two strings: `2 * LCS / (|a| + |b|)`
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    // Two-row LCS table
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];

    (2 * lcs) as f64 / total as f64
}

/// Outcome of comparing a URL against its host's drift baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriftVerdict {
    Clean,
    Repeat,
    Banned,
}

/// Trap detector with per-host drift statistics
pub struct TrapDetector {
    config: TrapDetectorConfig,
    hosts: DashMap<String, HostTrapStats>,
    store: TrapStore,
}

impl TrapDetector {
    pub fn new(store: TrapStore, config: TrapDetectorConfig) -> Self {
        Self {
            config,
            hosts: DashMap::new(),
            store,
        }
    }

    /// Check a URL and record it as the host's newest observation
    pub fn is_trap(&self, url: &Url) -> Result<bool, FilterError> {
        if is_structural_trap(url, &self.config) {
            debug!("Structural trap: {}", url);
            return Ok(true);
        }

        let Some(hostname) = url.host_str() else {
            return Ok(false);
        };

        let verdict = self.observe(hostname, url)?;
        if verdict != DriftVerdict::Clean {
            debug!("Query-drift trap ({:?}): {}", verdict, url);
        }
        Ok(verdict != DriftVerdict::Clean)
    }

    /// Check a URL without advancing the host's drift baseline.
    ///
    /// Used on fetched pages, whose URL was already observed when it was
    /// admitted to the frontier.
    pub fn inspect(&self, url: &Url) -> Result<bool, FilterError> {
        if is_structural_trap(url, &self.config) {
            return Ok(true);
        }
        match url.host_str() {
            Some(hostname) => self.is_banned(hostname),
            None => Ok(false),
        }
    }

    /// Check if a host has reached the ban threshold
    pub fn is_banned(&self, hostname: &str) -> Result<bool, FilterError> {
        if let Some(stats) = self.hosts.get(hostname) {
            return Ok(stats.repeat_count >= self.config.ban_threshold);
        }
        Ok(self
            .store
            .get(hostname)?
            .is_some_and(|stats| stats.repeat_count >= self.config.ban_threshold))
    }

    /// Current statistics for a host
    pub fn host_stats(&self, hostname: &str) -> Result<Option<HostTrapStats>, FilterError> {
        if let Some(stats) = self.hosts.get(hostname) {
            return Ok(Some(stats.clone()));
        }
        Ok(self.store.get(hostname)?)
    }

    /// Read-modify-write of the host's stats, serialized by the map entry lock
    fn observe(&self, hostname: &str, url: &Url) -> Result<DriftVerdict, FilterError> {
        let mut entry = match self.hosts.entry(hostname.to_string()) {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => {
                let stats = self
                    .store
                    .get(hostname)?
                    .unwrap_or_else(|| HostTrapStats::new(hostname));
                vacant.insert(stats)
            }
        };
        let stats = entry.value_mut();

        if stats.repeat_count >= self.config.ban_threshold {
            return Ok(DriftVerdict::Banned);
        }

        let mut verdict = DriftVerdict::Clean;
        if let Some(last) = stats.last_url.as_deref() {
            if last == url.as_str() {
                verdict = DriftVerdict::Repeat;
            } else if let Ok(last_url) = Url::parse(last) {
                let (last_path, last_fingerprint) = query_fingerprint(&last_url);
                let (path, fingerprint) = query_fingerprint(url);
                if path == last_path
                    && similarity_ratio(&fingerprint, &last_fingerprint)
                        >= self.config.query_similarity_threshold
                {
                    // Counted, not flagged; the ban applies from the next URL
                    stats.repeat_count += 1;
                }
            }
        }

        stats.last_url = Some(url.as_str().to_string());
        self.store.put(hostname, stats)?;

        Ok(verdict)
    }
}
