//! robots.txt policy cache
//!
//! Each host's robots.txt is fetched at most once per crawl. The parsed
//! policy (or an `Unavailable` marker when the fetch failed) is persisted in
//! the robots store, so a restarted crawl does not fetch it again either.
//! Concurrent lookups for the same host share a single fetch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use url::Url;

use crate::error::{FetchError, FilterError};
use crate::store::RobotsStore;

/// Default user agent for robots.txt requests
pub const DEFAULT_USER_AGENT: &str = "crawlgate/0.1 (+https://www.ics.uci.edu)";

// ============================================================================
// Policy
// ============================================================================

/// Allow/Disallow rules of the `User-agent: *` group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotsRules {
    disallow_patterns: Vec<String>,
    allow_patterns: Vec<String>,
}

impl RobotsRules {
    /// Parse robots.txt content, keeping only the wildcard group
    pub fn parse(content: &str) -> Self {
        let mut rules = Self::default();
        let mut in_wildcard_group = false;
        let mut group_has_rules = false;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before.trim(),
                None => line.trim(),
            };
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group
                    if group_has_rules {
                        in_wildcard_group = false;
                        group_has_rules = false;
                    }
                    if value == "*" {
                        in_wildcard_group = true;
                    }
                }
                "disallow" => {
                    group_has_rules = true;
                    if in_wildcard_group && !value.is_empty() {
                        rules.disallow_patterns.push(value.to_string());
                    }
                }
                "allow" => {
                    group_has_rules = true;
                    if in_wildcard_group && !value.is_empty() {
                        rules.allow_patterns.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        rules
    }

    /// Rules that allow everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Rules that disallow everything
    pub fn disallow_all() -> Self {
        Self {
            disallow_patterns: vec!["/".to_string()],
            allow_patterns: Vec::new(),
        }
    }

    /// Check if a path (optionally with `?query`) is allowed
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest_allow_match = self
            .allow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        let longest_disallow_match = self
            .disallow_patterns
            .iter()
            .filter(|p| Self::path_matches(path, p))
            .map(|p| p.len())
            .max()
            .unwrap_or(0);

        // Longer match wins; if equal, allow wins
        longest_allow_match >= longest_disallow_match
    }

    /// Check if a path matches a robots.txt pattern
    fn path_matches(path: &str, pattern: &str) -> bool {
        if pattern.is_empty() {
            return false;
        }

        let (pattern, must_end_match) = match pattern.strip_suffix('$') {
            Some(stripped) => (stripped, true),
            None => (pattern, false),
        };

        if pattern.contains('*') {
            let parts: Vec<&str> = pattern.split('*').collect();
            let last_index = parts.len() - 1;
            let mut pos = 0;
            for (i, part) in parts.iter().enumerate() {
                if part.is_empty() {
                    continue;
                }
                if i == 0 {
                    if !path.starts_with(part) {
                        return false;
                    }
                    pos = part.len();
                    continue;
                }
                if must_end_match && i == last_index {
                    // Anchored tail must sit at the end of the path
                    return path.len() >= pos + part.len() && path.ends_with(part);
                }
                match path[pos..].find(part) {
                    Some(found_pos) => pos += found_pos + part.len(),
                    None => return false,
                }
            }

            if must_end_match {
                return pos == path.len() || pattern.ends_with('*');
            }
            return true;
        }

        if must_end_match {
            return path == pattern;
        }

        path.starts_with(pattern)
    }
}

/// Cached robots.txt outcome for a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotsPolicy {
    /// Parsed rules
    Rules(RobotsRules),
    /// robots.txt could not be retrieved; nothing on the host is fetched
    Unavailable,
}

impl RobotsPolicy {
    /// Check if the policy permits fetching `path`
    pub fn is_allowed(&self, path: &str) -> bool {
        match self {
            RobotsPolicy::Rules(rules) => rules.is_allowed(path),
            RobotsPolicy::Unavailable => false,
        }
    }
}

/// Persisted per-host robots entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRobotsEntry {
    pub hostname: String,
    pub policy: RobotsPolicy,
    pub fetched_at: DateTime<Utc>,
}

impl HostRobotsEntry {
    pub fn new(hostname: impl Into<String>, policy: RobotsPolicy) -> Self {
        Self {
            hostname: hostname.into(),
            policy,
            fetched_at: Utc::now(),
        }
    }
}

// ============================================================================
// Fetching
// ============================================================================

/// Raw robots.txt response
#[derive(Debug, Clone)]
pub struct RobotsResponse {
    pub status: u16,
    pub body: String,
}

impl RobotsResponse {
    /// Interpret the response as a policy
    pub fn into_policy(self) -> RobotsPolicy {
        match self.status {
            200..=299 => RobotsPolicy::Rules(RobotsRules::parse(&self.body)),
            401 | 403 => RobotsPolicy::Rules(RobotsRules::disallow_all()),
            400..=499 => RobotsPolicy::Rules(RobotsRules::allow_all()),
            _ => RobotsPolicy::Unavailable,
        }
    }
}

/// Retrieves robots.txt files; the HTTP layer lives outside the core
#[async_trait]
pub trait RobotsFetcher: Send + Sync {
    async fn fetch_robots(&self, robots_url: &Url) -> Result<RobotsResponse, FetchError>;
}

/// reqwest-backed robots.txt fetcher
pub struct HttpRobotsFetcher {
    http_client: reqwest::Client,
}

impl HttpRobotsFetcher {
    pub fn new(config: &RobotsConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl RobotsFetcher for HttpRobotsFetcher {
    async fn fetch_robots(&self, robots_url: &Url) -> Result<RobotsResponse, FetchError> {
        let response = self.http_client.get(robots_url.as_str()).send().await?;
        let status = response.status().as_u16();
        let body = if response.status().is_success() {
            response.text().await?
        } else {
            String::new()
        };

        Ok(RobotsResponse { status, body })
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Configuration for robots.txt handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    /// User agent sent with robots.txt requests
    pub user_agent: String,
    /// Upper bound on a robots.txt fetch (seconds)
    pub request_timeout_secs: u64,
}

impl RobotsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Per-host robots.txt cache with single-flight population
pub struct RobotsCache {
    /// One cell per host; the first caller initializes it
    hosts: DashMap<String, Arc<OnceCell<RobotsPolicy>>>,
    store: RobotsStore,
    fetcher: Arc<dyn RobotsFetcher>,
    timeout: Duration,
}

impl RobotsCache {
    pub fn new(store: RobotsStore, fetcher: Arc<dyn RobotsFetcher>, config: &RobotsConfig) -> Self {
        Self {
            hosts: DashMap::new(),
            store,
            fetcher,
            timeout: config.request_timeout(),
        }
    }

    /// Check whether robots.txt permits fetching `url`
    pub async fn is_allowed(&self, url: &Url) -> Result<bool, FilterError> {
        let Some(hostname) = url.host_str() else {
            return Ok(false);
        };

        let cell = self
            .hosts
            .entry(hostname.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let policy = cell
            .get_or_try_init(|| self.load_policy(hostname, url))
            .await?;

        let mut target = url.path().to_string();
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }

        let allowed = policy.is_allowed(&target);
        if !allowed {
            debug!("robots.txt disallows {}", url);
        }
        Ok(allowed)
    }

    /// Number of hosts resolved in this process
    pub fn cached_hosts(&self) -> usize {
        self.hosts.iter().filter(|e| e.value().initialized()).count()
    }

    async fn load_policy(&self, hostname: &str, url: &Url) -> Result<RobotsPolicy, FilterError> {
        if let Some(entry) = self.store.get(hostname)? {
            return Ok(entry.policy);
        }

        let policy = self.fetch_policy(hostname, url).await;
        self.store
            .put(hostname, &HostRobotsEntry::new(hostname, policy.clone()))?;
        Ok(policy)
    }

    /// Fetch and interpret robots.txt. Failures become `Unavailable`.
    async fn fetch_policy(&self, hostname: &str, url: &Url) -> RobotsPolicy {
        let robots_url = match Url::parse(&format!("{}://{}/robots.txt", url.scheme(), hostname)) {
            Ok(u) => u,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", hostname, e);
                return RobotsPolicy::Unavailable;
            }
        };

        let result = match tokio::time::timeout(self.timeout, self.fetcher.fetch_robots(&robots_url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        match result {
            Ok(response) => {
                debug!("Fetched {} (status {})", robots_url, response.status);
                let policy = response.into_policy();
                if policy == RobotsPolicy::Unavailable {
                    warn!("robots.txt for {} unavailable, denying host", hostname);
                }
                policy
            }
            Err(e) => {
                warn!("Error fetching robots.txt for {}: {}, denying host", hostname, e);
                RobotsPolicy::Unavailable
            }
        }
    }
}
