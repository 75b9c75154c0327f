//! Configuration for crawlgate

mod logging;
mod storage;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use storage::StorageConfig;

pub use crate::crawl::dedup::DedupConfig;
pub use crate::crawl::pipeline::PageFilterConfig;
pub use crate::crawl::robots::RobotsConfig;
pub use crate::crawl::tokenizer::TokenizerConfig;
pub use crate::crawl::trap_detection::TrapDetectorConfig;
pub use crate::crawl::validator::UrlValidatorConfig;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for a crawl
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Durable store location
    #[serde(default)]
    pub storage: StorageConfig,
    /// Tokenizer configuration
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    /// robots.txt retrieval
    #[serde(default)]
    pub robots: RobotsConfig,
    /// Crawl trap detection
    #[serde(default)]
    pub trap: TrapDetectorConfig,
    /// Duplicate detection
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Page filter gates
    #[serde(default)]
    pub filter: PageFilterConfig,
    /// Link validation
    #[serde(default)]
    pub validator: UrlValidatorConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration fields.
    ///
    /// Collects all validation errors and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Storage validation
        if !self.storage.in_memory && self.storage.data_dir.as_os_str().is_empty() {
            errors.push("data_dir must not be empty".to_string());
        }

        // Tokenizer validation
        if self.tokenizer.min_token_len == 0 {
            errors.push("min_token_len must be positive".to_string());
        }

        // Robots validation
        if self.robots.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        if self.robots.user_agent.trim().is_empty() {
            errors.push("user_agent must not be empty".to_string());
        }

        // Trap validation
        if !(0.0..=1.0).contains(&self.trap.query_similarity_threshold) {
            errors.push("query_similarity_threshold must be between 0.0 and 1.0".to_string());
        }
        if self.trap.ban_threshold == 0 {
            errors.push("ban_threshold must be positive".to_string());
        }
        if self.trap.max_segment_occurrences == 0 {
            errors.push("max_segment_occurrences must be positive".to_string());
        }

        // Dedup validation
        if !(0.0..=1.0).contains(&self.dedup.near_duplicate_threshold) {
            errors.push("near_duplicate_threshold must be between 0.0 and 1.0".to_string());
        }

        // Filter validation
        if self.filter.accepted_statuses.is_empty() {
            errors.push("accepted_statuses must not be empty".to_string());
        }
        if self.filter.min_body_bytes > self.filter.max_body_bytes {
            errors.push(format!(
                "min_body_bytes ({}) must not exceed max_body_bytes ({})",
                self.filter.min_body_bytes, self.filter.max_body_bytes
            ));
        }

        // Validator validation
        if self.validator.allowed_domains.is_empty() {
            errors.push("allowed_domains must not be empty".to_string());
        }
        if self
            .validator
            .allowed_domains
            .iter()
            .any(|d| d.trim_matches('.').is_empty())
        {
            errors.push("allowed_domains must not contain empty entries".to_string());
        }
        if self.validator.verdict_cache_size == 0 {
            errors.push("verdict_cache_size must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}
