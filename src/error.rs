//! Error types for the crawl decision core
//!
//! Only malformed input and store failures surface as errors. Policy, trap and
//! duplicate rejections are ordinary outcomes, and robots.txt fetch failures
//! are absorbed by the robots cache.

use std::time::Duration;
use thiserror::Error;

/// Errors that escape the filtering pipeline and the URL validator
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Failed to parse URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Fetched page is missing required field: {0}")]
    MissingField(&'static str),
    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl FilterError {
    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        FilterError::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}

/// Errors while retrieving a robots.txt file
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Parse a URL string, mapping failures to [`FilterError::InvalidUrl`]
pub(crate) fn parse_url(raw: &str) -> Result<url::Url, FilterError> {
    url::Url::parse(raw).map_err(|e| FilterError::invalid_url(raw, e))
}
