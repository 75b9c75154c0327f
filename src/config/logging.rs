//! Logging configuration

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log severity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log format
    pub format: LogFormat,
    /// Log level
    pub level: LogLevel,
}

impl LoggingConfig {
    /// Effective level after `-v` flags: each one lowers the threshold a step
    pub fn effective_level(&self, verbose: u8) -> LogLevel {
        match verbose {
            0 => self.level,
            1 => self.level.min(LogLevel::Debug),
            _ => LogLevel::Trace,
        }
    }

    /// Subscriber filter. `RUST_LOG` wins unless `-v` was given.
    pub fn env_filter(&self, verbose: u8) -> EnvFilter {
        let level = self.effective_level(verbose);
        if verbose > 0 {
            return EnvFilter::new(level.as_str());
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
    }
}
