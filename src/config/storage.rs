//! Store location configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where crawl state is kept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `crawl.sled`
    pub data_dir: PathBuf,
    /// Keep all state in memory; nothing survives the process
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".crawlgate"),
            in_memory: false,
        }
    }
}
