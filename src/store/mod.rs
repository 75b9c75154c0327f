//! Durable key-value stores for crawl state
//!
//! Three stores back the decision core:
//! - `pages`: page history keyed by request-URL hash
//! - `robots`: robots.txt policy per hostname
//! - `trap_stats`: query-drift counters per hostname
//!
//! Components receive the stores explicitly so tests can swap in
//! [`MemoryTree`] and separate crawls never share state.

mod memory;
mod sled_tree;

pub use memory::MemoryTree;
pub use sled_tree::SledTree;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::crawl::robots::HostRobotsEntry;
use crate::crawl::trap_detection::HostTrapStats;
use crate::types::PageRecord;

/// Typed key-value store with string keys
pub trait KvStore<V>: Send + Sync {
    /// Get the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: &str, value: &V) -> Result<()>;

    /// Store `value` only if `key` is absent. Returns false if the key existed.
    fn insert_if_absent(&self, key: &str, value: &V) -> Result<bool>;

    /// All entries, in unspecified order
    fn entries(&self) -> Result<Vec<(String, V)>>;

    /// Number of entries
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush buffered writes to durable storage
    fn flush(&self) -> Result<()>;
}

/// Page history store
pub type PageStore = Arc<dyn KvStore<PageRecord>>;
/// Robots policy store
pub type RobotsStore = Arc<dyn KvStore<HostRobotsEntry>>;
/// Trap statistics store
pub type TrapStore = Arc<dyn KvStore<HostTrapStats>>;

/// The three stores of a crawl, opened together
#[derive(Clone)]
pub struct CrawlStores {
    pub pages: PageStore,
    pub robots: RobotsStore,
    pub trap_stats: TrapStore,
}

impl CrawlStores {
    /// Open (or create) the sled-backed stores under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("crawl.sled");
        let db = sled::open(&db_path)
            .with_context(|| format!("Failed to open crawl database at {:?}", db_path))?;

        let stores = Self {
            pages: Arc::new(SledTree::open(&db, "pages")?),
            robots: Arc::new(SledTree::open(&db, "robots")?),
            trap_stats: Arc::new(SledTree::open(&db, "trap_stats")?),
        };

        info!(
            "Opened crawl stores at {:?} ({} pages, {} robots entries, {} trap hosts)",
            db_path,
            stores.pages.len(),
            stores.robots.len(),
            stores.trap_stats.len()
        );

        Ok(stores)
    }

    /// Non-durable stores for tests and throwaway runs
    pub fn in_memory() -> Self {
        Self {
            pages: Arc::new(MemoryTree::new()),
            robots: Arc::new(MemoryTree::new()),
            trap_stats: Arc::new(MemoryTree::new()),
        }
    }

    /// Flush all three stores
    pub fn flush(&self) -> Result<()> {
        self.pages.flush()?;
        self.robots.flush()?;
        self.trap_stats.flush()?;
        Ok(())
    }
}
