//! Retrieval service
//!
//! One sizing knob: a count of 0 or 1 is answered from the latest-entry
//! cache without touching the store; anything larger reads the store.

use crate::cache::LatestEntryCache;
use crate::metrics::ServiceMetrics;
use persistence::{EntryStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use types::location::Entry;

pub const DEFAULT_COUNT: u16 = 1;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("failed to read entries: {0}")]
    Store(#[from] StoreError),
}

/// Parse the `count` query value. Absent or unparsable input yields 1.
pub fn parse_count(raw: Option<&str>) -> u16 {
    match raw {
        None | Some("") => DEFAULT_COUNT,
        Some(raw) => raw.parse::<u16>().unwrap_or_else(|e| {
            debug!(raw, error = %e, "Error parsing query parameter 'count'");
            DEFAULT_COUNT
        }),
    }
}

pub struct Retriever {
    store: Arc<dyn EntryStore>,
    cache: Arc<LatestEntryCache>,
    metrics: Arc<ServiceMetrics>,
    max_count: u16,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn EntryStore>,
        cache: Arc<LatestEntryCache>,
        metrics: Arc<ServiceMetrics>,
        max_count: u16,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            max_count: max_count.max(1),
        }
    }

    pub fn max_count(&self) -> u16 {
        self.max_count
    }

    /// Most recent entries, newest first. Always at least one element when
    /// `count <= 1`, possibly the zero-value entry.
    pub fn retrieve(&self, count: u16) -> Result<Vec<Entry>, RetrieveError> {
        let count = count.min(self.max_count);

        if count <= 1 {
            debug!("Fetching last location entry from memory");
            self.metrics.record_cache_read();
            return Ok(vec![self.cache.get()]);
        }

        debug!(count, "Fetching last location entries from store");
        self.metrics.record_store_read();
        Ok(self.store.read_recent(count as usize)?)
    }
}
