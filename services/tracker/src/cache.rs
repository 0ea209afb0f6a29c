//! Latest-entry cache
//!
//! Holds the most recently *ingested* entry, which is not necessarily the
//! one with the highest timestamp. Seeded from the store once at startup and
//! afterwards only written by the ingestion pipeline.

use persistence::{EntryStore, StoreError};
use std::sync::{PoisonError, RwLock};
use tracing::debug;
use types::location::Entry;

pub struct LatestEntryCache {
    slot: RwLock<Entry>,
}

impl LatestEntryCache {
    pub fn new(entry: Entry) -> Self {
        Self {
            slot: RwLock::new(entry),
        }
    }

    /// Build the cache from the store's most recent entry, or the zero-value
    /// entry when the store is empty.
    pub fn seed(store: &dyn EntryStore) -> Result<Self, StoreError> {
        let entry = store.read_recent(1)?.into_iter().next().unwrap_or_default();
        debug!(timestamp = entry.timestamp, empty = entry.is_zero(), "Latest-entry cache seeded");
        Ok(Self::new(entry))
    }

    /// Replace the held entry unconditionally.
    pub fn set(&self, entry: Entry) {
        // Entry is Copy, so a poisoned lock still holds a whole value.
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = entry;
    }

    pub fn get(&self) -> Entry {
        *self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LatestEntryCache {
    fn default() -> Self {
        Self::new(Entry::default())
    }
}
