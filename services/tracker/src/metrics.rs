//! Counters for ingestion and retrieval
//!
//! Makes zero-filled and refused input observable instead of silent.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServiceMetrics {
    pub updates_accepted: AtomicU64,
    pub updates_rejected: AtomicU64,
    pub store_failures: AtomicU64,
    /// Individual fields replaced by zero.
    pub fields_defaulted: AtomicU64,
    pub cache_reads: AtomicU64,
    pub store_reads: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub updates_accepted: u64,
    pub updates_rejected: u64,
    pub store_failures: u64,
    pub fields_defaulted: u64,
    pub cache_reads: u64,
    pub store_reads: u64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self, defaulted_fields: usize) {
        self.updates_accepted.fetch_add(1, Ordering::Relaxed);
        self.fields_defaulted
            .fetch_add(defaulted_fields as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.updates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_failure(&self) {
        self.store_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_read(&self) {
        self.cache_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store_read(&self) {
        self.store_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_accepted: self.updates_accepted.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            fields_defaulted: self.fields_defaulted.load(Ordering::Relaxed),
            cache_reads: self.cache_reads.load(Ordering::Relaxed),
            store_reads: self.store_reads.load(Ordering::Relaxed),
        }
    }
}
