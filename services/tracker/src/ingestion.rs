//! Ingestion pipeline
//!
//! Turns a raw, loosely typed update into a persisted `Entry` and then
//! refreshes the latest-entry cache:
//!
//! 1. Parse each field independently (`ParseOutcome`)
//! 2. Refuse the update if the strict policy rejected a field
//! 3. Append the entry to the store
//! 4. Only after a successful append, replace the cached entry
//!
//! Steps 3 and 4 run under one lock so the cache always ends up holding the
//! entry that was appended last.

use crate::cache::LatestEntryCache;
use crate::metrics::ServiceMetrics;
use crate::parse::{parse_f64, parse_u64, ParsePolicy};
use persistence::{EntryStore, StoreError};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, error, warn};
use types::location::{Entry, LocationUpdate};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("field `{field}` is not a valid number: {raw:?}")]
    Rejected { field: &'static str, raw: String },

    #[error("failed to persist entry: {0}")]
    Store(#[from] StoreError),
}

/// Update fields exactly as received, e.g. from an OsmAnd tracking URL.
#[derive(Debug, Clone, Default)]
pub struct RawLocationUpdate {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub timestamp: Option<String>,
    pub hdop: Option<String>,
    pub altitude: Option<String>,
    pub speed: Option<String>,
}

impl RawLocationUpdate {
    /// Collect the known fields from decoded query pairs. The first value of
    /// a repeated key wins and unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "lat" => &mut raw.lat,
                "lon" => &mut raw.lon,
                "timestamp" => &mut raw.timestamp,
                "hdop" => &mut raw.hdop,
                "altitude" => &mut raw.altitude,
                "speed" => &mut raw.speed,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        raw
    }

    fn raw(&self, field: &str) -> Option<&str> {
        match field {
            "latitude" => self.lat.as_deref(),
            "longitude" => self.lon.as_deref(),
            "timestamp" => self.timestamp.as_deref(),
            "hdop" => self.hdop.as_deref(),
            "altitude" => self.altitude.as_deref(),
            "speed" => self.speed.as_deref(),
            _ => None,
        }
    }
}

/// A parsed update plus the names of fields that were zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUpdate {
    pub update: LocationUpdate,
    pub defaulted: Vec<&'static str>,
}

pub struct Ingestor {
    store: Arc<dyn EntryStore>,
    cache: Arc<LatestEntryCache>,
    metrics: Arc<ServiceMetrics>,
    policy: ParsePolicy,
    ingest_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn EntryStore>,
        cache: Arc<LatestEntryCache>,
        metrics: Arc<ServiceMetrics>,
        policy: ParsePolicy,
    ) -> Self {
        Self {
            store,
            cache,
            metrics,
            policy,
            ingest_lock: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    /// Parse all six fields. Fails only when the strict policy rejects one.
    pub fn parse(&self, raw: &RawLocationUpdate) -> Result<ParsedUpdate, IngestError> {
        let policy = self.policy;
        let latitude = parse_f64(raw.lat.as_deref(), policy);
        let longitude = parse_f64(raw.lon.as_deref(), policy);
        let timestamp = parse_u64(raw.timestamp.as_deref(), policy);
        let hdop = parse_f64(raw.hdop.as_deref(), policy);
        let altitude = parse_f64(raw.altitude.as_deref(), policy);
        let speed = parse_f64(raw.speed.as_deref(), policy);

        // (field, rejected, defaulted)
        let states = [
            ("latitude", latitude.is_rejected(), latitude.is_defaulted()),
            ("longitude", longitude.is_rejected(), longitude.is_defaulted()),
            ("timestamp", timestamp.is_rejected(), timestamp.is_defaulted()),
            ("hdop", hdop.is_rejected(), hdop.is_defaulted()),
            ("altitude", altitude.is_rejected(), altitude.is_defaulted()),
            ("speed", speed.is_rejected(), speed.is_defaulted()),
        ];

        if let Some(&(field, _, _)) = states.iter().find(|(_, rejected, _)| *rejected) {
            return Err(self.reject(field, raw));
        }

        let defaulted = states
            .iter()
            .filter(|(_, _, defaulted)| *defaulted)
            .map(|(field, _, _)| *field)
            .collect();

        let update = LocationUpdate {
            latitude: latitude.value(),
            longitude: longitude.value(),
            timestamp: timestamp.value(),
            hdop: hdop.value(),
            altitude: altitude.value(),
            speed: speed.value(),
        };

        Ok(ParsedUpdate { update, defaulted })
    }

    /// Parse, persist and cache one raw update.
    pub fn ingest(&self, raw: &RawLocationUpdate) -> Result<Entry, IngestError> {
        let parsed = self.parse(raw)?;
        if !parsed.defaulted.is_empty() {
            debug!(fields = ?parsed.defaulted, "Update fields defaulted to zero");
        }

        let entry = self.commit(Entry::new(parsed.update))?;
        self.metrics.record_accepted(parsed.defaulted.len());
        Ok(entry)
    }

    /// Append `entry` to the store and, once that succeeded, cache it.
    pub fn commit(&self, entry: Entry) -> Result<Entry, IngestError> {
        if let Some(field) = entry.data.first_non_finite() {
            self.metrics.record_rejected();
            warn!(field, "Refusing entry with a non-finite value");
            return Err(IngestError::Rejected {
                field,
                raw: "non-finite".to_string(),
            });
        }

        let _guard = self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = self.store.append(&entry) {
            self.metrics.record_store_failure();
            error!(timestamp = entry.timestamp, error = %e, "Saving entry to store failed");
            return Err(e.into());
        }
        self.cache.set(entry);

        debug!(timestamp = entry.timestamp, "Entry stored and cached");
        Ok(entry)
    }

    fn reject(&self, field: &'static str, raw: &RawLocationUpdate) -> IngestError {
        let value = raw.raw(field).unwrap_or_default().to_string();
        self.metrics.record_rejected();
        warn!(field, raw = %value, "Rejected malformed update field");
        IngestError::Rejected { field, raw: value }
    }
}
