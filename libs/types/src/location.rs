//! Location report and persisted entry types
//!
//! A `LocationUpdate` is what the tracking client reports. An `Entry` is the
//! immutable record the store keeps, keyed by the update's timestamp.

use serde::{Deserialize, Serialize};

/// A single position report from the tracking client.
///
/// No field is range-checked: latitude 500.0 is accepted as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Client supplied ordering key (epoch-like, unit chosen by the client)
    pub timestamp: u64,
    /// Horizontal dilution of precision
    pub hdop: f64,
    /// Meters
    pub altitude: f64,
    pub speed: f64,
}

impl LocationUpdate {
    /// Returns the first float field that is NaN or infinite, if any.
    ///
    /// Such values have no JSON representation.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("hdop", self.hdop),
            ("altitude", self.altitude),
            ("speed", self.speed),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

/// A persisted location record.
///
/// `Entry::default()` is the zero-value entry served before anything has
/// been ingested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Ordering key; not unique
    pub timestamp: u64,
    pub data: LocationUpdate,
}

impl Entry {
    /// Wrap an update, taking its timestamp as the ordering key.
    pub fn new(data: LocationUpdate) -> Self {
        Self {
            timestamp: data.timestamp,
            data,
        }
    }

    /// True for the zero-value entry.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}
