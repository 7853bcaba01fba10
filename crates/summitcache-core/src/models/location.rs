//! Prefetch candidate locations.

use serde::{Deserialize, Serialize};

use super::key::{CacheKey, DataKind};

/// Check that a latitude/longitude pair is a real position on the globe.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// A location worth keeping warm: a mountain pass, a trailhead, a place a
/// user recently looked at.
///
/// Coordinates are optional because candidate lists come from collaborators
/// that may not have geocoded every entry yet. Such locations are never
/// enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Location {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Higher values are warmed first within a sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl Location {
    pub fn new(id: impl Into<String>, name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            lat: Some(lat),
            lng: Some(lng),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Validated coordinates, if both are present and in range.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if is_valid_coordinate(lat, lng) => Some((lat, lng)),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.coordinates().is_some()
    }

    pub fn cache_key(&self, kind: DataKind) -> Option<CacheKey> {
        let (lat, lng) = self.coordinates()?;
        CacheKey::new(kind, lat, lng)
    }

    /// Name for log output, falling back to the id.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}
