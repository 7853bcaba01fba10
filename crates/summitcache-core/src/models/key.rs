//! Coordinate cache keys.
//!
//! Keys are built from latitude/longitude rounded to two decimals (roughly
//! 1 km), so nearby requests share one entry. Current conditions and forecasts
//! live in separate namespaces: `current:48.07,7.00` vs `forecast:48.07,7.00`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::location::is_valid_coordinate;

/// Rounding factor for coordinates (two decimal places).
const COORDINATE_SCALE: f64 = 100.0;

/// Which upstream dataset a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Current,
    Forecast,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Current => "current",
            DataKind::Forecast => "forecast",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    #[error("Unknown data kind: {0}")]
    UnknownKind(String),

    #[error("Malformed cache key: {0}")]
    Malformed(String),

    #[error("Coordinates out of range: {0}")]
    OutOfRange(String),
}

impl FromStr for DataKind {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(DataKind::Current),
            "forecast" => Ok(DataKind::Forecast),
            other => Err(KeyParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Normalized coordinate key.
///
/// Coordinates are stored as integer hundredths so equality and hashing are
/// exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    kind: DataKind,
    lat_e2: i32,
    lng_e2: i32,
}

impl CacheKey {
    /// Build a key, or `None` if the coordinates are not a real position.
    pub fn new(kind: DataKind, lat: f64, lng: f64) -> Option<Self> {
        if !is_valid_coordinate(lat, lng) {
            return None;
        }
        Some(Self {
            kind,
            lat_e2: (lat * COORDINATE_SCALE).round() as i32,
            lng_e2: (lng * COORDINATE_SCALE).round() as i32,
        })
    }

    pub fn current(lat: f64, lng: f64) -> Option<Self> {
        Self::new(DataKind::Current, lat, lng)
    }

    pub fn forecast(lat: f64, lng: f64) -> Option<Self> {
        Self::new(DataKind::Forecast, lat, lng)
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Rounded latitude.
    pub fn lat(&self) -> f64 {
        self.lat_e2 as f64 / COORDINATE_SCALE
    }

    /// Rounded longitude.
    pub fn lng(&self) -> f64 {
        self.lng_e2 as f64 / COORDINATE_SCALE
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:.2},{:.2}", self.kind, self.lat(), self.lng())
    }
}

impl FromStr for CacheKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KeyParseError::Malformed(s.to_string());

        let (kind, coords) = s.split_once(':').ok_or_else(malformed)?;
        let kind: DataKind = kind.parse()?;
        let (lat, lng) = coords.split_once(',').ok_or_else(malformed)?;
        let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
        let lng: f64 = lng.trim().parse().map_err(|_| malformed())?;

        CacheKey::new(kind, lat, lng).ok_or_else(|| KeyParseError::OutOfRange(s.to_string()))
    }
}

impl Serialize for CacheKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
