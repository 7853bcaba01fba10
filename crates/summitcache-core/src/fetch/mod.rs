//! Upstream weather access.
//!
//! The cache never talks to the network itself. Callers inject a
//! `WeatherFetcher`; `OpenMeteoFetcher` is the HTTP implementation, and tests
//! use in-process doubles.

pub mod error;
pub mod open_meteo;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::DataKind;

pub use error::FetchError;
pub use open_meteo::OpenMeteoFetcher;

/// Source of weather payloads for a coordinate.
///
/// Payloads are opaque to the cache; whatever JSON comes back is stored and
/// served as-is.
#[async_trait]
pub trait WeatherFetcher: Send + Sync {
    async fn fetch(&self, kind: DataKind, lat: f64, lng: f64) -> Result<Value, FetchError>;
}
