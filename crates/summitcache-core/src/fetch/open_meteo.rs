//! HTTP fetcher for the Open-Meteo forecast API.
//!
//! Current conditions and the daily forecast are separate requests so they can
//! be cached under separate keys with their own freshness.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{FetchError, WeatherFetcher};
use crate::models::DataKind;

// ============================================================================
// Constants
// ============================================================================

/// Public Open-Meteo forecast endpoint (no API key required).
pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// HTTP request timeout in seconds.
/// Prefetch workers should give up on a hung request long before the next sync.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Fields requested for current conditions.
const CURRENT_FIELDS: &str =
    "temperature_2m,apparent_temperature,precipitation,weather_code,wind_speed_10m,wind_gusts_10m";

/// Fields requested for the daily forecast.
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,snowfall_sum,wind_speed_10m_max";

/// Days of daily forecast to request.
const FORECAST_DAYS: u32 = 7;

/// Weather fetcher backed by Open-Meteo.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct OpenMeteoFetcher {
    client: Client,
    base_url: String,
}

impl OpenMeteoFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("summitcache/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at a different endpoint (self-hosted instance, test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_url(&self, kind: DataKind, lat: f64, lng: f64) -> String {
        let selection = match kind {
            DataKind::Current => format!("current={}", CURRENT_FIELDS),
            DataKind::Forecast => format!(
                "daily={}&forecast_days={}",
                DAILY_FIELDS, FORECAST_DAYS
            ),
        };
        format!(
            "{}?latitude={:.4}&longitude={:.4}&{}&timezone=auto",
            self.base_url, lat, lng, selection
        )
    }

    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, FetchError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.client.get(url).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body: Value = response.json().await?;
                    return Self::validate(body);
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(FetchError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// Open-Meteo reports some failures as `{"error": true, "reason": ...}`.
    fn validate(body: Value) -> Result<Value, FetchError> {
        let Some(object) = body.as_object() else {
            return Err(FetchError::InvalidResponse("expected a JSON object".to_string()));
        };
        if object.get("error").and_then(Value::as_bool) == Some(true) {
            let reason = object
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(FetchError::InvalidResponse(reason.to_string()));
        }
        Ok(body)
    }
}

#[async_trait]
impl WeatherFetcher for OpenMeteoFetcher {
    async fn fetch(&self, kind: DataKind, lat: f64, lng: f64) -> Result<Value, FetchError> {
        let url = self.request_url(kind, lat, lng);
        debug!(%kind, lat, lng, "Fetching weather");
        self.get_json(&url).await
    }
}
