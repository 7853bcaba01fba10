//! Configuration for the weather cache and prefetch scheduler.
//!
//! Options are stored alongside the curated location list at
//! `~/.config/summitcache/config.json`. Every field has a default, so a
//! partial (or missing) file is fine.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::Location;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "summitcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Refresh attempts start once an entry is an hour old.
pub const DEFAULT_SOFT_TTL_MS: u64 = 60 * 60 * 1000;

/// Entries older than a day are not worth keeping even as a fallback.
pub const DEFAULT_HARD_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Pause between prefetch requests on one worker.
pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 500;

/// Purge timer period.
pub const DEFAULT_PURGE_INTERVAL_MS: u64 = 60 * 60 * 1000;

/// Periodic sync every 30 minutes.
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 30 * 60 * 1000;

/// Two workers keep the upstream API comfortably under its rate limits.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Freshness and persistence tuning for the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    pub soft_ttl_ms: u64,
    pub hard_ttl_ms: u64,
    pub inter_request_delay_ms: u64,
    pub purge_interval_ms: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            soft_ttl_ms: DEFAULT_SOFT_TTL_MS,
            hard_ttl_ms: DEFAULT_HARD_TTL_MS,
            inter_request_delay_ms: DEFAULT_INTER_REQUEST_DELAY_MS,
            purge_interval_ms: DEFAULT_PURGE_INTERVAL_MS,
        }
    }
}

impl CacheOptions {
    pub fn soft_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(clamp_ms(self.soft_ttl_ms))
    }

    /// Hard TTL, never shorter than the soft TTL.
    pub fn hard_ttl(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(clamp_ms(self.hard_ttl_ms.max(self.soft_ttl_ms)))
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    /// Purge period; zero is bumped to one second so the timer cannot spin.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms.max(1000))
    }
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX / 1000)
}

/// Options accepted by `PrefetchScheduler::initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "camelCase", default)]
pub struct PrefetchOptions {
    /// Run one sync immediately on initialize.
    pub preload_on_start: bool,
    pub sync_interval_ms: u64,
    /// Number of prefetch workers (at most this many fetches in flight).
    pub concurrency: usize,
    /// Run the periodic sync timer.
    pub enable_sync: bool,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            preload_on_start: true,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            concurrency: DEFAULT_CONCURRENCY,
            enable_sync: true,
        }
    }
}

impl PrefetchOptions {
    /// Worker count, at least one.
    pub fn workers(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Sync period; zero is bumped to one second so the timer cannot spin.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.max(1000))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub cache: CacheOptions,
    pub prefetch: PrefetchOptions,
    /// Curated prefetch candidates. Empty means use the built-in pass list.
    pub locations: Vec<Location>,
    /// Override for the upstream weather API base URL.
    pub weather_api_url: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Prefetch candidates: the configured list, or the built-in passes.
    pub fn candidates(&self) -> Vec<Location> {
        if self.locations.is_empty() {
            default_locations()
        } else {
            self.locations.clone()
        }
    }
}

/// Popular passes in the Vosges and the Alps.
pub fn default_locations() -> Vec<Location> {
    vec![
        Location::new("col-de-la-schlucht", "Col de la Schlucht", 48.0636, 7.0222),
        Location::new("grand-ballon", "Grand Ballon", 47.9013, 7.0988),
        Location::new("ballon-d-alsace", "Ballon d'Alsace", 47.8225, 6.8411),
        Location::new("col-du-galibier", "Col du Galibier", 45.0641, 6.4078),
        Location::new("col-du-tourmalet", "Col du Tourmalet", 42.9083, 0.1453),
        Location::new("passo-dello-stelvio", "Passo dello Stelvio", 46.5286, 10.4531),
        Location::new("grossglockner", "Grossglockner Hochalpenstrasse", 47.0806, 12.8431),
        Location::new("furkapass", "Furkapass", 46.5725, 8.4150),
    ]
}
