//! summitcache - keeps mountain pass weather warm in a local cache.
//!
//! Wires the core `WeatherService` to a file-backed store in the user's cache
//! directory and the Open-Meteo HTTP fetcher.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use summitcache_core::config::default_locations;
use summitcache_core::utils::{format_age, format_coordinates};
use summitcache_core::{Config, DataKind, FileStore, OpenMeteoFetcher, WeatherService};

/// How often `run` prints a status line.
const STATUS_INTERVAL_SECS: u64 = 60;

/// Log file prefix inside the cache directory
const LOG_FILE: &str = "summitcache.log";

const USAGE: &str = "\
Usage: summitcache <command>

Commands:
  init                         Write a config file with the built-in locations
  run                          Prefetch configured locations until Ctrl-C
  get <lat> <lng> [--forecast] Print weather for a coordinate
  stats                        Print cache statistics
  purge                        Drop entries past the hard TTL
  clear                        Wipe the cache
  locations                    List prefetch candidates";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and to a daily-rolling file in the cache directory. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

/// Apply `SUMMITCACHE_*` environment overrides on top of the config file.
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(value) = std::env::var("SUMMITCACHE_CONCURRENCY") {
        config.prefetch.concurrency = value
            .parse()
            .with_context(|| format!("Invalid SUMMITCACHE_CONCURRENCY: {}", value))?;
    }
    if let Ok(value) = std::env::var("SUMMITCACHE_SYNC_INTERVAL_MS") {
        config.prefetch.sync_interval_ms = value
            .parse()
            .with_context(|| format!("Invalid SUMMITCACHE_SYNC_INTERVAL_MS: {}", value))?;
    }
    if let Ok(value) = std::env::var("SUMMITCACHE_WEATHER_API_URL") {
        config.weather_api_url = Some(value);
    }
    Ok(())
}

fn build_service(config: &Config, cache_dir: &Path) -> Result<WeatherService> {
    let store = FileStore::new(cache_dir.to_path_buf())
        .with_context(|| format!("Failed to open cache directory: {}", cache_dir.display()))?;
    info!(store_dir = %store.dir().display(), "Using file-backed weather store");

    let mut fetcher = OpenMeteoFetcher::new().context("Failed to build HTTP client")?;
    if let Some(url) = &config.weather_api_url {
        fetcher = fetcher.with_base_url(url.clone());
    }

    Ok(WeatherService::new(config, Arc::new(store), Arc::new(fetcher)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    if command == "--help" || command == "-h" || command == "help" {
        println!("{}", USAGE);
        return Ok(());
    }

    if command == "init" {
        return init_config();
    }

    let mut config = Config::load()?;
    apply_env_overrides(&mut config)?;
    let cache_dir = config.cache_dir()?;
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;

    let _guard = init_tracing(&cache_dir);
    info!(command = %command, cache_dir = %cache_dir.display(), "summitcache starting");

    let service = build_service(&config, &cache_dir)?;

    match command.as_str() {
        "run" => run(&service, &config).await?,
        "get" => get(&service, &args[2..]).await?,
        "stats" => print_stats(&service)?,
        "purge" => {
            let removed = service.purge_expired();
            println!("Purged {} expired entries", removed);
        }
        "clear" => {
            service.clear();
            println!("Cache cleared");
        }
        "locations" => {
            for location in config.candidates() {
                let coordinates = match location.coordinates() {
                    Some((lat, lng)) => format_coordinates(lat, lng),
                    None => "(no coordinates)".to_string(),
                };
                println!("{:<24} {:<32} {}", location.id, location.name, coordinates);
            }
        }
        other => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            bail!("unknown command: {}", other);
        }
    }

    info!("summitcache shutting down");
    Ok(())
}

/// Write a starter config file unless one already exists.
fn init_config() -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    let config = Config {
        locations: default_locations(),
        ..Default::default()
    };
    config
        .save()
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    println!("Wrote {} with {} locations", path.display(), config.locations.len());
    Ok(())
}

/// Prefetch until Ctrl-C, printing a status line every minute.
async fn run(service: &WeatherService, config: &Config) -> Result<()> {
    service.start(config.prefetch.clone());
    eprintln!(
        "Prefetching {} locations with {} workers (Ctrl-C to stop)",
        config.candidates().len(),
        config.prefetch.workers()
    );

    let mut status = tokio::time::interval(Duration::from_secs(STATUS_INTERVAL_SECS));
    status.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = status.tick() => {
                let stats = service.stats();
                let oldest = stats
                    .oldest_entry_age_minutes
                    .map(format_age)
                    .unwrap_or_else(|| "-".to_string());
                eprintln!(
                    "{} entries ({} fresh), oldest {}, {} hits, {} errors, queue {}{}",
                    stats.cache.total_entries,
                    stats.cache.fresh_entries,
                    oldest,
                    stats.hit_count,
                    stats.error_count,
                    stats.queue_depth,
                    if stats.is_syncing { ", syncing" } else { "" }
                );
            }
        }
    }

    service.shutdown();
    eprintln!("Stopped");
    Ok(())
}

async fn get(service: &WeatherService, args: &[String]) -> Result<()> {
    let positional: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();
    if positional.len() != 2 {
        bail!("usage: summitcache get <lat> <lng> [--forecast]");
    }
    let lat: f64 = positional[0]
        .parse()
        .with_context(|| format!("Invalid latitude: {}", positional[0]))?;
    let lng: f64 = positional[1]
        .parse()
        .with_context(|| format!("Invalid longitude: {}", positional[1]))?;
    let kind = if args.iter().any(|a| a == "--forecast") {
        DataKind::Forecast
    } else {
        DataKind::Current
    };

    let lookup = service.get(kind, lat, lng).await;
    println!("{}", serde_json::to_string_pretty(&lookup)?);
    if !lookup.is_authoritative() {
        eprintln!("Note: weather data may be outdated ({:?})", lookup.origin);
    }
    Ok(())
}

fn print_stats(service: &WeatherService) -> Result<()> {
    let stats = service.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    if let Some(minutes) = stats.oldest_entry_age_minutes {
        eprintln!("Oldest entry fetched {}", format_age(minutes));
    }
    Ok(())
}
