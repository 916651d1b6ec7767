//! Configuration Loader - File Loading and Validation
//!
//! Handles locating and loading `config.toml`, applying environment
//! overrides, validating all parameters, and providing clear error
//! messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, TransportBackend};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "FORECAST_CONFIG";
/// Environment variable overriding `transport.redis_url`.
pub const REDIS_URL_ENV: &str = "FORECAST_REDIS_URL";
/// Used when `FORECAST_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Load configuration the way the binary does.
///
/// Reads the file named by `FORECAST_CONFIG` (which must exist), else
/// `config.toml` if present, else built-in defaults. Environment
/// overrides are applied before validation.
pub fn load_from_env() -> Result<AppConfig> {
  let mut config = match std::env::var(CONFIG_PATH_ENV) {
    Ok(path) => parse_file(&path)?,
    Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => parse_file(DEFAULT_CONFIG_PATH)?,
    Err(_) => AppConfig::default(),
  };

  if let Ok(url) = std::env::var(REDIS_URL_ENV) {
    apply_redis_url(&mut config, url);
  }

  validate_config(&config)?;
  log_loaded(&config);
  Ok(config)
}

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let config = parse_file(path)?;
  validate_config(&config)?;
  log_loaded(&config);
  Ok(config)
}

fn parse_file(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  toml::from_str(&content)
    .with_context(|| format!("Failed to parse {}", path.display()))
}

fn apply_redis_url(config: &mut AppConfig, url: String) {
  if !url.is_empty() {
    config.transport.redis_url = url;
  }
}

fn log_loaded(config: &AppConfig) {
  info!(
    backend = ?config.transport.backend,
    trade_stream = %config.transport.trade_stream,
    window = config.features.window_size,
    artifact = %config.predictor.artifact_path,
    "Configuration loaded successfully"
  );
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-zero window, batch sizes and block durations
/// - Non-empty stream names and routes
/// - A Redis URL when the Redis backend is selected
pub fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    config.features.window_size >= 1,
    "features.window_size must be at least 1"
  );

  // Transport validation
  anyhow::ensure!(
    !config.transport.trade_stream.is_empty(),
    "transport.trade_stream must not be empty"
  );
  anyhow::ensure!(
    !config.transport.feature_stream.is_empty(),
    "transport.feature_stream must not be empty"
  );
  if config.transport.backend == TransportBackend::Redis {
    anyhow::ensure!(
      !config.transport.redis_url.is_empty(),
      "transport.redis_url must be set for the redis backend"
    );
  }

  // Gateway validation
  anyhow::ensure!(
    config.gateway.batch_size >= 1,
    "gateway.batch_size must be at least 1, got {}",
    config.gateway.batch_size
  );
  // A zero block means "wait forever" on Redis
  anyhow::ensure!(
    config.gateway.block_ms >= 1,
    "gateway.block_ms must be at least 1"
  );
  anyhow::ensure!(
    config.gateway.path.starts_with('/'),
    "gateway.path must start with '/', got {:?}",
    config.gateway.path
  );

  // Processor validation
  anyhow::ensure!(
    config.processor.batch_size >= 1,
    "processor.batch_size must be at least 1, got {}",
    config.processor.batch_size
  );
  anyhow::ensure!(
    config.processor.block_ms >= 1,
    "processor.block_ms must be at least 1"
  );

  // Ingest validation
  if config.ingest.enabled {
    anyhow::ensure!(
      !config.ingest.ws_url.is_empty(),
      "ingest.ws_url must not be empty"
    );
  }

  Ok(())
}
