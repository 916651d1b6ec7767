//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides. Every section and field has a
//! default, so a partial file (or no file at all) yields a working
//! single-symbol BTC/USDT deployment.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::entry::StartFrom;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  #[serde(default)]
  pub service: ServiceConfig,
  /// Stream transport backend and stream names.
  #[serde(default)]
  pub transport: TransportConfig,
  /// Sliding-window feature engine.
  #[serde(default)]
  pub features: FeaturesConfig,
  /// Model artifact location and reload policy.
  #[serde(default)]
  pub predictor: PredictorConfig,
  /// WebSocket forecast gateway.
  #[serde(default)]
  pub gateway: GatewayConfig,
  /// Batch feature processor.
  #[serde(default)]
  pub processor: ProcessorConfig,
  /// Exchange trade ingest.
  #[serde(default)]
  pub ingest: IngestConfig,
  /// Metrics and monitoring.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  #[serde(default = "default_service_name")]
  pub name: String,
  /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Emit JSON log lines instead of plain text.
  #[serde(default = "default_true")]
  pub json_logs: bool,
  /// Directory for cursor checkpoints.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

/// Which `StreamLog` implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportBackend {
  /// Redis Streams (shared across processes).
  #[default]
  Redis,
  /// Process-local log (single-process deployments, tests).
  Memory,
}

/// Stream transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
  #[serde(default)]
  pub backend: TransportBackend,
  /// Redis URL, overridden by `FORECAST_REDIS_URL`.
  #[serde(default = "default_redis_url")]
  pub redis_url: String,
  /// Stream of normalized trades.
  #[serde(default = "default_trade_stream")]
  pub trade_stream: String,
  /// Stream of derived feature records.
  #[serde(default = "default_feature_stream")]
  pub feature_stream: String,
  /// Entries kept per stream by the memory backend; 0 = unbounded.
  #[serde(default = "default_memory_max_len")]
  pub memory_max_len: usize,
}

/// Feature engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
  /// Sliding window capacity N (number of trade sides kept).
  #[serde(default = "default_window_size")]
  pub window_size: usize,
}

/// Predictor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
  /// Path of the JSON model artifact. Absent file = heuristic mode.
  #[serde(default = "default_artifact_path")]
  pub artifact_path: String,
  /// Artifact poll interval in seconds (0 disables reload).
  #[serde(default = "default_reload_interval")]
  pub reload_interval_secs: u64,
}

/// Stream a gateway session reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewaySource {
  /// Raw normalized trades.
  #[default]
  Trades,
  /// Feature records carrying an upstream OFI.
  Features,
}

/// Forecast gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// HTTP bind address.
  #[serde(default = "default_gateway_addr")]
  pub bind_address: String,
  /// WebSocket route.
  #[serde(default = "default_gateway_path")]
  pub path: String,
  #[serde(default)]
  pub source: GatewaySource,
  /// Starting point of every new session's cursor.
  #[serde(default)]
  pub start_from: StartFrom,
  /// Max entries per read.
  #[serde(default = "default_gateway_batch")]
  pub batch_size: usize,
  /// Max wait per read in milliseconds.
  #[serde(default = "default_block_ms")]
  pub block_ms: u64,
  /// Keep a sliding window per connection for local OFI.
  #[serde(default)]
  pub per_connection_ofi: bool,
}

/// Batch feature processor configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Starting point when no checkpoint exists.
  #[serde(default)]
  pub start_from: StartFrom,
  #[serde(default = "default_processor_batch")]
  pub batch_size: usize,
  #[serde(default = "default_block_ms")]
  pub block_ms: u64,
  /// Persist the cursor every N processed entries (0 = only on shutdown).
  #[serde(default = "default_checkpoint_every")]
  pub checkpoint_every: u64,
}

/// Exchange ingest configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Exchange trade-stream WebSocket URL.
  #[serde(default = "default_ingest_url")]
  pub ws_url: String,
  /// Directory of the JSONL trade archive; unset disables archiving.
  #[serde(default)]
  pub archive_path: Option<String>,
  /// Delay before reconnecting a dropped feed (seconds).
  #[serde(default = "default_reconnect_secs")]
  pub reconnect_secs: u64,
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health check endpoint port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl TransportConfig {
  /// Stream name a gateway session should read.
  pub fn stream_for(&self, source: GatewaySource) -> &str {
    match source {
      GatewaySource::Trades => &self.trade_stream,
      GatewaySource::Features => &self.feature_stream,
    }
  }
}

impl PredictorConfig {
  pub fn reload_interval(&self) -> Option<Duration> {
    (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
  }
}

impl GatewayConfig {
  pub fn block(&self) -> Duration {
    Duration::from_millis(self.block_ms)
  }
}

impl ProcessorConfig {
  pub fn block(&self) -> Duration {
    Duration::from_millis(self.block_ms)
  }
}

impl IngestConfig {
  pub fn reconnect_delay(&self) -> Duration {
    Duration::from_secs(self.reconnect_secs)
  }
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_service_name(),
      log_level: default_log_level(),
      json_logs: true,
      data_dir: default_data_dir(),
    }
  }
}

impl Default for TransportConfig {
  fn default() -> Self {
    Self {
      backend: TransportBackend::default(),
      redis_url: default_redis_url(),
      trade_stream: default_trade_stream(),
      feature_stream: default_feature_stream(),
      memory_max_len: default_memory_max_len(),
    }
  }
}

impl Default for FeaturesConfig {
  fn default() -> Self {
    Self {
      window_size: default_window_size(),
    }
  }
}

impl Default for PredictorConfig {
  fn default() -> Self {
    Self {
      artifact_path: default_artifact_path(),
      reload_interval_secs: default_reload_interval(),
    }
  }
}

impl Default for GatewayConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_gateway_addr(),
      path: default_gateway_path(),
      source: GatewaySource::default(),
      start_from: StartFrom::default(),
      batch_size: default_gateway_batch(),
      block_ms: default_block_ms(),
      per_connection_ofi: false,
    }
  }
}

impl Default for ProcessorConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      start_from: StartFrom::default(),
      batch_size: default_processor_batch(),
      block_ms: default_block_ms(),
      checkpoint_every: default_checkpoint_every(),
    }
  }
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ws_url: default_ingest_url(),
      archive_path: None,
      reconnect_secs: default_reconnect_secs(),
    }
  }
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_service_name() -> String {
  "orderflow-forecast".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_redis_url() -> String {
  "redis://127.0.0.1:6379".to_string()
}

fn default_trade_stream() -> String {
  "trades:btcusdt".to_string()
}

fn default_feature_stream() -> String {
  "features:btcusdt".to_string()
}

fn default_memory_max_len() -> usize {
  100_000
}

fn default_window_size() -> usize {
  crate::domain::ofi::DEFAULT_WINDOW_SIZE
}

fn default_artifact_path() -> String {
  "storage/models/btcusdt_1min_h1.json".to_string()
}

fn default_reload_interval() -> u64 {
  60
}

fn default_gateway_addr() -> String {
  "0.0.0.0:8000".to_string()
}

fn default_gateway_path() -> String {
  "/ws/trades".to_string()
}

fn default_gateway_batch() -> usize {
  10
}

fn default_processor_batch() -> usize {
  1
}

fn default_block_ms() -> u64 {
  1000
}

fn default_checkpoint_every() -> u64 {
  100
}

fn default_ingest_url() -> String {
  "wss://stream.binance.com:9443/ws/btcusdt@trade".to_string()
}

fn default_reconnect_secs() -> u64 {
  5
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
