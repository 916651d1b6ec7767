//! Order-flow Forecast Service - Entry Point
//!
//! Wiring sequence:
//! 1. Load config (FORECAST_CONFIG / config.toml / defaults) + validate
//! 2. Init tracing (JSON structured logging unless disabled)
//! 3. Spawn Prometheus metrics and health servers
//! 4. Open the stream transport (Redis or in-memory) and probe it
//! 5. Load the predictor (model artifact or heuristic) + model watcher
//! 6. Spawn Binance feed → trade ingest
//! 7. Spawn the batch feature processor
//! 8. Spawn the WebSocket forecast gateway
//! 9. Wait for SIGINT → broadcast shutdown → drain tasks

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use orderflow_forecast::adapters::feeds::BinanceTradeFeed;
use orderflow_forecast::adapters::gateway::GatewayServer;
use orderflow_forecast::adapters::metrics::{ForecastMetrics, HealthServer, HealthState};
use orderflow_forecast::adapters::persistence::{FileModelStore, RepositoryImpl};
use orderflow_forecast::adapters::stream::{InMemoryStreamLog, RedisConnector};
use orderflow_forecast::config::{self, AppConfig, ServiceConfig, TransportBackend};
use orderflow_forecast::ports::{LogConnector, Repository, StreamLog, Telemetry};
use orderflow_forecast::usecases::{
    FeatureProcessor, ModelWatcher, PredictorService, ProcessorSettings,
    SessionSettings, TradeIngestor,
};

/// Capacity of the feed → ingest channel.
const FEED_BUFFER: usize = 4096;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config = config::loader::load_from_env().context("Failed to load configuration")?;

    // ── 2. Initialize structured logging ────────────────────
    init_tracing(&config.service);

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.transport.backend,
        "Starting order-flow forecast service"
    );

    // ── 3. Shutdown channel, metrics and health ─────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let metrics = Arc::new(ForecastMetrics::new().context("Failed to register metrics")?);
    let health = HealthState::new();

    let mut handles = Vec::new();
    if config.metrics.enabled {
        let metrics_ref = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(bind, rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }));

        let server = HealthServer::new(health.clone(), config.metrics.health_port);
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = server.run(rx).await {
                error!(error = %e, "Health server failed");
            }
        }));
    }

    // ── 4. Select the stream transport ──────────────────────
    let telemetry: Arc<dyn Telemetry> = metrics;
    let result = match config.transport.backend {
        TransportBackend::Redis => {
            let max_block = config.gateway.block().max(config.processor.block());
            let connector = RedisConnector::new(&config.transport.redis_url, max_block)
                .context("Invalid Redis URL")?;
            run_with(Arc::new(connector), &config, telemetry, &health, &shutdown_tx, handles).await
        }
        TransportBackend::Memory => {
            let log = InMemoryStreamLog::with_max_len(config.transport.memory_max_len);
            run_with(Arc::new(log), &config, telemetry, &health, &shutdown_tx, handles).await
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "Service stopped with an error");
    }
    info!("Shutdown complete");
    result
}

fn init_tracing(service: &ServiceConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&service.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if service.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wire every loop against one transport backend and run until SIGINT.
async fn run_with<C: LogConnector>(
    connector: Arc<C>,
    config: &AppConfig,
    telemetry: Arc<dyn Telemetry>,
    health: &HealthState,
    shutdown_tx: &broadcast::Sender<()>,
    mut handles: Vec<JoinHandle<()>>,
) -> Result<()> {
    // ── 4b. Probe the transport ─────────────────────────────
    let probe = connector.open().await.context("Stream transport unreachable")?;
    probe
        .latest_id(&config.transport.trade_stream)
        .await
        .context("Stream transport did not answer")?;
    health.set_transport_ready(true);
    info!("Stream transport ready");

    // ── 5. Predictor and model watcher ──────────────────────
    let predictor = Arc::new(
        PredictorService::load(FileModelStore::new(&config.predictor.artifact_path))
            .context("Model artifact is present but unusable")?,
    );
    telemetry.predictor_active(predictor.source());

    if let Some(interval) = config.predictor.reload_interval() {
        let mut watcher = ModelWatcher::new(Arc::clone(&predictor), Arc::clone(&telemetry), interval);
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move { watcher.run(rx).await }));
    }

    let repo: Arc<dyn Repository> = Arc::new(
        RepositoryImpl::open(&config.service.data_dir, config.ingest.archive_path.as_deref())
            .await
            .context("Failed to open repository")?,
    );

    // ── 6. Binance feed → trade ingest ──────────────────────
    if config.ingest.enabled {
        let (messages_tx, messages_rx) = mpsc::channel(FEED_BUFFER);
        let feed = BinanceTradeFeed::new(
            config.ingest.ws_url.clone(),
            config.ingest.reconnect_delay(),
            messages_tx,
        );
        let rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            if let Err(e) = feed.run(rx).await {
                error!(error = %e, "Binance feed task failed");
            }
        }));

        let archive = config.ingest.archive_path.is_some().then(|| Arc::clone(&repo));
        let ingestor = TradeIngestor::new(
            connector.open().await.context("Failed to open ingest log handle")?,
            config.transport.trade_stream.clone(),
            archive,
            Arc::clone(&telemetry),
        );
        let rx = shutdown_tx.subscribe();
        let health = health.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = ingestor.run(messages_rx, rx).await {
                error!(error = %e, "Trade ingest failed");
                health.set_transport_ready(false);
            }
        }));
    }

    // ── 7. Batch feature processor ──────────────────────────
    if config.processor.enabled {
        let settings = ProcessorSettings {
            trade_stream: config.transport.trade_stream.clone(),
            feature_stream: config.transport.feature_stream.clone(),
            start_from: config.processor.start_from,
            batch_size: config.processor.batch_size,
            block: config.processor.block(),
            window_size: config.features.window_size,
            checkpoint_every: config.processor.checkpoint_every,
        };
        let processor = FeatureProcessor::start(
            connector.open().await.context("Failed to open processor log handle")?,
            Some(Arc::clone(&repo)),
            Arc::clone(&telemetry),
            settings,
        )
        .await?;
        let rx = shutdown_tx.subscribe();
        let health = health.clone();
        handles.push(tokio::spawn(async move {
            match processor.run(rx).await {
                Ok(cursor) => info!(last = ?cursor.last(), "Feature processor stopped"),
                Err(e) => {
                    error!(error = %e, "Feature processor failed");
                    health.set_transport_ready(false);
                }
            }
        }));
    }

    // ── 8. WebSocket forecast gateway ───────────────────────
    if config.gateway.enabled {
        let settings = SessionSettings {
            stream: config.transport.stream_for(config.gateway.source).to_string(),
            start_from: config.gateway.start_from,
            batch_size: config.gateway.batch_size,
            block: config.gateway.block(),
            local_window: config
                .gateway
                .per_connection_ofi
                .then_some(config.features.window_size),
        };
        let server = GatewayServer::new(
            Arc::clone(&connector),
            Arc::clone(&predictor),
            Arc::clone(&telemetry),
            settings,
            config.gateway.path.clone(),
            shutdown_tx.clone(),
        );
        let bind = config.gateway.bind_address.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = server.run(&bind).await {
                error!(error = %e, "Forecast gateway failed");
            }
        }));
    }

    info!(tasks = handles.len(), "All tasks spawned, service is running");

    // ── 9. Wait for SIGINT, then drain ──────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());
    health.set_transport_ready(false);

    for handle in handles {
        if tokio::time::timeout(Duration::from_secs(10), handle).await.is_err() {
            warn!("Task did not stop within 10s");
        }
    }
    Ok(())
}
