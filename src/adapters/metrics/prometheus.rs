//! Prometheus Metrics Registry - Forecast Pipeline Observability
//!
//! Registers and exposes Prometheus metrics at `/metrics`. Covers frames
//! pushed, dropped events, prediction fallbacks, live sessions, ingest
//! and processor throughput, and which predictor variant is active.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::domain::predictor::PredictionSource;
use crate::ports::telemetry::Telemetry;

/// Centralized Prometheus metrics for the forecast service.
///
/// All metrics follow the naming convention `orderflow_forecast_*`.
pub struct ForecastMetrics {
    registry: Registry,
    /// Frames delivered to clients, by prediction source.
    pub frames_pushed: IntCounterVec,
    /// Events dropped as malformed, by consumer (ingest, processor, gateway).
    pub malformed_events: IntCounterVec,
    /// Model predictions that failed and were served by the heuristic.
    pub prediction_fallbacks: IntCounter,
    /// Forecast sessions currently streaming.
    pub active_sessions: IntGauge,
    /// Trades appended to the trade stream by ingest.
    pub trades_ingested: IntCounter,
    /// Feature entries appended by the batch processor.
    pub features_emitted: IntCounter,
    /// Active predictor variant (1 = model, 0 = heuristic).
    pub predictor_model_active: IntGauge,
    /// Time from entry read to frame pushed, in microseconds.
    pub frame_latency_us: Histogram,
}

impl ForecastMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let frames_pushed = IntCounterVec::new(
            Opts::new(
                "orderflow_forecast_frames_pushed_total",
                "Forecast frames delivered to clients",
            ),
            &["source"],
        )?;

        let malformed_events = IntCounterVec::new(
            Opts::new(
                "orderflow_forecast_malformed_events_total",
                "Events skipped because they could not be parsed",
            ),
            &["consumer"],
        )?;

        let prediction_fallbacks = IntCounter::new(
            "orderflow_forecast_prediction_fallbacks_total",
            "Model predictions that failed and fell back to the heuristic",
        )?;

        let active_sessions = IntGauge::new(
            "orderflow_forecast_active_sessions",
            "Forecast sessions currently streaming",
        )?;

        let trades_ingested = IntCounter::new(
            "orderflow_forecast_trades_ingested_total",
            "Normalized trades appended to the trade stream",
        )?;

        let features_emitted = IntCounter::new(
            "orderflow_forecast_features_emitted_total",
            "Feature entries appended to the feature stream",
        )?;

        let predictor_model_active = IntGauge::new(
            "orderflow_forecast_predictor_model_active",
            "Active predictor variant (1=model, 0=heuristic)",
        )?;

        let frame_latency_us = Histogram::with_opts(
            HistogramOpts::new(
                "orderflow_forecast_frame_latency_us",
                "Entry read to frame pushed, in microseconds",
            )
            .buckets(vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 20000.0]),
        )?;

        registry.register(Box::new(frames_pushed.clone()))?;
        registry.register(Box::new(malformed_events.clone()))?;
        registry.register(Box::new(prediction_fallbacks.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;
        registry.register(Box::new(trades_ingested.clone()))?;
        registry.register(Box::new(features_emitted.clone()))?;
        registry.register(Box::new(predictor_model_active.clone()))?;
        registry.register(Box::new(frame_latency_us.clone()))?;

        Ok(Self {
            registry,
            frames_pushed,
            malformed_events,
            prediction_fallbacks,
            active_sessions,
            trades_ingested,
            features_emitted,
            predictor_model_active,
            frame_latency_us,
        })
    }

    /// Record which predictor variant is active.
    pub fn set_predictor(&self, source: PredictionSource) {
        self.predictor_model_active
            .set(i64::from(source == PredictionSource::Model));
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    metrics
                        .render()
                        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

impl Telemetry for ForecastMetrics {
    #[allow(clippy::cast_precision_loss)]
    fn frame_pushed(&self, source: PredictionSource, latency: Duration) {
        self.frames_pushed.with_label_values(&[source.as_str()]).inc();
        self.frame_latency_us.observe(latency.as_micros() as f64);
    }

    fn malformed_event(&self, consumer: &'static str) {
        self.malformed_events.with_label_values(&[consumer]).inc();
    }

    fn prediction_fallback(&self) {
        self.prediction_fallbacks.inc();
    }

    fn session_opened(&self) {
        self.active_sessions.inc();
    }

    fn session_closed(&self) {
        self.active_sessions.dec();
    }

    fn trade_ingested(&self) {
        self.trades_ingested.inc();
    }

    fn feature_emitted(&self) {
        self.features_emitted.inc();
    }

    fn predictor_active(&self, source: PredictionSource) {
        self.set_predictor(source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_metrics() {
        let metrics = ForecastMetrics::new().unwrap();
        metrics.frames_pushed.with_label_values(&["heuristic"]).inc();
        metrics.set_predictor(PredictionSource::Model);

        let text = metrics.render().unwrap();
        assert!(text.contains("orderflow_forecast_frames_pushed_total{source=\"heuristic\"} 1"));
        assert!(text.contains("orderflow_forecast_predictor_model_active 1"));
    }

    #[test]
    fn test_telemetry_hooks() {
        let metrics = ForecastMetrics::new().unwrap();
        metrics.session_opened();
        metrics.session_opened();
        metrics.session_closed();
        metrics.malformed_event("gateway");
        metrics.frame_pushed(PredictionSource::Model, Duration::from_micros(42));

        assert_eq!(metrics.active_sessions.get(), 1);
        assert_eq!(metrics.malformed_events.with_label_values(&["gateway"]).get(), 1);
        assert_eq!(metrics.frames_pushed.with_label_values(&["model"]).get(), 1);
        assert_eq!(metrics.frame_latency_us.get_sample_count(), 1);
    }
}
