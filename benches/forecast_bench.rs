//! Forecast Hot-Path Benchmarks
//!
//! Benchmarks the per-event domain work done for every trade a session
//! or the processor handles: window update, feature resolution,
//! prediction and frame encoding.
//!
//! Run with: cargo bench --bench forecast_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use orderflow_forecast::domain::entry::{EntryId, EntryPayload, FeatureRecord, StreamEntry};
use orderflow_forecast::domain::features::FeatureVector;
use orderflow_forecast::domain::frame::ForecastFrame;
use orderflow_forecast::domain::ofi::OfiWindow;
use orderflow_forecast::domain::predictor::{heuristic, Estimator, ModelArtifact, Predictor};
use orderflow_forecast::domain::trade::{normalize, RawTradeEvent, Trade, TradeSide};
use orderflow_forecast::domain::RawEntry;

fn sample_trade() -> Trade {
    Trade::new(1_700_000_000_000, 64_000.42, 0.012, TradeSide::Buy).unwrap()
}

/// Benchmark a full window update at the default capacity.
fn bench_ofi_observe(c: &mut Criterion) {
    let mut window = OfiWindow::new(100);
    let mut i = 0u64;

    c.bench_function("ofi_window_observe", |b| {
        b.iter(|| {
            i += 1;
            let side = if i % 3 == 0 { TradeSide::Sell } else { TradeSide::Buy };
            black_box(window.observe(black_box(side)));
        });
    });
}

/// Benchmark raw exchange message → normalized trade.
fn bench_normalize(c: &mut Criterion) {
    let msg = r#"{"e":"trade","E":1700000000001,"s":"BTCUSDT","t":12345,"p":"64000.42","q":"0.012","T":1700000000000,"m":false}"#;

    c.bench_function("normalize_binance_trade", |b| {
        b.iter(|| {
            let raw = RawTradeEvent::from_json(black_box(msg)).unwrap_or_default();
            let _trade = normalize(&raw);
        });
    });
}

/// Benchmark stream entry decode from its field map.
fn bench_entry_decode(c: &mut Criterion) {
    let payload = EntryPayload::Feature(FeatureRecord {
        trade: sample_trade(),
        ofi: 0.35,
    });
    let raw = RawEntry {
        id: EntryId::new(1_700_000_000_000, 0),
        fields: payload.to_fields(),
    };

    c.bench_function("stream_entry_decode", |b| {
        b.iter(|| {
            let _entry = StreamEntry::try_from(black_box(&raw));
        });
    });
}

/// Benchmark feature resolution plus both predictor variants.
fn bench_predict(c: &mut Criterion) {
    let trade = sample_trade();
    let model = Predictor::Model(ModelArtifact {
        estimator: Estimator::LogisticRegression {
            coefficients: vec![0.8, 0.1, 1.5],
            intercept: -0.02,
        },
        feature_cols: vec!["qty".to_string(), "side".to_string(), "ofi".to_string()],
    });

    c.bench_function("resolve_and_predict_heuristic", |b| {
        b.iter(|| {
            let features = FeatureVector::resolve(&trade, black_box(Some(0.35)), None);
            black_box(heuristic(&features));
        });
    });

    c.bench_function("resolve_and_predict_model", |b| {
        b.iter(|| {
            let features = FeatureVector::resolve(&trade, black_box(None), black_box(Some(-0.2)));
            let _prediction = model.predict(&features);
        });
    });
}

/// Benchmark frame JSON encoding.
fn bench_frame_json(c: &mut Criterion) {
    let features = FeatureVector::resolve(&sample_trade(), Some(0.35), None);
    let prediction = heuristic(&features);
    let frame = ForecastFrame::new(EntryId::new(1_700_000_000_000, 7), &features, &prediction);

    c.bench_function("forecast_frame_to_json", |b| {
        b.iter(|| {
            let _json = black_box(&frame).to_json();
        });
    });
}

criterion_group!(
    benches,
    bench_ofi_observe,
    bench_normalize,
    bench_entry_decode,
    bench_predict,
    bench_frame_json,
);
criterion_main!(benches);
