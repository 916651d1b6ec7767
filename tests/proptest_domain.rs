//! Property-Based Tests - Domain Layer Invariants
//!
//! Uses `proptest` to verify that the OFI window, feature resolution and
//! the predictors hold their invariants across random inputs.

use proptest::prelude::*;

use orderflow_forecast::domain::entry::{Cursor, EntryId};
use orderflow_forecast::domain::features::FeatureVector;
use orderflow_forecast::domain::ofi::OfiWindow;
use orderflow_forecast::domain::predictor::{heuristic, Estimator, ModelArtifact, Predictor};
use orderflow_forecast::domain::trade::{normalize, RawTradeEvent, Trade, TradeSide};

fn side() -> impl Strategy<Value = TradeSide> {
    prop_oneof![Just(TradeSide::Buy), Just(TradeSide::Sell)]
}

fn trade() -> impl Strategy<Value = Trade> {
    (0u64..2_000_000_000_000, 0.01f64..1_000_000.0, 0.0f64..10_000.0, side())
        .prop_map(|(ts, price, qty, side)| Trade::new(ts, price, qty, side).unwrap())
}

// ── OFI Window Properties ───────────────────────────────────

proptest! {
    /// OFI stays in [-1, 1] and the window never exceeds its capacity.
    #[test]
    fn ofi_bounded_and_window_capped(
        capacity in 1usize..64,
        sides in prop::collection::vec(side(), 0..300),
    ) {
        let mut window = OfiWindow::new(capacity);
        for s in sides {
            let ofi = window.observe(s);
            prop_assert!((-1.0..=1.0).contains(&ofi), "OFI out of range: {ofi}");
            prop_assert!(window.len() <= capacity);
        }
    }

    /// A window holding only one side reads exactly ±1.
    #[test]
    fn one_sided_window_is_extreme(capacity in 1usize..64, n in 1usize..200) {
        let mut buys = OfiWindow::new(capacity);
        let mut sells = OfiWindow::new(capacity);
        for _ in 0..n {
            buys.observe(TradeSide::Buy);
            sells.observe(TradeSide::Sell);
        }
        prop_assert_eq!(buys.ofi(), 1.0);
        prop_assert_eq!(sells.ofi(), -1.0);
    }

    /// Only the last `capacity` sides count.
    #[test]
    fn window_forgets_evicted_sides(
        capacity in 1usize..32,
        prefix in prop::collection::vec(side(), 0..100),
        tail in prop::collection::vec(side(), 32..64),
    ) {
        let mut window = OfiWindow::new(capacity);
        for s in prefix.iter().chain(tail.iter()) {
            window.observe(*s);
        }
        let kept = &tail[tail.len() - capacity..];
        let buys = kept.iter().filter(|s| **s == TradeSide::Buy).count() as f64;
        let expected = (2.0 * buys - capacity as f64) / capacity as f64;
        prop_assert!((window.ofi() - expected).abs() < 1e-12);
    }
}

#[test]
fn empty_window_reads_zero() {
    assert_eq!(OfiWindow::new(10).ofi(), 0.0);
}

// ── Feature / Predictor Properties ──────────────────────────

proptest! {
    /// Heuristic probabilities are complementary and inside [0, 1].
    #[test]
    fn heuristic_probabilities_complementary(
        t in trade(),
        upstream in prop::option::of(-1.0f64..=1.0),
        local in prop::option::of(-1.0f64..=1.0),
    ) {
        let features = FeatureVector::resolve(&t, upstream, local);
        let p = heuristic(&features);
        prop_assert!((0.0..=1.0).contains(&p.prob_up));
        prop_assert!((0.0..=1.0).contains(&p.prob_down));
        prop_assert!((p.prob_up + p.prob_down - 1.0).abs() < 1e-12);
    }

    /// Non-zero upstream OFI always wins over the local window.
    #[test]
    fn upstream_ofi_takes_precedence(
        t in trade(),
        upstream in prop_oneof![-1.0f64..-0.001, 0.001f64..1.0],
        local in prop::option::of(-1.0f64..=1.0),
    ) {
        let features = FeatureVector::resolve(&t, Some(upstream), local);
        prop_assert_eq!(features.ofi, upstream);
    }

    /// Heuristic leans with the order flow direction.
    #[test]
    fn heuristic_follows_flow_sign(t in trade(), ofi in 0.001f64..1.0) {
        let up = heuristic(&FeatureVector::resolve(&t, Some(ofi), None));
        let down = heuristic(&FeatureVector::resolve(&t, Some(-ofi), None));
        prop_assert!(up.prob_up > 0.5);
        prop_assert!(down.prob_up < 0.5);
    }

    /// A valid logistic model always yields complementary probabilities.
    #[test]
    fn model_probabilities_complementary(
        t in trade(),
        ofi in -1.0f64..=1.0,
        w_ofi in -10.0f64..10.0,
        w_side in -10.0f64..10.0,
        intercept in -5.0f64..5.0,
    ) {
        let artifact = ModelArtifact {
            estimator: Estimator::LogisticRegression {
                coefficients: vec![w_ofi, w_side],
                intercept,
            },
            feature_cols: vec!["ofi".to_string(), "side".to_string()],
        };
        prop_assert!(artifact.validate().is_ok());
        let p = Predictor::Model(artifact)
            .predict(&FeatureVector::resolve(&t, Some(ofi), None))
            .unwrap();
        prop_assert!((0.0..=1.0).contains(&p.prob_up));
        prop_assert!((p.prob_up + p.prob_down - 1.0).abs() < 1e-12);
    }
}

// ── Normalization / Cursor Properties ───────────────────────

proptest! {
    /// Buyer-is-maker maps to a sell, otherwise a buy.
    #[test]
    fn normalize_maps_maker_flag(
        ts in 0u64..2_000_000_000_000,
        price in 0.01f64..1_000_000.0,
        qty in 0.0f64..10_000.0,
        maker in any::<bool>(),
    ) {
        let json = format!(r#"{{"T":{ts},"p":"{price}","q":"{qty}","m":{maker}}}"#);
        let t = normalize(&RawTradeEvent::from_json(&json).unwrap()).unwrap();
        let expected = if maker { TradeSide::Sell } else { TradeSide::Buy };
        prop_assert_eq!(t.side, expected);
        prop_assert_eq!(t.ts, ts);
        prop_assert_eq!(t.price, price);
        prop_assert_eq!(t.qty, qty);
    }

    /// A cursor only ever moves forward.
    #[test]
    fn cursor_monotonic(ids in prop::collection::vec((0u64..1000, 0u64..5), 1..50)) {
        let mut cursor = Cursor::beginning("trades");
        for (ms, seq) in ids {
            let before = cursor.last();
            cursor.advance(EntryId::new(ms, seq));
            if let Some(prev) = before {
                prop_assert!(cursor.last().unwrap() >= prev);
            }
        }
    }
}
