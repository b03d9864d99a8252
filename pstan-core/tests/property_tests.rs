//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Determinism: the same chain over the same table is bit-identical
//! 2. Column monotonicity: every stage only adds columns, never edits them
//! 3. RSI bound: 0 ≤ RSI ≤ 100 wherever defined
//! 4. Bollinger ordering: Boll_l ≤ Boll_m ≤ Boll_h wherever defined

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use pstan_core::processors::rsi::rsi;
use pstan_core::{Bar, Pipeline, Table};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bar_parts() -> impl Strategy<Value = (f64, f64, f64)> {
    (
        (1.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0),
        0.0..0.05_f64,
        prop_oneof![1 => Just(0.0), 4 => (100.0..10_000.0_f64).prop_map(|v| v.round())],
    )
}

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec(arb_bar_parts(), 5..60).prop_map(|parts| {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(4, 0, 0)
            .unwrap();
        let mut prev_close = parts[0].0;
        parts
            .into_iter()
            .enumerate()
            .map(|(i, (close, wick, volume))| {
                let open = prev_close;
                prev_close = close;
                Bar {
                    timestamp: start + Duration::minutes(i as i64),
                    open,
                    high: open.max(close) * (1.0 + wick),
                    low: open.min(close) * (1.0 - wick),
                    close,
                    volume,
                }
            })
            .collect()
    })
}

fn bits(table: &Table, name: &str) -> Vec<u64> {
    table
        .numeric("test", name)
        .unwrap()
        .iter()
        .map(|v| v.to_bits())
        .collect()
}

// ── 1. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn pipeline_is_deterministic(bars in arb_bars(), window in 2usize..8) {
        let table = Table::from_bars(&bars).unwrap();
        let pipeline = Pipeline::default_chain(window).unwrap();
        let (a, _) = pipeline.run(&table).unwrap();
        let (b, _) = pipeline.run(&table).unwrap();

        prop_assert_eq!(a.column_names(), b.column_names());
        for name in a.column_names().iter().skip(1) {
            prop_assert_eq!(bits(&a, name), bits(&b, name), "column {}", name);
        }
    }
}

// ── 2. Column monotonicity ───────────────────────────────────────────

proptest! {
    #[test]
    fn stages_only_add_columns(bars in arb_bars(), window in 2usize..8) {
        let mut current = Table::from_bars(&bars).unwrap();
        let pipeline = Pipeline::default_chain(window).unwrap();

        for (name, stage) in pipeline.registry().iter() {
            let next = stage.process(&current).unwrap();
            let before = current.column_names();
            let after = next.column_names();

            prop_assert_eq!(&after[..before.len()], &before[..], "stage {}", name);
            prop_assert_eq!(&after[before.len()..], stage.output_columns());
            for column in before.iter().skip(1) {
                prop_assert_eq!(bits(&current, column), bits(&next, column));
            }
            current = next;
        }
    }
}

// ── 3. RSI bound ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_stays_within_bounds(
        closes in prop::collection::vec(0.01..1_000.0_f64, 2..120),
        period in 2usize..30,
    ) {
        for value in rsi(&closes, period).into_iter().filter(|v| !v.is_nan()) {
            prop_assert!((0.0..=100.0).contains(&value), "RSI {}", value);
        }
    }
}

// ── 4. Bollinger ordering ────────────────────────────────────────────

proptest! {
    #[test]
    fn bollinger_bands_are_ordered(bars in arb_bars(), window in 2usize..8) {
        let (out, _) = Pipeline::default_chain(window)
            .unwrap()
            .run(&Table::from_bars(&bars).unwrap())
            .unwrap();
        let h = out.numeric("test", "Boll_h").unwrap();
        let m = out.numeric("test", "Boll_m").unwrap();
        let l = out.numeric("test", "Boll_l").unwrap();

        for i in 0..h.len() {
            if !m[i].is_nan() {
                prop_assert!(l[i] <= m[i] && m[i] <= h[i], "row {}: {} {} {}", i, l[i], m[i], h[i]);
            }
        }
    }
}
