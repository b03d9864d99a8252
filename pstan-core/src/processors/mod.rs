//! Concrete pipeline stages.
//!
//! Every stage implements [`Processor`](crate::processor::Processor). The
//! canonical order is base → volume → rsi → macd → boll → atr → pressure →
//! signals; volume, atr, pressure and signals read columns written by earlier
//! stages and fail with `MissingColumn` when run out of order.

pub mod atr;
pub mod base;
pub mod boll;
pub mod macd;
pub mod pressure;
pub mod rsi;
pub mod signals;
pub mod volume;

pub use atr::Atr;
pub use base::Base;
pub use boll::Boll;
pub use macd::Macd;
pub use pressure::Pressure;
pub use rsi::Rsi;
pub use signals::{SignalHit, Signals};
pub use volume::Volume;

/// Default window shared by every stage.
pub const DEFAULT_WINDOW: usize = 16;

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open, close) + 1,
/// low = min(open, close) - 1, volume = 1000, one bar per hour.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(4, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Table from [`make_bars`].
#[cfg(test)]
pub fn make_table(closes: &[f64]) -> crate::table::Table {
    crate::table::Table::from_bars(&make_bars(closes)).unwrap()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for stage tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
