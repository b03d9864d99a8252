//! Relative Strength Index at three timeframes.
//!
//! `RSI` uses the stage window, `RSI_fast` half of it and `RSI_slow` double.
//! Average gain and loss are smoothed recursively with alpha = 1/period and
//! reported once `period` observations have been folded in; the undefined
//! first price change counts as a zero observation.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Edge cases: avg_loss == 0 → 100 (the limit); avg_gain == avg_loss == 0 → NaN.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{diff, ewm_min_periods};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &["Close"];
const OUTPUTS: &[&str] = &["RSI", "RSI_fast", "RSI_slow"];

#[derive(Debug, Clone)]
pub struct Rsi {
    window: usize,
}

impl Rsi {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "RSI window must be >= 2");
        Self { window }
    }
}

/// RSI of `close` over `period`.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    let delta = diff(close);
    let gains: Vec<f64> = delta
        .iter()
        .map(|&d| if d > 0.0 { d } else { 0.0 })
        .collect();
    let losses: Vec<f64> = delta
        .iter()
        .map(|&d| if d < 0.0 { -d } else { 0.0 })
        .collect();

    let alpha = 1.0 / period as f64;
    let avg_gain = ewm_min_periods(&gains, alpha, period);
    let avg_loss = ewm_min_periods(&losses, alpha, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| compute_rsi(g, l))
        .collect()
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain.is_nan() || avg_loss.is_nan() {
        f64::NAN
    } else if avg_loss == 0.0 && avg_gain == 0.0 {
        f64::NAN // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl Processor for Rsi {
    fn kind(&self) -> StageKind {
        StageKind::Rsi
    }

    fn window(&self) -> usize {
        self.window
    }

    fn required_columns(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn output_columns(&self) -> &'static [&'static str] {
        OUTPUTS
    }

    fn process(&self, table: &Table) -> Result<Table> {
        self.ensure_inputs(table)?;
        let stage = self.kind().as_str();
        let close = table.numeric(stage, "Close")?;

        let mut out = NewColumns::new();
        out.numeric("RSI", rsi(&close, self.window));
        out.numeric("RSI_fast", rsi(&close, (self.window / 2).max(1)));
        out.numeric("RSI_slow", rsi(&close, self.window * 2));

        table.extend(stage, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{assert_approx, make_table};

    #[test]
    fn rsi_all_gains() {
        let result = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3);
        assert_approx(result[2], 100.0, 1e-6);
        assert_approx(result[5], 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let result = rsi(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0], 3);
        assert_approx(result[2], 0.0, 1e-6);
    }

    #[test]
    fn rsi_mixed() {
        // Changes: +0.34, -0.25, -0.48, +0.72
        // alpha = 1/3, seeded by the zero first observation
        let result = rsi(&[44.0, 44.34, 44.09, 43.61, 44.33], 3);

        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        let ag = (0.34 * (1.0 / 3.0)) * (2.0 / 3.0);
        let al = 0.25 * (1.0 / 3.0);
        assert_approx(result[2], 100.0 - 100.0 / (1.0 + ag / al), 1e-9);
        assert!(result[4] > result[3]);
    }

    #[test]
    fn rsi_flat_is_undefined() {
        let result = rsi(&[100.0; 10], 3);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_bounds() {
        let result = rsi(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0], 3);
        for (i, &v) in result.iter().enumerate() {
            if !v.is_nan() {
                assert!(
                    (0.0..=100.0).contains(&v),
                    "RSI out of bounds at bar {i}: {v}"
                );
            }
        }
    }

    #[test]
    fn rsi_window_boundary() {
        let short = rsi(&[1.0, 2.0, 1.5], 4);
        assert!(short.iter().all(|v| v.is_nan()));
        let exact = rsi(&[1.0, 2.0, 1.5, 2.5], 4);
        assert!(exact[..3].iter().all(|v| v.is_nan()));
        assert!(!exact[3].is_nan());
    }

    #[test]
    fn three_timeframes() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let out = Rsi::new(8).process(&make_table(&closes)).unwrap();
        let main = out.numeric("t", "RSI").unwrap();
        let fast = out.numeric("t", "RSI_fast").unwrap();
        let slow = out.numeric("t", "RSI_slow").unwrap();
        assert!(fast[3].is_finite() && main[3].is_nan());
        assert!(main[7].is_finite() && slow[7].is_nan());
        assert!(slow[15].is_finite());
    }
}
