//! Average True Range, volatility compression and range breaks.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{and, diff, gt, lt, ratio_or_nan, rolling_mean};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &["High", "Low", "Close", "Gain"];
const OUTPUTS: &[&str] = &[
    "TR",
    "ATR",
    "ATR_pct",
    "ATR_trend",
    "ATR_compression",
    "ATR_break",
];

pub const DEFAULT_COMPRESSION_THRESHOLD: f64 = 0.8;
pub const DEFAULT_BREAK_THRESHOLD: f64 = 1.9;

#[derive(Debug, Clone)]
pub struct Atr {
    window: usize,
    compression_threshold: f64,
    break_threshold: f64,
}

impl Atr {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "ATR window must be >= 2");
        Self {
            window,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            break_threshold: DEFAULT_BREAK_THRESHOLD,
        }
    }

    pub fn with_compression_threshold(mut self, threshold: f64) -> Self {
        assert!(threshold > 0.0, "compression threshold must be > 0");
        self.compression_threshold = threshold;
        self
    }

    pub fn with_break_threshold(mut self, threshold: f64) -> Self {
        assert!(threshold > 0.0, "break threshold must be > 0");
        self.break_threshold = threshold;
        self
    }
}

/// True range: max(H − L, |H − prevC|, |L − prevC|).
///
/// The first bar, or any bar whose previous close is undefined, falls back
/// to H − L.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..high.len())
        .map(|i| {
            let hl = high[i] - low[i];
            if i == 0 {
                return hl;
            }
            let prev = close[i - 1];
            // f64::max skips a NaN operand
            hl.max((high[i] - prev).abs()).max((low[i] - prev).abs())
        })
        .collect()
}

impl Processor for Atr {
    fn kind(&self) -> StageKind {
        StageKind::Atr
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
        let high = table.numeric(stage, "High")?;
        let low = table.numeric(stage, "Low")?;
        let close = table.numeric(stage, "Close")?;
        let gain = table.numeric(stage, "Gain")?;
        let n = close.len();

        let tr = true_range(&high, &low, &close);
        let atr = rolling_mean(&tr, self.window);
        let atr_avg = rolling_mean(&atr, self.window);

        let compression = (0..n)
            .map(|i| lt(atr[i], self.compression_threshold * atr_avg[i]))
            .collect();
        let breaks = (0..n)
            .map(|i| {
                and(
                    gt(gain[i], 0.0),
                    gt(gain[i], self.break_threshold * atr[i]),
                )
            })
            .collect();

        let pct = (0..n).map(|i| ratio_or_nan(atr[i], close[i])).collect();
        let trend = diff(&atr);

        let mut out = NewColumns::new();
        out.numeric("TR", tr);
        out.numeric("ATR", atr);
        out.numeric("ATR_pct", pct);
        out.numeric("ATR_trend", trend);
        out.flag("ATR_compression", compression);
        out.flag("ATR_break", breaks);

        table.extend(stage, out)
    }

    fn summary(&self, table: &Table) -> Option<String> {
        let breaks = table
            .flags(self.kind().as_str(), "ATR_break")
            .ok()?
            .into_iter()
            .filter(|f| *f == Some(true))
            .count();
        Some(format!("{breaks} range breaks"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{assert_approx, make_table, Base, DEFAULT_EPSILON};

    fn with_base(closes: &[f64]) -> Table {
        Base::new(2).process(&make_table(closes)).unwrap()
    }

    #[test]
    fn true_range_uses_previous_close() {
        let tr = true_range(&[12.0, 15.0, 11.0], &[9.0, 13.0, 8.0], &[10.0, 14.0, 9.0]);
        assert_approx(tr[0], 3.0, DEFAULT_EPSILON);
        // |15 - 10| beats 15 - 13
        assert_approx(tr[1], 5.0, DEFAULT_EPSILON);
        // |8 - 14| beats 11 - 8
        assert_approx(tr[2], 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_skips_undefined_previous_close() {
        let tr = true_range(&[12.0, 15.0], &[9.0, 13.0], &[f64::NAN, 14.0]);
        assert_approx(tr[1], 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn requires_gain() {
        let err = Atr::new(3).process(&make_table(&[10.0, 11.0])).unwrap_err();
        match err {
            crate::error::PipelineError::MissingColumn { stage, column } => {
                assert_eq!(stage, "atr");
                assert_eq!(column, "Gain");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn flat_price_never_breaks() {
        let out = Atr::new(3).process(&with_base(&[10.0; 8])).unwrap();
        let atr = out.numeric("t", "ATR").unwrap();
        let brk = out.flags("t", "ATR_break").unwrap();
        assert!(atr[1].is_nan());
        // every bar spans open ± 1
        assert_approx(atr[7], 2.0, DEFAULT_EPSILON);
        assert!(brk.iter().all(|b| *b != Some(true)));
        assert_eq!(brk[7], Some(false));
    }

    #[test]
    fn large_gain_breaks_range() {
        let mut closes = vec![10.0; 8];
        closes.push(20.0);
        let table = with_base(&closes);
        let out = Atr::new(4).process(&table).unwrap();
        let brk = out.flags("t", "ATR_break").unwrap();
        let trend = out.numeric("t", "ATR_trend").unwrap();
        // gain 10 against ATR (2 + 2 + 2 + 12) / 4 = 4.5
        assert_eq!(brk[8], Some(true));
        assert!(trend[8] > 0.0);
        assert_eq!(Atr::new(4).summary(&out).as_deref(), Some("1 range breaks"));
    }

    #[test]
    fn compression_after_quiet_spell() {
        let mut closes = vec![10.0, 20.0, 10.0, 20.0, 10.0];
        closes.extend([10.0; 6]);
        let out = Atr::new(3).process(&with_base(&closes)).unwrap();
        let comp = out.flags("t", "ATR_compression").unwrap();
        let pct = out.numeric("t", "ATR_pct").unwrap();
        assert_eq!(comp[8], Some(true));
        assert!(pct[10] > 0.0);
    }
}
