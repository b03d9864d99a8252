//! MACD with a long-horizon trend filter.
//!
//! Spans scale with the stage window: fast w/2, slow 2w, signal w, trend 10w.
//! The buy signal is the histogram turning positive while both lines are
//! still below zero and price sits above the long trend average.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{and, ewm, gt, lt, span_alpha};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &["Close"];
const OUTPUTS: &[&str] = &[
    "MACD",
    "MACD_signal",
    "hist_difference",
    "MACD_trend_up",
    "MACD_buy_signal",
];

#[derive(Debug, Clone)]
pub struct Macd {
    window: usize,
}

impl Macd {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "MACD window must be >= 2");
        Self { window }
    }
}

/// Exponential moving average with span-based smoothing.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    ewm(values, span_alpha(span.max(1)))
}

/// Histogram crosses from ≤ 0 to > 0 on this bar.
fn crossed_up(hist: &[f64], i: usize) -> Option<bool> {
    if i == 0 {
        return None;
    }
    let was_flat_or_below = gt(hist[i - 1], 0.0).map(|b| !b);
    and(was_flat_or_below, gt(hist[i], 0.0))
}

impl Processor for Macd {
    fn kind(&self) -> StageKind {
        StageKind::Macd
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
        let w = self.window;

        let fast = ema(&close, w / 2);
        let slow = ema(&close, w * 2);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema(&macd, w);
        let hist: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
        let trend = ema(&close, w * 10);
        let trend_up: Vec<Option<bool>> =
            close.iter().zip(&trend).map(|(&c, &t)| gt(c, t)).collect();

        let buy: Vec<Option<bool>> = (0..close.len())
            .map(|i| {
                [
                    lt(macd[i], 0.0),
                    lt(signal[i], 0.0),
                    trend_up[i],
                ]
                .into_iter()
                .fold(crossed_up(&hist, i), and)
            })
            .collect();

        let mut out = NewColumns::new();
        out.numeric("MACD", macd);
        out.numeric("MACD_signal", signal);
        out.numeric("hist_difference", hist);
        out.flag("MACD_trend_up", trend_up);
        out.flag("MACD_buy_signal", buy);

        table.extend(stage, out)
    }

    fn summary(&self, table: &Table) -> Option<String> {
        let buys = table
            .flags(self.kind().as_str(), "MACD_buy_signal")
            .ok()?
            .into_iter()
            .filter(|f| *f == Some(true))
            .count();
        Some(format!("{buys} MACD buy crossovers"))
    }
}
