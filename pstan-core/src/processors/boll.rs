//! Bollinger Bands, band width and squeeze/breakout flags.
//!
//! Bands use the population standard deviation of Close over the window.
//! A squeeze is a band width below `squeeze_threshold` of its own rolling
//! average.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{gt, lt, ratio_or_nan, rolling_mean, rolling_std};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &["Close"];
const OUTPUTS: &[&str] = &[
    "Boll_h",
    "Boll_m",
    "Boll_l",
    "Boll_w",
    "Boll_w_avg",
    "Boll_squeeze",
    "Boll_breakout_h",
    "Boll_breakout_l",
    "Boll_pct",
];

pub const DEFAULT_SQUEEZE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_NUM_STD: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Boll {
    window: usize,
    squeeze_threshold: f64,
    num_std: f64,
}

impl Boll {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "Boll window must be >= 2");
        Self {
            window,
            squeeze_threshold: DEFAULT_SQUEEZE_THRESHOLD,
            num_std: DEFAULT_NUM_STD,
        }
    }

    pub fn with_squeeze_threshold(mut self, threshold: f64) -> Self {
        assert!(threshold > 0.0, "squeeze threshold must be > 0");
        self.squeeze_threshold = threshold;
        self
    }

    pub fn with_num_std(mut self, num_std: f64) -> Self {
        assert!(num_std > 0.0, "band width must be > 0 standard deviations");
        self.num_std = num_std;
        self
    }
}

impl Processor for Boll {
    fn kind(&self) -> StageKind {
        StageKind::Boll
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
        let n = close.len();
        let w = self.window;

        let mid = rolling_mean(&close, w);
        let std = rolling_std(&close, w, 0);
        let upper: Vec<f64> = (0..n).map(|i| mid[i] + self.num_std * std[i]).collect();
        let lower: Vec<f64> = (0..n).map(|i| mid[i] - self.num_std * std[i]).collect();
        let width: Vec<f64> = (0..n).map(|i| upper[i] - lower[i]).collect();
        let width_avg = rolling_mean(&width, w);

        let squeeze = (0..n)
            .map(|i| lt(width[i], self.squeeze_threshold * width_avg[i]))
            .collect();
        let breakout_h = (0..n).map(|i| gt(close[i], upper[i])).collect();
        let breakout_l = (0..n).map(|i| lt(close[i], lower[i])).collect();
        let pct = (0..n)
            .map(|i| ratio_or_nan(close[i] - lower[i], width[i]))
            .collect();

        let mut out = NewColumns::new();
        out.numeric("Boll_h", upper);
        out.numeric("Boll_m", mid);
        out.numeric("Boll_l", lower);
        out.numeric("Boll_w", width);
        out.numeric("Boll_w_avg", width_avg);
        out.flag("Boll_squeeze", squeeze);
        out.flag("Boll_breakout_h", breakout_h);
        out.flag("Boll_breakout_l", breakout_l);
        out.numeric("Boll_pct", pct);

        table.extend(stage, out)
    }

    fn summary(&self, table: &Table) -> Option<String> {
        let squeezed = table
            .flags(self.kind().as_str(), "Boll_squeeze")
            .ok()?
            .into_iter()
            .filter(|f| *f == Some(true))
            .count();
        Some(format!("{squeezed} squeeze bars"))
    }
}
