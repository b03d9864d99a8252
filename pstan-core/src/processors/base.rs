//! Base: the feature vocabulary every later stage builds on.
//!
//! Session mask, smoothed volume, candle geometry, support/resistance, gaps,
//! money flow, high-of-day breaks and green streaks. Reads raw OHLCV only.
//!
//! Raw `Volume` is left untouched; its 2-bar rolling mean `Volume_smooth` is
//! the volume every later stage works with.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{
    and, diff, fill_nan, gt, lt, normalize, normalize_signed, pct_change, ratio_or_nan,
    rolling_max, rolling_mean, rolling_min, rolling_sum, running_max, shift,
};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &["Open", "High", "Low", "Close", "Volume"];

const OUTPUTS: &[&str] = &[
    "Volume_smooth",
    "Volume_n",
    "Close_n",
    "Close_pct_change",
    "Close_roll",
    "Price_efficiency",
    "Close_roc_fast",
    "Close_roc_slow",
    "Is_regular_hours",
    "Is_prepost",
    "Volume_valid",
    "Gain_n",
    "Range_pct",
    "Gain_close_ratio",
    "Gain",
    "Range",
    "Typical_price",
    "Distance_to_resistance",
    "Distance_to_support",
    "Resistance",
    "Support",
    "Gap_up",
    "Big_gap_up",
    "Big_gap_down",
    "Gap",
    "Gap_pct",
    "Money_flow_ratio",
    "Money_flow",
    "HOD",
    "New_HOD",
    "HOD_break",
    "Spike_momentum",
    "Green_streak",
];

/// Gap above the prior close counted as a gap up.
const GAP_UP_PCT: f64 = 0.01;
/// Gap that usually comes from a pre/post-market move.
const BIG_GAP_PCT: f64 = 0.10;
/// Green bars in a row that count as momentum.
const SPIKE_STREAK: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct Base {
    window: usize,
    efficiency_period: usize,
}

impl Base {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "Base window must be >= 2");
        Self {
            window,
            efficiency_period: window,
        }
    }

    /// Override the efficiency-ratio lookback (defaults to the window).
    pub fn with_efficiency_period(mut self, period: usize) -> Self {
        assert!(period >= 1, "efficiency period must be >= 1");
        self.efficiency_period = period;
        self
    }

    pub fn efficiency_period(&self) -> usize {
        self.efficiency_period
    }
}

/// |net change over `period`| / sum of |bar-to-bar changes| over `period`.
/// NaN when the path length is zero.
pub fn efficiency_ratio(values: &[f64], period: usize) -> Vec<f64> {
    let net = pct_free_change(values, period);
    let path = rolling_sum(
        &diff(values).iter().map(|d| d.abs()).collect::<Vec<_>>(),
        period,
    );
    net.iter()
        .zip(&path)
        .map(|(&n, &p)| ratio_or_nan(n.abs(), p))
        .collect()
}

fn pct_free_change(values: &[f64], period: usize) -> Vec<f64> {
    let prev = shift(values, period);
    values.iter().zip(&prev).map(|(x, p)| x - p).collect()
}

/// Consecutive bars with `Gain > 0`; resets to 0 on any other bar.
pub fn green_streak(gain: &[f64]) -> Vec<f64> {
    let mut streak = 0.0;
    gain.iter()
        .map(|&g| {
            streak = if g > 0.0 { streak + 1.0 } else { 0.0 };
            streak
        })
        .collect()
}

impl Processor for Base {
    fn kind(&self) -> StageKind {
        StageKind::Base
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
        let open = table.numeric(stage, "Open")?;
        let high = table.numeric(stage, "High")?;
        let low = table.numeric(stage, "Low")?;
        let close = table.numeric(stage, "Close")?;
        let volume_raw = table.numeric(stage, "Volume")?;
        let n = table.height();
        let w = self.window;

        let volume = rolling_mean(&volume_raw, 2);

        let regular: Vec<bool> = volume_raw.iter().map(|&v| v > 0.0).collect();
        let volume_valid: Vec<f64> = volume
            .iter()
            .zip(&regular)
            .map(|(&v, &r)| if r && v != 0.0 { v } else { f64::NAN })
            .collect();

        // Candle geometry
        let gain: Vec<f64> = (0..n).map(|i| close[i] - open[i]).collect();
        let range: Vec<f64> = (0..n).map(|i| high[i] - low[i]).collect();
        let typical: Vec<f64> = (0..n)
            .map(|i| (high[i] + low[i] + close[i]) / 3.0)
            .collect();

        // Support / resistance
        let resistance = rolling_max(&high, w * 2);
        let support = rolling_min(&low, w * 2);

        // Gaps
        let prev_close = shift(&close, 1);
        let gap: Vec<f64> = (0..n).map(|i| open[i] - prev_close[i]).collect();
        let gap_pct: Vec<f64> = (0..n).map(|i| gap[i] / prev_close[i]).collect();

        // Money flow
        let valid_filled = fill_nan(&volume_valid, 0.0);
        let money_flow: Vec<f64> = (0..n).map(|i| typical[i] * valid_filled[i]).collect();
        let money_flow_avg = rolling_mean(&money_flow, w);

        // High of day
        let hod = running_max(&high);
        let prev_hod = shift(&hod, 1);
        let new_hod: Vec<Option<bool>> = (0..n)
            .map(|i| {
                if high[i].is_nan() || prev_hod[i].is_nan() {
                    None
                } else {
                    Some(high[i] >= prev_hod[i])
                }
            })
            .collect();

        let hod_break: Vec<Option<bool>> = (0..n)
            .map(|i| and(new_hod[i], gt(close[i], open[i])))
            .collect();

        let streak = green_streak(&gain);

        let mut out = NewColumns::new();
        out.numeric("Volume_smooth", volume.clone());
        out.numeric("Volume_n", normalize(&volume));
        out.numeric("Close_n", normalize(&close));
        out.numeric("Close_pct_change", fill_nan(&pct_change(&close, 1), 0.0));
        out.numeric("Close_roll", rolling_mean(&close, w));
        out.numeric(
            "Price_efficiency",
            efficiency_ratio(&close, self.efficiency_period),
        );
        out.numeric("Close_roc_fast", pct_change(&close, (w / 2).max(1)));
        out.numeric("Close_roc_slow", pct_change(&close, w * 2));
        out.flag("Is_regular_hours", regular.iter().map(|&r| Some(r)).collect());
        out.flag("Is_prepost", regular.iter().map(|&r| Some(!r)).collect());
        out.numeric("Volume_valid", volume_valid);
        out.numeric("Gain_n", normalize_signed(&gain));
        out.numeric("Range_pct", (0..n).map(|i| range[i] / close[i]).collect());
        out.numeric(
            "Gain_close_ratio",
            (0..n).map(|i| gain[i] / close[i]).collect(),
        );
        out.numeric("Gain", gain);
        out.numeric("Range", range);
        out.numeric("Typical_price", typical);
        out.numeric(
            "Distance_to_resistance",
            (0..n).map(|i| (resistance[i] - close[i]) / close[i]).collect(),
        );
        out.numeric(
            "Distance_to_support",
            (0..n).map(|i| (close[i] - support[i]) / close[i]).collect(),
        );
        out.numeric("Resistance", resistance);
        out.numeric("Support", support);
        out.flag("Gap_up", gap_pct.iter().map(|&g| gt(g, GAP_UP_PCT)).collect());
        out.flag(
            "Big_gap_up",
            gap_pct.iter().map(|&g| gt(g, BIG_GAP_PCT)).collect(),
        );
        out.flag(
            "Big_gap_down",
            gap_pct.iter().map(|&g| lt(g, -BIG_GAP_PCT)).collect(),
        );
        out.numeric("Gap", gap);
        out.numeric("Gap_pct", gap_pct);
        out.numeric(
            "Money_flow_ratio",
            (0..n)
                .map(|i| ratio_or_nan(money_flow[i], money_flow_avg[i]))
                .collect(),
        );
        out.numeric("Money_flow", money_flow);
        out.numeric("HOD", hod);
        out.flag("New_HOD", new_hod);
        out.flag("HOD_break", hod_break);
        out.flag(
            "Spike_momentum",
            streak.iter().map(|&s| Some(s >= SPIKE_STREAK)).collect(),
        );
        out.numeric("Green_streak", streak);

        table.extend(stage, out)
    }

    fn summary(&self, table: &Table) -> Option<String> {
        let regular = table.flags(self.kind().as_str(), "Is_regular_hours").ok()?;
        let session = regular.iter().filter(|r| **r == Some(true)).count();
        Some(format!(
            "{session} regular-hours bars, {} pre/post bars",
            regular.len() - session
        ))
    }
}
