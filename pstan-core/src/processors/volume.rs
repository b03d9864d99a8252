//! Volume: volume abnormality measured only over regular-hours bars.
//!
//! The EWMA baseline is folded over `Volume_valid`, so pre/post bars neither
//! drag the baseline down nor leave a hole in it: the last baseline carries
//! across them. Ratios against that baseline are only reported for
//! regular-hours bars.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{
    diff, ewm, fill_nan, linear_slope, pct_change, ratio_or_nan, rolling, rolling_mean,
    rolling_std, rolling_sum, span_alpha,
};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &[
    "High",
    "Low",
    "Close",
    "Volume_smooth",
    "Volume_valid",
    "Is_regular_hours",
];

const OUTPUTS: &[&str] = &[
    "Volume_ewm",
    "Volume_ratio",
    "Volume_pct_change",
    "Volume_pct_change_regular",
    "Volume_acceleration",
    "Volume_elevated_count",
    "Volume_trend",
    "Volume_ratio_fast",
    "Volume_ratio_slow",
    "Volume_momentum_norm",
    "Volume_sentiment",
    "Volume_confirmable",
    "OBV",
    "OBV_change",
];

/// Ratio above which a bar counts as elevated volume.
const ELEVATED_RATIO: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Volume {
    window: usize,
}

impl Volume {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "Volume window must be >= 2");
        Self { window }
    }
}

/// 1.0 where the least-squares slope over the window is positive, else 0.0.
pub fn volume_trend(ratio: &[f64], window: usize) -> Vec<f64> {
    rolling(ratio, window, |w| {
        if linear_slope(w) > 0.0 {
            1.0
        } else {
            0.0
        }
    })
}

/// Cumulative sum of `sign(ΔClose) × volume`; undefined terms add nothing.
pub fn on_balance_volume(close: &[f64], volume_valid: &[f64]) -> Vec<f64> {
    let delta = diff(close);
    let mut total = 0.0;
    delta
        .iter()
        .zip(volume_valid)
        .map(|(&d, &v)| {
            let step = d.signum() * v;
            if !step.is_nan() && d != 0.0 {
                total += step;
            }
            total
        })
        .collect()
}

impl Processor for Volume {
    fn kind(&self) -> StageKind {
        StageKind::Volume
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
        let volume = table.numeric(stage, "Volume_smooth")?;
        let volume_valid = table.numeric(stage, "Volume_valid")?;
        let regular: Vec<bool> = table
            .flags(stage, "Is_regular_hours")?
            .into_iter()
            .map(|r| r == Some(true))
            .collect();
        let n = table.height();
        let w = self.window;

        let baseline = ewm(&volume_valid, span_alpha(w));
        let ratio: Vec<f64> = (0..n)
            .map(|i| {
                if regular[i] {
                    ratio_or_nan(volume[i], baseline[i])
                } else {
                    f64::NAN
                }
            })
            .collect();

        let pct = fill_nan(&pct_change(&volume, 1), 0.0);
        let pct_regular: Vec<f64> = (0..n)
            .map(|i| if regular[i] { pct[i] } else { f64::NAN })
            .collect();

        let elevated: Vec<f64> = ratio
            .iter()
            .map(|&r| if r > ELEVATED_RATIO { 1.0 } else { 0.0 })
            .collect();

        let fast = ewm(&volume, span_alpha((w / 2).max(1)));
        let slow = ewm(&volume, span_alpha(w * w));

        let mean = rolling_mean(&volume, w);
        let std = rolling_std(&volume, w, 1);
        let zscore: Vec<f64> = (0..n)
            .map(|i| ratio_or_nan(volume[i] - mean[i], std[i]))
            .collect();

        let sentiment: Vec<f64> = (0..n)
            .map(|i| {
                let span = high[i] - low[i];
                if span == 0.0 {
                    0.0
                } else {
                    ((close[i] - low[i]) - (high[i] - close[i])) / span * volume[i]
                }
            })
            .collect();

        let obv = on_balance_volume(&close, &volume_valid);
        let obv_change = fill_nan(&pct_change(&obv, w), 0.0);

        let mut out = NewColumns::new();
        out.numeric("Volume_ewm", baseline.clone());
        out.numeric("Volume_ratio", ratio.clone());
        out.numeric("Volume_pct_change", pct);
        out.numeric("Volume_pct_change_regular", pct_regular);
        out.numeric("Volume_acceleration", diff(&ratio));
        out.numeric("Volume_elevated_count", rolling_sum(&elevated, w));
        out.numeric("Volume_trend", volume_trend(&ratio, w));
        out.numeric(
            "Volume_ratio_fast",
            (0..n).map(|i| ratio_or_nan(volume[i], fast[i])).collect(),
        );
        out.numeric(
            "Volume_ratio_slow",
            (0..n).map(|i| ratio_or_nan(volume[i], slow[i])).collect(),
        );
        out.numeric("Volume_momentum_norm", zscore);
        out.numeric("Volume_sentiment", sentiment);
        out.flag(
            "Volume_confirmable",
            (0..n).map(|i| Some(regular[i] && !ratio[i].is_nan())).collect(),
        );
        out.numeric("OBV", obv);
        out.numeric("OBV_change", obv_change);

        table.extend(stage, out)
    }
}
