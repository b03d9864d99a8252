//! Final entry signal: a conjunction of volatility, volume, momentum and
//! band conditions computed by the earlier stages.
//!
//! `Signal` is strict: a bar only signals when every term is defined and
//! true. The event-like terms (range break, MACD buy crossover, upper band
//! breakout) only need to have happened somewhere in their lookback window.

use serde::Serialize;

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::{and, diff, gt, rolling_any, rolling_mean};
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &[
    "ATR_break",
    "Volume_ratio_slow",
    "Buy_sell_ratio",
    "RSI",
    "MACD_buy_signal",
    "MACD",
    "Volume_momentum_norm",
    "Boll_breakout_h",
    "Boll_w",
];
const OUTPUTS: &[&str] = &["Signal"];

pub const DEFAULT_VOLUME_RATIO_SLOW_MIN: f64 = 3.0;
pub const DEFAULT_BUY_SELL_RATIO_MIN: f64 = 1.0;
pub const DEFAULT_RSI_MIN: f64 = 60.0;
pub const DEFAULT_VOLUME_ZSCORE_MIN: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Signals {
    window: usize,
    volume_ratio_slow_min: f64,
    buy_sell_ratio_min: f64,
    rsi_min: f64,
    volume_zscore_min: f64,
}

/// One bar on which `Signal` fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalHit {
    pub row: usize,
    pub timestamp: String,
    pub close: f64,
}

impl Signals {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "Signals window must be >= 2");
        Self {
            window,
            volume_ratio_slow_min: DEFAULT_VOLUME_RATIO_SLOW_MIN,
            buy_sell_ratio_min: DEFAULT_BUY_SELL_RATIO_MIN,
            rsi_min: DEFAULT_RSI_MIN,
            volume_zscore_min: DEFAULT_VOLUME_ZSCORE_MIN,
        }
    }

    pub fn with_volume_ratio_slow_min(mut self, min: f64) -> Self {
        self.volume_ratio_slow_min = min;
        self
    }

    pub fn with_buy_sell_ratio_min(mut self, min: f64) -> Self {
        self.buy_sell_ratio_min = min;
        self
    }

    pub fn with_rsi_min(mut self, min: f64) -> Self {
        self.rsi_min = min;
        self
    }

    pub fn with_volume_zscore_min(mut self, min: f64) -> Self {
        self.volume_zscore_min = min;
        self
    }

    /// Rows of an enriched table where `Signal` is true.
    pub fn hits(table: &Table) -> Result<Vec<SignalHit>> {
        let stage = StageKind::Signals.as_str();
        let signal = table.flags(stage, "Signal")?;
        let close = table.numeric(stage, "Close")?;
        signal
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Some(true))
            .map(|(row, _)| {
                Ok(SignalHit {
                    row,
                    timestamp: table.timestamp_label(row)?,
                    close: close[row],
                })
            })
            .collect()
    }

    /// Per-bar conjunction of every term, undefined where any term is.
    fn conditions(&self, table: &Table) -> Result<Vec<Option<bool>>> {
        let stage = self.kind().as_str();
        let w = self.window;

        let atr_break = rolling_any(&table.flags(stage, "ATR_break")?, w);
        let volume_ratio_slow = table.numeric(stage, "Volume_ratio_slow")?;
        let buy_sell = table.numeric(stage, "Buy_sell_ratio")?;
        let rsi = table.numeric(stage, "RSI")?;
        let macd_buy = rolling_any(&table.flags(stage, "MACD_buy_signal")?, w * 2);
        let macd_rising = diff(&table.numeric(stage, "MACD")?);
        let zscore = table.numeric(stage, "Volume_momentum_norm")?;
        let band_break = rolling_any(&table.flags(stage, "Boll_breakout_h")?, w);
        let width_rising = diff(&rolling_mean(&table.numeric(stage, "Boll_w")?, w));

        Ok((0..table.height())
            .map(|i| {
                [
                    gt(volume_ratio_slow[i], self.volume_ratio_slow_min),
                    gt(buy_sell[i], self.buy_sell_ratio_min),
                    gt(rsi[i], self.rsi_min),
                    macd_buy[i],
                    gt(macd_rising[i], 0.0),
                    gt(zscore[i], self.volume_zscore_min),
                    band_break[i],
                    gt(width_rising[i], 0.0),
                ]
                .into_iter()
                .fold(atr_break[i], and)
            })
            .collect())
    }
}

impl Processor for Signals {
    fn kind(&self) -> StageKind {
        StageKind::Signals
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
        let signal = self
            .conditions(table)?
            .into_iter()
            .map(|c| Some(c == Some(true)))
            .collect();

        let mut out = NewColumns::new();
        out.flag("Signal", signal);
        table.extend(self.kind().as_str(), out)
    }

    fn summary(&self, table: &Table) -> Option<String> {
        let hits = Self::hits(table).ok()?;
        Some(format!("{} signal bars", hits.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::processors::make_bars;
    use polars::prelude::*;

    /// Table carrying only the columns the signal stage reads, every term
    /// satisfied on the last row.
    fn primed(n: usize) -> DataFrame {
        let bars = make_bars(&vec![10.0; n]);
        let mut frame = Table::from_bars(&bars).unwrap().into_frame();
        let mut flag_on_last = vec![false; n];
        flag_on_last[n - 1] = true;
        let rising: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let columns: Vec<Series> = vec![
            Series::new("ATR_break".into(), flag_on_last.clone()),
            Series::new("Volume_ratio_slow".into(), vec![4.0; n]),
            Series::new("Buy_sell_ratio".into(), vec![1.5; n]),
            Series::new("RSI".into(), vec![70.0; n]),
            Series::new("MACD_buy_signal".into(), flag_on_last.clone()),
            Series::new("MACD".into(), rising.clone()),
            Series::new("Volume_momentum_norm".into(), vec![2.5; n]),
            Series::new("Boll_breakout_h".into(), flag_on_last),
            Series::new("Boll_w".into(), rising),
        ];
        for column in columns {
            frame.with_column(column).unwrap();
        }
        frame
    }

    fn signal(frame: DataFrame, signals: &Signals) -> Vec<Option<bool>> {
        let table = Table::new(frame).unwrap();
        signals.process(&table).unwrap().flags("t", "Signal").unwrap()
    }

    #[test]
    fn fires_when_every_term_holds() {
        let s = signal(primed(8), &Signals::new(2));
        assert_eq!(s[7], Some(true));
        // rolling windows not yet complete on the first bar
        assert_eq!(s[0], Some(false));
    }

    #[test]
    fn single_failing_term_blocks_signal() {
        let mut frame = primed(8);
        frame
            .with_column(Series::new("RSI".into(), vec![55.0; 8]))
            .unwrap();
        let s = signal(frame, &Signals::new(2));
        assert!(s.iter().all(|v| *v == Some(false)));
    }

    #[test]
    fn thresholds_are_tunable() {
        let mut frame = primed(8);
        frame
            .with_column(Series::new("RSI".into(), vec![55.0; 8]))
            .unwrap();
        let s = signal(frame, &Signals::new(2).with_rsi_min(50.0));
        assert_eq!(s[7], Some(true));
    }

    #[test]
    fn undefined_term_is_false() {
        let mut frame = primed(8);
        frame
            .with_column(Series::new("Buy_sell_ratio".into(), vec![f64::NAN; 8]))
            .unwrap();
        let s = signal(frame, &Signals::new(2));
        assert!(s.iter().all(|v| *v == Some(false)));
    }

    #[test]
    fn hits_report_rows() {
        let table = Table::new(primed(8)).unwrap();
        let out = Signals::new(2).process(&table).unwrap();
        let hits = Signals::hits(&out).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].row, 7);
        assert_eq!(hits[0].close, 10.0);
        assert!(hits[0].timestamp.starts_with("2024-01-02 11:00"));
        assert_eq!(
            Signals::new(2).summary(&out).as_deref(),
            Some("1 signal bars")
        );
    }

    #[test]
    fn requires_upstream_columns() {
        let table = Table::from_bars(&make_bars(&[10.0, 11.0])).unwrap();
        let err = Signals::new(2).process(&table).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { ref column, .. } if column == "ATR_break"
        ));
    }
}
