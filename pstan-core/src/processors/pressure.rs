//! Buying vs selling pressure from where each bar closes within its range.
//!
//! Only regular-hours bars with a positive range contribute; everything else
//! counts as zero pressure on both sides.

use crate::config::StageKind;
use crate::error::Result;
use crate::processor::Processor;
use crate::series::rolling_sum;
use crate::table::{NewColumns, Table};

const REQUIRED: &[&str] = &[
    "Close",
    "High",
    "Low",
    "Range",
    "Volume_smooth",
    "Is_regular_hours",
];
const OUTPUTS: &[&str] = &["Buying_pressure", "Selling_pressure", "Buy_sell_ratio"];

#[derive(Debug, Clone)]
pub struct Pressure {
    window: usize,
}

impl Pressure {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "Pressure window must be >= 2");
        Self { window }
    }
}

impl Processor for Pressure {
    fn kind(&self) -> StageKind {
        StageKind::Pressure
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
        let high = table.numeric(stage, "High")?;
        let low = table.numeric(stage, "Low")?;
        let range = table.numeric(stage, "Range")?;
        let volume = table.numeric(stage, "Volume_smooth")?;
        let regular = table.flags(stage, "Is_regular_hours")?;
        let n = close.len();

        let mut buying = vec![0.0; n];
        let mut selling = vec![0.0; n];
        for i in 0..n {
            // `range[i] > 0.0` is false for NaN
            if regular[i] == Some(true) && range[i] > 0.0 {
                buying[i] = volume[i] * (close[i] - low[i]) / range[i];
                selling[i] = volume[i] * (high[i] - close[i]) / range[i];
            }
        }

        let buy_sum = rolling_sum(&buying, self.window);
        let sell_sum = rolling_sum(&selling, self.window);
        let ratio = buy_sum
            .iter()
            .zip(&sell_sum)
            .map(|(&b, &s)| if s > 0.0 { b / s } else { f64::NAN })
            .collect();

        let mut out = NewColumns::new();
        out.numeric("Buying_pressure", buying);
        out.numeric("Selling_pressure", selling);
        out.numeric("Buy_sell_ratio", ratio);

        table.extend(stage, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{assert_approx, make_bars, make_table, Base, DEFAULT_EPSILON};

    #[test]
    fn pressure_splits_volume_by_close_location() {
        let table = Base::new(2).process(&make_table(&[10.0, 12.0, 11.0])).unwrap();
        let out = Pressure::new(2).process(&table).unwrap();
        let buy = out.numeric("t", "Buying_pressure").unwrap();
        let sell = out.numeric("t", "Selling_pressure").unwrap();
        let ratio = out.numeric("t", "Buy_sell_ratio").unwrap();

        // bar 0 has no smoothed volume yet
        assert!(buy[0].is_nan());
        // bar 1: low 9, high 13, close 12 → 3/4 buying, 1/4 selling
        assert_approx(buy[1], 750.0, DEFAULT_EPSILON);
        assert_approx(sell[1], 250.0, DEFAULT_EPSILON);
        // bar 2: low 10, high 13, close 11
        assert_approx(buy[2], 1000.0 / 3.0, 1e-9);
        assert_approx(sell[2], 2000.0 / 3.0, 1e-9);
        assert_approx(ratio[2], (750.0 + 1000.0 / 3.0) / (250.0 + 2000.0 / 3.0), 1e-9);
    }

    #[test]
    fn prepost_bar_has_no_pressure() {
        let mut bars = make_bars(&[10.0, 12.0, 11.0]);
        bars[2].volume = 0.0;
        let table = Base::new(2)
            .process(&crate::table::Table::from_bars(&bars).unwrap())
            .unwrap();
        let out = Pressure::new(2).process(&table).unwrap();
        let buy = out.numeric("t", "Buying_pressure").unwrap();
        let sell = out.numeric("t", "Selling_pressure").unwrap();
        assert_eq!(buy[2], 0.0);
        assert_eq!(sell[2], 0.0);
    }

    #[test]
    fn ratio_undefined_without_selling() {
        // closes on the high every bar: only buying pressure
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0]);
        for bar in &mut bars {
            bar.high = bar.close;
        }
        let table = Base::new(2)
            .process(&crate::table::Table::from_bars(&bars).unwrap())
            .unwrap();
        let out = Pressure::new(2).process(&table).unwrap();
        let ratio = out.numeric("t", "Buy_sell_ratio").unwrap();
        assert!(ratio[3].is_nan());
    }

    #[test]
    fn requires_range() {
        let err = Pressure::new(2).process(&make_table(&[1.0, 2.0])).unwrap_err();
        assert!(err.to_string().contains("Range"));
    }
}
