//! Table: the ordered OHLCV container threaded through the pipeline.
//!
//! A thin wrapper over a polars `DataFrame` that enforces the pipeline's
//! invariants: a strictly increasing `timestamp` key, numeric raw columns,
//! and add-only column growth. Every stage returns a new `Table`; the input
//! is never mutated. Column buffers are shared between versions through
//! polars' reference-counted chunks.

use polars::prelude::*;
use tracing::warn;

use crate::domain::Bar;
use crate::error::{PipelineError, Result};

/// Name of the row key column.
pub const TIMESTAMP: &str = "timestamp";

/// Raw input columns every table must carry.
pub const RAW_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Data for a column a stage is about to add.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// NaN marks undefined rows.
    Numeric(Vec<f64>),
    /// `None` marks undefined rows.
    Flag(Vec<Option<bool>>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Flag(v) => v.len(),
        }
    }
}

/// Ordered set of columns produced by one stage invocation.
#[derive(Debug, Clone, Default)]
pub struct NewColumns {
    columns: Vec<(String, ColumnData)>,
}

impl NewColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numeric(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.columns.push((name.into(), ColumnData::Numeric(values)));
    }

    pub fn flag(&mut self, name: impl Into<String>, values: Vec<Option<bool>>) {
        self.columns.push((name.into(), ColumnData::Flag(values)));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
}

impl Table {
    /// Wrap a frame, validating the key and raw columns.
    pub fn new(frame: DataFrame) -> Result<Self> {
        let table = Self { frame };
        table.validate()?;
        Ok(table)
    }

    /// Build a table from row-oriented bars.
    ///
    /// Bars with undefined prices or an inverted candle are kept and logged.
    pub fn from_bars(bars: &[Bar]) -> Result<Self> {
        let suspect = bars.iter().filter(|b| !b.is_sane()).count();
        if suspect > 0 {
            warn!(suspect, rows = bars.len(), "bars with undefined or inverted prices");
        }

        let millis: Vec<i64> = bars
            .iter()
            .map(|b| b.timestamp.and_utc().timestamp_millis())
            .collect();
        let timestamp = Series::new(TIMESTAMP.into(), millis)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

        let field = |name: &str, get: fn(&Bar) -> f64| {
            Column::from(Series::new(
                name.into(),
                bars.iter().map(get).collect::<Vec<f64>>(),
            ))
        };

        let frame = DataFrame::new(vec![
            Column::from(timestamp),
            field("Open", |b| b.open),
            field("High", |b| b.high),
            field("Low", |b| b.low),
            field("Close", |b| b.close),
            field("Volume", |b| b.volume),
        ])?;

        Self::new(frame)
    }

    fn validate(&self) -> Result<()> {
        let ts = self
            .frame
            .column(TIMESTAMP)
            .map_err(|_| PipelineError::missing("table", TIMESTAMP))?;
        match ts.dtype() {
            DataType::Datetime(_, _)
            | DataType::Date
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32 => {}
            other => {
                return Err(PipelineError::TypeMismatch {
                    column: TIMESTAMP.to_string(),
                    expected: "temporal or integer",
                    actual: other.clone(),
                })
            }
        }

        let physical = ts.as_materialized_series().cast(&DataType::Int64)?;
        let mut prev: Option<i64> = None;
        for (row, value) in physical.i64()?.into_iter().enumerate() {
            let Some(value) = value else {
                return Err(PipelineError::UnorderedTimestamps { row });
            };
            if prev.is_some_and(|p| value <= p) {
                return Err(PipelineError::UnorderedTimestamps { row });
            }
            prev = Some(value);
        }

        for name in RAW_COLUMNS {
            let column = self
                .frame
                .column(name)
                .map_err(|_| PipelineError::missing("table", name))?;
            match column.dtype() {
                DataType::Float64
                | DataType::Float32
                | DataType::Int64
                | DataType::Int32
                | DataType::UInt64
                | DataType::UInt32 => {}
                other => {
                    return Err(PipelineError::TypeMismatch {
                        column: name.to_string(),
                        expected: "numeric",
                        actual: other.clone(),
                    })
                }
            }
        }

        Ok(())
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Read a column as `f64`, nulls as NaN. `stage` names the reader for the
    /// missing-column error.
    pub fn numeric(&self, stage: &str, name: &str) -> Result<Vec<f64>> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| PipelineError::missing(stage, name))?;
        let series = column.as_materialized_series().cast(&DataType::Float64)?;
        Ok(series
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// Read a column as tri-state flags. Numeric columns read as `value != 0`,
    /// with NaN undefined.
    pub fn flags(&self, stage: &str, name: &str) -> Result<Vec<Option<bool>>> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| PipelineError::missing(stage, name))?;
        let series = column.as_materialized_series();
        if let DataType::Boolean = series.dtype() {
            return Ok(series.bool()?.into_iter().collect());
        }
        Ok(self
            .numeric(stage, name)?
            .into_iter()
            .map(|v| if v.is_nan() { None } else { Some(v != 0.0) })
            .collect())
    }

    /// Display form of the timestamp at `row`.
    pub fn timestamp_label(&self, row: usize) -> Result<String> {
        let value = self
            .frame
            .column(TIMESTAMP)?
            .as_materialized_series()
            .get(row)?;
        Ok(value.to_string())
    }

    /// Return a new table with `columns` appended. Existing columns are never
    /// replaced; the receiver is left untouched.
    pub fn extend(&self, stage: &str, columns: NewColumns) -> Result<Table> {
        let height = self.frame.height();
        let mut frame = self.frame.clone();

        for (name, data) in columns.columns {
            if frame.get_column_index(&name).is_some() {
                return Err(PipelineError::DuplicateColumn {
                    stage: stage.to_string(),
                    column: name,
                });
            }
            if data.len() != height {
                return Err(PipelineError::LengthMismatch {
                    column: name,
                    expected: height,
                    actual: data.len(),
                });
            }
            let series = match data {
                ColumnData::Numeric(values) => Series::new(name.as_str().into(), values),
                ColumnData::Flag(values) => Series::new(name.as_str().into(), values),
            };
            frame.with_column(series)?;
        }

        Ok(Table { frame })
    }
}
