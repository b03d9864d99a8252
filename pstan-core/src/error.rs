//! Error type shared by the table, the processors and the pipeline driver.

use polars::prelude::{DataType, PolarsError};

/// Errors that can occur while building tables or running stages.
///
/// Insufficient history is not an error: windows longer than the table
/// simply yield undefined values.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("stage `{stage}` requires column `{column}`, which is not in the table")]
    MissingColumn { stage: String, column: String },

    #[error("stage `{stage}` tried to add column `{column}`, which already exists")]
    DuplicateColumn { stage: String, column: String },

    #[error("column `{column}` has type {actual:?}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: DataType,
    },

    #[error("timestamps must be non-null and strictly increasing (row {row})")]
    UnorderedTimestamps { row: usize },

    #[error("column `{column}` has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate stage name: {0}")]
    DuplicateStage(String),

    #[error("parse pipeline config: {0}")]
    ConfigParse(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn missing(stage: &str, column: &str) -> Self {
        Self::MissingColumn {
            stage: stage.to_string(),
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
