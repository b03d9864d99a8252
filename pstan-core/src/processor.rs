//! Processor trait: one stage of the feature pipeline.
//!
//! A processor is a pure function from a table to a wider table. Its only
//! state is the configuration it was constructed with, so one instance can be
//! reused across any number of tables and shared between threads.

use crate::config::StageKind;
use crate::error::{PipelineError, Result};
use crate::table::Table;

pub trait Processor: Send + Sync + std::fmt::Debug {
    /// Which stage this is.
    fn kind(&self) -> StageKind;

    /// Smoothing/lookback length the stage was configured with.
    fn window(&self) -> usize;

    /// Columns that must already be present before `process` runs.
    fn required_columns(&self) -> &'static [&'static str];

    /// Columns `process` appends, in order.
    fn output_columns(&self) -> &'static [&'static str];

    /// Compute the stage's columns and return the extended table.
    ///
    /// Fails with `MissingColumn` if a required column is absent and with
    /// `DuplicateColumn` if one of the outputs already exists.
    fn process(&self, table: &Table) -> Result<Table>;

    /// Short human-readable digest of what the stage found in `table`.
    fn summary(&self, _table: &Table) -> Option<String> {
        None
    }

    /// Fail fast on the first required column missing from `table`.
    fn ensure_inputs(&self, table: &Table) -> Result<()> {
        match self
            .required_columns()
            .iter()
            .find(|name| !table.has_column(name))
        {
            Some(name) => Err(PipelineError::missing(self.kind().as_str(), name)),
            None => Ok(()),
        }
    }
}
