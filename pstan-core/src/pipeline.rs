//! Pipeline driver: runs an ordered chain of stages over a table.
//!
//! Each stage receives the table produced by the previous one and returns a
//! new, wider table, so every intermediate version stays valid and no stage
//! can observe columns from stages after it.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::factory::{check_window, create_stage};
use crate::processor::Processor;
use crate::processors::{Atr, Base, Boll, Macd, Pressure, Rsi, Signals, Volume};
use crate::table::Table;

/// Ordered `(name, stage)` pairs, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: Vec<(String, Arc<dyn Processor>)>,
}

impl StageRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Processor>> {
        self.stages
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, stage)| stage)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Processor>)> {
        self.stages.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn insert(&mut self, name: String, stage: Arc<dyn Processor>) -> Result<()> {
        if self.get(&name).is_some() {
            return Err(PipelineError::DuplicateStage(name));
        }
        self.stages.push((name, stage));
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    registry: StageRegistry,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage. Names must be unique within the pipeline.
    pub fn with_stage(
        mut self,
        name: impl Into<String>,
        stage: impl Processor + 'static,
    ) -> Result<Self> {
        self.registry.insert(name.into(), Arc::new(stage))?;
        Ok(self)
    }

    /// All eight stages in canonical order, each with window `window`.
    pub fn default_chain(window: usize) -> Result<Self> {
        check_window("default chain", window)?;
        Self::new()
            .with_stage("base", Base::new(window))?
            .with_stage("volume", Volume::new(window))?
            .with_stage("rsi", Rsi::new(window))?
            .with_stage("macd", Macd::new(window))?
            .with_stage("boll", Boll::new(window))?
            .with_stage("atr", Atr::new(window))?
            .with_stage("pressure", Pressure::new(window))?
            .with_stage("signals", Signals::new(window))
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let mut registry = StageRegistry::default();
        for stage in &config.stages {
            registry.insert(stage.name.clone(), create_stage(stage, config.window)?)?;
        }
        Ok(Self { registry })
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Run every stage in order. Returns the final table and the registry of
    /// the stages that produced it.
    pub fn run(&self, table: &Table) -> Result<(Table, StageRegistry)> {
        let rows = table.height();
        let mut current = table.clone();

        for (name, stage) in self.registry.iter() {
            if stage.window() > rows {
                warn!(
                    stage = name,
                    window = stage.window(),
                    rows,
                    "window longer than table; windowed columns will be undefined"
                );
            }
            let before = current.column_names().len();
            current = stage.process(&current)?;
            debug!(
                stage = name,
                kind = %stage.kind(),
                added = current.column_names().len() - before,
                "stage complete"
            );
        }

        let signals = current
            .flags("pipeline", "Signal")
            .map(|flags| flags.iter().filter(|f| **f == Some(true)).count())
            .unwrap_or(0);
        info!(
            rows,
            stages = self.registry.len(),
            signals,
            "pipeline run complete"
        );

        Ok((current, self.registry.clone()))
    }

    /// Run independent tables in parallel. Results keep the input order; a
    /// failure on one table does not affect the others.
    pub fn run_batch(&self, tables: &[Table]) -> Vec<Result<(Table, StageRegistry)>> {
        tables.par_iter().map(|table| self.run(table)).collect()
    }
}
