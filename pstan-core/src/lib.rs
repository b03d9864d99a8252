//! pstan core: staged feature pipeline over intraday OHLCV tables.
//!
//! This crate contains:
//! - The columnar [`Table`] with its timestamp/raw-column invariants
//! - Numeric kernels (rolling windows, recursive EWMA, tri-state flags)
//! - Eight processors: base, volume, RSI, MACD, Bollinger, ATR, pressure, signals
//! - The pipeline driver and its ordered stage registry
//! - TOML configuration, the stage factory and config hashing
//! - CSV/Parquet ingestion and deterministic synthetic bars

pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod factory;
pub mod pipeline;
pub mod processor;
pub mod processors;
pub mod series;
pub mod synthetic;
pub mod table;

pub use config::{PipelineConfig, StageConfig, StageKind};
pub use domain::Bar;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, StageRegistry};
pub use processor::Processor;
pub use processors::SignalHit;
pub use table::Table;
