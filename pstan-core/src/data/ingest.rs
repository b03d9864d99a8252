//! Load bar tables from CSV/Parquet and write enriched tables back out.
//!
//! Column headers are matched case-insensitively against the raw bar
//! columns and renamed to their canonical form; `date`, `datetime` and
//! `time` are accepted as the timestamp column.

use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::table::{Table, RAW_COLUMNS, TIMESTAMP};

const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "date", "datetime", "time"];

/// Rename raw bar columns to their canonical names.
fn canonicalize_columns(frame: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let has_timestamp = names.iter().any(|n| n == TIMESTAMP);

    for name in &names {
        let lower = name.to_ascii_lowercase();
        let target = if !has_timestamp && TIMESTAMP_ALIASES.contains(&lower.as_str()) {
            Some(TIMESTAMP)
        } else {
            RAW_COLUMNS
                .iter()
                .find(|raw| raw.to_ascii_lowercase() == lower)
                .copied()
        };
        if let Some(target) = target {
            if target != name && frame.get_column_index(target).is_none() {
                debug!(from = %name, to = target, "renaming column");
                frame.rename(name, target.into())?;
            }
        }
    }
    Ok(())
}

/// Read a CSV file with a header row. Date-like timestamp strings are parsed
/// into temporal values.
pub fn read_csv(path: &Path) -> Result<Table> {
    let mut frame = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_try_parse_dates(true)
        .finish()?
        .collect()?;
    canonicalize_columns(&mut frame)?;
    Table::new(frame)
}

pub fn read_parquet(path: &Path) -> Result<Table> {
    let file = fs::File::open(path)?;
    let mut frame = ParquetReader::new(file).finish()?;
    canonicalize_columns(&mut frame)?;
    Table::new(frame)
}

/// Read a table, choosing the format from the file extension.
pub fn read_table(path: &Path) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => read_csv(path),
        Some("parquet") | Some("pq") => read_parquet(path),
        other => Err(PipelineError::InvalidConfig(format!(
            "unsupported input format {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ))),
    }
}

pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    let mut frame = table.frame().clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)?;
    Ok(())
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut frame = table.frame().clone();
    ParquetWriter::new(file).finish(&mut frame)?;
    Ok(())
}
