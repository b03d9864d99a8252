//! Table ingestion and export (CSV, Parquet).

pub mod ingest;

pub use ingest::{read_csv, read_parquet, read_table, write_csv, write_parquet};
