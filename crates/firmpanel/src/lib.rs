//! Build emerging-market firm-year panels from WRDS (Orbis and Compustat).
//!
//! This crate provides the library behind the `firmpanel` CLI. Firm-level
//! financial statements are extracted from WRDS over the PostgreSQL wire
//! protocol, staged as CSV and then Parquet, and cleaned with Apache DataFusion
//! into one Parquet partition per fiscal year, deflated and converted to USD.
//!
//! # Data Pipeline
//!
//! ```text
//! WRDS (PostgreSQL, server-side cursor)
//!     → CSV batch files            orbis_em_<size>_<start>_<end>_part<n>.csv
//!         → Parquet chunks         <batch>_chunk<i>.parquet (closdate typed)
//!             → DataFusion cleaning (casts, filters, dedup, deflator join)
//!                 → yearly Parquet data_year=<year>.parquet
//!                     → yearly CSV data_year=<year>.csv
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use firmpanel::{CleanConfig, ConvertConfig, WriteConfig, clean, convert_csv_dir};
//!
//! # fn main() -> Result<(), firmpanel::FirmPanelError> {
//! // Stage the extracted CSV batches as Parquet
//! let cc = ConvertConfig::new(Path::new("scratch"), None, None, false)?;
//! let wc = WriteConfig::new("scratch/orbis_parquet".into(), true, true, None, None)?;
//! convert_csv_dir(&cc, &wc, None)?;
//!
//! // Clean into one partition per fiscal year
//! let cfg = CleanConfig::new(
//!     Path::new("scratch/orbis_parquet"),
//!     Path::new("gdp_deflator_long.csv"),
//!     false,
//!     None,
//! )?;
//! let out = WriteConfig::new("scratch/cleaned".into(), true, true, None, None)?;
//! let summary = clean(&cfg, &out, None)?;
//! println!("Wrote fiscal years {:?}", summary.years());
//! # Ok(())
//! # }
//! ```
//!
//! # Key Types
//!
//! - [`QueryRunner`] / [`BatchSource`]: remote query streaming, implemented by [`WrdsConnection`]
//! - [`OrbisExtractConfig`] / [`CompustatExtractConfig`]: what to extract and in which windows
//! - [`ConvertConfig`], [`CleanConfig`], [`ExportConfig`]: per-stage settings
//! - [`WriteConfig`]: output directory, overwrite policy and Parquet compression
//! - [`BatchWriter`]: streams Arrow batches into one CSV or Parquet file
//! - [`FileMetadata`]: row count and schema of a staged file
//!
//! # Parallel Processing
//!
//! Extraction and cleaning are sequential. The converter and the re-exporter
//! handle independent files and can process them on a local Rayon pool.

#![warn(missing_docs)]
#![allow(non_camel_case_types)]

pub mod columns;

pub use common::{format_with_commas, list_matching_files, parse_columns_file};
pub use err::FirmPanelError;
pub use fp_batch::{TextBatchBuilder, text_schema};
pub use fp_clean::{
    CLEAN_VIEW, CleanConfig, CleanSummary, DEFAULT_FISCAL_CUTOFF_MONTH, YearPartition,
    build_clean_sql, clean, partition_file_name,
};
pub use fp_convert::{
    ConvertConfig, ConvertedFile, DEFAULT_CHUNK_ROWS, DEFAULT_CSV_PATTERN, STAGED_DATE_TYPE,
    convert_csv_dir, convert_csv_file, parse_date_column, read_csv_header, staging_schema,
};
pub use fp_export::{ExportConfig, ExportedFile, export_partitions, parquet_to_csv};
pub use fp_extract::{
    BatchFile, BatchSource, COMPUSTAT_BATCH_ROWS, CompustatExtractConfig, ConnectionConfig,
    OrbisColumns, OrbisExtractConfig, PgCursor, QueryRunner, SizeBucket, TimeWindow, WRDS_DBNAME,
    WRDS_HOST, WRDS_PORT, WrdsConnection, build_compustat_query, build_orbis_query,
    compustat_file_stem, drain_to_files, extract_compustat, extract_orbis, orbis_file_stem,
};
pub use fp_metadata::{ColumnMetadata, FileMetadata};
pub use fp_query::{PREVIEW_TABLE, execute_sql, read_sql_file};
pub use fp_write::{BatchWriter, write_batches};
pub use fp_write_config::{
    OutFormat, ParquetCompression, WriteConfig, resolve_parquet_compression, validate_in_dir,
};
pub use progress::ProgressCallback;

mod common;
mod err;
mod fp_batch;
mod fp_clean;
mod fp_convert;
mod fp_export;
mod fp_extract;
mod fp_metadata;
mod fp_query;
mod fp_write;
mod fp_write_config;
mod progress;
