//! Yearly Parquet partitions to CSV.
//!
//! Each `<name>.parquet` in the input directory becomes `<name>.csv` with a
//! header row. Values are written as they are stored; nothing is transformed.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rayon::prelude::*;
use regex::Regex;

use crate::common::{display_name, format_with_commas, list_matching_files};
use crate::err::FirmPanelError;
use crate::fp_write::BatchWriter;
use crate::fp_write_config::{OutFormat, WriteConfig, validate_in_dir};
use crate::progress::ProgressCallback;

/// Default rows per record batch read from Parquet.
pub const DEFAULT_READ_BATCH_ROWS: usize = 65_536;

/// Re-export settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding the partitions.
    pub in_dir: PathBuf,
    /// File name pattern selecting the partitions.
    pub pattern: Regex,
    /// Export files concurrently on a local thread pool.
    pub parallel: bool,
}

impl ExportConfig {
    /// Validates the input directory; the default pattern selects every `.parquet` file.
    pub fn new(in_dir: &Path, pattern: Option<&str>, parallel: bool) -> Result<Self, FirmPanelError> {
        Ok(Self {
            in_dir: validate_in_dir(in_dir)?,
            pattern: Regex::new(pattern.unwrap_or(r"\.parquet$"))?,
            parallel,
        })
    }
}

/// One exported file.
#[derive(Debug, Clone)]
pub struct ExportedFile {
    /// Parquet partition that was read.
    pub source: PathBuf,
    /// CSV file written.
    pub target: PathBuf,
    /// Data rows written.
    pub rows: usize,
}

/// Converts a single Parquet file to CSV at `target`.
pub fn parquet_to_csv(
    source: &Path,
    target: &Path,
    wc: &WriteConfig,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<usize, FirmPanelError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(source)?)?
        .with_batch_size(DEFAULT_READ_BATCH_ROWS);
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut wtr = BatchWriter::try_new(target, OutFormat::csv, schema, wc)?;
    for batch in reader {
        let batch = batch?;
        wtr.write(&batch)?;
        if let Some(p) = progress {
            p.inc(batch.num_rows() as u64);
        }
    }
    let rows = wtr.finish()?;

    info!(
        "In total, wrote {} rows from file {} into {}",
        format_with_commas(rows),
        display_name(source),
        display_name(target)
    );
    Ok(rows)
}

/// Exports every matching partition in the input directory, in name order.
pub fn export_partitions(
    cfg: &ExportConfig,
    wc: &WriteConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<ExportedFile>, FirmPanelError> {
    let files = list_matching_files(&cfg.in_dir, &cfg.pattern)?;
    debug!("Exporting {} file(s) from {}", files.len(), cfg.in_dir.display());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(if cfg.parallel { 0 } else { 1 })
        .build()?;

    pool.install(|| {
        files
            .par_iter()
            .map(|source| {
                let stem = source
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .ok_or_else(|| {
                        FirmPanelError::Other(format!("{} has no file name", source.display()))
                    })?;
                let target = wc.out_path(&format!("{stem}.{}", OutFormat::csv))?;
                if let Some(p) = progress.as_ref() {
                    p.stage_started(&display_name(source));
                }
                let rows = parquet_to_csv(source, &target, wc, progress.as_ref())?;
                Ok(ExportedFile {
                    source: source.clone(),
                    target,
                    rows,
                })
            })
            .collect::<Result<Vec<_>, FirmPanelError>>()
    })
}
