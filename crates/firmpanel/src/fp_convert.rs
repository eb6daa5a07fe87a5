//! CSV batch files to staged Parquet chunks.
//!
//! Every column is read as text. Only the statement close date is typed, as a
//! nanosecond timestamp; each chunk of at most `chunk_rows` rows is written to
//! its own `<stem>_chunk<i>.parquet` file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::{CastOptions, cast_with_options};
use arrow_array::{Array, ArrayRef, RecordBatch, StringArray};
use arrow_csv::ReaderBuilder as CsvReaderBuilder;
use arrow_csv::reader::Format;
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use log::{debug, info};
use rayon::prelude::*;
use regex::Regex;

use crate::columns;
use crate::common::{display_name, format_with_commas, list_matching_files};
use crate::err::FirmPanelError;
use crate::fp_batch::text_schema;
use crate::fp_write::BatchWriter;
use crate::fp_write_config::{OutFormat, WriteConfig, validate_in_dir};
use crate::progress::ProgressCallback;

/// File names picked up by default: the Orbis batch files.
pub const DEFAULT_CSV_PATTERN: &str = r"^orbis_em_.*_part\d+\.csv$";

/// Default rows per Parquet chunk.
pub const DEFAULT_CHUNK_ROWS: usize = 100_000;

/// Type of the staged close-date column.
pub const STAGED_DATE_TYPE: DataType = DataType::Timestamp(TimeUnit::Nanosecond, None);

/// Converter settings.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Directory holding the CSV batch files.
    pub in_dir: PathBuf,
    /// File name pattern selecting the batch files.
    pub pattern: Regex,
    /// Rows per Parquet chunk.
    pub chunk_rows: usize,
    /// Column parsed as a timestamp.
    pub date_column: String,
    /// Convert files concurrently on a local thread pool.
    pub parallel: bool,
}

impl ConvertConfig {
    /// Validates the input directory, pattern and chunk size.
    pub fn new(
        in_dir: &Path,
        pattern: Option<&str>,
        chunk_rows: Option<usize>,
        parallel: bool,
    ) -> Result<Self, FirmPanelError> {
        let chunk_rows = chunk_rows.unwrap_or(DEFAULT_CHUNK_ROWS);
        if chunk_rows == 0 {
            return Err(FirmPanelError::Other(
                "The value of --chunk-rows must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            in_dir: validate_in_dir(in_dir)?,
            pattern: Regex::new(pattern.unwrap_or(DEFAULT_CSV_PATTERN))?,
            chunk_rows,
            date_column: columns::CLOSE_DATE.to_string(),
            parallel,
        })
    }
}

/// Result of converting one CSV file.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    /// CSV batch file that was read.
    pub source: PathBuf,
    /// Parquet chunks written, in order.
    pub chunks: Vec<PathBuf>,
    /// Total rows across all chunks.
    pub rows: usize,
}

/// Reads the column names from the header row of a CSV file.
pub fn read_csv_header(path: &Path) -> Result<Vec<String>, FirmPanelError> {
    let mut f = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut f, Some(0))?;
    Ok(schema.fields().iter().map(|f| f.name().to_string()).collect())
}

/// Output schema of a staged chunk: every column text, except `date_column`
/// which becomes a timestamp when present.
pub fn staging_schema<S: AsRef<str>>(header: &[S], date_column: &str) -> SchemaRef {
    Arc::new(Schema::new(
        header
            .iter()
            .map(|c| {
                let c = c.as_ref();
                if c == date_column {
                    Field::new(c, STAGED_DATE_TYPE, true)
                } else {
                    Field::new(c, DataType::Utf8, true)
                }
            })
            .collect::<Vec<_>>(),
    ))
}

/// Parses a text column into [`STAGED_DATE_TYPE`].
///
/// Nulls and blank values stay null. Any other value that does not parse is
/// reported as [`FirmPanelError::DateParse`].
pub fn parse_date_column(column: &str, values: &ArrayRef) -> Result<ArrayRef, FirmPanelError> {
    let opts = CastOptions {
        safe: true,
        ..Default::default()
    };
    let parsed = cast_with_options(values, &STAGED_DATE_TYPE, &opts)?;

    if parsed.null_count() > values.null_count()
        && let Some(text) = values.as_any().downcast_ref::<StringArray>()
    {
        let bad = (0..text.len()).find(|&i| {
            text.is_valid(i) && !text.value(i).trim().is_empty() && parsed.is_null(i)
        });
        if let Some(i) = bad {
            return Err(FirmPanelError::DateParse {
                column: column.to_string(),
                value: text.value(i).to_string(),
            });
        }
    }
    Ok(parsed)
}

fn stage_batch(
    batch: &RecordBatch,
    schema: &SchemaRef,
    date_idx: Option<usize>,
    date_column: &str,
) -> Result<RecordBatch, FirmPanelError> {
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
    if let Some(i) = date_idx {
        arrays[i] = parse_date_column(date_column, &arrays[i])?;
    }
    Ok(RecordBatch::try_new(schema.clone(), arrays)?)
}

/// Converts one CSV file into Parquet chunks in the output directory.
pub fn convert_csv_file(
    path: &Path,
    cfg: &ConvertConfig,
    wc: &WriteConfig,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<ConvertedFile, FirmPanelError> {
    if let Some(p) = progress {
        p.stage_started(&display_name(path));
    }

    let header = read_csv_header(path)?;
    let date_idx = header.iter().position(|c| *c == cfg.date_column);
    if date_idx.is_none() {
        info!(
            "{} has no {} column, staging every column as text",
            display_name(path),
            cfg.date_column
        );
    }
    let read_schema = text_schema(&header);
    let out_schema = staging_schema(&header, &cfg.date_column);

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| FirmPanelError::Other(format!("{} has no file name", path.display())))?;

    let reader = CsvReaderBuilder::new(read_schema)
        .with_header(true)
        .with_batch_size(cfg.chunk_rows)
        .build(File::open(path)?)?;

    let mut chunks = Vec::new();
    let mut rows = 0;
    for (i, batch) in reader.enumerate() {
        let staged = stage_batch(&batch?, &out_schema, date_idx, &cfg.date_column)?;
        let out_path = wc.out_path(&format!("{stem}_chunk{}.{}", i + 1, OutFormat::parquet))?;

        let mut wtr = BatchWriter::try_new(&out_path, OutFormat::parquet, out_schema.clone(), wc)?;
        wtr.write(&staged)?;
        let n = wtr.finish()?;
        debug!("Wrote {} rows into {}", n, display_name(&out_path));

        if let Some(p) = progress {
            p.inc(n as u64);
        }
        rows += n;
        chunks.push(out_path);
    }

    info!(
        "In total, wrote {} rows from file {} into {} chunk(s)",
        format_with_commas(rows),
        display_name(path),
        chunks.len()
    );

    Ok(ConvertedFile {
        source: path.to_path_buf(),
        chunks,
        rows,
    })
}

/// Converts every matching CSV file in the input directory, in name order.
///
/// With `parallel` set, files are converted concurrently; each file's output is
/// the same as in a sequential run.
pub fn convert_csv_dir(
    cfg: &ConvertConfig,
    wc: &WriteConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<ConvertedFile>, FirmPanelError> {
    let files = list_matching_files(&cfg.in_dir, &cfg.pattern)?;
    debug!("Converting {} file(s) from {}", files.len(), cfg.in_dir.display());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(if cfg.parallel { 0 } else { 1 })
        .build()?;

    pool.install(|| {
        files
            .par_iter()
            .map(|f| convert_csv_file(f, cfg, wc, progress.as_ref()))
            .collect::<Result<Vec<_>, _>>()
    })
}
