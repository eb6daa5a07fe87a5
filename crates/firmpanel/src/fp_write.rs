//! Output writers for Arrow [`RecordBatch`] data.
//!
//! [`BatchWriter`] owns one output file and streams any number of batches into
//! it as CSV (header on the first batch) or Parquet. Every stage that writes a
//! file goes through it: extraction batches, converter chunks, yearly partitions
//! and their CSV mirrors.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow_array::RecordBatch;
use arrow_csv::WriterBuilder as CsvWriterBuilder;
use arrow_schema::SchemaRef;
use log::debug;
use parquet::arrow::ArrowWriter as ParquetArrowWriter;

use crate::err::FirmPanelError;
use crate::fp_write_config::{OutFormat, WriteConfig};

/// Format-specific writer variant.
enum BatchWriterFormat {
    Csv(arrow_csv::Writer<BufWriter<File>>),
    Parquet(ParquetArrowWriter<BufWriter<File>>),
}

/// Streams record batches into a single CSV or Parquet file.
///
/// The file is created (or truncated) by [`try_new`](BatchWriter::try_new) and
/// finalized by [`finish`](BatchWriter::finish), which returns the row count.
pub struct BatchWriter {
    wtr: BatchWriterFormat,
    path: PathBuf,
    rows: usize,
}

impl BatchWriter {
    /// Creates `path` and prepares a writer for batches with `schema`.
    ///
    /// Parquet compression and writer properties come from `wc`.
    pub fn try_new(
        path: &Path,
        format: OutFormat,
        schema: SchemaRef,
        wc: &WriteConfig,
    ) -> Result<Self, FirmPanelError> {
        let f = BufWriter::new(File::create(path)?);
        let wtr = match format {
            OutFormat::csv => BatchWriterFormat::Csv(CsvWriterBuilder::new().with_header(true).build(f)),
            OutFormat::parquet => {
                let props = wc.writer_properties()?;
                BatchWriterFormat::Parquet(ParquetArrowWriter::try_new(f, schema, Some(props))?)
            }
        };
        debug!("Opened {} writer for {}", format, path.to_string_lossy());

        Ok(Self {
            wtr,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    /// Appends one batch.
    pub fn write(&mut self, batch: &RecordBatch) -> Result<(), FirmPanelError> {
        match &mut self.wtr {
            BatchWriterFormat::Csv(w) => w.write(batch)?,
            BatchWriterFormat::Parquet(w) => w.write(batch)?,
        }
        self.rows += batch.num_rows();
        Ok(())
    }

    /// Number of rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and closes the file, returning the number of rows written.
    pub fn finish(self) -> Result<usize, FirmPanelError> {
        match self.wtr {
            BatchWriterFormat::Csv(w) => {
                let mut inner = w.into_inner();
                inner.flush()?;
            }
            BatchWriterFormat::Parquet(w) => {
                w.close()?;
            }
        }
        debug!("Closed {} after {} rows", self.path.to_string_lossy(), self.rows);
        Ok(self.rows)
    }
}

/// Writes a complete set of batches to `path` in one call.
pub fn write_batches(
    path: &Path,
    format: OutFormat,
    schema: SchemaRef,
    batches: &[RecordBatch],
    wc: &WriteConfig,
) -> Result<usize, FirmPanelError> {
    let mut wtr = BatchWriter::try_new(path, format, schema, wc)?;
    for b in batches {
        wtr.write(b)?;
    }
    wtr.finish()
}
