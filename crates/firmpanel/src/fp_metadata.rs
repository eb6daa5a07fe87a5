//! Metadata for staged and exported files.
//!
//! [`FileMetadata`] reports the row count and Arrow schema of a CSV or Parquet
//! file. CSV types are inferred from a full scan of the file; Parquet metadata
//! comes from the footer without reading any data pages.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow_csv::reader::Format;
use arrow_schema::Schema;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;

use crate::err::FirmPanelError;
use crate::fp_write_config::OutFormat;

/// Per-column metadata.
#[derive(Clone, Debug, Serialize)]
pub struct ColumnMetadata {
    /// Column name.
    pub name: String,
    /// Arrow data type, as displayed by Arrow.
    pub data_type: String,
    /// Whether the column allows nulls.
    pub nullable: bool,
}

/// File-level metadata.
#[derive(Clone, Debug, Serialize)]
pub struct FileMetadata {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File format.
    pub format: String,
    /// Number of data rows.
    pub row_count: u64,
    /// Number of columns.
    pub column_count: usize,
    /// Parquet row groups; not set for CSV.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_groups: Option<usize>,
    /// Parquet codec of the first column chunk; not set for CSV.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    /// Columns keyed by position.
    pub columns: BTreeMap<usize, ColumnMetadata>,
    /// Arrow schema. Not serialized.
    #[serde(skip_serializing)]
    pub schema: Schema,
}

/// Guesses the format from the file extension.
pub fn format_from_path(path: &Path) -> Result<OutFormat, FirmPanelError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(e) if e.eq_ignore_ascii_case("csv") => Ok(OutFormat::csv),
        Some(e) if e.eq_ignore_ascii_case("parquet") => Ok(OutFormat::parquet),
        Some(e) => Err(FirmPanelError::Other(format!(
            "Expecting extension csv or parquet. Instead, file {} has extension {}.",
            path.to_string_lossy(),
            e
        ))),
        None => Err(FirmPanelError::Other(format!(
            "File {} does not have an extension! Expecting extension csv or parquet.",
            path.to_string_lossy()
        ))),
    }
}

impl FileMetadata {
    /// Reads metadata from a CSV or Parquet file.
    pub fn read(path: &Path) -> Result<Self, FirmPanelError> {
        let path = std::path::absolute(path)?;
        let format = format_from_path(&path)?;
        debug!("Reading {} metadata from {}", format, path.display());

        let (schema, row_count, row_groups, compression) = match format {
            OutFormat::csv => {
                let mut f = File::open(&path)?;
                let (schema, rows) = Format::default()
                    .with_header(true)
                    .infer_schema(&mut f, None)?;
                (schema, rows as u64, None, None)
            }
            OutFormat::parquet => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?;
                let md = builder.metadata();
                let rows = md.file_metadata().num_rows().max(0) as u64;
                let groups = md.num_row_groups();
                let codec = md
                    .row_groups()
                    .first()
                    .and_then(|rg| rg.columns().first())
                    .map(|c| c.compression().to_string());
                (builder.schema().as_ref().clone(), rows, Some(groups), codec)
            }
        };

        let columns = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, f)| {
                (
                    i,
                    ColumnMetadata {
                        name: f.name().to_string(),
                        data_type: f.data_type().to_string(),
                        nullable: f.is_nullable(),
                    },
                )
            })
            .collect();

        Ok(Self {
            path,
            format: format.to_string(),
            row_count,
            column_count: schema.fields().len(),
            row_groups,
            compression,
            columns,
            schema,
        })
    }

    /// Serializes the metadata as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, FirmPanelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the metadata to stdout, as JSON when `as_json` is set.
    pub fn print(&self, as_json: bool) -> Result<(), FirmPanelError> {
        if as_json {
            println!("{}", self.to_json()?);
            return Ok(());
        }

        println!("Metadata for the file {}\n", self.path.to_string_lossy());
        println!("Format: {}", self.format);
        println!("Row count: {}", self.row_count);
        println!("Column count: {}", self.column_count);
        if let Some(rg) = self.row_groups {
            println!("Row groups: {rg}");
        }
        if let Some(c) = &self.compression {
            println!("Compression: {c}");
        }
        println!("Columns:");
        for (k, c) in &self.columns {
            println!(
                "{}: {} {{ arrow data type: {}, nullable: {} }}",
                k, c.name, c.data_type, c.nullable
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(format_from_path(Path::new("a.csv")).unwrap(), OutFormat::csv);
        assert_eq!(
            format_from_path(Path::new("data_year=2015.PARQUET")).unwrap(),
            OutFormat::parquet
        );
        assert!(format_from_path(Path::new("a.feather")).is_err());
        assert!(format_from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn csv_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("comp_2015_part1.csv");
        std::fs::write(&p, "gvkey,fyear,capx\n001004,2015,1.5\n001045,2015,\n").unwrap();

        let md = FileMetadata::read(&p).unwrap();
        assert_eq!(md.format, "csv");
        assert_eq!(md.row_count, 2);
        assert_eq!(md.column_count, 3);
        assert_eq!(md.columns[&2].name, "capx");
        assert!(md.row_groups.is_none());

        let json = md.to_json().unwrap();
        assert!(json.contains("\"row_count\": 2"));
        assert!(!json.contains("row_groups"));
    }
}
