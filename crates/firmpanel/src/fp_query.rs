//! SQL previews of staged and cleaned files via Apache DataFusion.
//!
//! Registers a CSV or Parquet file (or a directory of Parquet files) as the
//! table `data` in a DataFusion [`SessionContext`], executes a SQL query, and
//! returns the results as a `Vec<RecordBatch>`.

use std::path::Path;

use arrow_array::RecordBatch;
use datafusion::prelude::*;

use crate::err::FirmPanelError;
use crate::fp_batch::text_schema;
use crate::fp_clean::session_context;
use crate::fp_convert::read_csv_header;
use crate::fp_metadata::format_from_path;
use crate::fp_write_config::OutFormat;

/// Table name used to reference the previewed file in SQL.
pub const PREVIEW_TABLE: &str = "data";

/// Executes `sql` against the file or directory at `path`.
///
/// A directory is read as the union of its Parquet files. Without `sql`, the
/// first `rows` rows are returned.
pub fn execute_sql(
    path: &Path,
    sql: Option<&str>,
    rows: usize,
) -> Result<Vec<RecordBatch>, FirmPanelError> {
    let default_sql = format!("SELECT * FROM {PREVIEW_TABLE} LIMIT {rows}");
    let sql = sql.unwrap_or(&default_sql);
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(execute_sql_async(path, sql))
}

async fn execute_sql_async(path: &Path, sql: &str) -> Result<Vec<RecordBatch>, FirmPanelError> {
    let ctx = session_context();
    let abs = std::path::absolute(path)?;

    if abs.is_dir() {
        let dir = format!("{}/", abs.to_string_lossy().trim_end_matches('/'));
        ctx.register_parquet(PREVIEW_TABLE, &dir, ParquetReadOptions::default())
            .await?;
    } else {
        let p = abs.to_string_lossy().to_string();
        match format_from_path(&abs)? {
            OutFormat::csv => {
                // every column as text, matching how batch files are staged
                let schema = text_schema(&read_csv_header(&abs)?);
                ctx.register_csv(
                    PREVIEW_TABLE,
                    &p,
                    CsvReadOptions::new().has_header(true).schema(schema.as_ref()),
                )
                .await?
            }
            OutFormat::parquet => {
                ctx.register_parquet(PREVIEW_TABLE, &p, ParquetReadOptions::default())
                    .await?
            }
        }
    }

    let df = ctx.sql(sql).await?;
    Ok(df.collect().await?)
}

/// Reads a SQL query from a file path.
pub fn read_sql_file(path: &Path) -> Result<String, FirmPanelError> {
    let sql = std::fs::read_to_string(path)?;
    let sql = sql.trim().to_string();
    if sql.is_empty() {
        return Err(FirmPanelError::Other("SQL file is empty".to_string()));
    }
    Ok(sql)
}
