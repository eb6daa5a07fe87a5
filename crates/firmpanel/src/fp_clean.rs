//! Cleaning, deflation and currency conversion with Apache DataFusion.
//!
//! All staged Parquet chunks are registered as one table, `raw`, whose schema is
//! the union of the chunk schemas. The deflator CSV is registered as
//! `deflator_raw`. [`build_clean_sql`] renders a single query of chained common
//! table expressions over those two tables:
//!
//! ```text
//! raw ──▶ base ──▶ filtered ──▶ ranked ──▶ deduped ──▶ nonneg ──▶ joined ──▶ final
//!  (casts)  (fiscal year,   (row number per  (rn = 1)  (turn, cuas,  (left join
//!            completeness)   firm and year)             empl >= 0)    deflator)
//! ```
//!
//! The query is registered as the view `full_data` and written out once per
//! distinct fiscal year as `data_year=<year>.parquet`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{Array, Int32Array};
use datafusion::prelude::*;
use futures::StreamExt;
use log::{debug, info};
use regex::Regex;
use serde::Serialize;

use crate::columns;
use crate::common::{display_name, format_with_commas, list_matching_files};
use crate::err::FirmPanelError;
use crate::fp_write::BatchWriter;
use crate::fp_write_config::{OutFormat, WriteConfig, validate_in_dir};
use crate::progress::ProgressCallback;

/// Table name of the staged chunks.
pub const RAW_TABLE: &str = "raw";
/// Table name of the deflator CSV.
pub const DEFLATOR_TABLE: &str = "deflator_raw";
/// View name of the cleaned panel.
pub const CLEAN_VIEW: &str = "full_data";

/// Default first month of a fiscal year that reports under its calendar year.
pub const DEFAULT_FISCAL_CUTOFF_MONTH: u32 = 6;

/// Cleaning settings.
#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Directory of staged Parquet chunks.
    pub staging_dir: PathBuf,
    /// Deflator CSV with header `ctryiso,year,gdpdef`.
    pub deflator_csv: PathBuf,
    /// Drop rows missing any classification code.
    pub require_classification: bool,
    /// Close months at or after this one report under the calendar year;
    /// earlier months report under the previous year.
    pub fiscal_cutoff_month: u32,
}

impl CleanConfig {
    /// Validates the input paths and cutoff month.
    pub fn new(
        staging_dir: &Path,
        deflator_csv: &Path,
        keep_unclassified: bool,
        fiscal_cutoff_month: Option<u32>,
    ) -> Result<Self, FirmPanelError> {
        let month = fiscal_cutoff_month.unwrap_or(DEFAULT_FISCAL_CUTOFF_MONTH);
        if !(1..=12).contains(&month) {
            return Err(FirmPanelError::Other(format!(
                "The fiscal year cutoff month must be between 1 and 12, got {month}"
            )));
        }
        let deflator_csv = std::path::absolute(deflator_csv)?;
        if !deflator_csv.is_file() {
            return Err(FirmPanelError::Other(format!(
                "The deflator file {} does not exist",
                deflator_csv.display()
            )));
        }

        Ok(Self {
            staging_dir: validate_in_dir(staging_dir)?,
            deflator_csv,
            require_classification: !keep_unclassified,
            fiscal_cutoff_month: month,
        })
    }
}

/// One written yearly partition.
#[derive(Debug, Clone, Serialize)]
pub struct YearPartition {
    /// Fiscal year.
    pub year: i32,
    /// Partition file.
    pub path: PathBuf,
    /// Rows in the partition.
    pub rows: usize,
}

/// Outcome of a cleaning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanSummary {
    /// Partitions in ascending year order.
    pub partitions: Vec<YearPartition>,
    /// Rows across all partitions.
    pub total_rows: usize,
}

impl CleanSummary {
    /// Years written, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.partitions.iter().map(|p| p.year).collect()
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn typed_column(name: &str, sql_type: &str, available: &HashSet<&str>) -> String {
    let q = quote(name);
    if available.contains(name) {
        format!("CAST({q} AS {sql_type}) AS {q}")
    } else {
        format!("CAST(NULL AS {sql_type}) AS {q}")
    }
}

/// Columns of the typed `base` relation, in output order.
pub fn base_columns() -> Vec<&'static str> {
    columns::TEXT
        .iter()
        .chain(columns::NUMERIC)
        .copied()
        .chain(std::iter::once(columns::CLOSE_DATE))
        .collect()
}

/// Renders the cleaning query over [`RAW_TABLE`] and [`DEFLATOR_TABLE`].
///
/// `available` lists the columns present in the staged data; typed columns
/// absent from it are produced as all-null columns.
pub fn build_clean_sql<S: AsRef<str>>(available: &[S], cfg: &CleanConfig) -> String {
    let available: HashSet<&str> = available.iter().map(|s| s.as_ref()).collect();

    let casts: Vec<String> = columns::TEXT
        .iter()
        .map(|c| typed_column(c, "VARCHAR", &available))
        .chain(columns::NUMERIC.iter().map(|c| typed_column(c, "DOUBLE", &available)))
        .chain(std::iter::once(typed_column(
            columns::CLOSE_DATE,
            "TIMESTAMP",
            &available,
        )))
        .collect();

    let close = quote(columns::CLOSE_DATE);
    let year = quote(columns::FISCAL_YEAR);
    let country = quote(columns::COUNTRY);
    let firm = quote(columns::FIRM_ID);

    let mut required: Vec<String> = Vec::new();
    if cfg.require_classification {
        required.extend(
            columns::CLASSIFICATION
                .iter()
                .map(|c| format!("{} IS NOT NULL", quote(c))),
        );
    }
    required.push(format!("{} IS NOT NULL", quote(columns::ORIG_CURRENCY)));
    required.push(format!("{close} IS NOT NULL"));
    let any_size = columns::SIZE_MEASURES
        .iter()
        .map(|c| format!("{} IS NOT NULL", quote(c)))
        .collect::<Vec<_>>()
        .join(" OR ");
    required.push(format!("({any_size})"));

    let kept: Vec<String> = base_columns()
        .into_iter()
        .chain([columns::FISCAL_YEAR, "is_annual"])
        .map(quote)
        .collect();

    let nonneg = columns::NON_NEGATIVE
        .iter()
        .map(|c| format!("{} >= 0", quote(c)))
        .collect::<Vec<_>>()
        .join(" AND ");

    let rate = quote(columns::EXCHANGE_RATE);
    let derived: Vec<String> = columns::monetary()
        .map(|c| format!("{} * (100.0 / \"deflator\") AS {}", quote(c), quote(&format!("{c}_defl"))))
        .chain(
            columns::monetary()
                .map(|c| format!("{} * {rate} AS {}", quote(c), quote(&format!("{c}_usd")))),
        )
        .collect();

    let cutoff = cfg.fiscal_cutoff_month;
    let sep = ",\n    ";
    let and = "\n    AND ";

    format!(
        "WITH
  base AS (
    SELECT
    {casts}
    FROM {RAW_TABLE}
  ),
  defl AS (
    SELECT
    CAST(\"ctryiso\" AS VARCHAR) AS \"ctryiso\",
    CAST(\"year\" AS INT) AS \"year\",
    CAST(\"gdpdef\" AS DOUBLE) AS \"deflator\"
    FROM {DEFLATOR_TABLE}
  ),
  filtered AS (
    SELECT
    *,
    CAST(CASE
      WHEN date_part('month', {close}) >= {cutoff} THEN date_part('year', {close})
      ELSE date_part('year', {close}) - 1
    END AS INT) AS {year},
    CASE WHEN {filing} = '{annual}' THEN 1 ELSE 0 END AS \"is_annual\"
    FROM base
    WHERE {required}
  ),
  ranked AS (
    SELECT
    *,
    ROW_NUMBER() OVER (
      PARTITION BY {firm}, {year}
      ORDER BY \"is_annual\" DESC, {close} DESC
    ) AS \"rn\"
    FROM filtered
  ),
  deduped AS (
    SELECT {kept}
    FROM ranked
    WHERE \"rn\" = 1
  ),
  nonneg AS (
    SELECT *
    FROM deduped
    WHERE {nonneg}
  ),
  joined AS (
    SELECT n.*, d.\"deflator\"
    FROM nonneg AS n
    LEFT JOIN defl AS d
      ON n.{country} = d.{country} AND n.{year} = d.{year}
  )
SELECT
    *,
    {derived}
FROM joined",
        casts = casts.join(sep),
        filing = quote(columns::FILING_TYPE),
        annual = columns::ANNUAL_REPORT,
        required = required.join(and),
        kept = kept.join(", "),
        derived = derived.join(sep),
    )
}

/// Registers [`RAW_TABLE`], [`DEFLATOR_TABLE`] and the [`CLEAN_VIEW`] view.
pub async fn register_clean_view(
    ctx: &SessionContext,
    cfg: &CleanConfig,
) -> Result<(), FirmPanelError> {
    list_matching_files(&cfg.staging_dir, &Regex::new(r"\.parquet$")?)?;

    let staging = format!("{}/", cfg.staging_dir.to_string_lossy().trim_end_matches('/'));
    ctx.register_parquet(RAW_TABLE, &staging, ParquetReadOptions::default())
        .await?;

    let ext = cfg
        .deflator_csv
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    ctx.register_csv(
        DEFLATOR_TABLE,
        cfg.deflator_csv.to_string_lossy().as_ref(),
        CsvReadOptions::new().has_header(true).file_extension(&ext),
    )
    .await?;

    let raw = ctx.table(RAW_TABLE).await?;
    let available: Vec<String> = raw
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    debug!("Staged data has {} column(s)", available.len());

    let sql = build_clean_sql(&available, cfg);
    debug!("Cleaning query:\n{sql}");
    let df = ctx.sql(&sql).await?;
    ctx.register_table(CLEAN_VIEW, df.into_view())?;
    Ok(())
}

/// Distinct fiscal years of the cleaned panel, ascending.
pub async fn distinct_years(ctx: &SessionContext) -> Result<Vec<i32>, FirmPanelError> {
    let batches = ctx
        .sql(&format!(
            "SELECT DISTINCT \"year\" FROM {CLEAN_VIEW} WHERE \"year\" IS NOT NULL ORDER BY \"year\""
        ))
        .await?
        .collect()
        .await?;

    let mut years = Vec::new();
    for b in &batches {
        let col = b
            .column(0)
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or_else(|| FirmPanelError::Other("Fiscal year column is not INT".to_string()))?;
        years.extend((0..col.len()).filter(|&i| col.is_valid(i)).map(|i| col.value(i)));
    }
    Ok(years)
}

/// Partition file name for a fiscal year.
pub fn partition_file_name(year: i32) -> String {
    format!("data_year={year}.{}", OutFormat::parquet)
}

async fn write_partition(
    ctx: &SessionContext,
    year: i32,
    wc: &WriteConfig,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<YearPartition, FirmPanelError> {
    // partitions are always replaced
    let path = wc.out_dir.join(partition_file_name(year));
    if let Some(p) = progress {
        p.stage_started(&format!("Fiscal year {year}"));
    }

    let mut stream = ctx
        .sql(&format!(
            "SELECT * FROM {CLEAN_VIEW} WHERE \"year\" = {year}"
        ))
        .await?
        .execute_stream()
        .await?;

    let mut wtr = BatchWriter::try_new(&path, OutFormat::parquet, stream.schema(), wc)?;
    while let Some(batch) = stream.next().await {
        let batch = batch?;
        wtr.write(&batch)?;
        if let Some(p) = progress {
            p.inc(batch.num_rows() as u64);
        }
    }
    let rows = wtr.finish()?;
    info!(
        "Wrote {} rows for fiscal year {} into {}",
        format_with_commas(rows),
        year,
        display_name(&path)
    );
    Ok(YearPartition { year, path, rows })
}

/// DataFusion session that keeps text as plain `Utf8`.
///
/// Staged chunks are read and SQL `VARCHAR` casts are planned as `Utf8` rather
/// than `Utf8View`, so partitions carry the same string type as the staged
/// files and downstream Arrow readers.
pub(crate) fn session_context() -> SessionContext {
    let config = SessionConfig::new()
        .set_bool("datafusion.sql_parser.map_string_types_to_utf8view", false)
        .set_bool("datafusion.execution.parquet.schema_force_view_types", false);
    SessionContext::new_with_config(config)
}

async fn clean_async(
    cfg: &CleanConfig,
    wc: &WriteConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<CleanSummary, FirmPanelError> {
    let ctx = session_context();
    register_clean_view(&ctx, cfg).await?;

    let mut summary = CleanSummary::default();
    for year in distinct_years(&ctx).await? {
        let part = write_partition(&ctx, year, wc, progress.as_ref()).await?;
        summary.total_rows += part.rows;
        summary.partitions.push(part);
    }
    Ok(summary)
}

/// Runs the cleaning query and writes one Parquet partition per fiscal year.
pub fn clean(
    cfg: &CleanConfig,
    wc: &WriteConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<CleanSummary, FirmPanelError> {
    if wc.out_dir == cfg.staging_dir {
        return Err(FirmPanelError::Other(
            "The output directory must differ from the staging directory".to_string(),
        ));
    }
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(clean_async(cfg, wc, progress))
}
