//! Batch extraction from the remote WRDS databases.
//!
//! Queries are rendered from the column catalogue ([`build_orbis_query`],
//! [`build_compustat_query`]) and streamed through a server-side cursor. Each
//! cursor fetch becomes one numbered CSV batch file in the scratch directory.
//!
//! The database side is hidden behind two traits. A [`QueryRunner`] opens a
//! [`BatchSource`] for a query; [`drain_to_files`] writes whatever the source
//! yields. [`WrdsConnection`] implements the runner over the PostgreSQL wire
//! protocol with `tokio-postgres` on a current-thread runtime.

use std::path::PathBuf;
use std::sync::Arc;

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;
use chrono::{Datelike, NaiveDate};
use log::{debug, error, info};
use tokio_postgres::SimpleQueryMessage;

use crate::columns;
use crate::common::{display_name, format_with_commas};
use crate::err::FirmPanelError;
use crate::fp_batch::{TextBatchBuilder, text_schema};
use crate::fp_write::BatchWriter;
use crate::fp_write_config::{OutFormat, WriteConfig};
use crate::progress::ProgressCallback;

/// Default WRDS PostgreSQL host.
pub const WRDS_HOST: &str = "wrds-pgdata.wharton.upenn.edu";
/// Default WRDS PostgreSQL port.
pub const WRDS_PORT: u16 = 9737;
/// Default WRDS database name.
pub const WRDS_DBNAME: &str = "wrds";

/// Default Compustat batch size.
pub const COMPUSTAT_BATCH_ROWS: usize = 100_000;

const CURSOR_NAME: &str = "firmpanel_cursor";

/// Orbis firm-size bucket; each lives in its own schema with its own table suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeBucket {
    /// `bvd_orbis_small`, suffix `s`.
    Small,
    /// `bvd_orbis_medium`, suffix `m`.
    Medium,
    /// `bvd_orbis_large`, suffix `l`.
    Large,
}

impl SizeBucket {
    /// Lowercase bucket name used in schema and file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    /// Source schema, e.g. `bvd_orbis_small`.
    pub fn schema(&self) -> String {
        format!("bvd_orbis_{}", self.name())
    }

    /// Table name suffix.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Small => "s",
            Self::Medium => "m",
            Self::Large => "l",
        }
    }

    /// Country column of the company id table.
    ///
    /// The small-firm table only carries the contact address country.
    pub fn country_column(&self) -> &'static str {
        match self {
            Self::Small => "contact_ctryiso",
            Self::Medium | Self::Large => "ctryiso",
        }
    }

    /// Default financial allowlist for this bucket's cash-flow table version.
    pub fn financial_columns(&self) -> &'static [&'static str] {
        match self {
            Self::Small => columns::FINANCIAL_SMALL,
            Self::Medium | Self::Large => columns::FINANCIAL_MEDLARGE,
        }
    }

    /// Rows per cursor fetch, and so per batch file.
    pub fn default_batch_rows(&self) -> usize {
        match self {
            Self::Small => 50_000,
            Self::Medium | Self::Large => 250_000,
        }
    }

    /// Width of each query window in years.
    pub fn default_window_years(&self) -> u32 {
        match self {
            Self::Small => 1,
            Self::Medium | Self::Large => 5,
        }
    }
}

impl std::fmt::Display for SizeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive range of statement closing dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// First close date included.
    pub start: NaiveDate,
    /// Last close date included.
    pub end: NaiveDate,
}

impl TimeWindow {
    /// Creates a window, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FirmPanelError> {
        if start > end {
            return Err(FirmPanelError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// One window per calendar year from `from` to `to` inclusive.
    pub fn yearly(from: i32, to: i32) -> Result<Vec<Self>, FirmPanelError> {
        Self::spans(from, to, 1)
    }

    /// Consecutive windows of `years` calendar years covering `from..=to`.
    ///
    /// The last window is cut short at the end of `to`.
    pub fn spans(from: i32, to: i32, years: u32) -> Result<Vec<Self>, FirmPanelError> {
        let first = year_start(from)?;
        let last = year_end(to)?;
        if first > last {
            return Err(FirmPanelError::InvalidWindow {
                start: first,
                end: last,
            });
        }
        if years == 0 {
            return Err(FirmPanelError::Other(
                "Window width must be at least one year".to_string(),
            ));
        }

        let step = years as i32;
        let mut windows = Vec::new();
        let mut y = from;
        while y <= to {
            let end_year = (y + step - 1).min(to);
            windows.push(Self::new(year_start(y)?, year_end(end_year)?)?);
            y += step;
        }
        Ok(windows)
    }

    /// Calendar year of the first day.
    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    /// Calendar year of the last day.
    pub fn end_year(&self) -> i32 {
        self.end.year()
    }
}

fn year_start(y: i32) -> Result<NaiveDate, FirmPanelError> {
    NaiveDate::from_ymd_opt(y, 1, 1)
        .ok_or_else(|| FirmPanelError::Other(format!("Year {y} is out of range")))
}

fn year_end(y: i32) -> Result<NaiveDate, FirmPanelError> {
    NaiveDate::from_ymd_opt(y, 12, 31)
        .ok_or_else(|| FirmPanelError::Other(format!("Year {y} is out of range")))
}

/// Column allowlist for the three Orbis tables.
#[derive(Debug, Clone)]
pub struct OrbisColumns {
    /// Company id table columns (alias `c`).
    pub static_cols: Vec<String>,
    /// Industry classification columns (alias `p`).
    pub sector: Vec<String>,
    /// Financial columns (alias `f`); each bucket's own list when `None`.
    pub financial: Option<Vec<String>>,
}

impl Default for OrbisColumns {
    fn default() -> Self {
        let owned = |cols: &[&str]| -> Vec<String> { cols.iter().map(|c| c.to_string()).collect() };
        Self {
            static_cols: owned(columns::STATIC),
            sector: owned(columns::SECTOR),
            financial: None,
        }
    }
}

impl OrbisColumns {
    /// Replaces the financial allowlist, e.g. from a columns file.
    pub fn with_financial(mut self, financial: Vec<String>) -> Self {
        self.financial = Some(financial);
        self
    }

    /// Financial columns selected for `bucket`.
    pub fn financial_for(&self, bucket: SizeBucket) -> Vec<String> {
        match &self.financial {
            Some(cols) => cols.clone(),
            None => bucket
                .financial_columns()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

fn validate_identifier(name: &str) -> Result<&str, FirmPanelError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(FirmPanelError::Other(format!(
            "{name:?} is not a valid column name"
        )))
    }
}

fn validate_country(code: &str) -> Result<&str, FirmPanelError> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(FirmPanelError::Other(format!(
            "{code:?} is not a two-letter uppercase ISO country code"
        )))
    }
}

fn qualified(alias: &str, cols: &[String]) -> Result<Vec<String>, FirmPanelError> {
    cols.iter()
        .map(|c| validate_identifier(c).map(|c| format!("{alias}.{c}")))
        .collect()
}

/// Renders the three-table Orbis join for one bucket and window.
///
/// The bucket's country column is always selected as `ctryiso`. Rows are ordered
/// by country, firm and close date.
pub fn build_orbis_query(
    bucket: SizeBucket,
    window: &TimeWindow,
    countries: &[String],
    cols: &OrbisColumns,
) -> Result<String, FirmPanelError> {
    if countries.is_empty() {
        return Err(FirmPanelError::Other(
            "At least one country code is required".to_string(),
        ));
    }
    let iso_list = countries
        .iter()
        .map(|c| validate_country(c).map(|c| format!("'{c}'")))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let country = bucket.country_column();
    let mut select = qualified("c", &cols.static_cols)?;
    select.push(format!("c.{country} AS {}", columns::COUNTRY));
    select.extend(qualified("p", &cols.sector)?);
    select.extend(qualified("f", &cols.financial_for(bucket))?);

    let schema = bucket.schema();
    let suffix = bucket.suffix();
    let id = columns::FIRM_ID;
    let close = columns::CLOSE_DATE;

    Ok(format!(
        "SELECT {select}\n\
         FROM {schema}.ob_w_ind_g_fins_cfl_usd_{suffix} AS f\n  \
         JOIN {schema}.ob_w_company_id_table_{suffix} AS c ON f.{id} = c.{id}\n  \
         JOIN {schema}.ob_industry_classifications_{suffix} AS p ON f.{id} = p.{id}\n\
         WHERE c.{country} IN ({iso_list})\n  \
         AND f.{close} BETWEEN '{start}' AND '{end}'\n\
         ORDER BY c.{country}, c.{id}, f.{close}",
        select = select.join(", "),
        start = window.start.format("%Y-%m-%d"),
        end = window.end.format("%Y-%m-%d"),
    ))
}

/// Renders the Compustat annual fundamentals query for one fiscal year.
pub fn build_compustat_query(year: i32, cols: &[String]) -> Result<String, FirmPanelError> {
    if cols.is_empty() {
        return Err(FirmPanelError::Other(
            "At least one Compustat column is required".to_string(),
        ));
    }
    let select = cols
        .iter()
        .map(|c| validate_identifier(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    Ok(format!(
        "SELECT {select}\nFROM comp.funda\nWHERE fyear = {year}"
    ))
}

/// Batch file name stem for an Orbis window, e.g. `orbis_em_small_2005_2005`.
pub fn orbis_file_stem(bucket: SizeBucket, window: &TimeWindow) -> String {
    format!(
        "orbis_em_{}_{}_{}",
        bucket.name(),
        window.start_year(),
        window.end_year()
    )
}

/// Batch file name stem for a Compustat fiscal year, e.g. `comp_2015`.
pub fn compustat_file_stem(year: i32) -> String {
    format!("comp_{year}")
}

/// A stream of text record batches, one per remote fetch.
pub trait BatchSource {
    /// Returns the next batch, or `None` once the result set is exhausted.
    fn next_batch(&mut self) -> Result<Option<RecordBatch>, FirmPanelError>;

    /// Releases server-side resources after the last batch.
    fn finish(&mut self) -> Result<(), FirmPanelError> {
        Ok(())
    }
}

/// Opens a [`BatchSource`] for a query.
pub trait QueryRunner {
    /// Starts streaming `query` in batches of at most `batch_rows` rows.
    fn stream<'a>(
        &'a self,
        query: &str,
        batch_rows: usize,
    ) -> Result<Box<dyn BatchSource + 'a>, FirmPanelError>;
}

/// One written batch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFile {
    /// Absolute path of the CSV file.
    pub path: PathBuf,
    /// Data rows in the file, excluding the header.
    pub rows: usize,
}

/// Writes every batch from `source` to `<stem>_part<n>.csv` in the output
/// directory, numbering from 1. An empty batch ends the stream.
pub fn drain_to_files(
    source: &mut dyn BatchSource,
    stem: &str,
    wc: &WriteConfig,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<Vec<BatchFile>, FirmPanelError> {
    let mut files = Vec::new();
    while let Some(batch) = source.next_batch()? {
        if batch.num_rows() == 0 {
            break;
        }
        let name = format!("{stem}_part{}.{}", files.len() + 1, OutFormat::csv);
        let path = wc.out_path(&name)?;

        let mut wtr = BatchWriter::try_new(&path, OutFormat::csv, batch.schema(), wc)?;
        wtr.write(&batch)?;
        let rows = wtr.finish()?;

        info!(
            "[{stem}] wrote {} rows into {}",
            format_with_commas(rows),
            display_name(&path)
        );
        if let Some(p) = progress {
            p.inc(rows as u64);
        }
        files.push(BatchFile { path, rows });
    }
    source.finish()?;
    Ok(files)
}

/// Orbis extraction settings.
#[derive(Debug, Clone)]
pub struct OrbisExtractConfig {
    /// Size buckets to extract, in order.
    pub buckets: Vec<SizeBucket>,
    /// First calendar year of statement close dates.
    pub from_year: i32,
    /// Last calendar year of statement close dates.
    pub to_year: i32,
    /// Window width in years; each bucket's default when `None`.
    pub window_years: Option<u32>,
    /// Country codes (ISO 3166-1 alpha-2).
    pub countries: Vec<String>,
    /// Column allowlist.
    pub columns: OrbisColumns,
    /// Rows per batch file; each bucket's default when `None`.
    pub batch_rows: Option<usize>,
}

impl Default for OrbisExtractConfig {
    fn default() -> Self {
        Self {
            buckets: vec![SizeBucket::Small, SizeBucket::Medium, SizeBucket::Large],
            from_year: 2005,
            to_year: 2024,
            window_years: None,
            countries: columns::EM_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            columns: OrbisColumns::default(),
            batch_rows: None,
        }
    }
}

impl OrbisExtractConfig {
    /// Windows queried for `bucket`.
    pub fn windows(&self, bucket: SizeBucket) -> Result<Vec<TimeWindow>, FirmPanelError> {
        let years = self
            .window_years
            .unwrap_or_else(|| bucket.default_window_years());
        TimeWindow::spans(self.from_year, self.to_year, years)
    }
}

/// Compustat extraction settings.
#[derive(Debug, Clone)]
pub struct CompustatExtractConfig {
    /// First fiscal year.
    pub from_year: i32,
    /// Last fiscal year.
    pub to_year: i32,
    /// Selected columns, `fyear` included.
    pub columns: Vec<String>,
    /// Rows per batch file.
    pub batch_rows: usize,
}

impl Default for CompustatExtractConfig {
    fn default() -> Self {
        Self {
            from_year: 2009,
            to_year: 2023,
            columns: columns::COMPUSTAT.iter().map(|c| c.to_string()).collect(),
            batch_rows: COMPUSTAT_BATCH_ROWS,
        }
    }
}

/// Runs the Orbis extraction for every (bucket, window) pair.
pub fn extract_orbis(
    runner: &dyn QueryRunner,
    cfg: &OrbisExtractConfig,
    wc: &WriteConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<BatchFile>, FirmPanelError> {
    let mut files = Vec::new();
    for &bucket in &cfg.buckets {
        let batch_rows = cfg.batch_rows.unwrap_or_else(|| bucket.default_batch_rows());
        for window in cfg.windows(bucket)? {
            let stem = orbis_file_stem(bucket, &window);
            if let Some(p) = &progress {
                p.stage_started(&format!(
                    "{} {}-{}",
                    bucket,
                    window.start_year(),
                    window.end_year()
                ));
            }

            let query = build_orbis_query(bucket, &window, &cfg.countries, &cfg.columns)?;
            debug!("Orbis query for {stem}:\n{query}");

            let mut source = runner.stream(&query, batch_rows)?;
            files.extend(drain_to_files(source.as_mut(), &stem, wc, progress.as_ref())?);
        }
    }
    Ok(files)
}

/// Runs the Compustat extraction, one query per fiscal year.
pub fn extract_compustat(
    runner: &dyn QueryRunner,
    cfg: &CompustatExtractConfig,
    wc: &WriteConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<BatchFile>, FirmPanelError> {
    if cfg.from_year > cfg.to_year {
        return Err(FirmPanelError::InvalidWindow {
            start: year_start(cfg.from_year)?,
            end: year_end(cfg.to_year)?,
        });
    }

    let mut files = Vec::new();
    for year in cfg.from_year..=cfg.to_year {
        if let Some(p) = &progress {
            p.stage_started(&format!("Compustat fiscal year {year}"));
        }
        let query = build_compustat_query(year, &cfg.columns)?;
        debug!("Compustat query for {year}:\n{query}");

        let mut source = runner.stream(&query, cfg.batch_rows)?;
        files.extend(drain_to_files(
            source.as_mut(),
            &compustat_file_stem(year),
            wc,
            progress.as_ref(),
        )?);
    }
    Ok(files)
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub dbname: String,
    /// WRDS user name.
    pub user: String,
    /// Password; `None` leaves authentication to the server's defaults.
    pub password: Option<String>,
    /// Negotiate TLS (requires the `tls` feature).
    pub tls: bool,
}

impl ConnectionConfig {
    /// WRDS defaults for `user`.
    pub fn wrds(user: impl Into<String>) -> Self {
        Self {
            host: WRDS_HOST.to_string(),
            port: WRDS_PORT,
            dbname: WRDS_DBNAME.to_string(),
            user: user.into(),
            password: None,
            tls: false,
        }
    }

    fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .application_name("firmpanel");
        if let Some(pw) = &self.password {
            pg.password(pw);
        }
        if self.tls {
            pg.ssl_mode(tokio_postgres::config::SslMode::Require);
        }
        pg
    }
}

/// Blocking handle to a WRDS PostgreSQL session.
///
/// Owns a current-thread runtime; the connection task runs whenever a call
/// blocks on it.
pub struct WrdsConnection {
    rt: tokio::runtime::Runtime,
    client: tokio_postgres::Client,
}

impl WrdsConnection {
    /// Connects and authenticates.
    pub fn connect(cfg: &ConnectionConfig) -> Result<Self, FirmPanelError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = rt.block_on(connect_client(cfg))?;
        info!("Connected to {}:{}/{} as {}", cfg.host, cfg.port, cfg.dbname, cfg.user);
        Ok(Self { rt, client })
    }

    fn batch_execute(&self, sql: &str) -> Result<(), FirmPanelError> {
        self.rt.block_on(self.client.batch_execute(sql))?;
        Ok(())
    }

    fn simple_query(&self, sql: &str) -> Result<Vec<SimpleQueryMessage>, FirmPanelError> {
        Ok(self.rt.block_on(self.client.simple_query(sql))?)
    }
}

impl QueryRunner for WrdsConnection {
    fn stream<'a>(
        &'a self,
        query: &str,
        batch_rows: usize,
    ) -> Result<Box<dyn BatchSource + 'a>, FirmPanelError> {
        Ok(Box::new(PgCursor::open(self, query, batch_rows)?))
    }
}

async fn connect_client(cfg: &ConnectionConfig) -> Result<tokio_postgres::Client, FirmPanelError> {
    let pg = cfg.pg_config();

    #[cfg(feature = "tls")]
    if cfg.tls {
        let connector = native_tls::TlsConnector::builder().build()?;
        let (client, connection) = pg
            .connect(postgres_native_tls::MakeTlsConnector::new(connector))
            .await?;
        spawn_connection(connection);
        return Ok(client);
    }

    #[cfg(not(feature = "tls"))]
    if cfg.tls {
        return Err(FirmPanelError::Other(
            "TLS was requested but firmpanel was built without the tls feature".to_string(),
        ));
    }

    let (client, connection) = pg.connect(tokio_postgres::NoTls).await?;
    spawn_connection(connection);
    Ok(client)
}

fn spawn_connection<F>(connection: F)
where
    F: std::future::Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {e}");
        }
    });
}

/// Server-side cursor inside its own transaction.
///
/// Every [`next_batch`](BatchSource::next_batch) issues one `FETCH`; values
/// arrive as text and SQL NULL becomes a null field.
pub struct PgCursor<'a> {
    conn: &'a WrdsConnection,
    batch_rows: usize,
    schema: Option<SchemaRef>,
    open: bool,
}

impl<'a> PgCursor<'a> {
    /// Begins a transaction and declares the cursor for `query`.
    pub fn open(
        conn: &'a WrdsConnection,
        query: &str,
        batch_rows: usize,
    ) -> Result<Self, FirmPanelError> {
        if batch_rows == 0 {
            return Err(FirmPanelError::Other(
                "Batch size must be at least one row".to_string(),
            ));
        }
        conn.batch_execute(&format!(
            "BEGIN; DECLARE {CURSOR_NAME} NO SCROLL CURSOR FOR {query}"
        ))?;
        Ok(Self {
            conn,
            batch_rows,
            schema: None,
            open: true,
        })
    }
}

impl BatchSource for PgCursor<'_> {
    fn next_batch(&mut self) -> Result<Option<RecordBatch>, FirmPanelError> {
        if !self.open {
            return Ok(None);
        }
        let messages = self
            .conn
            .simple_query(&format!("FETCH {} FROM {CURSOR_NAME}", self.batch_rows))?;

        let mut builder: Option<TextBatchBuilder> = None;
        for m in &messages {
            let SimpleQueryMessage::Row(row) = m else {
                continue;
            };
            let b = builder.get_or_insert_with(|| {
                let schema = self.schema.get_or_insert_with(|| {
                    let names: Vec<&str> = row.columns().iter().map(|c| c.name()).collect();
                    text_schema(&names)
                });
                TextBatchBuilder::new(schema.clone())
            });
            let values = (0..row.len())
                .map(|i| row.try_get(i))
                .collect::<Result<Vec<Option<&str>>, _>>()?;
            b.append_row(values)?;
        }

        match builder {
            Some(mut b) => Ok(Some(b.finish()?)),
            None => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<(), FirmPanelError> {
        if self.open {
            self.conn
                .batch_execute(&format!("CLOSE {CURSOR_NAME}; COMMIT"))?;
            self.open = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // --- TimeWindow ---

    #[test]
    fn window_rejects_reversed_dates() {
        let err = TimeWindow::new(ymd(2010, 1, 1), ymd(2009, 12, 31)).unwrap_err();
        assert!(matches!(err, FirmPanelError::InvalidWindow { .. }));
    }

    #[test]
    fn yearly_windows() {
        let w = TimeWindow::yearly(2005, 2007).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w[0].start, ymd(2005, 1, 1));
        assert_eq!(w[0].end, ymd(2005, 12, 31));
        assert_eq!(w[2].start_year(), 2007);
    }

    #[test]
    fn five_year_spans() {
        let w = TimeWindow::spans(2005, 2024, 5).unwrap();
        let years: Vec<_> = w.iter().map(|w| (w.start_year(), w.end_year())).collect();
        assert_eq!(
            years,
            vec![(2005, 2009), (2010, 2014), (2015, 2019), (2020, 2024)]
        );
    }

    #[test]
    fn spans_clip_last_window() {
        let w = TimeWindow::spans(2005, 2011, 5).unwrap();
        assert_eq!(w.last().unwrap().end, ymd(2011, 12, 31));
    }

    #[test]
    fn spans_reject_reversed_years() {
        assert!(TimeWindow::spans(2010, 2009, 1).is_err());
        assert!(TimeWindow::spans(2009, 2010, 0).is_err());
    }

    // --- SizeBucket ---

    #[test]
    fn bucket_names() {
        assert_eq!(SizeBucket::Small.schema(), "bvd_orbis_small");
        assert_eq!(SizeBucket::Large.suffix(), "l");
        assert_eq!(SizeBucket::Small.country_column(), "contact_ctryiso");
        assert_eq!(SizeBucket::Medium.country_column(), "ctryiso");
    }

    #[test]
    fn default_windows_per_bucket() {
        let cfg = OrbisExtractConfig::default();
        assert_eq!(cfg.windows(SizeBucket::Small).unwrap().len(), 20);
        assert_eq!(cfg.windows(SizeBucket::Medium).unwrap().len(), 4);
    }

    // --- build_orbis_query ---

    #[test]
    fn small_query_aliases_contact_country() {
        let w = TimeWindow::yearly(2015, 2015).unwrap()[0];
        let q = build_orbis_query(
            SizeBucket::Small,
            &w,
            &["BR".to_string(), "CN".to_string()],
            &OrbisColumns::default(),
        )
        .unwrap();

        assert!(q.contains("c.contact_ctryiso AS ctryiso"));
        assert!(q.contains("FROM bvd_orbis_small.ob_w_ind_g_fins_cfl_usd_s AS f"));
        assert!(q.contains("JOIN bvd_orbis_small.ob_w_company_id_table_s AS c ON f.bvdid = c.bvdid"));
        assert!(q.contains("JOIN bvd_orbis_small.ob_industry_classifications_s AS p ON f.bvdid = p.bvdid"));
        assert!(q.contains("WHERE c.contact_ctryiso IN ('BR', 'CN')"));
        assert!(q.contains("f.closdate BETWEEN '2015-01-01' AND '2015-12-31'"));
        assert!(q.ends_with("ORDER BY c.contact_ctryiso, c.bvdid, f.closdate"));
    }

    #[test]
    fn large_query_uses_ctryiso() {
        let w = TimeWindow::spans(2010, 2014, 5).unwrap()[0];
        let q = build_orbis_query(
            SizeBucket::Large,
            &w,
            &["IN".to_string()],
            &OrbisColumns::default(),
        )
        .unwrap();
        assert!(q.contains("c.ctryiso AS ctryiso"));
        assert!(q.contains("bvd_orbis_large.ob_w_company_id_table_l"));
        assert!(q.contains("p.ussiccdes"));
        assert!(q.contains("f.toas"));
    }

    #[test]
    fn financial_columns_follow_table_version() {
        let w = TimeWindow::spans(2010, 2014, 5).unwrap()[0];
        let iso = ["BR".to_string()];
        for bucket in [SizeBucket::Medium, SizeBucket::Large] {
            let q = build_orbis_query(bucket, &w, &iso, &OrbisColumns::default()).unwrap();
            assert!(q.contains("f.has_cashflow_tables"), "{bucket}");
            assert!(!q.contains("f.fdpp"), "{bucket}");
            assert!(!q.contains("f._315523"), "{bucket}");
        }

        let q = build_orbis_query(SizeBucket::Small, &w, &iso, &OrbisColumns::default()).unwrap();
        assert!(q.contains("f.fdpp"));
        assert!(!q.contains("has_cashflow_tables"));

        let cols = OrbisColumns::default().with_financial(vec!["closdate".to_string()]);
        let q = build_orbis_query(SizeBucket::Large, &w, &iso, &cols).unwrap();
        assert!(q.contains("f.closdate"));
        assert!(!q.contains("f.has_cashflow_tables"));
    }

    #[test]
    fn query_rejects_bad_identifiers() {
        let w = TimeWindow::yearly(2015, 2015).unwrap()[0];
        let cols = OrbisColumns::default().with_financial(vec!["toas; DROP".to_string()]);
        assert!(build_orbis_query(SizeBucket::Small, &w, &["BR".to_string()], &cols).is_err());
        assert!(
            build_orbis_query(
                SizeBucket::Small,
                &w,
                &["B'R".to_string()],
                &OrbisColumns::default()
            )
            .is_err()
        );
        assert!(build_orbis_query(SizeBucket::Small, &w, &[], &OrbisColumns::default()).is_err());
    }

    // --- build_compustat_query ---

    #[test]
    fn compustat_query_filters_one_year() {
        let cols: Vec<String> = columns::COMPUSTAT.iter().map(|c| c.to_string()).collect();
        let q = build_compustat_query(2015, &cols).unwrap();
        assert!(q.starts_with("SELECT gvkey, conm, fyr"));
        assert!(q.contains("FROM comp.funda"));
        assert!(q.ends_with("WHERE fyear = 2015"));
    }

    // --- file stems ---

    #[test]
    fn file_stems() {
        let w = TimeWindow::spans(2005, 2009, 5).unwrap()[0];
        assert_eq!(orbis_file_stem(SizeBucket::Medium, &w), "orbis_em_medium_2005_2009");
        assert_eq!(compustat_file_stem(2012), "comp_2012");
    }
}
