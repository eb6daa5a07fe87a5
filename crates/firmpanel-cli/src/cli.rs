//! CLI argument types for the firmpanel binary.

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use firmpanel::{ParquetCompression, SizeBucket, WRDS_DBNAME, WRDS_HOST};
use std::fmt;
use std::path::PathBuf;

/// 🏭 Build emerging-market firm-year panels from WRDS
///
/// Extract Orbis and Compustat batches, stage them as Parquet, clean them with
/// DataFusion, and export yearly partitions
#[derive(Parser, Debug)]
#[command(version)]
#[command(propagate_version = true)]
pub struct FirmPanelCli {
    #[command(subcommand)]
    pub command: FirmPanelCliCommands,
}

/// CLI subcommands for firmpanel.
#[derive(Debug, Subcommand)]
pub enum FirmPanelCliCommands {
    /// Extract batch files from WRDS into a scratch directory
    Extract {
        #[command(subcommand)]
        source: ExtractSource,
    },
    /// Convert CSV batch files to Parquet chunks{n}Only the close date column is typed; every other column stays text
    Convert {
        /// Directory holding the CSV batch files
        #[arg(value_hint = ValueHint::DirPath, value_parser)]
        input: PathBuf,
        /// Directory for the Parquet chunks (created if missing)
        #[arg(long, short = 'o', value_hint = ValueHint::DirPath, value_parser)]
        output: PathBuf,
        /// Regular expression selecting batch file names{n}Defaults to ^orbis_em_.*_part\d+\.csv$
        #[arg(long)]
        pattern: Option<String>,
        /// Number of rows per Parquet chunk{n}Defaults to 100,000 rows
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        chunk_rows: Option<u64>,
        /// Overwrite output files if they already exist
        #[arg(action, long)]
        overwrite: bool,
        /// Convert files in parallel
        #[arg(action, long)]
        parallel: bool,
        /// Do not display progress bar
        #[arg(action, long)]
        no_progress: bool,
        #[command(flatten)]
        parquet: ParquetArgs,
    },
    /// Clean staged Parquet chunks into one partition per fiscal year{n}Casts, filters, deduplicates, deflates, and converts to USD
    Clean {
        /// Directory holding the staged Parquet chunks
        #[arg(value_hint = ValueHint::DirPath, value_parser)]
        input: PathBuf,
        /// Deflator CSV with header ctryiso,year,gdpdef
        #[arg(long, value_hint = ValueHint::FilePath, value_parser)]
        deflator: PathBuf,
        /// Directory for the yearly partitions (created if missing){n}Existing partitions are replaced
        #[arg(long, short = 'o', value_hint = ValueHint::DirPath, value_parser)]
        output: PathBuf,
        /// Keep rows missing industry classification codes
        #[arg(action, long)]
        keep_unclassified: bool,
        /// First close month reported under the same calendar year{n}Earlier months belong to the previous fiscal year{n}Defaults to 6 (June)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        fiscal_cutoff_month: Option<u32>,
        /// Print the run summary as json
        #[arg(action, long)]
        as_json: bool,
        /// Do not display progress bar
        #[arg(action, long)]
        no_progress: bool,
        #[command(flatten)]
        parquet: ParquetArgs,
    },
    /// Export yearly Parquet partitions to CSV
    Export {
        /// Directory holding the yearly partitions
        #[arg(value_hint = ValueHint::DirPath, value_parser)]
        input: PathBuf,
        /// Directory for the CSV files (created if missing)
        #[arg(long, short = 'o', value_hint = ValueHint::DirPath, value_parser)]
        output: PathBuf,
        /// Regular expression selecting partition file names{n}Defaults to every .parquet file
        #[arg(long)]
        pattern: Option<String>,
        /// Overwrite output files if they already exist
        #[arg(action, long)]
        overwrite: bool,
        /// Export files in parallel
        #[arg(action, long)]
        parallel: bool,
        /// Do not display progress bar
        #[arg(action, long)]
        no_progress: bool,
    },
    /// Display metadata of a CSV or Parquet file
    Metadata {
        /// Path to a csv or parquet file
        #[arg(value_hint = ValueHint::FilePath, value_parser)]
        input: PathBuf,
        /// Display metadata as json
        #[arg(action, long)]
        as_json: bool,
    },
    /// Preview a CSV or Parquet file, or a directory of Parquet files, as CSV
    Preview {
        /// Path to a csv or parquet file, or a directory of parquet files
        #[arg(value_hint = ValueHint::AnyPath, value_parser)]
        input: PathBuf,
        /// Number of rows to write
        #[arg(default_value = "10", long, value_parser)]
        rows: u32,
        /// SQL query to run against the data{n}The table name is "data"
        #[arg(long)]
        sql: Option<String>,
        /// Path to a file containing a SQL query{n}Mutually exclusive with --sql
        #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "sql")]
        sql_file: Option<PathBuf>,
    },
}

/// Remote sources for the `extract` subcommand.
#[derive(Debug, Subcommand)]
pub enum ExtractSource {
    /// Extract Orbis firm financials for emerging markets
    Orbis {
        /// Size buckets to extract{n}Defaults to small,medium,large
        #[arg(long, value_enum, value_delimiter = ',', num_args = 1..)]
        buckets: Option<Vec<CliSizeBucket>>,
        /// First calendar year of statement close dates
        #[arg(long, default_value = "2005")]
        from_year: i32,
        /// Last calendar year of statement close dates
        #[arg(long, default_value = "2024")]
        to_year: i32,
        /// Years per query window{n}Defaults to 1 for small firms and 5 for medium and large firms
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        window_years: Option<u32>,
        /// Comma-separated ISO country codes{n}Defaults to the MSCI emerging markets
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        countries: Option<Vec<String>>,
        /// Path to a file of financial column names (one per line, # comments);
        /// replaces the per-bucket default list
        #[arg(long, value_hint = ValueHint::FilePath)]
        columns_file: Option<PathBuf>,
        /// Number of rows per batch file{n}Defaults to 50,000 for small firms and 250,000 for medium and large firms
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        batch_rows: Option<u64>,
        /// Scratch directory for the batch files (created if missing)
        #[arg(long, short = 'o', value_hint = ValueHint::DirPath, value_parser)]
        output: PathBuf,
        /// Overwrite batch files if they already exist
        #[arg(action, long)]
        overwrite: bool,
        /// Do not display progress bar
        #[arg(action, long)]
        no_progress: bool,
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Extract Compustat annual fundamentals
    Compustat {
        /// First fiscal year
        #[arg(long, default_value = "2009")]
        from_year: i32,
        /// Last fiscal year
        #[arg(long, default_value = "2023")]
        to_year: i32,
        /// Comma-separated column names{n}Defaults to gvkey,conm,fyr,naicsh,sich,ap,invt,rect,rectr,oancf,capx,fyear
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        columns: Option<Vec<String>>,
        /// Number of rows per batch file
        #[arg(long, default_value = "100000", value_parser = clap::value_parser!(u64).range(1..))]
        batch_rows: u64,
        /// Scratch directory for the batch files (created if missing)
        #[arg(long, short = 'o', value_hint = ValueHint::DirPath, value_parser)]
        output: PathBuf,
        /// Overwrite batch files if they already exist
        #[arg(action, long)]
        overwrite: bool,
        /// Do not display progress bar
        #[arg(action, long)]
        no_progress: bool,
        #[command(flatten)]
        conn: ConnectionArgs,
    },
}

/// WRDS connection options.
#[derive(Debug, Args)]
pub struct ConnectionArgs {
    /// WRDS PostgreSQL host
    #[arg(long, env = "WRDS_HOST", default_value = WRDS_HOST)]
    pub host: String,
    /// WRDS PostgreSQL port
    #[arg(long, env = "WRDS_PORT", default_value = "9737")]
    pub port: u16,
    /// Database name
    #[arg(long, default_value = WRDS_DBNAME)]
    pub dbname: String,
    /// WRDS user name
    #[arg(long, env = "WRDS_USER")]
    pub user: String,
    /// WRDS password
    #[arg(long, env = "WRDS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Connect over TLS (requires the tls feature)
    #[arg(action, long)]
    pub tls: bool,
}

/// Parquet output options.
#[derive(Debug, Args)]
pub struct ParquetArgs {
    /// Parquet compression algorithm{n}Defaults to snappy
    #[arg(long, value_enum, value_parser)]
    pub compression: Option<CliParquetCompression>,
    /// Parquet compression level (if applicable)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=22))]
    pub compression_level: Option<u32>,
}

/// CLI Orbis size bucket (with clap `ValueEnum` derive).
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliSizeBucket {
    /// Small firms.
    Small,
    /// Medium firms.
    Medium,
    /// Large firms.
    Large,
}

impl From<CliSizeBucket> for SizeBucket {
    fn from(b: CliSizeBucket) -> Self {
        match b {
            CliSizeBucket::Small => SizeBucket::Small,
            CliSizeBucket::Medium => SizeBucket::Medium,
            CliSizeBucket::Large => SizeBucket::Large,
        }
    }
}

impl fmt::Display for CliSizeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&SizeBucket::from(*self), f)
    }
}

/// CLI Parquet compression algorithm (with clap `ValueEnum` derive).
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliParquetCompression {
    /// No compression.
    Uncompressed,
    /// Snappy compression (fast, moderate ratio).
    Snappy,
    /// Gzip compression (levels 0-9).
    Gzip,
    /// LZ4 raw compression.
    Lz4Raw,
    /// Brotli compression (levels 0-11).
    Brotli,
    /// Zstandard compression (levels 0-22).
    Zstd,
}

impl From<CliParquetCompression> for ParquetCompression {
    fn from(c: CliParquetCompression) -> Self {
        match c {
            CliParquetCompression::Uncompressed => ParquetCompression::Uncompressed,
            CliParquetCompression::Snappy => ParquetCompression::Snappy,
            CliParquetCompression::Gzip => ParquetCompression::Gzip,
            CliParquetCompression::Lz4Raw => ParquetCompression::Lz4Raw,
            CliParquetCompression::Brotli => ParquetCompression::Brotli,
            CliParquetCompression::Zstd => ParquetCompression::Zstd,
        }
    }
}

impl fmt::Display for CliParquetCompression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&ParquetCompression::from(*self), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        FirmPanelCli::command().debug_assert();
    }

    #[test]
    fn parse_orbis_buckets() {
        let cli = FirmPanelCli::try_parse_from([
            "firmpanel",
            "extract",
            "orbis",
            "--buckets",
            "medium,large",
            "--user",
            "jdoe",
            "-o",
            "scratch",
        ])
        .unwrap();
        match cli.command {
            FirmPanelCliCommands::Extract {
                source: ExtractSource::Orbis { buckets, conn, .. },
            } => {
                let b: Vec<SizeBucket> = buckets.unwrap().into_iter().map(Into::into).collect();
                assert_eq!(b, vec![SizeBucket::Medium, SizeBucket::Large]);
                assert_eq!(conn.port, 9737);
                assert_eq!(conn.dbname, "wrds");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn clean_rejects_bad_month() {
        let res = FirmPanelCli::try_parse_from([
            "firmpanel",
            "clean",
            "staging",
            "--deflator",
            "defl.csv",
            "-o",
            "out",
            "--fiscal-cutoff-month",
            "13",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn compression_display() {
        assert_eq!(CliParquetCompression::Lz4Raw.to_string(), "lz4-raw");
        assert_eq!(CliSizeBucket::Small.to_string(), "small");
    }
}
