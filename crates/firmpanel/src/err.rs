use chrono::NaiveDate;

/// Errors raised by any pipeline stage.
///
/// No stage retries or recovers; every error aborts the current run.
#[derive(Debug, thiserror::Error)]
pub enum FirmPanelError {
    /// A non-blank close date could not be parsed.
    #[error("Failed to parse {value:?} in column {column} as a date")]
    DateParse {
        /// Column holding the value.
        column: String,
        /// Raw text that failed to parse.
        value: String,
    },

    /// An extraction window whose start falls after its end.
    #[error("Invalid time window: start {start} is after end {end}")]
    InvalidWindow {
        /// First day of the window.
        start: NaiveDate,
        /// Last day of the window.
        end: NaiveDate,
    },

    /// A stage found nothing to read.
    #[error("No files matching {pattern} found in {dir}")]
    NoInputFiles {
        /// Directory that was listed.
        dir: String,
        /// File name pattern applied to the listing.
        pattern: String,
    },

    /// A database row whose width differs from the batch schema.
    #[error("Row has {found} values but the batch has {expected} columns")]
    RowWidthMismatch {
        /// Columns in the batch schema.
        expected: usize,
        /// Values in the row.
        found: usize,
    },

    /// Arrow array or CSV error.
    #[error("{0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet read or write error.
    #[error("{0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Query planning or execution error.
    #[error("{0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Database connection or query error.
    #[error("{0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// TLS connector setup error.
    #[cfg(feature = "tls")]
    #[error("{0}")]
    Tls(#[from] native_tls::Error),

    /// Filesystem error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Path could not be made absolute.
    #[error("{0}")]
    PathAbs(#[from] path_abs::Error),

    /// Invalid file name pattern.
    #[error("{0}")]
    Regex(#[from] regex::Error),

    /// JSON serialization error.
    #[error("{0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Worker pool could not be built.
    #[error("{0}")]
    Rayon(#[from] rayon::ThreadPoolBuildError),

    /// Any other failure, with its message.
    #[error("{0}")]
    Other(String),
}
