//! Output configuration shared by every stage that writes files.
//!
//! [`WriteConfig`] captures the output directory, overwrite behavior and Parquet
//! compression settings. Each stage derives its file names from the directory;
//! the config only validates where they go and how they are encoded.

use std::path::{Path, PathBuf};

use parquet::basic::{BrotliLevel, Compression as ParquetCompressionCodec, GzipLevel, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties, WriterVersion};

use crate::err::FirmPanelError;

/// Output file format of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum OutFormat {
    /// Comma-separated values with a header row.
    csv,
    /// Apache Parquet columnar format.
    parquet,
}

impl OutFormat {
    /// File extension written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::csv => "csv",
            Self::parquet => "parquet",
        }
    }
}

impl std::fmt::Display for OutFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parquet compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParquetCompression {
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

impl std::fmt::Display for ParquetCompression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uncompressed => f.write_str("uncompressed"),
            Self::Snappy => f.write_str("snappy"),
            Self::Gzip => f.write_str("gzip"),
            Self::Lz4Raw => f.write_str("lz4-raw"),
            Self::Brotli => f.write_str("brotli"),
            Self::Zstd => f.write_str("zstd"),
        }
    }
}

/// Where a stage writes and how Parquet output is encoded.
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// Absolute output directory.
    pub out_dir: PathBuf,
    /// Whether existing output files may be replaced.
    pub overwrite: bool,
    /// Optional Parquet compression algorithm (Snappy when unset).
    pub compression: Option<ParquetCompression>,
    /// Optional Parquet compression level.
    pub compression_level: Option<u32>,
}

impl WriteConfig {
    /// Creates a new `WriteConfig`, creating `out_dir` when `create_dir` is set and
    /// validating the compression settings.
    pub fn new(
        out_dir: PathBuf,
        create_dir: bool,
        overwrite: bool,
        compression: Option<ParquetCompression>,
        compression_level: Option<u32>,
    ) -> Result<Self, FirmPanelError> {
        let out_dir = Self::validate_out_dir(out_dir, create_dir)?;
        let cl = match compression {
            None => match compression_level {
                None => None,
                Some(_) => {
                    println!("Ignoring value of --compression-level as --compression was not set");
                    None
                }
            },
            Some(pc) => Self::validate_compression_level(pc, compression_level)?,
        };

        Ok(Self {
            out_dir,
            overwrite,
            compression,
            compression_level: cl,
        })
    }

    /// Returns the path for `file_name` in the output directory, refusing to
    /// replace an existing file unless overwriting is enabled.
    pub fn out_path(&self, file_name: &str) -> Result<PathBuf, FirmPanelError> {
        let p = self.out_dir.join(file_name);
        if p.exists() && !self.overwrite {
            return Err(FirmPanelError::Other(format!(
                "The output file - {} - already exists! To overwrite the file, utilize the --overwrite parameter",
                p.to_string_lossy()
            )));
        }
        Ok(p)
    }

    /// Builds the Parquet writer properties for this config.
    pub fn writer_properties(&self) -> Result<WriterProperties, FirmPanelError> {
        let codec = resolve_parquet_compression(self.compression, self.compression_level)?;
        Ok(WriterProperties::builder()
            .set_compression(codec)
            .set_statistics_enabled(EnabledStatistics::Page)
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .build())
    }

    fn validate_out_dir(path: PathBuf, create_dir: bool) -> Result<PathBuf, FirmPanelError> {
        let abs_path = std::path::absolute(&path)
            .map_err(|e| FirmPanelError::Other(format!("Failed to resolve path: {e}")))?;

        if abs_path.is_dir() {
            return Ok(abs_path);
        }
        if abs_path.exists() {
            return Err(FirmPanelError::Other(format!(
                "The output path {} exists but is not a directory",
                abs_path.to_string_lossy()
            )));
        }
        if create_dir {
            std::fs::create_dir_all(&abs_path)?;
            Ok(abs_path)
        } else {
            Err(FirmPanelError::Other(format!(
                "The output directory {} does not exist",
                abs_path.to_string_lossy()
            )))
        }
    }

    /// Validates compression level is valid for the given compression algorithm.
    fn validate_compression_level(
        compression: ParquetCompression,
        compression_level: Option<u32>,
    ) -> Result<Option<u32>, FirmPanelError> {
        let (name, max_level): (&str, Option<u32>) = match compression {
            ParquetCompression::Uncompressed => ("uncompressed", None),
            ParquetCompression::Snappy => ("snappy", None),
            ParquetCompression::Lz4Raw => ("lz4-raw", None),
            ParquetCompression::Gzip => ("gzip", Some(9)),
            ParquetCompression::Brotli => ("brotli", Some(11)),
            ParquetCompression::Zstd => ("zstd", Some(22)),
        };

        match (max_level, compression_level) {
            (None, None) => Ok(None),
            (None, Some(_)) => {
                println!(
                    "Compression level is not required for compression={name}, ignoring value of --compression-level"
                );
                Ok(None)
            }
            (Some(_), None) => Ok(None),
            (Some(max), Some(c)) => {
                if c <= max {
                    Ok(Some(c))
                } else {
                    Err(FirmPanelError::Other(format!(
                        "The compression level of {c} is not a valid level for {name} compression. \
                         Instead, please use values between 0-{max}."
                    )))
                }
            }
        }
    }
}

/// Validates that `path` is an existing directory and returns its absolute form.
pub fn validate_in_dir(path: &Path) -> Result<PathBuf, FirmPanelError> {
    let abs_path = std::path::absolute(path)
        .map_err(|e| FirmPanelError::Other(format!("Failed to resolve path: {e}")))?;
    if abs_path.is_dir() {
        Ok(abs_path)
    } else {
        Err(FirmPanelError::Other(format!(
            "The input directory {} does not exist",
            abs_path.to_string_lossy()
        )))
    }
}

/// Resolves [`ParquetCompression`] and an optional level into a Parquet compression codec.
///
/// Defaults to Snappy when no compression is specified.
pub fn resolve_parquet_compression(
    compression: Option<ParquetCompression>,
    compression_level: Option<u32>,
) -> Result<ParquetCompressionCodec, FirmPanelError> {
    let codec = match compression {
        Some(ParquetCompression::Uncompressed) => ParquetCompressionCodec::UNCOMPRESSED,
        Some(ParquetCompression::Snappy) | None => ParquetCompressionCodec::SNAPPY,
        Some(ParquetCompression::Lz4Raw) => ParquetCompressionCodec::LZ4_RAW,
        Some(ParquetCompression::Gzip) => match compression_level {
            Some(level) => ParquetCompressionCodec::GZIP(GzipLevel::try_new(level).map_err(|e| {
                FirmPanelError::Other(format!("Invalid Gzip compression level: {e}"))
            })?),
            None => ParquetCompressionCodec::GZIP(GzipLevel::default()),
        },
        Some(ParquetCompression::Brotli) => match compression_level {
            Some(level) => {
                ParquetCompressionCodec::BROTLI(BrotliLevel::try_new(level).map_err(|e| {
                    FirmPanelError::Other(format!("Invalid Brotli compression level: {e}"))
                })?)
            }
            None => ParquetCompressionCodec::BROTLI(BrotliLevel::default()),
        },
        Some(ParquetCompression::Zstd) => match compression_level {
            Some(level) => {
                ParquetCompressionCodec::ZSTD(ZstdLevel::try_new(level as i32).map_err(|e| {
                    FirmPanelError::Other(format!("Invalid Zstd compression level: {e}"))
                })?)
            }
            None => ParquetCompressionCodec::ZSTD(ZstdLevel::default()),
        },
    };
    Ok(codec)
}
