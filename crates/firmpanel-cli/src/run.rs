//! CLI dispatch logic for the firmpanel binary.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use path_abs::{PathAbs, PathInfo};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use firmpanel::{
    CleanConfig, CompustatExtractConfig, ConnectionConfig, ConvertConfig, ExportConfig,
    FileMetadata, FirmPanelError, OrbisColumns, OrbisExtractConfig, ProgressCallback,
    WriteConfig, WrdsConnection, clean, convert_csv_dir, execute_sql, export_partitions,
    extract_compustat, extract_orbis, format_with_commas, list_matching_files, parse_columns_file,
    read_sql_file,
};

use crate::cli::{ConnectionArgs, ExtractSource, FirmPanelCli, FirmPanelCliCommands};

/// [`ProgressCallback`] implementation backed by an `indicatif::ProgressBar`.
struct IndicatifProgress {
    pb: ProgressBar,
}

impl ProgressCallback for IndicatifProgress {
    fn inc(&self, n: u64) {
        self.pb.inc(n);
    }

    fn stage_started(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }
}

/// Create a progress bar if progress is enabled.
///
/// Without a known row total the bar is a spinner that counts rows.
fn create_progress(
    no_progress: bool,
    total_rows: Option<u64>,
) -> Result<Option<Arc<IndicatifProgress>>, FirmPanelError> {
    if no_progress {
        return Ok(None);
    }
    let pb = match total_rows {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} rows {msg}")
                    .map_err(|e| FirmPanelError::Other(format!("Progress bar template error: {e}")))?
                    .progress_chars("##-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("[{spinner:.green} {elapsed_precise}] {pos} rows {msg}")
                    .map_err(|e| FirmPanelError::Other(format!("Progress bar template error: {e}")))?,
            );
            pb.enable_steady_tick(std::time::Duration::from_millis(120));
            pb
        }
    };
    Ok(Some(Arc::new(IndicatifProgress { pb })))
}

/// Upcast for the library's progress parameter.
fn as_callback(p: &Option<Arc<IndicatifProgress>>) -> Option<Arc<dyn ProgressCallback>> {
    p.as_ref()
        .map(|p| Arc::clone(p) as Arc<dyn ProgressCallback>)
}

fn finish_progress(p: Option<Arc<IndicatifProgress>>) {
    if let Some(p) = p {
        p.pb.finish_with_message("Done");
    }
}

fn abs_path(p: PathBuf) -> Result<PathBuf, FirmPanelError> {
    Ok(PathAbs::new(p)?.as_path().to_path_buf())
}

fn connect(conn: ConnectionArgs) -> Result<WrdsConnection, FirmPanelError> {
    let cfg = ConnectionConfig {
        host: conn.host,
        port: conn.port,
        dbname: conn.dbname,
        user: conn.user,
        password: conn.password,
        tls: conn.tls,
    };
    WrdsConnection::connect(&cfg)
}

/// Resolve the SQL query from `--sql` or `--sql-file` CLI options.
fn resolve_sql(
    sql: Option<String>,
    sql_file: Option<PathBuf>,
) -> Result<Option<String>, FirmPanelError> {
    if let Some(path) = sql_file {
        Ok(Some(read_sql_file(&path)?))
    } else {
        Ok(sql)
    }
}

/// Sum of Parquet footer row counts, used to size the export progress bar.
fn parquet_row_total(dir: &Path, pattern: &Regex) -> Option<u64> {
    let files = list_matching_files(dir, pattern).ok()?;
    files
        .iter()
        .map(|f| FileMetadata::read(f).map(|md| md.row_count).ok())
        .sum()
}

fn print_written(what: &str, files: usize, rows: usize, out_dir: &Path) {
    println!(
        "Wrote {} rows into {} {} in {}",
        format_with_commas(rows).bright_yellow(),
        files.to_string().bright_yellow(),
        what,
        out_dir.to_string_lossy().bright_cyan()
    );
}

/// Executes the CLI command specified by the parsed [`FirmPanelCli`] arguments.
///
/// This is the main entry point for the CLI binary, dispatching to the
/// `extract`, `convert`, `clean`, `export`, `metadata`, or `preview` subcommand.
pub fn run(fp: FirmPanelCli) -> Result<(), FirmPanelError> {
    env_logger::init();

    match fp.command {
        FirmPanelCliCommands::Extract { source } => run_extract(source),
        FirmPanelCliCommands::Convert {
            input,
            output,
            pattern,
            chunk_rows,
            overwrite,
            parallel,
            no_progress,
            parquet,
        } => {
            let in_dir = abs_path(input)?;
            debug!("Converting CSV batch files in {}", in_dir.to_string_lossy());

            let cc = ConvertConfig::new(
                &in_dir,
                pattern.as_deref(),
                chunk_rows.map(|n| n as usize),
                parallel,
            )?;
            let wc = WriteConfig::new(
                output,
                true,
                overwrite,
                parquet.compression.map(Into::into),
                parquet.compression_level,
            )?;

            let progress = create_progress(no_progress, None)?;
            let converted = convert_csv_dir(&cc, &wc, as_callback(&progress))?;
            finish_progress(progress);

            let chunks: usize = converted.iter().map(|c| c.chunks.len()).sum();
            let rows: usize = converted.iter().map(|c| c.rows).sum();
            println!(
                "Converted {} CSV file(s)",
                converted.len().to_string().bright_yellow()
            );
            print_written("Parquet chunk(s)", chunks, rows, &wc.out_dir);
            Ok(())
        }
        FirmPanelCliCommands::Clean {
            input,
            deflator,
            output,
            keep_unclassified,
            fiscal_cutoff_month,
            as_json,
            no_progress,
            parquet,
        } => {
            let staging = abs_path(input)?;
            let deflator = abs_path(deflator)?;
            debug!(
                "Cleaning staged chunks in {} with deflator {}",
                staging.to_string_lossy(),
                deflator.to_string_lossy()
            );

            let cfg = CleanConfig::new(&staging, &deflator, keep_unclassified, fiscal_cutoff_month)?;
            // partitions are always replaced
            let wc = WriteConfig::new(
                output,
                true,
                true,
                parquet.compression.map(Into::into),
                parquet.compression_level,
            )?;

            let progress = create_progress(no_progress || as_json, None)?;
            let summary = clean(&cfg, &wc, as_callback(&progress))?;
            finish_progress(progress);

            if as_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)?
                );
            } else {
                for p in &summary.partitions {
                    println!(
                        "Fiscal year {}: {} rows",
                        p.year.to_string().bright_yellow(),
                        format_with_commas(p.rows)
                    );
                }
                print_written(
                    "partition(s)",
                    summary.partitions.len(),
                    summary.total_rows,
                    &wc.out_dir,
                );
            }
            Ok(())
        }
        FirmPanelCliCommands::Export {
            input,
            output,
            pattern,
            overwrite,
            parallel,
            no_progress,
        } => {
            let in_dir = abs_path(input)?;
            debug!("Exporting partitions in {}", in_dir.to_string_lossy());

            let cfg = ExportConfig::new(&in_dir, pattern.as_deref(), parallel)?;
            let wc = WriteConfig::new(output, true, overwrite, None, None)?;

            let total = if no_progress {
                None
            } else {
                parquet_row_total(&cfg.in_dir, &cfg.pattern)
            };
            let progress = create_progress(no_progress, total)?;
            let exported = export_partitions(&cfg, &wc, as_callback(&progress))?;
            finish_progress(progress);

            let rows: usize = exported.iter().map(|e| e.rows).sum();
            print_written("CSV file(s)", exported.len(), rows, &wc.out_dir);
            Ok(())
        }
        FirmPanelCliCommands::Metadata { input, as_json } => {
            let path = abs_path(input)?;
            debug!("Retrieving metadata from the file {}", path.to_string_lossy());

            FileMetadata::read(&path)?.print(as_json)
        }
        FirmPanelCliCommands::Preview {
            input,
            rows,
            sql,
            sql_file,
        } => {
            let path = abs_path(input)?;
            let sql = resolve_sql(sql, sql_file)?;
            debug!("Previewing {}", path.to_string_lossy());

            let batches = execute_sql(&path, sql.as_deref(), rows as usize)?;
            let mut wtr = arrow_csv::WriterBuilder::new()
                .with_header(true)
                .build(std::io::stdout());
            for b in &batches {
                wtr.write(b)?;
            }
            Ok(())
        }
    }
}

fn run_extract(source: ExtractSource) -> Result<(), FirmPanelError> {
    match source {
        ExtractSource::Orbis {
            buckets,
            from_year,
            to_year,
            window_years,
            countries,
            columns_file,
            batch_rows,
            output,
            overwrite,
            no_progress,
            conn,
        } => {
            let mut cfg = OrbisExtractConfig {
                from_year,
                to_year,
                window_years,
                batch_rows: batch_rows.map(|n| n as usize),
                ..OrbisExtractConfig::default()
            };
            if let Some(b) = buckets {
                cfg.buckets = b.into_iter().map(Into::into).collect();
            }
            if let Some(c) = countries {
                cfg.countries = c.into_iter().map(|c| c.trim().to_uppercase()).collect();
            }
            if let Some(path) = columns_file {
                let financial = parse_columns_file(&path)?;
                if !financial.is_empty() {
                    cfg.columns = OrbisColumns::default().with_financial(financial);
                }
            }

            let wc = WriteConfig::new(output, true, overwrite, None, None)?;
            let wrds = connect(conn)?;

            let progress = create_progress(no_progress, None)?;
            let files = extract_orbis(&wrds, &cfg, &wc, as_callback(&progress))?;
            finish_progress(progress);

            let rows: usize = files.iter().map(|f| f.rows).sum();
            print_written("batch file(s)", files.len(), rows, &wc.out_dir);
            Ok(())
        }
        ExtractSource::Compustat {
            from_year,
            to_year,
            columns,
            batch_rows,
            output,
            overwrite,
            no_progress,
            conn,
        } => {
            let mut cfg = CompustatExtractConfig {
                from_year,
                to_year,
                batch_rows: batch_rows as usize,
                ..CompustatExtractConfig::default()
            };
            if let Some(c) = columns {
                cfg.columns = c;
            }

            let wc = WriteConfig::new(output, true, overwrite, None, None)?;
            let wrds = connect(conn)?;

            let progress = create_progress(no_progress, None)?;
            let files = extract_compustat(&wrds, &cfg, &wc, as_callback(&progress))?;
            finish_progress(progress);

            let rows: usize = files.iter().map(|f| f.rows).sum();
            print_written("batch file(s)", files.len(), rows, &wc.out_dir);
            Ok(())
        }
    }
}
