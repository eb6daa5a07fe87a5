use arrow::compute::{cast, concat_batches};
use arrow_array::{Array, Float64Array, RecordBatch, StringArray};
use arrow_schema::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Staged Orbis columns used by the synthetic batch files.
#[allow(dead_code)]
pub const ORBIS_HEADER: &[&str] = &[
    "bvdid",
    "ctryiso",
    "closdate",
    "filing_type",
    "orig_currency",
    "exchrate",
    "ussicccod",
    "naicsccod2017",
    "naceccod2",
    "nace2_main_section",
    "toas",
    "turn",
    "cuas",
    "empl",
];

/// One synthetic firm-year row, in [`ORBIS_HEADER`] order.
#[allow(dead_code)]
pub struct FirmRow<'a> {
    pub bvdid: &'a str,
    pub ctryiso: &'a str,
    pub closdate: &'a str,
    pub filing_type: &'a str,
    pub orig_currency: &'a str,
    pub exchrate: &'a str,
    pub ussicccod: &'a str,
    pub toas: &'a str,
    pub turn: &'a str,
    pub cuas: &'a str,
    pub empl: &'a str,
}

#[allow(dead_code)]
impl<'a> FirmRow<'a> {
    /// A complete annual report for `bvdid` closing on `closdate`.
    pub fn annual(bvdid: &'a str, ctryiso: &'a str, closdate: &'a str) -> Self {
        Self {
            bvdid,
            ctryiso,
            closdate,
            filing_type: "Annual report",
            orig_currency: "BRL",
            exchrate: "0.25",
            ussicccod: "3711",
            toas: "100",
            turn: "50",
            cuas: "20",
            empl: "5",
        }
    }

    pub fn to_csv(&self) -> String {
        [
            self.bvdid,
            self.ctryiso,
            self.closdate,
            self.filing_type,
            self.orig_currency,
            self.exchrate,
            self.ussicccod,
            "336111",
            "29.10",
            "C",
            self.toas,
            self.turn,
            self.cuas,
            self.empl,
        ]
        .join(",")
    }
}

/// Writes an extracted batch file with the given header and rows.
#[allow(dead_code)]
pub fn write_csv(dir: &Path, name: &str, header: &[&str], rows: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut contents = header.join(",");
    contents.push('\n');
    for r in rows {
        contents.push_str(r);
        contents.push('\n');
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes a long-format deflator file.
#[allow(dead_code)]
pub fn write_deflator(dir: &Path, rows: &[(&str, i32, f64)]) -> PathBuf {
    let lines: Vec<String> = rows
        .iter()
        .map(|(c, y, d)| format!("{c},{y},{d}"))
        .collect();
    write_csv(dir, "gdp_deflator_long.csv", &["ctryiso", "year", "gdpdef"], &lines)
}

/// Reads a whole Parquet file into one batch.
#[allow(dead_code)]
pub fn read_parquet(path: &Path) -> RecordBatch {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap()).unwrap();
    let schema = builder.schema().clone();
    let batches: Vec<RecordBatch> = builder.build().unwrap().map(|b| b.unwrap()).collect();
    concat_batches(&schema, &batches).unwrap()
}

/// A text column as `Utf8`, whatever string layout it was stored with.
#[allow(dead_code)]
pub fn strings(batch: &RecordBatch, column: &str) -> StringArray {
    let col = cast(batch.column_by_name(column).unwrap(), &DataType::Utf8).unwrap();
    col.as_any().downcast_ref::<StringArray>().unwrap().clone()
}

/// Row index of the first row whose `column` equals `value`.
#[allow(dead_code)]
pub fn find_row(batch: &RecordBatch, column: &str, value: &str) -> Option<usize> {
    let col = strings(batch, column);
    (0..col.len()).find(|&i| col.is_valid(i) && col.value(i) == value)
}

#[allow(dead_code)]
pub fn string_at(batch: &RecordBatch, column: &str, row: usize) -> Option<String> {
    let col = strings(batch, column);
    col.is_valid(row).then(|| col.value(row).to_string())
}

#[allow(dead_code)]
pub fn f64_at(batch: &RecordBatch, column: &str, row: usize) -> Option<f64> {
    let col = batch
        .column_by_name(column)
        .unwrap()
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    col.is_valid(row).then(|| col.value(row))
}

/// Number of data lines in a CSV file, excluding the header.
#[allow(dead_code)]
pub fn csv_data_rows(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .count()
}
