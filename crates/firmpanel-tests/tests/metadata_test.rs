use firmpanel::{ConvertConfig, FileMetadata, WriteConfig, convert_csv_file};

mod common;
use common::{FirmRow, ORBIS_HEADER, write_csv};

#[test]
fn staged_chunk_metadata() {
    let scratch = tempfile::tempdir().unwrap();
    let rows: Vec<String> = ["BR1", "BR2", "BR3"]
        .iter()
        .map(|id| FirmRow::annual(id, "BR", "2015-12-31").to_csv())
        .collect();
    let input = write_csv(
        scratch.path(),
        "orbis_em_small_2015_2015_part1.csv",
        ORBIS_HEADER,
        &rows,
    );

    let cc = ConvertConfig::new(scratch.path(), None, None, false).unwrap();
    let wc = WriteConfig::new(
        scratch.path().join("staging"),
        true,
        false,
        Some(firmpanel::ParquetCompression::Zstd),
        Some(3),
    )
    .unwrap();
    let converted = convert_csv_file(&input, &cc, &wc, None).unwrap();

    let md = FileMetadata::read(&converted.chunks[0]).unwrap();
    assert_eq!(md.format, "parquet");
    assert_eq!(md.row_count, 3);
    assert_eq!(md.column_count, ORBIS_HEADER.len());
    assert_eq!(md.row_groups, Some(1));
    assert!(md.compression.as_deref().unwrap().starts_with("ZSTD"));
    assert_eq!(md.columns[&2].name, "closdate");
    assert!(md.columns[&2].data_type.starts_with("Timestamp"));

    let json = md.to_json().unwrap();
    assert!(json.contains("\"row_groups\": 1"));
    assert!(!json.contains("\"schema\""));
}

#[test]
fn csv_batch_metadata() {
    let scratch = tempfile::tempdir().unwrap();
    let input = write_csv(
        scratch.path(),
        "comp_2015_part1.csv",
        &["gvkey", "fyear", "capx"],
        &["001004,2015,1.5".to_string(), "001045,2015,".to_string()],
    );

    let md = FileMetadata::read(&input).unwrap();
    assert_eq!(md.format, "csv");
    assert_eq!(md.row_count, 2);
    assert_eq!(md.column_count, 3);
    assert!(md.compression.is_none());
}

#[test]
fn unknown_extension_is_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let p = scratch.path().join("data.feather");
    std::fs::write(&p, "x").unwrap();
    assert!(FileMetadata::read(&p).is_err());
}
