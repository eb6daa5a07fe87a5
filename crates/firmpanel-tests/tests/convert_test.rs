use arrow_array::Array;
use arrow_schema::{DataType, TimeUnit};
use firmpanel::{ConvertConfig, FirmPanelError, WriteConfig, convert_csv_dir, convert_csv_file};

mod common;
use common::{FirmRow, ORBIS_HEADER, read_parquet, write_csv};

fn rows(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let id = format!("BR{i:06}");
            FirmRow::annual(&id, "BR", "2015-12-31").to_csv()
        })
        .collect()
}

#[test]
fn converts_into_ceil_chunks() {
    let scratch = tempfile::tempdir().unwrap();
    let input = write_csv(
        scratch.path(),
        "orbis_em_small_2015_2015_part1.csv",
        ORBIS_HEADER,
        &rows(250),
    );

    let cc = ConvertConfig::new(scratch.path(), None, Some(100), false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("staging"), true, false, None, None).unwrap();
    let converted = convert_csv_file(&input, &cc, &wc, None).unwrap();

    assert_eq!(converted.rows, 250);
    assert_eq!(converted.chunks.len(), 3);
    assert!(
        converted.chunks[0]
            .to_string_lossy()
            .ends_with("orbis_em_small_2015_2015_part1_chunk1.parquet")
    );

    let sizes: Vec<usize> = converted
        .chunks
        .iter()
        .map(|c| read_parquet(c).num_rows())
        .collect();
    assert_eq!(sizes, vec![100, 100, 50]);
}

#[test]
fn only_close_date_is_typed() {
    let scratch = tempfile::tempdir().unwrap();
    write_csv(
        scratch.path(),
        "orbis_em_large_2005_2009_part1.csv",
        ORBIS_HEADER,
        &rows(3),
    );

    let cc = ConvertConfig::new(scratch.path(), None, None, false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("staging"), true, false, None, None).unwrap();
    let converted = convert_csv_dir(&cc, &wc, None).unwrap();
    assert_eq!(converted.len(), 1);

    let batch = read_parquet(&converted[0].chunks[0]);
    let schema = batch.schema();
    for f in schema.fields() {
        if f.name() == "closdate" {
            assert_eq!(
                f.data_type(),
                &DataType::Timestamp(TimeUnit::Nanosecond, None)
            );
        } else {
            assert_eq!(f.data_type(), &DataType::Utf8, "column {}", f.name());
        }
    }
}

#[test]
fn blank_close_date_stays_null() {
    let scratch = tempfile::tempdir().unwrap();
    let mut r = rows(1);
    r.push(FirmRow::annual("BR999999", "BR", "").to_csv());
    let input = write_csv(
        scratch.path(),
        "orbis_em_small_2016_2016_part1.csv",
        ORBIS_HEADER,
        &r,
    );

    let cc = ConvertConfig::new(scratch.path(), None, None, false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("staging"), true, false, None, None).unwrap();
    let converted = convert_csv_file(&input, &cc, &wc, None).unwrap();

    let batch = read_parquet(&converted.chunks[0]);
    let dates = batch.column_by_name("closdate").unwrap();
    assert_eq!(dates.null_count(), 1);
    assert!(dates.is_null(1));
}

#[test]
fn invalid_close_date_is_an_error() {
    let scratch = tempfile::tempdir().unwrap();
    let input = write_csv(
        scratch.path(),
        "orbis_em_small_2016_2016_part1.csv",
        ORBIS_HEADER,
        &[FirmRow::annual("BR000001", "BR", "2016-13-45").to_csv()],
    );

    let cc = ConvertConfig::new(scratch.path(), None, None, false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("staging"), true, false, None, None).unwrap();
    match convert_csv_file(&input, &cc, &wc, None) {
        Err(FirmPanelError::DateParse { column, value }) => {
            assert_eq!(column, "closdate");
            assert_eq!(value, "2016-13-45");
        }
        other => panic!("expected a date parse error, got {other:?}"),
    }
}

#[test]
fn parallel_matches_sequential() {
    let scratch = tempfile::tempdir().unwrap();
    for i in 1..=4 {
        write_csv(
            scratch.path(),
            &format!("orbis_em_medium_2010_2014_part{i}.csv"),
            ORBIS_HEADER,
            &rows(10 * i),
        );
    }
    // not a batch file
    write_csv(scratch.path(), "notes.csv", &["a"], &["1".to_string()]);

    let cc = ConvertConfig::new(scratch.path(), None, Some(15), false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("seq"), true, false, None, None).unwrap();
    let seq = convert_csv_dir(&cc, &wc, None).unwrap();

    let cc = ConvertConfig::new(scratch.path(), None, Some(15), true).unwrap();
    let wc = WriteConfig::new(scratch.path().join("par"), true, false, None, None).unwrap();
    let par = convert_csv_dir(&cc, &wc, None).unwrap();

    assert_eq!(seq.len(), 4);
    assert_eq!(par.len(), 4);
    for (s, p) in seq.iter().zip(&par) {
        assert_eq!(s.source, p.source);
        assert_eq!(s.rows, p.rows);
        assert_eq!(s.chunks.len(), p.chunks.len());
        for (a, b) in s.chunks.iter().zip(&p.chunks) {
            assert_eq!(a.file_name(), b.file_name());
            assert_eq!(read_parquet(a), read_parquet(b));
        }
    }
}

#[test]
fn existing_chunk_without_overwrite_fails() {
    let scratch = tempfile::tempdir().unwrap();
    let input = write_csv(
        scratch.path(),
        "orbis_em_small_2015_2015_part1.csv",
        ORBIS_HEADER,
        &rows(2),
    );

    let cc = ConvertConfig::new(scratch.path(), None, None, false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("staging"), true, false, None, None).unwrap();
    convert_csv_file(&input, &cc, &wc, None).unwrap();
    assert!(convert_csv_file(&input, &cc, &wc, None).is_err());

    let wc = WriteConfig::new(scratch.path().join("staging"), true, true, None, None).unwrap();
    assert_eq!(convert_csv_file(&input, &cc, &wc, None).unwrap().rows, 2);
}

#[test]
fn empty_directory_has_no_input() {
    let scratch = tempfile::tempdir().unwrap();
    let cc = ConvertConfig::new(scratch.path(), None, None, false).unwrap();
    let wc = WriteConfig::new(scratch.path().join("staging"), true, false, None, None).unwrap();
    assert!(matches!(
        convert_csv_dir(&cc, &wc, None),
        Err(FirmPanelError::NoInputFiles { .. })
    ));
}
