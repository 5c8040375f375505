use anyhow::Result;
use sdds::dataset::Dataset;
use sdds::error::ErrorKind;
use sdds::header::read_header;
use sdds::io::SddsReader;
use sdds::layout::DataEncoding;
use sdds::testing::{assert_error_kind, assert_f64_slices_close, TestDir};
use sdds::types::SddsType;
use std::fs::OpenOptions;
use std::path::Path;

fn write_ramp(path: &Path, encoding: DataEncoding, rows: usize) -> Result<()> {
    let mut out = Dataset::initialize_output(encoding, 1, None, None, Some(path))?;
    out.define_simple_column("y", None, SddsType::Double)?;
    out.write_layout()?;
    out.start_page(rows)?;
    out.set_column("y", (0..rows).map(|i| i as f64).collect::<Vec<_>>())?;
    out.write_page()?;
    out.terminate()?;
    Ok(())
}

fn truncate(path: &Path, len: u64) -> Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(len)?;
    Ok(())
}

fn data_start(path: &Path) -> Result<u64> {
    let mut reader = SddsReader::open(path)?;
    read_header(&mut reader)?;
    Ok(reader.position())
}

#[test]
fn truncated_binary_page_recovers_complete_rows() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("cut.sdds");
    write_ramp(&path, DataEncoding::Binary, 100)?;
    truncate(&path, data_start(&path)? + 4 + 16)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.row_count(), 2);
    assert_f64_slices_close(&input.get_column_in_doubles("y")?, &[0.0, 1.0], 0.0);
    assert!(input.read_recovery_possible());
    assert_eq!(input.read_page()?, None);
    assert_eq!(input.read_page()?, None);
    Ok(())
}

fn write_three_columns(path: &Path) -> Result<()> {
    let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, Some(path))?;
    for name in ["a", "b", "c"] {
        out.define_simple_column(name, None, SddsType::Double)?;
    }
    out.write_layout()?;
    out.start_page(10)?;
    for (k, name) in ["a", "b", "c"].into_iter().enumerate() {
        let base = 100.0 * (k + 1) as f64;
        out.set_column(name, (0..10).map(|i| base + i as f64).collect::<Vec<_>>())?;
    }
    out.write_page()?;
    out.terminate()?;
    Ok(())
}

#[test]
fn column_major_rows_need_every_column() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("three.sdds");
    write_three_columns(&path)?;
    let start = data_start(&path)?;

    // All of a, four values of b, nothing of c.
    truncate(&path, start + 4 + 80 + 32)?;
    let mut input = Dataset::initialize_input(Some(&path))?;
    assert!(input.layout().data_mode.column_major);
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.row_count(), 0);
    assert!(input.get_column_in_doubles("c")?.is_empty());
    assert_eq!(input.read_page()?, None);

    // Inside the last column the complete prefix is kept.
    write_three_columns(&path)?;
    truncate(&path, start + 4 + 160 + 28)?;
    let mut input = Dataset::initialize_input(Some(&path))?;
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.row_count(), 3);
    assert_f64_slices_close(&input.get_column_in_doubles("a")?, &[100.0, 101.0, 102.0], 0.0);
    assert_f64_slices_close(&input.get_column_in_doubles("c")?, &[300.0, 301.0, 302.0], 0.0);
    Ok(())
}

#[test]
fn oversized_row_count_does_not_allocate_up_front() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("huge_count.sdds");
    let mut bytes = b"SDDS5\n! # little-endian\n&column name=y, type=double, &end\n&data mode=binary, &end\n".to_vec();
    bytes.extend_from_slice(&i32::MAX.to_le_bytes());
    bytes.extend_from_slice(&1.5_f64.to_le_bytes());
    bytes.extend_from_slice(&2.5_f64.to_le_bytes());
    std::fs::write(&path, &bytes)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_error_kind(input.read_page(), ErrorKind::Parse);

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_f64_slices_close(&input.get_column_in_doubles("y")?, &[1.5, 2.5], 0.0);
    assert_eq!(input.read_page()?, None);
    Ok(())
}

#[test]
fn truncated_page_without_recovery_deactivates() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("cut.sdds");
    write_ramp(&path, DataEncoding::Binary, 100)?;
    truncate(&path, data_start(&path)? + 4 + 16)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_error_kind(input.read_page(), ErrorKind::Parse);
    assert!(input.read_recovery_possible());
    assert!(!input.is_active());
    assert_error_kind(input.read_page(), ErrorKind::Inactive);
    assert_error_kind(input.get_column_in_doubles("y"), ErrorKind::Inactive);
    Ok(())
}

#[test]
fn truncated_ascii_page_recovers_complete_rows() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("cut.txt");
    std::fs::write(
        &path,
        "SDDS5\n&column name=a, type=long, &end\n&column name=b, type=long, &end\n\
         &data mode=ascii, &end\n5\n1 2\n3 4\n5\n",
    )?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.row_count(), 2);
    assert_eq!(input.get_column_in_strings("b")?, vec!["2", "4"]);
    assert_eq!(input.read_page()?, None);
    Ok(())
}

#[test]
fn intact_file_reports_no_recovery() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("whole.sdds");
    write_ramp(&path, DataEncoding::Binary, 10)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.row_count(), 10);
    assert_eq!(input.read_page()?, None);
    assert!(!input.read_recovery_possible());
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() -> Result<()> {
    let dir = TestDir::new()?;
    assert_error_kind(
        Dataset::initialize_input(Some(&dir.file("absent.sdds"))),
        ErrorKind::Io,
    );
    Ok(())
}
