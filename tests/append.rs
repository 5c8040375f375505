use anyhow::Result;
use sdds::dataset::{Dataset, RowCountMode};
use sdds::error::ErrorKind;
use sdds::header::read_header;
use sdds::io::lock::{file_is_locked, lock_path_for};
use sdds::io::SddsReader;
use sdds::layout::DataEncoding;
use sdds::testing::{assert_error_kind, write_xy_file, TestDir};
use sdds::types::{SddsType, Value, ValueVec};
use std::path::Path;

fn write_counter(path: &Path, encoding: DataEncoding, fixed: bool, values: &[i32]) -> Result<()> {
    let mut out = Dataset::initialize_output(encoding, 1, None, None, Some(path))?;
    if fixed {
        out.set_row_count_mode(RowCountMode::Fixed)?;
    }
    out.define_simple_parameter("run", None, SddsType::Int32)?;
    out.define_simple_column("v", None, SddsType::Int32)?;
    out.write_layout()?;
    out.start_page(values.len())?;
    out.set_parameter("run", 7)?;
    out.set_column("v", values.to_vec())?;
    out.write_page()?;
    out.terminate()?;
    Ok(())
}

#[test]
fn append_to_page_rewrites_sentinel() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("grow.sdds");
    write_counter(&path, DataEncoding::Binary, false, &[1, 2, 3, 4, 5])?;

    let mut out = Dataset::initialize_append_to_page(&path, 2)?;
    assert!(file_is_locked(&path));
    assert_eq!(out.first_row_in_memory(), 5);
    for (row, value) in [(5, 6), (6, 7), (7, 8)] {
        out.set_row_values(row, &[("v", Value::from(value))])?;
    }
    // Two rows were flushed automatically; the third waits for terminate.
    assert_eq!(out.rows_written(), 7);
    out.terminate()?;
    assert!(!file_is_locked(&path));
    assert!(!lock_path_for(&path).exists());

    let bytes = std::fs::read(&path)?;
    let mut reader = SddsReader::open(&path)?;
    let layout = read_header(&mut reader)?;
    let start = usize::try_from(reader.position())?;
    let order = layout.data_mode.effective_byte_order();
    let sentinel: [u8; 4] = bytes[start..start + 4].try_into()?;
    let count = match order {
        sdds::io::ByteOrder::BigEndian => i32::from_be_bytes(sentinel),
        sdds::io::ByteOrder::LittleEndian => i32::from_le_bytes(sentinel),
    };
    assert_eq!(count, 8);

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_parameter_as_i64("run")?, 7);
    assert_eq!(
        input.get_column("v")?,
        ValueVec::Int32(vec![1, 2, 3, 4, 5, 6, 7, 8])
    );
    assert_eq!(input.read_page()?, None);
    Ok(())
}

#[test]
fn append_to_page_with_fixed_ascii_row_count() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("grow.txt.sdds");
    write_counter(&path, DataEncoding::Ascii, true, &[1, 2])?;

    let mut out = Dataset::initialize_append_to_page(&path, 0)?;
    out.set_row_values(2, &[("v", Value::from(3))])?;
    out.write_page()?;
    out.terminate()?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains(&format!("{:>20}\n", 3)), "{text}");
    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_column("v")?, ValueVec::Int32(vec![1, 2, 3]));
    Ok(())
}

#[test]
fn ascii_row_count_width_bounds_the_new_count() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("narrow.sdds");
    write_counter(&path, DataEncoding::Ascii, false, &[1, 2, 3, 4, 5, 6, 7, 8, 9])?;

    let mut out = Dataset::initialize_append_to_page(&path, 0)?;
    out.set_row_values(9, &[("v", Value::from(10))])?;
    assert_error_kind(out.write_page(), ErrorKind::Bounds);
    Ok(())
}

#[test]
fn column_major_pages_with_several_columns_cannot_grow() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("xy.sdds");
    write_xy_file(&path, DataEncoding::Binary, &[(1.0, 2.0)])?;
    assert_error_kind(
        Dataset::initialize_append_to_page(&path, 1),
        ErrorKind::Unsupported,
    );
    assert!(!file_is_locked(&path));
    Ok(())
}

#[test]
fn append_adds_pages_after_the_last() -> Result<()> {
    let dir = TestDir::new()?;
    for encoding in [DataEncoding::Binary, DataEncoding::Ascii] {
        let path = dir.file(&format!("pages-{}.sdds", encoding.name()));
        write_counter(&path, encoding, false, &[1])?;

        let mut out = Dataset::initialize_append(&path)?;
        assert_eq!(out.page_number(), 1);
        out.start_page(2)?;
        out.set_parameter("run", 8)?;
        out.set_column("v", vec![2_i32, 3])?;
        out.write_page()?;
        out.terminate()?;

        let mut input = Dataset::initialize_input(Some(&path))?;
        assert_eq!(input.read_page()?, Some(1));
        assert_eq!(input.read_page()?, Some(2));
        assert_eq!(input.get_parameter_as_i64("run")?, 8);
        assert_eq!(input.get_column("v")?, ValueVec::Int32(vec![2, 3]));
        assert_eq!(input.read_page()?, None);
    }
    Ok(())
}

#[test]
fn held_lock_refuses_a_second_appender() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("busy.sdds");
    write_counter(&path, DataEncoding::Binary, false, &[1])?;

    let first = Dataset::initialize_append(&path)?;
    assert_error_kind(Dataset::initialize_append(&path), ErrorKind::Locked);
    first.terminate()?;
    let second = Dataset::initialize_append(&path)?;
    second.terminate()?;
    Ok(())
}
