#![cfg(all(feature = "compression-gzip", feature = "compression-xz"))]

use anyhow::Result;
use sdds::dataset::Dataset;
use sdds::error::ErrorKind;
use sdds::io::compression::is_compressed_path;
use sdds::layout::DataEncoding;
use sdds::testing::{assert_error_kind, sample_beam_rows, write_beam_file, write_xy_file, TestDir};
use sdds::types::{SddsType, ValueVec};

#[test]
fn compressed_files_round_trip_by_extension() -> Result<()> {
    let dir = TestDir::new()?;
    for name in ["beam.sdds.gz", "beam.sdds.xz", "beam.sdds.lzma"] {
        for encoding in [DataEncoding::Binary, DataEncoding::Ascii] {
            let path = dir.file(name);
            assert!(is_compressed_path(&path));
            write_beam_file(&path, encoding)?;
            let raw = std::fs::read(&path)?;
            assert!(!raw.starts_with(b"SDDS"), "{name} was written uncompressed");

            let mut input = Dataset::initialize_input(Some(&path))?;
            let mut pages = 0;
            while input.read_page()?.is_some() {
                pages += 1;
            }
            assert_eq!(pages, sample_beam_rows().len(), "{name} {}", encoding.name());
        }
    }
    Ok(())
}

#[test]
fn gzip_is_detected_by_magic_bytes() -> Result<()> {
    let dir = TestDir::new()?;
    let compressed = dir.file("xy.sdds.gz");
    write_xy_file(&compressed, DataEncoding::Binary, &[(1.0, 2.0), (3.0, 4.0)])?;
    let renamed = dir.file("xy.data");
    std::fs::rename(&compressed, &renamed)?;

    let mut input = Dataset::initialize_input(Some(&renamed))?;
    input.read_page()?;
    assert_eq!(input.get_column("y")?, ValueVec::Double(vec![2.0, 4.0]));
    Ok(())
}

#[test]
fn goto_page_rewinds_a_compressed_stream() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("beam.sdds.gz");
    write_beam_file(&path, DataEncoding::Binary)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.goto_page(2)?;
    assert_eq!(input.read_page()?, Some(2));
    input.goto_page(1)?;
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.get_parameter_as_f64("Energy")?, 1.5);
    assert_error_kind(input.goto_page(3), ErrorKind::Bounds);
    Ok(())
}

#[test]
fn pages_append_to_compressed_files_as_new_members() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("log.sdds.xz");
    let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, Some(&path))?;
    out.define_simple_column("n", None, SddsType::Int32)?;
    out.write_layout()?;
    out.start_page(1)?;
    out.set_column("n", vec![1_i32])?;
    out.write_page()?;
    out.terminate()?;

    let mut out = Dataset::initialize_append(&path)?;
    out.start_page(2)?;
    out.set_column("n", vec![2_i32, 3])?;
    out.write_page()?;
    out.terminate()?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.read_page()?, Some(2));
    assert_eq!(input.get_column("n")?, ValueVec::Int32(vec![2, 3]));
    assert_eq!(input.read_page()?, None);

    assert_error_kind(
        Dataset::initialize_append_to_page(&path, 1),
        ErrorKind::Unsupported,
    );
    Ok(())
}

#[test]
fn in_place_updates_need_a_plain_file() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("stream.sdds.gz");
    let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, Some(&path))?;
    out.define_simple_column("n", None, SddsType::Int32)?;
    out.write_layout()?;
    out.start_page(1)?;
    out.set_column("n", vec![1_i32])?;
    assert_error_kind(out.update_page(false), ErrorKind::Unsupported);
    out.terminate()?;
    Ok(())
}
