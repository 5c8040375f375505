use anyhow::Result;
use sdds::dataset::{Dataset, TransferMode};
use sdds::error::ErrorKind;
use sdds::layout::{DataEncoding, FieldValue};
use sdds::selection::{ColumnSelector, Logic};
use sdds::testing::{assert_error_kind, assert_f64_slices_close, sample_beam_rows, write_beam_file, TestDir};
use sdds::types::{SddsType, Value, ValueVec};

#[test]
fn copy_converts_encoding_and_keeps_selected_columns() -> Result<()> {
    let dir = TestDir::new()?;
    let source_path = dir.file("beam.sdds");
    let target_path = dir.file("beam.txt");
    write_beam_file(&source_path, DataEncoding::Binary)?;

    let mut input = Dataset::initialize_input(Some(&source_path))?;
    input.set_columns_of_interest(
        &ColumnSelector::NamesString("ElementName s".to_string()),
        Logic::REPLACE,
    )?;
    let mut out = Dataset::initialize_copy(&input, Some(&target_path), Some(DataEncoding::Ascii))?;
    assert_eq!(out.get_column_names(), vec!["ElementName", "s"]);
    out.write_layout()?;
    while input.read_page()?.is_some() {
        out.copy_page(&input)?;
        out.write_page()?;
    }
    out.terminate()?;

    let mut copy = Dataset::initialize_input(Some(&target_path))?;
    assert_eq!(copy.layout().data_mode.encoding, DataEncoding::Ascii);
    assert_eq!(copy.layout().description.text.as_deref(), Some("beam fixture"));
    for (page, rows) in sample_beam_rows().into_iter().enumerate() {
        assert!(copy.read_page()?.is_some());
        assert_f64_slices_close(&[copy.get_parameter_as_f64("Energy")?], &[1.5 * (page + 1) as f64], 1e-12);
        assert_eq!(copy.get_parameter("Machine")?, Value::from("ring A"));
        let s: Vec<f64> = rows.iter().map(|r| r.s).collect();
        assert_f64_slices_close(&copy.get_column_in_doubles("s")?, &s, 0.0);
        assert_eq!(copy.get_array("R")?.dimensions, vec![2, 2]);
    }
    assert_eq!(copy.read_page()?, None);
    Ok(())
}

#[test]
fn only_rows_of_interest_are_written() -> Result<()> {
    let dir = TestDir::new()?;
    let source_path = dir.file("beam.sdds");
    let target_path = dir.file("far.sdds");
    write_beam_file(&source_path, DataEncoding::Ascii)?;

    let mut input = Dataset::initialize_input(Some(&source_path))?;
    let mut out = Dataset::initialize_copy(&input, Some(&target_path), Some(DataEncoding::Binary))?;
    out.write_layout()?;
    input.read_page()?;
    let kept = input.filter_rows_of_interest("s", 1.0, f64::INFINITY, Logic::AND)?;
    out.copy_page(&input)?;
    assert_eq!(out.count_rows_of_interest(), kept);
    out.write_page()?;

    out.start_page(0)?;
    out.copy_parameters(&input)?;
    out.copy_rows_of_interest(&input)?;
    assert_eq!(out.row_count(), kept);
    out.write_page()?;
    out.terminate()?;

    let mut copy = Dataset::initialize_input(Some(&target_path))?;
    assert!(copy.layout().data_mode.column_major);
    for _ in 0..2 {
        copy.read_page()?;
        assert_eq!(copy.row_count(), kept);
        assert!(copy.get_column_in_doubles("s")?.iter().all(|&s| s >= 1.0));
    }
    Ok(())
}

#[test]
fn rows_copy_one_at_a_time() -> Result<()> {
    let dir = TestDir::new()?;
    let source_path = dir.file("beam.sdds");
    write_beam_file(&source_path, DataEncoding::Binary)?;
    let mut input = Dataset::initialize_input(Some(&source_path))?;
    input.read_page()?;

    let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, Some(&dir.file("rev.sdds")))?;
    out.transfer_column_definition(&input, "Turns", None)?;
    out.transfer_column_definition(&input, "x", Some("x_mm"))?;
    out.write_layout()?;
    out.start_page(3)?;
    for row in 0..3 {
        out.copy_row(2 - row, &input, row)?;
    }
    // Columns are matched by name, so the renamed column stays zero.
    assert_eq!(out.get_column("x_mm")?, ValueVec::Double(vec![0.0; 3]));
    let turns: Vec<i32> = sample_beam_rows()[0].iter().rev().map(|r| r.turns).collect();
    assert_eq!(out.get_column("Turns")?, ValueVec::Int32(turns));
    assert_error_kind(out.copy_row(0, &input, 7), ErrorKind::Bounds);
    out.terminate()?;
    Ok(())
}

#[test]
fn bulk_transfers_resolve_collisions_by_mode() -> Result<()> {
    let dir = TestDir::new()?;
    let source_path = dir.file("beam.sdds");
    write_beam_file(&source_path, DataEncoding::Binary)?;
    let input = Dataset::initialize_input(Some(&source_path))?;

    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&dir.file("t.sdds")))?;
    out.define_simple_column("s", Some("km"), SddsType::Float)?;
    assert_error_kind(
        out.transfer_all_column_definitions(&input, TransferMode::Strict),
        ErrorKind::Schema,
    );
    // The strict transfer stops at the collision; earlier names were added.
    assert_eq!(out.get_column_names(), vec!["s", "ElementName"]);

    assert_eq!(out.transfer_all_column_definitions(&input, TransferMode::KeepOld)?, 2);
    assert_eq!(out.get_column_information("units", "s")?, FieldValue::Text(Some("km".to_string())));
    assert_eq!(out.transfer_all_column_definitions(&input, TransferMode::Overwrite)?, 4);
    assert_eq!(out.get_column_information("units", "s")?, FieldValue::Text(Some("m".to_string())));
    assert_eq!(out.get_column_names(), vec!["s", "ElementName", "x", "Turns"]);

    assert_eq!(out.transfer_all_parameter_definitions(&input, TransferMode::Strict)?, 3);
    assert_eq!(out.transfer_all_array_definitions(&input, TransferMode::KeepOld)?, 1);
    out.define_column_like_parameter(&input, "Energy", Some("EnergyColumn"))?;
    out.define_parameter_like_column(&input, "Turns", None)?;
    assert_eq!(out.get_parameter_information("type", "Turns")?, FieldValue::Type(SddsType::Int32));
    assert_eq!(out.get_column_information("units", "EnergyColumn")?, FieldValue::Text(Some("GeV".to_string())));
    Ok(())
}
