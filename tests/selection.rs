use anyhow::Result;
use sdds::dataset::Dataset;
use sdds::error::ErrorKind;
use sdds::layout::DataEncoding;
use sdds::selection::{ColumnSelector, FindType, Logic, NumScanMode};
use sdds::testing::{assert_error_kind, TestDir};
use sdds::types::{SddsType, ValueVec};
use std::path::Path;

fn write_four_columns(path: &Path) -> Result<()> {
    let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, Some(path))?;
    for name in ["x1", "x2", "y1", "y2"] {
        out.define_simple_column(name, None, SddsType::Double)?;
    }
    let selected = out.set_columns_of_interest(
        &ColumnSelector::Matching("x*".to_string()),
        Logic::OR | Logic::ZERO_PREVIOUS,
    )?;
    assert_eq!(selected, 2);
    out.write_layout()?;
    out.start_page(2)?;
    out.set_column("x1", vec![1.0_f64, 2.0])?;
    out.set_column("x2", vec![3.0_f64, 4.0])?;
    out.write_page()?;
    out.terminate()?;
    Ok(())
}

/// A page of element names, kinds and positions for row selection.
fn element_page(dir: &TestDir) -> Result<Dataset> {
    let path = dir.file("elements.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_simple_column("Name", None, SddsType::String)?;
    out.define_simple_column("Kind", None, SddsType::String)?;
    out.define_simple_column("s", Some("m"), SddsType::Double)?;
    out.define_simple_column("Reading", None, SddsType::String)?;
    out.write_layout()?;
    out.start_page(5)?;
    out.set_column("Name", vec!["Q1", "q2", "B1", "D1", "Q3"])?;
    out.set_column("Kind", vec!["Q*", "Q*", "B?", "X", "Z*"])?;
    out.set_column("s", vec![0.5_f64, 1.5, 2.5, 3.5, 4.5])?;
    out.set_column("Reading", vec!["1.5", "2e3", "n/a", "7 turns", "-.5"])?;
    out.write_page()?;
    out.terminate()?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    Ok(input)
}

#[test]
fn wildcard_selection_writes_only_chosen_columns() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("xy.sdds");
    write_four_columns(&path)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_eq!(input.get_column_names(), vec!["x1", "x2"]);
    input.read_page()?;
    assert_eq!(input.get_column("x2")?, ValueVec::Double(vec![3.0, 4.0]));
    Ok(())
}

#[test]
fn selection_order_follows_the_selector() -> Result<()> {
    let mut out = Dataset::initialize_output(DataEncoding::Binary, 1, None, None, None)?;
    for name in ["a", "b", "c", "d"] {
        out.define_simple_column(name, None, SddsType::Int32)?;
    }
    out.set_columns_of_interest(&ColumnSelector::NamesString("c, a".to_string()), Logic::REPLACE)?;
    assert_eq!(out.columns_of_interest(), vec!["c", "a"]);
    out.set_columns_of_interest(&ColumnSelector::Names(vec!["D".to_string()]), Logic::OR | Logic::NOCASE_COMPARE)?;
    assert_eq!(out.columns_of_interest(), vec!["c", "a", "d"]);
    assert_eq!(out.column_flags(), &[true, false, true, true]);

    out.set_columns_of_interest(&ColumnSelector::Matching("[ab]".to_string()), Logic::AND | Logic::NEGATE_MATCH)?;
    assert_eq!(out.columns_of_interest(), vec!["c", "d"]);
    assert_error_kind(
        out.set_columns_of_interest(&ColumnSelector::Names(vec!["nope".to_string()]), Logic::OR),
        ErrorKind::Schema,
    );

    out.assert_column_flags_range(0..2, true)?;
    assert_eq!(out.count_columns_of_interest(), 4);
    out.assert_column_flags(&[false, true])?;
    assert_eq!(out.columns_of_interest(), vec!["b"]);
    out.delete_unset_columns()?;
    assert_eq!(out.get_column_names(), vec!["b"]);
    Ok(())
}

#[test]
fn range_and_pattern_filters_combine() -> Result<()> {
    let dir = TestDir::new()?;
    let mut input = element_page(&dir)?;
    assert_eq!(input.count_rows_of_interest(), 5);

    assert_eq!(input.filter_rows_of_interest("s", 1.0, 4.0, Logic::AND)?, 3);
    assert_eq!(input.row_flags(), &[false, true, true, true, false]);
    assert_eq!(input.match_rows_of_interest("Name", "Q*", Logic::AND)?, 0);
    assert_eq!(
        input.match_rows_of_interest("Name", "Q*", Logic::ONE_PREVIOUS | Logic::AND | Logic::NOCASE_COMPARE)?,
        3
    );
    assert_eq!(input.get_column("Name")?, ValueVec::String(vec!["Q1".into(), "q2".into(), "Q3".into()]));
    assert_eq!(input.get_internal_column("Name")?.len(), 5);
    assert_error_kind(input.filter_rows_of_interest("Name", 0.0, 1.0, Logic::AND), ErrorKind::Schema);
    Ok(())
}

#[test]
fn indirect_match_reads_patterns_from_a_column() -> Result<()> {
    let dir = TestDir::new()?;
    let mut input = element_page(&dir)?;
    let kept = input.match_rows_of_interest("Name", "Kind", Logic::INDIRECT_MATCH)?;
    assert_eq!(kept, 2);
    assert_eq!(input.row_flags(), &[true, false, true, false, false]);
    Ok(())
}

#[test]
fn numeric_scan_keeps_number_like_text() -> Result<()> {
    let dir = TestDir::new()?;
    let mut input = element_page(&dir)?;
    assert_eq!(input.filter_rows_by_num_scan("Reading", NumScanMode::default())?, 4);
    assert_eq!(input.row_flags(), &[true, true, false, true, true]);
    let strict = NumScanMode { invert: false, strict: true };
    assert_eq!(input.filter_rows_by_num_scan("Reading", strict)?, 3);

    let mut input = element_page(&dir)?;
    let inverted = NumScanMode { invert: true, strict: true };
    assert_eq!(input.filter_rows_by_num_scan("Reading", inverted)?, 2);
    assert_eq!(input.get_column_in_strings("Reading")?, vec!["n/a", "7 turns"]);
    Ok(())
}

#[test]
fn deleting_unset_rows_compacts_the_page() -> Result<()> {
    let dir = TestDir::new()?;
    let mut input = element_page(&dir)?;
    input.assert_row_flags(&[true, false, true])?;
    assert_eq!(input.delete_unset_rows()?, 3);
    assert_eq!(input.row_count(), 2);
    assert_eq!(input.get_internal_column("Name")?, ValueVec::String(vec!["Q1".into(), "B1".into()]));
    assert_eq!(input.count_rows_of_interest(), 2);
    assert_error_kind(input.assert_row_flags_range(0..3, false), ErrorKind::Bounds);
    Ok(())
}

#[test]
fn name_searches_respect_type_classes() -> Result<()> {
    let dir = TestDir::new()?;
    let input = element_page(&dir)?;
    assert_eq!(input.match_column_names("*", FindType::Numeric), vec!["s"]);
    assert_eq!(
        input.match_column_names("[NK]*", FindType::Specified(SddsType::String)),
        vec!["Name", "Kind"]
    );
    assert_eq!(input.find_column(FindType::Floating, &["Name", "s"]), Some("s".to_string()));
    assert_eq!(input.find_column(FindType::Integer, &["Name", "s"]), None);
    assert!(input.match_parameter_names("*", FindType::Any).is_empty());
    Ok(())
}
