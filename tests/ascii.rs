use anyhow::Result;
use sdds::dataset::{Dataset, RowCountMode};
use sdds::error::ErrorKind;
use sdds::layout::{ColumnDefinition, DataEncoding, ParameterDefinition};
use sdds::testing::{
    assert_error_kind, assert_f64_slices_close, sample_beam_rows, write_beam_file, TestDir,
};
use sdds::types::{SddsType, Value, ValueVec};

#[test]
fn pages_without_row_counts() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("counts.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.set_row_count_mode(RowCountMode::None)?;
    out.define_simple_column("n", None, SddsType::Int32)?;
    out.write_layout()?;
    for page in [vec![1_i32, 2], vec![3, 4, 5]] {
        out.start_page(page.len())?;
        out.set_column("n", page)?;
        out.write_page()?;
    }
    out.terminate()?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("no_row_counts=1"), "{text}");
    assert!(text.contains("! page number 2\n3\n4\n5\n\n"), "{text}");

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.get_column("n")?, ValueVec::Int32(vec![1, 2]));
    assert_eq!(input.read_page()?, Some(2));
    assert_eq!(input.get_column("n")?, ValueVec::Int32(vec![3, 4, 5]));
    assert_eq!(input.read_page()?, None);
    Ok(())
}

#[test]
fn beam_fixture_round_trip() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("beam.sdds");
    write_beam_file(&path, DataEncoding::Ascii)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_eq!(input.layout().data_mode.encoding, DataEncoding::Ascii);
    assert_eq!(input.layout().description.text.as_deref(), Some("beam fixture"));
    for rows in sample_beam_rows() {
        assert!(input.read_page()?.is_some());
        assert_eq!(input.get_parameter("Machine")?, Value::from("ring A"));
        let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
        assert_eq!(input.get_column_in_strings("ElementName")?, names);
        let s: Vec<f64> = rows.iter().map(|r| r.s).collect();
        assert_f64_slices_close(&input.get_column_in_doubles("s")?, &s, 0.0);
        let turns: Vec<i32> = rows.iter().map(|r| r.turns).collect();
        assert_eq!(input.get_column("Turns")?, ValueVec::Int32(turns));
    }
    assert_eq!(input.read_page()?, None);
    Ok(())
}

#[test]
fn strings_are_quoted_and_escaped() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("strings.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_parameter(ParameterDefinition::new("title", SddsType::String))?;
    out.define_column(ColumnDefinition::new("s", SddsType::String))?;
    out.write_layout()?;
    out.start_page(4)?;
    out.set_parameter("title", "two words")?;
    let values = vec!["plain", "has space", "tab\there", "!bang"];
    out.set_column("s", values.clone())?;
    out.write_page()?;
    out.terminate()?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("\"has space\""), "{text}");
    assert!(text.contains("\"tab\\there\""), "{text}");
    assert!(text.contains("\"!bang\""), "{text}");

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_parameter("title")?, Value::from("two words"));
    assert_eq!(input.get_column_in_strings("s")?, values);
    Ok(())
}

#[test]
fn unquoted_string_parameter_line_is_taken_whole() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("hand.sdds");
    std::fs::write(
        &path,
        "SDDS5\n&parameter name=title, type=string, &end\n&column name=v, type=long, &end\n\
         &data mode=ascii, &end\n! comment line\n  free text here  \n2\n7\n8\n",
    )?;
    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_parameter("title")?, Value::from("free text here"));
    assert_eq!(input.get_column("v")?, ValueVec::Int32(vec![7, 8]));
    Ok(())
}

#[test]
fn lines_per_row_and_continuations() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("wrapped.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 2, None, None, Some(&path))?;
    for name in ["a", "b", "c"] {
        out.define_simple_column(name, None, SddsType::Int32)?;
    }
    out.write_layout()?;
    out.start_page(2)?;
    out.set_column("a", vec![1_i32, 4])?;
    out.set_column("b", vec![2_i32, 5])?;
    out.set_column("c", vec![3_i32, 6])?;
    out.write_page()?;
    out.terminate()?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_column("c")?, ValueVec::Int32(vec![3, 6]));

    let hand = dir.file("continued.sdds");
    std::fs::write(
        &hand,
        "SDDS5\n&column name=a, type=double, &end\n&column name=b, type=double, &end\n\
         &data mode=ascii, &end\n2\n1.5 \\\n2.5\n3 4\n",
    )?;
    let mut input = Dataset::initialize_input(Some(&hand))?;
    input.read_page()?;
    assert_f64_slices_close(&input.get_column_in_doubles("b")?, &[2.5, 4.0], 0.0);
    Ok(())
}

#[test]
fn field_length_pads_and_truncates() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("width.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_column(ColumnDefinition::new("tag", SddsType::String).field_length(4))?;
    assert_error_kind(
        out.define_column(ColumnDefinition::new("bad", SddsType::Double).field_length(4)),
        ErrorKind::Schema,
    );
    out.write_layout()?;
    out.start_page(2)?;
    out.set_column("tag", vec!["ab", "abcdefg"])?;
    out.write_page()?;
    out.terminate()?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_column_in_strings("tag")?, vec!["ab", "abcd"]);
    Ok(())
}

#[test]
fn quoted_values_fit_the_field_length() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("quoted_width.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_column(ColumnDefinition::new("tag", SddsType::String).field_length(6))?;
    out.write_layout()?;
    out.start_page(2)?;
    out.set_column("tag", vec!["a b c d e", "x\"y"])?;
    out.write_page()?;
    out.terminate()?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.lines().any(|l| l == "\"a b \""), "{text}");
    assert!(text.lines().any(|l| l == "\"x\\\"y\""), "{text}");
    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_column_in_strings("tag")?, vec!["a b ", "x\"y"]);
    Ok(())
}

#[test]
fn character_values_survive_every_byte() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("chars.sdds");
    let bytes: Vec<u8> = vec![b'a', 0, 0x7F, 0x80, 0xA0, 0xE9, 0xFF, b' ', b'"', b'\\'];
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_parameter(ParameterDefinition::new("mark", SddsType::Character))?;
    out.define_column(ColumnDefinition::new("c", SddsType::Character))?;
    out.write_layout()?;
    out.start_page(bytes.len())?;
    out.set_parameter("mark", Value::Character(0xE9))?;
    out.set_column("c", bytes.clone())?;
    out.write_page()?;
    out.terminate()?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("\"\\351\""), "{text}");
    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_parameter("mark")?, Value::Character(0xE9));
    assert_eq!(input.get_column("c")?, ValueVec::Character(bytes));
    Ok(())
}

#[test]
fn oversized_row_count_reads_only_present_rows() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("huge_count.txt");
    std::fs::write(
        &path,
        "SDDS5\n&column name=n, type=long, &end\n&data mode=ascii, &end\n2147483647\n1\n2\n",
    )?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    input.set_auto_read_recovery(true);
    assert_eq!(input.read_page()?, Some(1));
    assert_eq!(input.get_column("n")?, ValueVec::Int32(vec![1, 2]));
    assert_eq!(input.read_page()?, None);
    Ok(())
}

#[test]
fn formatted_values_follow_format_string() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("fmt.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_column(ColumnDefinition::new("x", SddsType::Double).format_string("%.3f"))?;
    out.write_layout()?;
    out.start_page(1)?;
    out.set_column("x", vec![1.0_f64 / 3.0])?;
    out.write_page()?;
    out.terminate()?;

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("\n0.333\n"), "{text}");
    let mut input = Dataset::initialize_input(Some(&path))?;
    input.read_page()?;
    assert_eq!(input.get_column_in_strings("x")?, vec!["0.333"]);
    Ok(())
}

#[test]
fn update_page_is_binary_only() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("ascii-update.sdds");
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, Some(&path))?;
    out.define_simple_column("v", None, SddsType::Int32)?;
    out.write_layout()?;
    out.start_page(1)?;
    assert_error_kind(out.update_page(false), ErrorKind::Unsupported);
    out.terminate()?;
    Ok(())
}
