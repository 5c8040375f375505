use anyhow::Result;
use sdds::dataset::Dataset;
use sdds::error::ErrorKind;
use sdds::header::{read_header, render_header};
use sdds::io::{ByteOrder, SddsReader};
use sdds::layout::{DataEncoding, Layout};
use sdds::testing::{assert_error_kind, write_beam_file, TestDir};
use sdds::types::{SddsType, ValueVec};
use std::path::Path;

fn parse_file(path: &Path) -> sdds::Result<Layout> {
    let mut reader = SddsReader::open(path)?;
    read_header(&mut reader)
}

#[test]
fn included_definitions_join_the_layout() -> Result<()> {
    let dir = TestDir::new()?;
    std::fs::create_dir(dir.path().join("defs"))?;
    std::fs::write(
        dir.path().join("defs").join("orbit.inc"),
        "! shared definitions\n&column name=x, units=mm, type=double, &end\n",
    )?;
    let main = dir.file("main.sdds");
    std::fs::write(
        &main,
        "SDDS5\n&include filename=\"defs/orbit.inc\", &end\n\
         &column name=n, type=long, &end\n&data mode=ascii, &end\n2\n1.5 1\n2.5 2\n",
    )?;

    let mut input = Dataset::initialize_input(Some(&main))?;
    assert_eq!(input.get_column_names(), vec!["x", "n"]);
    assert_eq!(input.column_definition("x").and_then(|d| d.units.as_deref()), Some("mm"));
    input.read_page()?;
    assert_eq!(input.get_column("n")?, ValueVec::Int32(vec![1, 2]));
    Ok(())
}

#[test]
fn include_cycles_hit_the_depth_limit() -> Result<()> {
    let dir = TestDir::new()?;
    let looped = dir.file("loop.inc");
    std::fs::write(&looped, "&include filename=\"loop.inc\", &end\n")?;
    let main = dir.file("main.sdds");
    std::fs::write(&main, "SDDS5\n&include filename=\"loop.inc\", &end\n&data mode=ascii, &end\n")?;
    assert_error_kind(parse_file(&main), ErrorKind::Parse);

    let missing = dir.file("missing.sdds");
    std::fs::write(&missing, "SDDS5\n&include filename=\"nowhere.inc\", &end\n&data mode=ascii, &end\n")?;
    assert_error_kind(parse_file(&missing), ErrorKind::Io);
    Ok(())
}

#[test]
fn namelists_may_span_lines_and_share_them() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("layout.sdds");
    std::fs::write(
        &path,
        "SDDS5\n! # big-endian\n&description text=\"orbit, corrected\", contents=\"bpm data\", &end\n\
         &parameter name=Step, type=short, &end &column name=x,\n   units=mm,\n   type=float,\n&end\n\
         &array name=M, type=double, dimensions=2, &end\n&data\n mode=binary,\n&end\n",
    )?;
    let layout = parse_file(&path)?;
    assert_eq!(layout.description.text.as_deref(), Some("orbit, corrected"));
    assert_eq!(layout.description.contents.as_deref(), Some("bpm data"));
    assert_eq!(layout.parameters.names(), vec!["Step"]);
    assert_eq!(layout.column_type(0), Some(SddsType::Float));
    assert_eq!(layout.arrays.names(), vec!["M"]);
    assert_eq!(layout.data_mode.encoding, DataEncoding::Binary);
    assert_eq!(layout.data_mode.byte_order, Some(ByteOrder::BigEndian));
    Ok(())
}

#[test]
fn malformed_headers_are_parse_errors() -> Result<()> {
    let dir = TestDir::new()?;
    let cases = [
        "SDDS5\n&table name=x, &end\n&data mode=ascii, &end\n",
        "SDDS5\n&column name=x, type=double, &end\n",
        "SDDS5\n&column name=x, type=complex, &end\n&data mode=ascii, &end\n",
        "SDDS5\n&column name=x, type=double, colour=red, &end\n&data mode=ascii, &end\n",
        "SDDS5\n&array name=A, type=double, dimensions=0, &end\n&data mode=binary, &end\n",
        "SDDS5\n&data mode=binary, no_row_counts=1, &end\n",
        "SDDS5\n&data mode=hex, &end\n",
        "",
    ];
    for (i, text) in cases.iter().enumerate() {
        let path = dir.file(&format!("bad{i}.sdds"));
        std::fs::write(&path, text)?;
        let result = parse_file(&path);
        assert!(result.is_err(), "case {i} parsed: {text:?}");
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::Parse, "case {i}: {e}");
        }
    }

    let path = dir.file("dup.sdds");
    std::fs::write(
        &path,
        "SDDS5\n&column name=x, type=double, &end\n&column name=x, type=long, &end\n&data mode=ascii, &end\n",
    )?;
    assert_error_kind(parse_file(&path), ErrorKind::Schema);
    Ok(())
}

#[test]
fn rendered_headers_parse_back_to_the_same_layout() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("beam.sdds");
    write_beam_file(&path, DataEncoding::Binary)?;
    let layout = parse_file(&path)?;

    let columns: Vec<usize> = (0..layout.columns.len()).collect();
    let text = render_header(&layout, &columns);
    assert!(text.starts_with("SDDS5\n! # "), "{text}");
    let copy = dir.file("rendered.sdds");
    std::fs::write(&copy, &text)?;
    assert_eq!(parse_file(&copy)?, layout);

    let only_s = render_header(&layout, &[1]);
    assert!(only_s.contains("name=s,"), "{only_s}");
    assert!(!only_s.contains("name=Turns,"), "{only_s}");
    Ok(())
}

#[test]
fn layout_json_round_trips() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("beam.sdds");
    write_beam_file(&path, DataEncoding::Ascii)?;
    let input = Dataset::initialize_input(Some(&path))?;
    let json = input.layout_json()?;

    let value: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(value["data_mode"]["encoding"], "ascii");
    assert_eq!(Layout::from_json(&json)?, *input.layout());
    assert_error_kind(Layout::from_json("{\"columns\": 3}"), ErrorKind::Parse);
    Ok(())
}
