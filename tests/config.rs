use anyhow::Result;
use sdds::config::{self, LibraryConfig, NameValidity};
use sdds::dataset::Dataset;
use sdds::error::ErrorKind;
use sdds::layout::DataEncoding;
use sdds::testing::{assert_error_kind, TestDir};
use sdds::types::SddsType;

#[test]
fn partial_json_keeps_defaults() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("sdds.json");
    std::fs::write(&path, r#"{ "gzip_level": 1, "name_validity": "AllowAny" }"#)?;
    let loaded = LibraryConfig::from_json_file(&path)?;
    assert_eq!(loaded.gzip_level, 1);
    assert_eq!(loaded.name_validity, NameValidity::AllowAny);
    assert_eq!(loaded.io_buffer_size, 262_144);
    assert_eq!(loaded.max_include_depth, 16);

    let back: LibraryConfig = serde_json::from_str(&loaded.to_json()?)?;
    assert_eq!(back, loaded);

    std::fs::write(&path, "{ not json")?;
    assert_error_kind(LibraryConfig::from_json_file(&path), ErrorKind::Parse);
    assert_error_kind(LibraryConfig::from_json_file(dir.file("absent.json")), ErrorKind::Io);
    Ok(())
}

#[test]
fn name_rules_follow_the_current_setting() -> Result<()> {
    let mut out = Dataset::initialize_output(DataEncoding::Ascii, 1, None, None, None)?;
    assert_error_kind(out.define_simple_column("1st", None, SddsType::Double), ErrorKind::Schema);
    assert_error_kind(out.define_simple_column("a,b", None, SddsType::Double), ErrorKind::Schema);

    config::set_name_validity(NameValidity::AllowV15);
    out.define_simple_column("1st", None, SddsType::Double)?;
    assert_error_kind(out.define_simple_column("a,b", None, SddsType::Double), ErrorKind::Schema);

    config::set_name_validity(NameValidity::AllowAny);
    out.define_simple_column("a,b", None, SddsType::Double)?;
    assert_error_kind(out.define_simple_column("a b", None, SddsType::Double), ErrorKind::Schema);

    config::set(LibraryConfig::default());
    Ok(())
}

#[test]
fn include_depth_is_configurable() -> Result<()> {
    let dir = TestDir::new()?;
    std::fs::write(dir.file("inner.inc"), "&column name=x, type=double, &end\n")?;
    std::fs::write(dir.file("outer.inc"), "&include filename=\"inner.inc\", &end\n")?;
    let main = dir.file("main.sdds");
    std::fs::write(&main, "SDDS5\n&include filename=\"outer.inc\", &end\n&data mode=ascii, &end\n")?;

    let input = Dataset::initialize_input(Some(&main))?;
    assert_eq!(input.get_column_names(), vec!["x"]);

    config::update(|c| c.max_include_depth = 1);
    assert_error_kind(Dataset::initialize_input(Some(&main)), ErrorKind::Parse);
    config::set(LibraryConfig::default());
    Ok(())
}

#[test]
fn byte_order_sanity_check_can_be_disabled() -> Result<()> {
    let dir = TestDir::new()?;
    let path = dir.file("negative.sdds");
    let mut bytes = b"SDDS5\n! # big-endian\n&column name=n, type=long, &end\n&data mode=binary, &end\n".to_vec();
    bytes.extend_from_slice(&(-5_i32).to_be_bytes());
    std::fs::write(&path, &bytes)?;

    let mut input = Dataset::initialize_input(Some(&path))?;
    assert_error_kind(input.read_page(), ErrorKind::Parse);

    config::update(|c| c.check_row_count_sanity = false);
    let mut input = Dataset::initialize_input(Some(&path))?;
    let outcome = input.read_page();
    config::set(LibraryConfig::default());
    assert_eq!(outcome?, None);
    Ok(())
}
