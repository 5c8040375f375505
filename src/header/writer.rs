//! Header emission.

use super::namelist::render;
use crate::error::{IoContext, Result};
use crate::io::SddsWriter;
use crate::layout::{DataEncoding, Layout, SDDS_VERSION};

/// Header text for `layout`, listing only the columns at `columns`.
///
/// Binary headers always name their byte order so any host can read them.
#[must_use]
pub fn render_header(layout: &Layout, columns: &[usize]) -> String {
    let mode = &layout.data_mode;
    let mut out = format!("SDDS{SDDS_VERSION}\n");
    if mode.encoding == DataEncoding::Binary {
        out.push_str(&format!("! # {}\n", mode.effective_byte_order().header_word()));
    }
    if mode.fixed_row_count {
        out.push_str("! # sddsfixedrowcount\n");
    }
    if !layout.description.is_empty() {
        out.push_str(&render(&layout.description));
    }
    for parameter in layout.parameters.iter() {
        out.push_str(&render(parameter));
    }
    for column in columns.iter().filter_map(|&i| layout.columns.get(i)) {
        out.push_str(&render(column));
    }
    for array in layout.arrays.iter() {
        out.push_str(&render(array));
    }
    for associate in layout.associates.iter() {
        out.push_str(&render(associate));
    }

    let mut written = mode.clone();
    written.additional_header_lines = 0;
    match written.encoding {
        DataEncoding::Binary => {
            written.lines_per_row = 1;
            written.no_row_counts = false;
        }
        DataEncoding::Ascii => written.column_major = false,
    }
    out.push_str(&render(&written));
    out
}

/// Write the header and return the offset where page data starts.
pub fn write_header(writer: &mut SddsWriter, layout: &Layout, columns: &[usize]) -> Result<u64> {
    let text = render_header(layout, columns);
    writer
        .write_all(text.as_bytes())
        .io_context(|| "write header")?;
    Ok(writer.position())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::endian::ByteOrder;
    use crate::layout::{ColumnDefinition, DataMode, Description, ParameterDefinition};
    use crate::types::SddsType;

    #[test]
    fn canonical_header_text() {
        let mut layout = Layout::new();
        layout.description = Description {
            text: Some("free text".into()),
            contents: Some("kind-of-dataset".into()),
        };
        layout
            .add_parameter(ParameterDefinition::new("Energy", SddsType::Double).units("GeV"))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("x", SddsType::Double).units("mm"))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("y", SddsType::Double))
            .unwrap();
        layout.data_mode = DataMode {
            column_major: true,
            fixed_row_count: true,
            byte_order: Some(ByteOrder::BigEndian),
            ..DataMode::default()
        };
        let text = render_header(&layout, &[0]);
        assert_eq!(
            text,
            "SDDS5\n\
             ! # big-endian\n\
             ! # sddsfixedrowcount\n\
             &description text=\"free text\", contents=kind-of-dataset, &end\n\
             &parameter name=Energy, units=GeV, type=double, &end\n\
             &column name=x, units=mm, type=double, &end\n\
             &data mode=binary, fixed_row_count=1, column_major_order=1, &end\n"
        );
    }
}
