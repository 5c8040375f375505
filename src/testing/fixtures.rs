//! Sample layouts and files.

use crate::dataset::Dataset;
use crate::error::Result;
use crate::layout::{ArrayDefinition, ColumnDefinition, DataEncoding, ParameterDefinition};
use crate::types::{SddsType, Value};
use std::path::Path;

/// One row of the beam fixture.
#[derive(Clone, Debug, PartialEq)]
pub struct BeamRow {
    pub name: String,
    pub s: f64,
    pub x: f64,
    pub turns: i32,
}

/// Rows of the two beam pages.
#[must_use]
pub fn sample_beam_rows() -> Vec<Vec<BeamRow>> {
    let row = |name: &str, s: f64, x: f64, turns: i32| BeamRow {
        name: name.to_string(),
        s,
        x,
        turns,
    };
    vec![
        vec![
            row("Q1", 0.0, 1.5e-3, 10),
            row("drift 1", 0.25, -2.0e-4, 11),
            row("B1", 1.75, 3.25, 12),
        ],
        vec![row("", 2.0, 0.0, 13), row("quote\"d", 3.5, -1.0, 14)],
    ]
}

/// Define the beam fixture's layout on an output dataset: parameters
/// `Energy` (double) and `Pass` (long), a fixed string parameter
/// `Machine`, a 2-d double array `R`, and columns `ElementName`, `s`, `x`,
/// `Turns`.
pub fn define_beam_layout(dataset: &mut Dataset) -> Result<()> {
    dataset.define_parameter(ParameterDefinition::new("Energy", SddsType::Double).units("GeV"))?;
    dataset.define_parameter(ParameterDefinition::new("Pass", SddsType::Int32))?;
    dataset.define_parameter(ParameterDefinition::new("Machine", SddsType::String).fixed_value("ring A"))?;
    dataset.define_array(ArrayDefinition::new("R", SddsType::Double, 2))?;
    dataset.define_column(ColumnDefinition::new("ElementName", SddsType::String))?;
    dataset.define_column(ColumnDefinition::new("s", SddsType::Double).units("m"))?;
    dataset.define_column(
        ColumnDefinition::new("x", SddsType::Double)
            .units("m")
            .description("horizontal position"),
    )?;
    dataset.define_column(ColumnDefinition::new("Turns", SddsType::Int32))?;
    Ok(())
}

/// Write the two-page beam fixture to `path`.
pub fn write_beam_file(path: &Path, encoding: DataEncoding) -> Result<()> {
    let mut out = Dataset::initialize_output(encoding, 1, Some("beam fixture"), Some("test data"), Some(path))?;
    define_beam_layout(&mut out)?;
    out.write_layout()?;
    for (page, rows) in sample_beam_rows().iter().enumerate() {
        out.start_page(rows.len())?;
        out.set_parameter("Energy", 1.5 * (page + 1) as f64)?;
        out.set_parameter("Pass", i32::try_from(page).unwrap_or(0))?;
        out.set_array("R", &[2, 2], vec![1.0, 0.0, 0.0, 1.0 + page as f64])?;
        for (r, row) in rows.iter().enumerate() {
            out.set_row_values(
                r,
                &[
                    ("ElementName", Value::from(row.name.as_str())),
                    ("s", Value::from(row.s)),
                    ("x", Value::from(row.x)),
                    ("Turns", Value::from(row.turns)),
                ],
            )?;
        }
        out.write_page()?;
    }
    out.terminate()
}

/// Write a single page with double columns `x` and `y`.
pub fn write_xy_file(path: &Path, encoding: DataEncoding, rows: &[(f64, f64)]) -> Result<()> {
    let mut out = Dataset::initialize_output(encoding, 1, None, None, Some(path))?;
    out.define_simple_column("x", None, SddsType::Double)?;
    out.define_simple_column("y", None, SddsType::Double)?;
    out.write_layout()?;
    out.start_page(rows.len())?;
    out.set_column("x", rows.iter().map(|r| r.0).collect::<Vec<f64>>())?;
    out.set_column("y", rows.iter().map(|r| r.1).collect::<Vec<f64>>())?;
    out.write_page()?;
    out.terminate()
}
