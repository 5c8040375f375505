//! The schema of a dataset.
//!
//! A [`Layout`] holds the description, the parameter, column, array and
//! associate definitions (each in a [`DefinitionTable`] with a sorted name
//! index), and the `&data` record. Adding a definition checks the name
//! against the current [`NameValidity`](crate::config::NameValidity) rules
//! and the record against its type.
//!
//! ```
//! use sdds::layout::{ColumnDefinition, Layout, ParameterDefinition};
//! use sdds::types::SddsType;
//!
//! let mut layout = Layout::new();
//! layout.add_parameter(ParameterDefinition::new("Energy", SddsType::Double).units("GeV")).unwrap();
//! layout.add_column(ColumnDefinition::new("x", SddsType::Double)).unwrap();
//! assert_eq!(layout.columns.find("x"), Some(0));
//! assert!(layout.add_column(ColumnDefinition::new("bad name", SddsType::Double)).is_err());
//! ```

pub mod definitions;
pub mod index;

pub use definitions::{
    ArrayDefinition, AssociateDefinition, ColumnDefinition, DataEncoding, DataMode, Definition,
    Description, FieldKind, FieldSpec, FieldValue, ParameterDefinition,
};
pub use index::DefinitionTable;
pub use crate::config::NameValidity;
pub use crate::io::endian::ByteOrder;

use crate::config;
use crate::error::{Result, SddsError};
use crate::format::PrintfFormat;
use crate::types::{SddsType, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Header version written and accepted.
pub const SDDS_VERSION: u32 = 5;

static STRICT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_@:#%$&/\[\]][A-Za-z0-9@:#+%\-._$&/\[\]]*$").expect("valid name pattern")
});

/// Check a name against the current validity rules.
pub fn validate_name(name: &str, class: &str) -> Result<()> {
    let bad = |why: &str| SddsError::schema(format!("invalid {class} name \"{name}\": {why}"));
    if name.is_empty() {
        return Err(bad("empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(bad("contains whitespace"));
    }
    if name.contains(['"', '\'']) {
        return Err(bad("contains a quote"));
    }
    match config::current().name_validity {
        NameValidity::AllowAny => Ok(()),
        NameValidity::AllowV15 => {
            if name.chars().all(|c| c.is_ascii_graphic() && c != ',') {
                Ok(())
            } else {
                Err(bad("contains a comma or non-printable character"))
            }
        }
        NameValidity::Strict => {
            if STRICT_NAME.is_match(name) {
                Ok(())
            } else {
                Err(bad("use letters, digits and @:#+%-._$&/[] not starting with a digit"))
            }
        }
    }
}

/// Complete schema of a dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub description: Description,
    pub parameters: DefinitionTable<ParameterDefinition>,
    pub columns: DefinitionTable<ColumnDefinition>,
    pub arrays: DefinitionTable<ArrayDefinition>,
    pub associates: DefinitionTable<AssociateDefinition>,
    pub data_mode: DataMode,
}

fn check_format(format: Option<&str>, name: &str) -> Result<()> {
    if let Some(f) = format {
        PrintfFormat::parse(f)
            .map_err(|_| SddsError::schema(format!("{name}: invalid format_string \"{f}\"")))?;
    }
    Ok(())
}

pub(crate) fn check_field_length(length: i32, ty: SddsType, name: &str) -> Result<()> {
    if length < 0 {
        return Err(SddsError::schema(format!("{name}: negative field length")));
    }
    if length > 0 && ty != SddsType::String {
        return Err(SddsError::schema(format!(
            "{name}: field length is only valid for string data"
        )));
    }
    Ok(())
}

impl Layout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_parameter(&mut self, def: ParameterDefinition) -> Result<usize> {
        validate_name(&def.name, "parameter")?;
        check_format(def.format_string.as_deref(), &def.name)?;
        if let Some(fixed) = &def.fixed_value
            && def.sdds_type.is_numeric()
        {
            Value::scan(fixed, def.sdds_type).map_err(|_| {
                SddsError::schema(format!(
                    "parameter {}: fixed value \"{fixed}\" is not a valid {}",
                    def.name, def.sdds_type
                ))
            })?;
        }
        self.parameters.push(def)
    }

    pub fn add_column(&mut self, def: ColumnDefinition) -> Result<usize> {
        validate_name(&def.name, "column")?;
        check_format(def.format_string.as_deref(), &def.name)?;
        check_field_length(def.field_length, def.sdds_type, &def.name)?;
        self.columns.push(def)
    }

    pub fn add_array(&mut self, def: ArrayDefinition) -> Result<usize> {
        validate_name(&def.name, "array")?;
        check_format(def.format_string.as_deref(), &def.name)?;
        check_field_length(def.field_length, def.sdds_type, &def.name)?;
        if def.dimensions < 1 {
            return Err(SddsError::schema(format!(
                "array {}: dimensions must be at least 1",
                def.name
            )));
        }
        self.arrays.push(def)
    }

    pub fn add_associate(&mut self, def: AssociateDefinition) -> Result<usize> {
        validate_name(&def.name, "associate")?;
        self.associates.push(def)
    }

    /// Parameters that occupy space on each page.
    pub fn page_parameters(&self) -> impl Iterator<Item = (usize, &ParameterDefinition)> {
        self.parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.fixed_value.is_none())
    }

    #[must_use]
    pub fn column_type(&self, index: usize) -> Option<SddsType> {
        self.columns.get(index).map(|c| c.sdds_type)
    }

    /// Schema as pretty-printed JSON.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SddsError::parse(format!("layout JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_names() {
        for ok in ["x", "Energy", "s_1", "Q:x", "a.b", "[p]", "%rate"] {
            assert!(validate_name(ok, "column").is_ok(), "{ok}");
        }
        for bad in ["", "1x", ".a", "-a", "a b", "a\"b", "a,b"] {
            assert!(validate_name(bad, "column").is_err(), "{bad}");
        }
    }

    #[test]
    fn type_checks_on_add() {
        let mut layout = Layout::new();
        assert!(layout
            .add_parameter(ParameterDefinition::new("n", SddsType::Int32).fixed_value("abc"))
            .is_err());
        assert!(layout
            .add_array(ArrayDefinition::new("m", SddsType::Double, 0))
            .is_err());
        assert!(layout
            .add_column(ColumnDefinition::new("c", SddsType::Double).format_string("%q"))
            .is_err());
        assert!(layout
            .add_column(ColumnDefinition::new("c", SddsType::Double).field_length(8))
            .is_err());
        layout
            .add_column(ColumnDefinition::new("c", SddsType::String).field_length(8))
            .unwrap();
        layout
            .add_parameter(ParameterDefinition::new("n", SddsType::Int32).fixed_value("12"))
            .unwrap();
        assert_eq!(layout.page_parameters().count(), 0);
    }

    #[test]
    fn json_round_trip_rebuilds_indices() {
        let mut layout = Layout::new();
        layout.add_column(ColumnDefinition::new("b", SddsType::Float)).unwrap();
        layout.add_column(ColumnDefinition::new("a", SddsType::String)).unwrap();
        let back = Layout::from_json(&layout.to_json().unwrap()).unwrap();
        assert_eq!(back.columns.find("a"), Some(1));
        assert_eq!(back, layout);
    }
}
