//! Definition records and their namelist field tables.
//!
//! Every header namelist kind maps to one record type here. Each type lists
//! its permitted fields in a static [`FieldSpec`] table; the header parser,
//! the header writer and the `get_*_information` / `change_*_information`
//! calls all go through that table via the [`Definition`] trait, so a field
//! is spelled and typed in exactly one place.

use crate::error::{Result, SddsError};
use crate::io::endian::ByteOrder;
use crate::types::SddsType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a namelist field's text is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Type,
    Choice(&'static [&'static str]),
}

/// One permitted field of a namelist kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Integer fields equal to this value are left out of written headers.
    pub default: i32,
    /// False for fields that are read but never written.
    pub written: bool,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
        required: false,
        default: 0,
        written: true,
    }
}

const fn required_text(name: &'static str) -> FieldSpec {
    FieldSpec {
        required: true,
        ..text(name)
    }
}

const fn int(name: &'static str, default: i32) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Int,
        required: false,
        default,
        written: true,
    }
}

const fn type_field() -> FieldSpec {
    FieldSpec {
        name: "type",
        kind: FieldKind::Type,
        required: true,
        default: 0,
        written: true,
    }
}

const fn choice(name: &'static str, options: &'static [&'static str], written: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Choice(options),
        required: false,
        default: 0,
        written,
    }
}

/// Value of one field as seen through the field table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    Int(i32),
    Type(SddsType),
}

impl FieldValue {
    /// Interpret raw namelist text according to `spec`.
    pub fn parse(spec: &FieldSpec, raw: &str) -> Result<Self> {
        match spec.kind {
            FieldKind::Text => Ok(FieldValue::Text(Some(raw.to_string()))),
            FieldKind::Int => raw.trim().parse::<i32>().map(FieldValue::Int).map_err(|_| {
                SddsError::parse(format!("field {} expects an integer, got \"{raw}\"", spec.name))
            }),
            FieldKind::Type => SddsType::from_name(raw)
                .map(FieldValue::Type)
                .ok_or_else(|| SddsError::parse(format!("unknown data type \"{raw}\""))),
            FieldKind::Choice(options) => {
                let lower = raw.trim().to_ascii_lowercase();
                if options.contains(&lower.as_str()) {
                    Ok(FieldValue::Text(Some(lower)))
                } else {
                    Err(SddsError::parse(format!(
                        "field {} must be one of {}, got \"{raw}\"",
                        spec.name,
                        options.join("|")
                    )))
                }
            }
        }
    }

    fn into_text(self, field: &str) -> Result<Option<String>> {
        match self {
            FieldValue::Text(t) => Ok(t),
            other => Err(SddsError::schema(format!("field {field} expects text, got {other}"))),
        }
    }

    fn into_int(self, field: &str) -> Result<i32> {
        match self {
            FieldValue::Int(i) => Ok(i),
            FieldValue::Text(Some(t)) => t.trim().parse().map_err(|_| {
                SddsError::schema(format!("field {field} expects an integer, got \"{t}\""))
            }),
            other => Err(SddsError::schema(format!("field {field} expects an integer, got {other}"))),
        }
    }

    fn into_type(self, field: &str) -> Result<SddsType> {
        match self {
            FieldValue::Type(t) => Ok(t),
            FieldValue::Text(Some(t)) => t.parse(),
            other => Err(SddsError::schema(format!("field {field} expects a type, got {other}"))),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(Some(t)) => f.write_str(t),
            FieldValue::Text(None) => f.write_str("<unset>"),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Type(t) => write!(f, "{t}"),
        }
    }
}

/// A record described by a namelist in the header.
pub trait Definition: Clone + fmt::Debug {
    /// Namelist keyword, e.g. `column` for `&column`.
    const KIND: &'static str;
    const FIELDS: &'static [FieldSpec];

    /// Empty record that namelist fields are applied to.
    fn blank() -> Self;

    fn name(&self) -> &str;

    fn field(&self, field: &str) -> Option<FieldValue>;

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()>;

    fn field_spec(field: &str) -> Option<&'static FieldSpec> {
        Self::FIELDS.iter().find(|f| f.name == field)
    }
}

fn unknown_field(kind: &str, field: &str) -> SddsError {
    SddsError::schema(format!("&{kind} has no field \"{field}\""))
}

/// Free text describing the whole dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub text: Option<String>,
    pub contents: Option<String>,
}

impl Description {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.contents.is_none()
    }
}

impl Definition for Description {
    const KIND: &'static str = "description";
    const FIELDS: &'static [FieldSpec] = &[text("text"), text("contents")];

    fn blank() -> Self {
        Self::default()
    }

    fn name(&self) -> &str {
        ""
    }

    fn field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "text" => Some(FieldValue::Text(self.text.clone())),
            "contents" => Some(FieldValue::Text(self.contents.clone())),
            _ => None,
        }
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "text" => self.text = value.into_text(field)?,
            "contents" => self.contents = value.into_text(field)?,
            _ => return Err(unknown_field(Self::KIND, field)),
        }
        Ok(())
    }
}

/// Shared builder methods for the descriptive fields.
macro_rules! describe_builders {
    () => {
        #[must_use]
        pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
            self.symbol = Some(symbol.into());
            self
        }

        #[must_use]
        pub fn units(mut self, units: impl Into<String>) -> Self {
            self.units = Some(units.into());
            self
        }

        #[must_use]
        pub fn description(mut self, description: impl Into<String>) -> Self {
            self.description = Some(description.into());
            self
        }

        #[must_use]
        pub fn format_string(mut self, format: impl Into<String>) -> Self {
            self.format_string = Some(format.into());
            self
        }
    };
}

/// Scalar stored once per page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    #[serde(rename = "type")]
    pub sdds_type: SddsType,
    /// Constant value stored in the header instead of on each page.
    pub fixed_value: Option<String>,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, sdds_type: SddsType) -> Self {
        Self {
            name: name.into(),
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            sdds_type,
            fixed_value: None,
        }
    }

    describe_builders!();

    #[must_use]
    pub fn fixed_value(mut self, value: impl Into<String>) -> Self {
        self.fixed_value = Some(value.into());
        self
    }
}

impl Definition for ParameterDefinition {
    const KIND: &'static str = "parameter";
    const FIELDS: &'static [FieldSpec] = &[
        required_text("name"),
        text("symbol"),
        text("units"),
        text("description"),
        text("format_string"),
        type_field(),
        text("fixed_value"),
    ];

    fn blank() -> Self {
        Self::new("", SddsType::Double)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "name" => FieldValue::Text(Some(self.name.clone())),
            "symbol" => FieldValue::Text(self.symbol.clone()),
            "units" => FieldValue::Text(self.units.clone()),
            "description" => FieldValue::Text(self.description.clone()),
            "format_string" => FieldValue::Text(self.format_string.clone()),
            "type" => FieldValue::Type(self.sdds_type),
            "fixed_value" => FieldValue::Text(self.fixed_value.clone()),
            _ => return None,
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "name" => self.name = value.into_text(field)?.unwrap_or_default(),
            "symbol" => self.symbol = value.into_text(field)?,
            "units" => self.units = value.into_text(field)?,
            "description" => self.description = value.into_text(field)?,
            "format_string" => self.format_string = value.into_text(field)?,
            "type" => self.sdds_type = value.into_type(field)?,
            "fixed_value" => self.fixed_value = value.into_text(field)?,
            _ => return Err(unknown_field(Self::KIND, field)),
        }
        Ok(())
    }
}

/// One value per row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    #[serde(rename = "type")]
    pub sdds_type: SddsType,
    /// Fixed ASCII field width; zero means free format.
    pub field_length: i32,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sdds_type: SddsType) -> Self {
        Self {
            name: name.into(),
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            sdds_type,
            field_length: 0,
        }
    }

    describe_builders!();

    #[must_use]
    pub fn field_length(mut self, length: i32) -> Self {
        self.field_length = length;
        self
    }
}

impl Definition for ColumnDefinition {
    const KIND: &'static str = "column";
    const FIELDS: &'static [FieldSpec] = &[
        required_text("name"),
        text("symbol"),
        text("units"),
        text("description"),
        text("format_string"),
        type_field(),
        int("field_length", 0),
    ];

    fn blank() -> Self {
        Self::new("", SddsType::Double)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "name" => FieldValue::Text(Some(self.name.clone())),
            "symbol" => FieldValue::Text(self.symbol.clone()),
            "units" => FieldValue::Text(self.units.clone()),
            "description" => FieldValue::Text(self.description.clone()),
            "format_string" => FieldValue::Text(self.format_string.clone()),
            "type" => FieldValue::Type(self.sdds_type),
            "field_length" => FieldValue::Int(self.field_length),
            _ => return None,
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "name" => self.name = value.into_text(field)?.unwrap_or_default(),
            "symbol" => self.symbol = value.into_text(field)?,
            "units" => self.units = value.into_text(field)?,
            "description" => self.description = value.into_text(field)?,
            "format_string" => self.format_string = value.into_text(field)?,
            "type" => self.sdds_type = value.into_type(field)?,
            "field_length" => self.field_length = value.into_int(field)?,
            _ => return Err(unknown_field(Self::KIND, field)),
        }
        Ok(())
    }
}

/// Multi-dimensional block stored once per page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayDefinition {
    pub name: String,
    pub symbol: Option<String>,
    pub units: Option<String>,
    pub description: Option<String>,
    pub format_string: Option<String>,
    pub group_name: Option<String>,
    #[serde(rename = "type")]
    pub sdds_type: SddsType,
    pub field_length: i32,
    pub dimensions: i32,
}

impl ArrayDefinition {
    pub fn new(name: impl Into<String>, sdds_type: SddsType, dimensions: i32) -> Self {
        Self {
            name: name.into(),
            symbol: None,
            units: None,
            description: None,
            format_string: None,
            group_name: None,
            sdds_type,
            field_length: 0,
            dimensions,
        }
    }

    describe_builders!();

    #[must_use]
    pub fn group_name(mut self, group: impl Into<String>) -> Self {
        self.group_name = Some(group.into());
        self
    }
}

impl Definition for ArrayDefinition {
    const KIND: &'static str = "array";
    const FIELDS: &'static [FieldSpec] = &[
        required_text("name"),
        text("symbol"),
        text("units"),
        text("description"),
        text("format_string"),
        text("group_name"),
        type_field(),
        int("field_length", 0),
        int("dimensions", 1),
    ];

    fn blank() -> Self {
        Self::new("", SddsType::Double, 1)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "name" => FieldValue::Text(Some(self.name.clone())),
            "symbol" => FieldValue::Text(self.symbol.clone()),
            "units" => FieldValue::Text(self.units.clone()),
            "description" => FieldValue::Text(self.description.clone()),
            "format_string" => FieldValue::Text(self.format_string.clone()),
            "group_name" => FieldValue::Text(self.group_name.clone()),
            "type" => FieldValue::Type(self.sdds_type),
            "field_length" => FieldValue::Int(self.field_length),
            "dimensions" => FieldValue::Int(self.dimensions),
            _ => return None,
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "name" => self.name = value.into_text(field)?.unwrap_or_default(),
            "symbol" => self.symbol = value.into_text(field)?,
            "units" => self.units = value.into_text(field)?,
            "description" => self.description = value.into_text(field)?,
            "format_string" => self.format_string = value.into_text(field)?,
            "group_name" => self.group_name = value.into_text(field)?,
            "type" => self.sdds_type = value.into_type(field)?,
            "field_length" => self.field_length = value.into_int(field)?,
            "dimensions" => self.dimensions = value.into_int(field)?,
            _ => return Err(unknown_field(Self::KIND, field)),
        }
        Ok(())
    }
}

/// Pointer to a related file; metadata only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociateDefinition {
    pub name: String,
    pub filename: Option<String>,
    pub path: Option<String>,
    pub description: Option<String>,
    pub contents: Option<String>,
    /// Nonzero when the associated file is itself SDDS.
    pub sdds: i32,
}

impl AssociateDefinition {
    pub fn new(name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            path: None,
            description: None,
            contents: None,
            sdds: 0,
        }
    }
}

impl Definition for AssociateDefinition {
    const KIND: &'static str = "associate";
    const FIELDS: &'static [FieldSpec] = &[
        required_text("name"),
        text("filename"),
        text("path"),
        text("description"),
        text("contents"),
        int("sdds", 0),
    ];

    fn blank() -> Self {
        Self {
            name: String::new(),
            filename: None,
            path: None,
            description: None,
            contents: None,
            sdds: 0,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "name" => FieldValue::Text(Some(self.name.clone())),
            "filename" => FieldValue::Text(self.filename.clone()),
            "path" => FieldValue::Text(self.path.clone()),
            "description" => FieldValue::Text(self.description.clone()),
            "contents" => FieldValue::Text(self.contents.clone()),
            "sdds" => FieldValue::Int(self.sdds),
            _ => return None,
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "name" => self.name = value.into_text(field)?.unwrap_or_default(),
            "filename" => self.filename = value.into_text(field)?,
            "path" => self.path = value.into_text(field)?,
            "description" => self.description = value.into_text(field)?,
            "contents" => self.contents = value.into_text(field)?,
            "sdds" => self.sdds = value.into_int(field)?,
            _ => return Err(unknown_field(Self::KIND, field)),
        }
        Ok(())
    }
}

/// Page encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataEncoding {
    #[serde(rename = "ascii")]
    Ascii,
    #[default]
    #[serde(rename = "binary")]
    Binary,
}

impl DataEncoding {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            DataEncoding::Ascii => "ascii",
            DataEncoding::Binary => "binary",
        }
    }
}

/// Contents of the `&data` namelist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMode {
    pub encoding: DataEncoding,
    /// ASCII only: physical lines per row.
    pub lines_per_row: i32,
    /// ASCII only: pages end at a blank line instead of carrying a count.
    pub no_row_counts: bool,
    /// Row counts use a fixed width so they can be rewritten in place.
    pub fixed_row_count: bool,
    /// ASCII only: lines after `&data` to skip before the first page.
    pub additional_header_lines: i32,
    /// Binary only: columns stored one after another rather than by row.
    pub column_major: bool,
    /// Declared byte order; `None` means the host order.
    pub byte_order: Option<ByteOrder>,
}

impl Default for DataMode {
    fn default() -> Self {
        Self {
            encoding: DataEncoding::Binary,
            lines_per_row: 1,
            no_row_counts: false,
            fixed_row_count: false,
            additional_header_lines: 0,
            column_major: false,
            byte_order: None,
        }
    }
}

impl DataMode {
    /// Byte order the binary codec should use.
    #[must_use]
    pub fn effective_byte_order(&self) -> ByteOrder {
        self.byte_order.unwrap_or_else(ByteOrder::native)
    }
}

impl Definition for DataMode {
    const KIND: &'static str = "data";
    const FIELDS: &'static [FieldSpec] = &[
        choice("mode", &["ascii", "binary"], true),
        int("lines_per_row", 1),
        int("no_row_counts", 0),
        int("fixed_row_count", 0),
        int("additional_header_lines", 0),
        int("column_major_order", 0),
        choice("endian", &["big", "little"], false),
    ];

    fn blank() -> Self {
        Self::default()
    }

    fn name(&self) -> &str {
        ""
    }

    fn field(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "mode" => FieldValue::Text(Some(self.encoding.name().to_string())),
            "lines_per_row" => FieldValue::Int(self.lines_per_row),
            "no_row_counts" => FieldValue::Int(i32::from(self.no_row_counts)),
            "fixed_row_count" => FieldValue::Int(i32::from(self.fixed_row_count)),
            "additional_header_lines" => FieldValue::Int(self.additional_header_lines),
            "column_major_order" => FieldValue::Int(i32::from(self.column_major)),
            "endian" => FieldValue::Text(self.byte_order.map(|o| match o {
                ByteOrder::BigEndian => "big".to_string(),
                ByteOrder::LittleEndian => "little".to_string(),
            })),
            _ => return None,
        })
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<()> {
        match field {
            "mode" => {
                self.encoding = match value.into_text(field)?.as_deref() {
                    Some("ascii") => DataEncoding::Ascii,
                    Some("binary") => DataEncoding::Binary,
                    other => {
                        return Err(SddsError::schema(format!("unknown data mode {other:?}")));
                    }
                }
            }
            "lines_per_row" => self.lines_per_row = value.into_int(field)?.max(1),
            "no_row_counts" => self.no_row_counts = value.into_int(field)? != 0,
            "fixed_row_count" => self.fixed_row_count = value.into_int(field)? != 0,
            "additional_header_lines" => self.additional_header_lines = value.into_int(field)?,
            "column_major_order" => self.column_major = value.into_int(field)? != 0,
            "endian" => {
                self.byte_order = match value.into_text(field)?.as_deref() {
                    Some("big") => Some(ByteOrder::BigEndian),
                    Some("little") => Some(ByteOrder::LittleEndian),
                    None => None,
                    Some(other) => {
                        return Err(SddsError::schema(format!("unknown byte order \"{other}\"")));
                    }
                }
            }
            _ => return Err(unknown_field(Self::KIND, field)),
        }
        Ok(())
    }
}
