//! The closed set of SDDS scalar types and the values that carry them.
//!
//! [`SddsType`] names a type the way headers do (`double`, `long`,
//! `string`, ...). [`Value`] is one typed scalar, used for parameters and
//! single cells; [`ValueVec`] is a typed vector, used for columns and array
//! payloads.
//!
//! Numeric conversions between types go through the widest representation
//! (`i128` between integers, `f64` otherwise) and clamp on the way back
//! down: floats truncate toward zero and saturate, NaN becomes zero.
//!
//! Long double values are held in memory as `f64`; the binary codec stores
//! them on disk as 16-byte x87 extended precision numbers.
//!
//! ```
//! use sdds::types::{SddsType, Value};
//!
//! let v = Value::Double(300.7);
//! assert_eq!(v.cast(SddsType::Character).unwrap(), Value::Character(255));
//! assert_eq!(v.cast(SddsType::Short).unwrap(), Value::Short(300));
//! assert_eq!(SddsType::from_name("long64"), Some(SddsType::Int64));
//! ```

use crate::error::{Result, SddsError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar type of a parameter, column or array element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SddsType {
    #[serde(rename = "longdouble")]
    LongDouble,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "long64")]
    Int64,
    #[serde(rename = "ulong64")]
    UInt64,
    #[serde(rename = "long")]
    Int32,
    #[serde(rename = "ulong")]
    UInt32,
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "ushort")]
    UShort,
    #[serde(rename = "character")]
    Character,
    #[serde(rename = "string")]
    String,
}

impl SddsType {
    pub const ALL: [SddsType; 11] = [
        SddsType::LongDouble,
        SddsType::Double,
        SddsType::Float,
        SddsType::Int64,
        SddsType::UInt64,
        SddsType::Int32,
        SddsType::UInt32,
        SddsType::Short,
        SddsType::UShort,
        SddsType::String,
        SddsType::Character,
    ];

    /// Name used in headers.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SddsType::LongDouble => "longdouble",
            SddsType::Double => "double",
            SddsType::Float => "float",
            SddsType::Int64 => "long64",
            SddsType::UInt64 => "ulong64",
            SddsType::Int32 => "long",
            SddsType::UInt32 => "ulong",
            SddsType::Short => "short",
            SddsType::UShort => "ushort",
            SddsType::Character => "character",
            SddsType::String => "string",
        }
    }

    /// Look a type up by header name or one of its aliases.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let ty = match lower.as_str() {
            "longdouble" | "long_double" => SddsType::LongDouble,
            "double" | "real64" => SddsType::Double,
            "float" | "real32" => SddsType::Float,
            "long64" | "int64" => SddsType::Int64,
            "ulong64" | "uint64" => SddsType::UInt64,
            "long" | "int32" | "integer" => SddsType::Int32,
            "ulong" | "uint32" => SddsType::UInt32,
            "short" | "int16" => SddsType::Short,
            "ushort" | "uint16" => SddsType::UShort,
            "character" | "char" => SddsType::Character,
            "string" => SddsType::String,
            _ => return None,
        };
        Some(ty)
    }

    /// Numeric type code used by the C toolkit (1 = long double ... 11 = character).
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            SddsType::LongDouble => 1,
            SddsType::Double => 2,
            SddsType::Float => 3,
            SddsType::Int64 => 4,
            SddsType::UInt64 => 5,
            SddsType::Int32 => 6,
            SddsType::UInt32 => 7,
            SddsType::Short => 8,
            SddsType::UShort => 9,
            SddsType::String => 10,
            SddsType::Character => 11,
        }
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Bytes per value in the binary encoding; `None` for strings.
    #[must_use]
    pub fn binary_size(self) -> Option<usize> {
        match self {
            SddsType::LongDouble => Some(16),
            SddsType::Double | SddsType::Int64 | SddsType::UInt64 => Some(8),
            SddsType::Float | SddsType::Int32 | SddsType::UInt32 => Some(4),
            SddsType::Short | SddsType::UShort => Some(2),
            SddsType::Character => Some(1),
            SddsType::String => None,
        }
    }

    /// printf format used when a definition carries none.
    #[must_use]
    pub fn default_format(self) -> &'static str {
        match self {
            SddsType::LongDouble => "%22.18Le",
            SddsType::Double => "%22.15e",
            SddsType::Float => "%15.8e",
            SddsType::Int64 => "%lld",
            SddsType::UInt64 => "%llu",
            SddsType::Int32 => "%d",
            SddsType::UInt32 => "%u",
            SddsType::Short => "%hd",
            SddsType::UShort => "%hu",
            SddsType::Character => "%c",
            SddsType::String => "%s",
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        !matches!(self, SddsType::String | SddsType::Character)
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SddsType::Int64
                | SddsType::UInt64
                | SddsType::Int32
                | SddsType::UInt32
                | SddsType::Short
                | SddsType::UShort
        )
    }

    #[must_use]
    pub fn is_floating(self) -> bool {
        matches!(
            self,
            SddsType::LongDouble | SddsType::Double | SddsType::Float
        )
    }
}

impl fmt::Display for SddsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SddsType {
    type Err = SddsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| SddsError::parse(format!("unknown data type \"{s}\"")))
    }
}

/// One typed scalar.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    LongDouble(f64),
    Double(f64),
    Float(f32),
    Int64(i64),
    UInt64(u64),
    Int32(i32),
    UInt32(u32),
    Short(i16),
    UShort(u16),
    Character(u8),
    String(String),
}

/// Intermediate used for numeric casts.
#[derive(Clone, Copy, Debug)]
enum Wide {
    Int(i128),
    Float(f64),
}

macro_rules! clamp_int {
    ($w:expr, $t:ty) => {
        match $w {
            Wide::Int(i) => i.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t,
            Wide::Float(f) => f as $t,
        }
    };
}

impl Value {
    /// Zero (or empty string) of the given type.
    #[must_use]
    pub fn zero(ty: SddsType) -> Self {
        match ty {
            SddsType::LongDouble => Value::LongDouble(0.0),
            SddsType::Double => Value::Double(0.0),
            SddsType::Float => Value::Float(0.0),
            SddsType::Int64 => Value::Int64(0),
            SddsType::UInt64 => Value::UInt64(0),
            SddsType::Int32 => Value::Int32(0),
            SddsType::UInt32 => Value::UInt32(0),
            SddsType::Short => Value::Short(0),
            SddsType::UShort => Value::UShort(0),
            SddsType::Character => Value::Character(0),
            SddsType::String => Value::String(String::new()),
        }
    }

    #[must_use]
    pub fn sdds_type(&self) -> SddsType {
        match self {
            Value::LongDouble(_) => SddsType::LongDouble,
            Value::Double(_) => SddsType::Double,
            Value::Float(_) => SddsType::Float,
            Value::Int64(_) => SddsType::Int64,
            Value::UInt64(_) => SddsType::UInt64,
            Value::Int32(_) => SddsType::Int32,
            Value::UInt32(_) => SddsType::UInt32,
            Value::Short(_) => SddsType::Short,
            Value::UShort(_) => SddsType::UShort,
            Value::Character(_) => SddsType::Character,
            Value::String(_) => SddsType::String,
        }
    }

    fn wide(&self) -> Option<Wide> {
        Some(match *self {
            Value::LongDouble(v) | Value::Double(v) => Wide::Float(v),
            Value::Float(v) => Wide::Float(f64::from(v)),
            Value::Int64(v) => Wide::Int(i128::from(v)),
            Value::UInt64(v) => Wide::Int(i128::from(v)),
            Value::Int32(v) => Wide::Int(i128::from(v)),
            Value::UInt32(v) => Wide::Int(i128::from(v)),
            Value::Short(v) => Wide::Int(i128::from(v)),
            Value::UShort(v) => Wide::Int(i128::from(v)),
            Value::Character(v) => Wide::Int(i128::from(v)),
            Value::String(_) => return None,
        })
    }

    fn from_wide(w: Wide, ty: SddsType) -> Value {
        let as_f64 = match w {
            Wide::Int(i) => i as f64,
            Wide::Float(f) => f,
        };
        match ty {
            SddsType::LongDouble => Value::LongDouble(as_f64),
            SddsType::Double => Value::Double(as_f64),
            SddsType::Float => Value::Float(as_f64 as f32),
            SddsType::Int64 => Value::Int64(clamp_int!(w, i64)),
            SddsType::UInt64 => Value::UInt64(clamp_int!(w, u64)),
            SddsType::Int32 => Value::Int32(clamp_int!(w, i32)),
            SddsType::UInt32 => Value::UInt32(clamp_int!(w, u32)),
            SddsType::Short => Value::Short(clamp_int!(w, i16)),
            SddsType::UShort => Value::UShort(clamp_int!(w, u16)),
            SddsType::Character => Value::Character(clamp_int!(w, u8)),
            SddsType::String => Value::String(Value::from_wide(w, SddsType::Double).to_string()),
        }
    }

    /// Convert to another type. Strings convert to numbers by scanning.
    pub fn cast(&self, ty: SddsType) -> Result<Value> {
        if self.sdds_type() == ty {
            return Ok(self.clone());
        }
        match (self, self.wide()) {
            (_, Some(_)) if ty == SddsType::String => Ok(Value::String(self.to_string())),
            (_, Some(w)) => Ok(Value::from_wide(w, ty)),
            (Value::String(s), None) => Value::scan(s, ty),
            _ => Err(SddsError::schema(format!(
                "cannot cast {} to {}",
                self.sdds_type(),
                ty
            ))),
        }
    }

    /// Numeric value as `f64`; `None` for strings.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.wide().map(|w| match w {
            Wide::Int(i) => i as f64,
            Wide::Float(f) => f,
        })
    }

    /// Numeric value as `i64`, truncating floats; `None` for strings.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.wide().map(|w| clamp_int!(w, i64))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Scan text into a value of `ty`.
    pub fn scan(text: &str, ty: SddsType) -> Result<Value> {
        let t = text.trim();
        let bad = || SddsError::parse(format!("unable to scan \"{text}\" as {ty}"));
        match ty {
            SddsType::String => Ok(Value::String(text.to_string())),
            SddsType::Character => Ok(Value::Character(scan_character(text))),
            SddsType::LongDouble | SddsType::Double | SddsType::Float => {
                let f = parse_float(t).ok_or_else(bad)?;
                Ok(Value::from_wide(Wide::Float(f), ty))
            }
            _ => {
                let stripped = t.strip_prefix('+').unwrap_or(t);
                if let Ok(i) = stripped.parse::<i128>() {
                    Ok(Value::from_wide(Wide::Int(i), ty))
                } else {
                    let f = parse_float(t).ok_or_else(bad)?;
                    Ok(Value::from_wide(Wide::Float(f), ty))
                }
            }
        }
    }
}

/// First character as a byte. Code points up to U+00FF map to themselves,
/// so `Display` output scans back unchanged.
fn scan_character(text: &str) -> u8 {
    match text.chars().next() {
        Some(c) => u8::try_from(u32::from(c)).unwrap_or_else(|_| text.as_bytes()[0]),
        None => 0,
    }
}

/// Parse a float, accepting Fortran `d` exponents.
pub(crate) fn parse_float(text: &str) -> Option<f64> {
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().or_else(|| {
        if text.contains(['d', 'D']) {
            text.replace(['d', 'D'], "e").parse::<f64>().ok()
        } else {
            None
        }
    })
}

/// Shortest text that scans back to the same `f64`.
pub(crate) fn format_f64(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && a.is_finite() && !(1e-5..1e16).contains(&a) {
        format!("{v:e}")
    } else {
        format!("{v}")
    }
}

fn format_f32(v: f32) -> String {
    let a = v.abs();
    if a != 0.0 && a.is_finite() && !(1e-5..1e16).contains(&a) {
        format!("{v:e}")
    } else {
        format!("{v}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::LongDouble(v) | Value::Double(v) => f.write_str(&format_f64(*v)),
            Value::Float(v) => f.write_str(&format_f32(*v)),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::UShort(v) => write!(f, "{v}"),
            Value::Character(v) => write!(f, "{}", char::from(*v)),
            Value::String(s) => f.write_str(s),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    f64 => Double,
    f32 => Float,
    i64 => Int64,
    u64 => UInt64,
    i32 => Int32,
    u32 => UInt32,
    i16 => Short,
    u16 => UShort,
    u8 => Character,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// Typed vector backing a column or an array.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueVec {
    LongDouble(Vec<f64>),
    Double(Vec<f64>),
    Float(Vec<f32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    Character(Vec<u8>),
    String(Vec<String>),
}

macro_rules! each_vec {
    ($self:expr, $v:ident => $body:expr) => {
        match $self {
            ValueVec::LongDouble($v) => $body,
            ValueVec::Double($v) => $body,
            ValueVec::Float($v) => $body,
            ValueVec::Int64($v) => $body,
            ValueVec::UInt64($v) => $body,
            ValueVec::Int32($v) => $body,
            ValueVec::UInt32($v) => $body,
            ValueVec::Short($v) => $body,
            ValueVec::UShort($v) => $body,
            ValueVec::Character($v) => $body,
            ValueVec::String($v) => $body,
        }
    };
}

impl ValueVec {
    /// `len` zeros (or empty strings) of `ty`.
    #[must_use]
    pub fn zeros(ty: SddsType, len: usize) -> Self {
        let mut v = Self::empty(ty);
        v.resize(len);
        v
    }

    #[must_use]
    pub fn empty(ty: SddsType) -> Self {
        match ty {
            SddsType::LongDouble => ValueVec::LongDouble(Vec::new()),
            SddsType::Double => ValueVec::Double(Vec::new()),
            SddsType::Float => ValueVec::Float(Vec::new()),
            SddsType::Int64 => ValueVec::Int64(Vec::new()),
            SddsType::UInt64 => ValueVec::UInt64(Vec::new()),
            SddsType::Int32 => ValueVec::Int32(Vec::new()),
            SddsType::UInt32 => ValueVec::UInt32(Vec::new()),
            SddsType::Short => ValueVec::Short(Vec::new()),
            SddsType::UShort => ValueVec::UShort(Vec::new()),
            SddsType::Character => ValueVec::Character(Vec::new()),
            SddsType::String => ValueVec::String(Vec::new()),
        }
    }

    /// Build a vector of `ty` from values, casting each.
    pub fn from_values(ty: SddsType, values: &[Value]) -> Result<Self> {
        let mut out = Self::empty(ty);
        for v in values {
            out.push(v)?;
        }
        Ok(out)
    }

    #[must_use]
    pub fn sdds_type(&self) -> SddsType {
        match self {
            ValueVec::LongDouble(_) => SddsType::LongDouble,
            ValueVec::Double(_) => SddsType::Double,
            ValueVec::Float(_) => SddsType::Float,
            ValueVec::Int64(_) => SddsType::Int64,
            ValueVec::UInt64(_) => SddsType::UInt64,
            ValueVec::Int32(_) => SddsType::Int32,
            ValueVec::UInt32(_) => SddsType::UInt32,
            ValueVec::Short(_) => SddsType::Short,
            ValueVec::UShort(_) => SddsType::UShort,
            ValueVec::Character(_) => SddsType::Character,
            ValueVec::String(_) => SddsType::String,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        each_vec!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow with zeros or shrink to `len`.
    pub fn resize(&mut self, len: usize) {
        each_vec!(self, v => v.resize(len, Default::default()))
    }

    pub fn truncate(&mut self, len: usize) {
        each_vec!(self, v => v.truncate(len))
    }

    /// Reset every element to zero without changing the length.
    pub fn zero_fill(&mut self) {
        each_vec!(self, v => v.iter_mut().for_each(|x| *x = Default::default()))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match self {
            ValueVec::LongDouble(v) => Value::LongDouble(*v.get(index)?),
            ValueVec::Double(v) => Value::Double(*v.get(index)?),
            ValueVec::Float(v) => Value::Float(*v.get(index)?),
            ValueVec::Int64(v) => Value::Int64(*v.get(index)?),
            ValueVec::UInt64(v) => Value::UInt64(*v.get(index)?),
            ValueVec::Int32(v) => Value::Int32(*v.get(index)?),
            ValueVec::UInt32(v) => Value::UInt32(*v.get(index)?),
            ValueVec::Short(v) => Value::Short(*v.get(index)?),
            ValueVec::UShort(v) => Value::UShort(*v.get(index)?),
            ValueVec::Character(v) => Value::Character(*v.get(index)?),
            ValueVec::String(v) => Value::String(v.get(index)?.clone()),
        })
    }

    /// Store `value` at `index`, casting it to this vector's type.
    pub fn set(&mut self, index: usize, value: &Value) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(SddsError::bounds(format!(
                "index {index} outside vector of length {len}"
            )));
        }
        let value = value.cast(self.sdds_type())?;
        match (self, value) {
            (ValueVec::LongDouble(v), Value::LongDouble(x)) => v[index] = x,
            (ValueVec::Double(v), Value::Double(x)) => v[index] = x,
            (ValueVec::Float(v), Value::Float(x)) => v[index] = x,
            (ValueVec::Int64(v), Value::Int64(x)) => v[index] = x,
            (ValueVec::UInt64(v), Value::UInt64(x)) => v[index] = x,
            (ValueVec::Int32(v), Value::Int32(x)) => v[index] = x,
            (ValueVec::UInt32(v), Value::UInt32(x)) => v[index] = x,
            (ValueVec::Short(v), Value::Short(x)) => v[index] = x,
            (ValueVec::UShort(v), Value::UShort(x)) => v[index] = x,
            (ValueVec::Character(v), Value::Character(x)) => v[index] = x,
            (ValueVec::String(v), Value::String(x)) => v[index] = x,
            _ => return Err(SddsError::schema("value type does not match vector type")),
        }
        Ok(())
    }

    /// Append `value`, casting it to this vector's type.
    pub fn push(&mut self, value: &Value) -> Result<()> {
        let len = self.len();
        self.resize(len + 1);
        self.set(len, value)
    }

    /// Convert every element to `ty`.
    pub fn cast(&self, ty: SddsType) -> Result<ValueVec> {
        if self.sdds_type() == ty {
            return Ok(self.clone());
        }
        let mut out = ValueVec::zeros(ty, self.len());
        for i in 0..self.len() {
            if let Some(v) = self.get(i) {
                out.set(i, &v)?;
            }
        }
        Ok(out)
    }

    /// Numeric contents as `f64`; `None` for strings.
    #[must_use]
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        Some(match self {
            ValueVec::LongDouble(v) | ValueVec::Double(v) => v.clone(),
            ValueVec::Float(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ValueVec::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            ValueVec::UInt64(v) => v.iter().map(|&x| x as f64).collect(),
            ValueVec::Int32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ValueVec::UInt32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ValueVec::Short(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ValueVec::UShort(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ValueVec::Character(v) => v.iter().map(|&x| f64::from(x)).collect(),
            ValueVec::String(_) => return None,
        })
    }

    /// Every element in its default text form.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            ValueVec::String(v) => v.clone(),
            other => (0..other.len())
                .filter_map(|i| other.get(i).map(|v| v.to_string()))
                .collect(),
        }
    }

    /// Keep the elements whose flag is set; missing flags count as unset.
    #[must_use]
    pub fn filter(&self, flags: &[bool]) -> ValueVec {
        let mut out = self.clone();
        out.retain(flags);
        out
    }

    /// Drop the elements whose flag is unset, in place.
    pub fn retain(&mut self, flags: &[bool]) {
        each_vec!(self, v => {
            let mut i = 0;
            v.retain(|_| {
                let keep = flags.get(i).copied().unwrap_or(false);
                i += 1;
                keep
            });
        })
    }

    /// Copy `count` elements of `src` starting at `src_start` into `self`
    /// at `dst_start`, casting as needed.
    pub fn copy_range(
        &mut self,
        dst_start: usize,
        src: &ValueVec,
        src_start: usize,
        count: usize,
    ) -> Result<()> {
        for k in 0..count {
            let v = src
                .get(src_start + k)
                .ok_or_else(|| SddsError::bounds("source index out of range"))?;
            self.set(dst_start + k, &v)?;
        }
        Ok(())
    }
}

macro_rules! vec_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<Vec<$t>> for ValueVec {
            fn from(v: Vec<$t>) -> Self {
                ValueVec::$variant(v)
            }
        })*
    };
}

vec_from! {
    f64 => Double,
    f32 => Float,
    i64 => Int64,
    u64 => UInt64,
    i32 => Int32,
    u32 => UInt32,
    i16 => Short,
    u16 => UShort,
    u8 => Character,
    String => String,
}

impl From<Vec<&str>> for ValueVec {
    fn from(v: Vec<&str>) -> Self {
        ValueVec::String(v.into_iter().map(str::to_string).collect())
    }
}
