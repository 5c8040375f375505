//! printf-style format strings attached to definitions.
//!
//! Definitions may carry a `format_string` such as `%10.4f` or `%ld`. The
//! ASCII writer uses it instead of the default round-trip text. Only the
//! subset SDDS files use in practice is supported: one conversion
//! (`d i u x X o e E f F g G s c`) with flags `-+ 0#`, optional width and
//! precision, and length modifiers (`h hh l ll L q`) that are accepted and
//! ignored. Literal text around the conversion is kept; `%%` is a literal
//! percent sign.
//!
//! ```
//! use sdds::format::PrintfFormat;
//! use sdds::types::Value;
//!
//! let fmt = PrintfFormat::parse("%10.3e").unwrap();
//! assert_eq!(fmt.apply(&Value::Double(1234.0)), " 1.234e+03");
//! let fmt = PrintfFormat::parse("x=%-5d|").unwrap();
//! assert_eq!(fmt.apply(&Value::Int32(42)), "x=42   |");
//! ```

use crate::error::{Result, SddsError};
use crate::types::{SddsType, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Conversion {
    Signed,
    Unsigned,
    Hex { upper: bool },
    Octal,
    Exp { upper: bool },
    Fixed,
    General { upper: bool },
    Str,
    Char,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alt: bool,
}

/// A parsed single-conversion printf format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrintfFormat {
    prefix: String,
    suffix: String,
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: Conversion,
}

fn literal(text: &str) -> String {
    text.replace("%%", "%")
}

impl PrintfFormat {
    pub fn parse(text: &str) -> Result<Self> {
        let bad = |why: &str| SddsError::parse(format!("format string \"{text}\": {why}"));
        let bytes = text.as_bytes();
        let mut start = None;
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                if bytes.get(i + 1) == Some(&b'%') {
                    i += 2;
                    continue;
                }
                start = Some(i);
                break;
            }
            i += 1;
        }
        let start = start.ok_or_else(|| bad("no conversion"))?;
        let mut pos = start + 1;

        let mut flags = Flags::default();
        while let Some(&c) = bytes.get(pos) {
            match c {
                b'-' => flags.left = true,
                b'+' => flags.plus = true,
                b' ' => flags.space = true,
                b'0' => flags.zero = true,
                b'#' => flags.alt = true,
                _ => break,
            }
            pos += 1;
        }

        let digits = |pos: &mut usize| -> Option<usize> {
            let begin = *pos;
            while bytes.get(*pos).is_some_and(u8::is_ascii_digit) {
                *pos += 1;
            }
            text[begin..*pos].parse().ok()
        };
        let width = digits(&mut pos);
        let precision = if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            Some(digits(&mut pos).unwrap_or(0))
        } else {
            None
        };
        while bytes
            .get(pos)
            .is_some_and(|c| matches!(c, b'h' | b'l' | b'L' | b'q' | b'j' | b'z' | b't'))
        {
            pos += 1;
        }
        let conversion = match bytes.get(pos) {
            Some(b'd' | b'i') => Conversion::Signed,
            Some(b'u') => Conversion::Unsigned,
            Some(b'x') => Conversion::Hex { upper: false },
            Some(b'X') => Conversion::Hex { upper: true },
            Some(b'o') => Conversion::Octal,
            Some(b'e') => Conversion::Exp { upper: false },
            Some(b'E') => Conversion::Exp { upper: true },
            Some(b'f' | b'F') => Conversion::Fixed,
            Some(b'g') => Conversion::General { upper: false },
            Some(b'G') => Conversion::General { upper: true },
            Some(b's') => Conversion::Str,
            Some(b'c') => Conversion::Char,
            _ => return Err(bad("unsupported conversion")),
        };
        let rest = &text[pos + 1..];
        if rest.replace("%%", "").contains('%') {
            return Err(bad("more than one conversion"));
        }
        Ok(Self {
            prefix: literal(&text[..start]),
            suffix: literal(rest),
            flags,
            width,
            precision,
            conversion,
        })
    }

    /// True for conversions that take a number.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        !matches!(self.conversion, Conversion::Str | Conversion::Char)
    }

    /// Format one value; numbers and strings are converted as C would.
    #[must_use]
    pub fn apply(&self, value: &Value) -> String {
        let (negative, body) = match self.conversion {
            Conversion::Signed => {
                let v = value.as_i64().unwrap_or(0);
                (v < 0, self.pad_digits(v.unsigned_abs().to_string()))
            }
            Conversion::Unsigned => (false, self.pad_digits(unsigned(value).to_string())),
            Conversion::Hex { upper } => {
                let v = unsigned(value);
                let mut s = if upper {
                    format!("{v:X}")
                } else {
                    format!("{v:x}")
                };
                s = self.pad_digits(s);
                if self.flags.alt && v != 0 {
                    s.insert_str(0, if upper { "0X" } else { "0x" });
                }
                (false, s)
            }
            Conversion::Octal => {
                let mut s = self.pad_digits(format!("{:o}", unsigned(value)));
                if self.flags.alt && !s.starts_with('0') {
                    s.insert(0, '0');
                }
                (false, s)
            }
            Conversion::Exp { upper } => float_body(value, |a| {
                exp_text(a, self.precision.unwrap_or(6), upper, self.flags.alt)
            }),
            Conversion::Fixed => {
                float_body(value, |a| format!("{:.*}", self.precision.unwrap_or(6), a))
            }
            Conversion::General { upper } => float_body(value, |a| {
                general_text(a, self.precision.unwrap_or(6), upper, self.flags.alt)
            }),
            Conversion::Str => {
                let mut s = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if let Some(p) = self.precision {
                    s = s.chars().take(p).collect();
                }
                (false, s)
            }
            Conversion::Char => {
                let c = match value {
                    Value::String(s) => s.chars().next().unwrap_or(' '),
                    other => match other.cast(SddsType::Character) {
                        Ok(Value::Character(c)) => char::from(c),
                        _ => ' ',
                    },
                };
                (false, c.to_string())
            }
        };

        let signed = matches!(
            self.conversion,
            Conversion::Signed | Conversion::Exp { .. } | Conversion::Fixed | Conversion::General { .. }
        );
        let sign = if negative {
            "-"
        } else if signed && self.flags.plus {
            "+"
        } else if signed && self.flags.space {
            " "
        } else {
            ""
        };
        let len = sign.len() + body.chars().count();
        let width = self.width.unwrap_or(0);
        let mut out = String::with_capacity(self.prefix.len() + width.max(len) + self.suffix.len());
        out.push_str(&self.prefix);
        if len >= width {
            out.push_str(sign);
            out.push_str(&body);
        } else if self.flags.left {
            out.push_str(sign);
            out.push_str(&body);
            out.extend(std::iter::repeat_n(' ', width - len));
        } else if self.flags.zero && self.is_numeric() && body.starts_with(|c: char| c.is_ascii_digit()) {
            out.push_str(sign);
            out.extend(std::iter::repeat_n('0', width - len));
            out.push_str(&body);
        } else {
            out.extend(std::iter::repeat_n(' ', width - len));
            out.push_str(sign);
            out.push_str(&body);
        }
        out.push_str(&self.suffix);
        out
    }

    /// Integer precision is a minimum digit count.
    fn pad_digits(&self, digits: String) -> String {
        match self.precision {
            Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
            _ => digits,
        }
    }
}

fn unsigned(value: &Value) -> u64 {
    match value {
        Value::UInt64(v) => *v,
        other => other.as_i64().unwrap_or(0) as u64,
    }
}

fn float_body(value: &Value, finite: impl Fn(f64) -> String) -> (bool, String) {
    let v = value.as_f64().unwrap_or(0.0);
    let negative = v.is_sign_negative() && !v.is_nan();
    let a = v.abs();
    if a.is_nan() {
        (false, "nan".to_string())
    } else if a.is_infinite() {
        (negative, "inf".to_string())
    } else {
        (negative, finite(a))
    }
}

/// C-style `%e` text for a non-negative finite value.
fn exp_text(a: f64, precision: usize, upper: bool, alt: bool) -> String {
    let rust = format!("{a:.precision$e}");
    let (mantissa, exponent) = rust.split_once('e').unwrap_or((rust.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut mantissa = mantissa.to_string();
    if alt && precision == 0 {
        mantissa.push('.');
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{mantissa}{e}{sign}{:02}", exponent.abs())
}

/// C-style `%g` text for a non-negative finite value.
fn general_text(a: f64, precision: usize, upper: bool, alt: bool) -> String {
    let p = precision.max(1);
    let probe = format!("{:.*e}", p - 1, a);
    let x: i64 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    let mut text = if (p as i64) > x && x >= -4 {
        format!("{:.*}", (p as i64 - 1 - x) as usize, a)
    } else {
        exp_text(a, p - 1, upper, alt)
    };
    if !alt {
        let (mantissa, exp) = match text.find(['e', 'E']) {
            Some(i) => (text[..i].to_string(), text[i..].to_string()),
            None => (text.clone(), String::new()),
        };
        if mantissa.contains('.') {
            let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
            text = format!("{trimmed}{exp}");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(f: &str, v: Value) -> String {
        PrintfFormat::parse(f).unwrap().apply(&v)
    }

    #[test]
    fn floats_follow_c_rules() {
        assert_eq!(fmt("%e", Value::Double(0.0)), "0.000000e+00");
        assert_eq!(fmt("%.2E", Value::Double(-12345.678)), "-1.23E+04");
        assert_eq!(fmt("%8.3f", Value::Double(3.14159)), "   3.142");
        assert_eq!(fmt("%g", Value::Double(100000.0)), "100000");
        assert_eq!(fmt("%g", Value::Double(1000000.0)), "1e+06");
        assert_eq!(fmt("%g", Value::Double(0.0001)), "0.0001");
        assert_eq!(fmt("%.3g", Value::Double(2.5e-7)), "2.5e-07");
        assert_eq!(fmt("%+08.2f", Value::Double(2.5)), "+0002.50");
        assert_eq!(fmt("%21.15le", Value::Double(1.0)), "1.000000000000000e+00");
    }

    #[test]
    fn integers_and_strings() {
        assert_eq!(fmt("%5ld", Value::Int64(-42)), "  -42");
        assert_eq!(fmt("%05d", Value::Int32(-42)), "-0042");
        assert_eq!(fmt("%#x", Value::UInt32(255)), "0xff");
        assert_eq!(fmt("%.2s", Value::from("abc")), "ab");
        assert_eq!(fmt("%c", Value::Character(b'Q')), "Q");
        assert_eq!(fmt("100%% of %d", Value::Short(3)), "100% of 3");
    }

    #[test]
    fn rejects_missing_or_double_conversion() {
        assert!(PrintfFormat::parse("plain").is_err());
        assert!(PrintfFormat::parse("%d %d").is_err());
        assert!(PrintfFormat::parse("%k").is_err());
    }
}
