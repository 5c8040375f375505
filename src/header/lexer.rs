//! Namelist tokenizer and string escaping.
//!
//! A namelist is `&<kind> key=value, key="quoted value", ... &end`.
//! Values are bare tokens or single/double quoted strings with backslash
//! escapes (`\n \t \r \\ \" \'` and three-digit octal). The same escaping
//! rules are used by the ASCII page codec.

use crate::error::{Result, SddsError};

/// One parsed namelist: its kind and raw `key=value` pairs in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namelist {
    pub kind: String,
    pub fields: Vec<(String, String)>,
}

/// Byte offset of the first `&end` outside quotes.
#[must_use]
pub fn find_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) => {
                if c == b'\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == b'"' || c == b'\'' {
                    quote = Some(c);
                } else if c == b'&' && bytes[i + 1..].starts_with(b"end") {
                    let after = bytes.get(i + 4).copied();
                    if after.is_none_or(|b| !b.is_ascii_alphanumeric() && b != b'_') {
                        return Some(i);
                    }
                }
            }
        }
        i += 1;
    }
    None
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl Cursor<'_> {
    fn skip_separators(&mut self) {
        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_whitespace() || *c == ',')
        {
            self.chars.next();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn word(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '=' || c == ',' || c == '&' {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }
}

/// Read a quoted string whose opening quote was already consumed.
fn quoted(chars: &mut impl Iterator<Item = char>, quote: char) -> Option<String> {
    let mut raw = String::new();
    let mut closed = false;
    while let Some(c) = chars.next() {
        if c == '\\' {
            raw.push(c);
            if let Some(n) = chars.next() {
                raw.push(n);
            }
        } else if c == quote {
            closed = true;
            break;
        } else {
            raw.push(c);
        }
    }
    closed.then(|| unescape(&raw))
}

/// Parse the text of one namelist, from `&kind` through `&end`.
pub fn parse_namelist(text: &str) -> Result<Namelist> {
    let bad = |why: String| SddsError::parse(format!("namelist \"{}\": {why}", text.trim()));
    let mut cur = Cursor {
        chars: text.chars().peekable(),
    };
    cur.skip_whitespace();
    if cur.chars.next() != Some('&') {
        return Err(bad("does not start with &".into()));
    }
    let kind = cur.word().to_ascii_lowercase();
    if kind.is_empty() || kind == "end" {
        return Err(bad("missing namelist kind".into()));
    }
    let mut fields = Vec::new();
    loop {
        cur.skip_separators();
        match cur.chars.peek() {
            None => return Err(bad("missing &end".into())),
            Some('&') => {
                cur.chars.next();
                let word = cur.word();
                if word.eq_ignore_ascii_case("end") {
                    break;
                }
                return Err(bad(format!("unexpected &{word}")));
            }
            Some(_) => {}
        }
        let key = cur.word().to_ascii_lowercase();
        cur.skip_whitespace();
        if cur.chars.next() != Some('=') {
            return Err(bad(format!("expected = after {key}")));
        }
        cur.skip_whitespace();
        let value = match cur.chars.peek().copied() {
            Some(q @ ('"' | '\'')) => {
                cur.chars.next();
                quoted(&mut cur.chars, q).ok_or_else(|| bad(format!("unterminated string for {key}")))?
            }
            _ => unescape(&cur.word()),
        };
        fields.push((key, value));
    }
    Ok(Namelist { kind, fields })
}

/// Interpret backslash escapes.
#[must_use]
pub fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(d @ '0'..='7') => {
                let mut code = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(v) => {
                            code = code * 8 + v;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or('?'));
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escape `text` for use inside double quotes.
pub fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\{:03o}", u32::from(c) & 0o377)),
            c => out.push(c),
        }
    }
}

/// Header field value: quoted when it could be mistaken for syntax.
#[must_use]
pub fn header_value(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '"' | '\'' | ',' | '&' | '!' | '=' | '\\')
        });
    if !needs_quotes {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    escape_into(&mut out, text);
    out.push('"');
    out
}
