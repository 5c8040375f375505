//! ASCII page encoding.
//!
//! ```text
//! ! page number 1
//! 1.5                    <- one line per non-fixed parameter
//! 2 3                    <- per array: dimension sizes, then elements
//! 1 2 3 4 5 6
//!                    3   <- row count (fixed-width form shown)
//! 0.1 "a b"              <- rows, lines_per_row lines each
//! ```
//!
//! Strings that could be confused with separators or comments are double
//! quoted with backslash escapes. Lines starting with `!` are comments, and
//! a line ending in an unescaped backslash continues on the next line.

use super::{PageFrame, PageRead};
use crate::error::{Result, SddsError};
use crate::format::PrintfFormat;
use crate::header::lexer::{escape_into, unescape};
use crate::io::SddsReader;
use crate::layout::Layout;
use crate::storage::{ArrayValue, GROWTH_STEP, PageStore};
use crate::types::{SddsType, Value, ValueVec};
use std::collections::VecDeque;

/// Width reserved for fixed row counts.
pub const FIXED_ROW_COUNT_WIDTH: usize = 20;

/// Text form of a string value, quoted when needed.
#[must_use]
pub fn quote_token(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text.starts_with('!')
        || text
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | ',' | '\\'));
    if !needs_quotes {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    escape_into(&mut out, text);
    out.push('"');
    out
}

/// Split a data line into unescaped tokens.
pub fn split_tokens(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        if first == '"' {
            chars.next();
            let mut raw = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        raw.push(c);
                        if let Some(n) = chars.next() {
                            raw.push(n);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    c => raw.push(c),
                }
            }
            if !closed {
                return Err(SddsError::parse(format!("unterminated string in \"{line}\"")));
            }
            tokens.push(unescape(&raw));
        } else {
            let mut token = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
            tokens.push(token);
        }
    }
    Ok(tokens)
}

fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Next data line with its offset; comments skipped and continuations joined.
pub fn next_line(reader: &mut SddsReader) -> Result<Option<(u64, String)>> {
    loop {
        let offset = reader.position();
        let Some(mut line) = reader
            .read_line()
            .map_err(|e| SddsError::io("read ASCII page", e))?
        else {
            return Ok(None);
        };
        if line.starts_with('!') {
            continue;
        }
        while ends_with_continuation(&line) {
            line.pop();
            match reader
                .read_line()
                .map_err(|e| SddsError::io("read ASCII page", e))?
            {
                Some(next) => line.push_str(&next),
                None => break,
            }
        }
        return Ok(Some((offset, line)));
    }
}

/// Lines and tokens of one page, with one line of pushback.
struct PageText<'r> {
    reader: &'r mut SddsReader,
    pending: Option<(u64, String)>,
    tokens: VecDeque<String>,
}

impl PageText<'_> {
    fn line(&mut self, skip_blank: bool) -> Result<Option<(u64, String)>> {
        loop {
            let next = match self.pending.take() {
                Some(line) => Some(line),
                None => next_line(self.reader)?,
            };
            match next {
                Some((_, ref text)) if skip_blank && text.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    fn token(&mut self) -> Result<Option<String>> {
        while self.tokens.is_empty() {
            let Some((_, line)) = self.line(true)? else {
                return Ok(None);
            };
            self.tokens.extend(split_tokens(&line)?);
        }
        Ok(self.tokens.pop_front())
    }
}

/// Prepared formats for the values of one page.
struct Formats {
    parameters: Vec<Option<PrintfFormat>>,
    arrays: Vec<Option<PrintfFormat>>,
    columns: Vec<Option<PrintfFormat>>,
}

fn prepare(format: Option<&str>) -> Option<PrintfFormat> {
    format.and_then(|f| PrintfFormat::parse(f).ok())
}

fn render(value: &Value, format: Option<&PrintfFormat>, field_length: i32) -> String {
    match value {
        Value::String(s) => {
            let mut text = match format {
                Some(f) => f.apply(value),
                None => s.clone(),
            };
            let width = usize::try_from(field_length).unwrap_or(0);
            if width > 0 {
                text = text.chars().take(width).collect();
                let mut quoted = quote_token(&text);
                // Quotes and escapes count against the width too.
                while quoted.chars().count() > width && text.pop().is_some() {
                    quoted = quote_token(&text);
                }
                return format!("{quoted:<width$}");
            }
            quote_token(&text)
        }
        Value::Character(byte) if format.is_none() && !byte.is_ascii() => format!("\"\\{byte:03o}\""),
        Value::Character(_) => quote_token(&match format {
            Some(f) => f.apply(value),
            None => value.to_string(),
        }),
        other => match format {
            Some(f) => f.apply(other),
            None => other.to_string(),
        },
    }
}

/// Encoder and decoder for ASCII pages of one layout.
#[derive(Debug)]
pub struct AsciiCodec<'a> {
    layout: &'a Layout,
}

impl<'a> AsciiCodec<'a> {
    #[must_use]
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    fn formats(&self) -> Formats {
        Formats {
            parameters: self
                .layout
                .parameters
                .iter()
                .map(|p| prepare(p.format_string.as_deref()))
                .collect(),
            arrays: self
                .layout
                .arrays
                .iter()
                .map(|a| prepare(a.format_string.as_deref()))
                .collect(),
            columns: self
                .layout
                .columns
                .iter()
                .map(|c| prepare(c.format_string.as_deref()))
                .collect(),
        }
    }

    /// Page comment, parameter and array blocks.
    #[must_use]
    pub fn encode_header_blocks(&self, store: &PageStore, page_number: usize) -> String {
        let formats = self.formats();
        let mut out = format!("! page number {page_number}\n");
        for (index, _) in self.layout.page_parameters() {
            out.push_str(&render(
                &store.parameters[index],
                formats.parameters[index].as_ref(),
                0,
            ));
            out.push('\n');
        }
        let per_line = usize::try_from(self.layout.data_mode.lines_per_row)
            .unwrap_or(1)
            .max(1);
        for ((index, def), array) in self.layout.arrays.iter().enumerate().zip(&store.arrays) {
            let dims: Vec<String> = array.dimensions.iter().map(ToString::to_string).collect();
            out.push_str(&dims.join(" "));
            out.push('\n');
            let count = array.element_count().min(array.data.len());
            let values: Vec<String> = (0..count)
                .filter_map(|i| array.data.get(i))
                .map(|v| render(&v, formats.arrays[index].as_ref(), def.field_length))
                .collect();
            for chunk in values.chunks(per_line) {
                out.push_str(&chunk.join(" "));
                out.push('\n');
            }
        }
        out
    }

    /// The row-count line.
    #[must_use]
    pub fn encode_row_count(&self, count: usize) -> String {
        if self.layout.data_mode.fixed_row_count {
            format!("{count:>width$}\n", width = FIXED_ROW_COUNT_WIDTH)
        } else {
            format!("{count}\n")
        }
    }

    /// Row lines for the memory `rows` of the `columns` given.
    #[must_use]
    pub fn encode_rows(&self, store: &PageStore, columns: &[usize], rows: &[usize]) -> String {
        if columns.is_empty() {
            return String::new();
        }
        let formats = self.formats();
        let lines = usize::try_from(self.layout.data_mode.lines_per_row)
            .unwrap_or(1)
            .max(1);
        let per_line = columns.len().div_ceil(lines);
        let mut out = String::new();
        for &row in rows {
            for chunk in columns.chunks(per_line) {
                let fields: Vec<String> = chunk
                    .iter()
                    .map(|&c| {
                        let value = store.columns[c]
                            .get(row)
                            .unwrap_or_else(|| Value::zero(store.columns[c].sdds_type()));
                        let field_length = self.layout.columns.get(c).map_or(0, |d| d.field_length);
                        render(&value, formats.columns[c].as_ref(), field_length)
                    })
                    .collect();
                out.push_str(fields.join(" ").trim_end());
                out.push('\n');
            }
        }
        out
    }

    /// A complete page.
    #[must_use]
    pub fn encode_page(&self, store: &PageStore, columns: &[usize], rows: &[usize], page_number: usize) -> String {
        let mut out = self.encode_header_blocks(store, page_number);
        let mode = &self.layout.data_mode;
        if !mode.no_row_counts {
            out.push_str(&self.encode_row_count(rows.len()));
        }
        out.push_str(&self.encode_rows(store, columns, rows));
        if mode.no_row_counts {
            out.push('\n');
        }
        out
    }

    /// Read the next page into `store`.
    pub fn read_page(&self, reader: &mut SddsReader, store: &mut PageStore) -> Result<PageRead> {
        let offset = reader.position();
        let mut text = PageText {
            reader,
            pending: None,
            tokens: VecDeque::new(),
        };
        let Some(first) = text.line(true)? else {
            return Ok(PageRead::End);
        };
        text.pending = Some(first);
        store.reshape(self.layout, 0);
        let mut frame = PageFrame {
            offset,
            count_offset: None,
            row_count: 0,
            wide: false,
            count_width: 0,
        };
        let truncated = |frame: PageFrame, rows: usize| {
            tracing::warn!(rows, "ASCII page ends early");
            Ok(PageRead::Truncated { frame, rows })
        };

        for (index, def) in self.layout.page_parameters() {
            let Some((_, line)) = text.line(false)? else {
                return truncated(frame, 0);
            };
            let trimmed = line.trim();
            store.parameters[index] = if def.sdds_type == SddsType::String && !trimmed.starts_with('"') {
                Value::String(trimmed.to_string())
            } else {
                let token = split_tokens(trimmed)?.into_iter().next().unwrap_or_default();
                Value::scan(&token, def.sdds_type)?
            };
        }

        for (slot, def) in self.layout.arrays.iter().enumerate() {
            let n_dims = usize::try_from(def.dimensions).unwrap_or(1);
            let mut dimensions = Vec::with_capacity(n_dims);
            for _ in 0..n_dims {
                let Some(token) = text.token()? else {
                    return truncated(frame, 0);
                };
                let size = token.parse::<usize>().map_err(|_| {
                    SddsError::parse(format!("array {}: bad dimension \"{token}\"", def.name))
                })?;
                dimensions.push(size);
            }
            let count = dimensions
                .iter()
                .try_fold(1usize, |n, &d| n.checked_mul(d))
                .ok_or_else(|| SddsError::parse(format!("array {} dimensions {dimensions:?} overflow", def.name)))?;
            let count = if dimensions.is_empty() { 0 } else { count };
            let mut data = ValueVec::zeros(def.sdds_type, count.min(GROWTH_STEP));
            for i in 0..count {
                let Some(token) = text.token()? else {
                    return truncated(frame, 0);
                };
                if i == data.len() {
                    data.resize(i + (count - i).min(GROWTH_STEP));
                }
                data.set(i, &Value::scan(&token, def.sdds_type)?)?;
            }
            store.arrays[slot] = ArrayValue { dimensions, data };
        }
        text.tokens.clear();

        let n_columns = store.columns.len();
        let types: Vec<SddsType> = self.layout.columns.iter().map(|c| c.sdds_type).collect();
        if self.layout.data_mode.no_row_counts {
            let mut row = 0;
            let mut fields: Vec<String> = Vec::new();
            while let Some((_, line)) = text.line(false)? {
                if line.trim().is_empty() {
                    break;
                }
                fields.extend(split_tokens(&line)?);
                while n_columns > 0 && fields.len() >= n_columns {
                    for (column, token) in fields.drain(..n_columns).enumerate() {
                        store.set_value(column, row, &Value::scan(&token, types[column])?)?;
                    }
                    row += 1;
                }
            }
            if !fields.is_empty() {
                tracing::warn!(tokens = fields.len(), "incomplete last row dropped");
            }
            store.n_rows = row;
            frame.row_count = row;
            return Ok(PageRead::Complete(frame));
        }

        let Some((count_offset, line)) = text.line(true)? else {
            return truncated(frame, 0);
        };
        let count_text = line.trim();
        let count = count_text
            .parse::<usize>()
            .map_err(|_| SddsError::parse(format!("bad row count \"{count_text}\"")))?;
        frame.count_offset = Some(count_offset);
        frame.count_width = line.len();
        frame.row_count = count;
        store.ensure_capacity(count.min(GROWTH_STEP));
        for row in 0..count {
            for (column, ty) in types.iter().enumerate() {
                let Some(token) = text.token()? else {
                    store.n_rows = row;
                    return truncated(frame, row);
                };
                store.set_value(column, row, &Value::scan(&token, *ty)?)?;
            }
            store.n_rows = row + 1;
        }
        tracing::trace!(rows = count, "decoded ASCII page");
        Ok(PageRead::Complete(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ColumnDefinition, ParameterDefinition};

    #[test]
    fn quoting_rules() {
        assert_eq!(quote_token("abc"), "abc");
        assert_eq!(quote_token(""), "\"\"");
        assert_eq!(quote_token("a b"), "\"a b\"");
        assert_eq!(quote_token("!x"), "\"!x\"");
        assert_eq!(quote_token("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(
            split_tokens(r#"1 "a b" "say \"hi\"" "" x"#).unwrap(),
            vec!["1", "a b", "say \"hi\"", "", "x"]
        );
        assert!(split_tokens("\"open").is_err());
    }

    #[test]
    fn continuation_lines_join() {
        let mut reader =
            SddsReader::from_reader(std::io::Cursor::new(b"! note\n1 2 \\\n3\n".to_vec()));
        let (_, line) = next_line(&mut reader).unwrap().unwrap();
        assert_eq!(split_tokens(&line).unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn page_round_trip_with_string_parameter() {
        let mut layout = Layout::new();
        layout
            .add_parameter(ParameterDefinition::new("title", SddsType::String))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("x", SddsType::Int32))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("s", SddsType::String).field_length(4))
            .unwrap();
        layout.data_mode.fixed_row_count = true;
        let codec = AsciiCodec::new(&layout);
        let mut store = PageStore::for_layout(&layout);
        store.parameters[0] = Value::from("two words");
        store.set_value(0, 0, &Value::Int32(1)).unwrap();
        store.set_value(1, 0, &Value::from("abcdef")).unwrap();
        store.set_value(0, 1, &Value::Int32(-2)).unwrap();
        store.set_value(1, 1, &Value::from("a b")).unwrap();
        let text = codec.encode_page(&store, &[0, 1], &[0, 1], 1);
        assert!(text.contains(&format!("{:>20}\n", 2)));

        let mut reader = SddsReader::from_reader(std::io::Cursor::new(text.into_bytes()));
        let mut back = PageStore::for_layout(&layout);
        let read = codec.read_page(&mut reader, &mut back).unwrap();
        let PageRead::Complete(frame) = read else {
            panic!("expected a complete page, got {read:?}");
        };
        assert_eq!(frame.count_width, 20);
        assert_eq!(back.parameters[0], Value::from("two words"));
        assert_eq!(back.column_rows(0), Some(ValueVec::from(vec![1i32, -2])));
        assert_eq!(back.column_rows(1), Some(ValueVec::from(vec!["abcd", "a "])));
    }
}
