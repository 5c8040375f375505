//! Header parsing.

use super::lexer::{Namelist, find_end, parse_namelist};
use super::namelist::apply;
use crate::config;
use crate::error::{IoContext, Result, SddsError};
use crate::io::SddsReader;
use crate::io::endian::ByteOrder;
use crate::layout::{ArrayDefinition, DataEncoding, Layout, SDDS_VERSION};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static BANNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SDDS(\d+)\s*$").expect("valid banner pattern"));

/// Check the `SDDS<n>` banner line.
pub fn check_banner(line: &str) -> Result<u32> {
    let caps = BANNER
        .captures(line.trim_end())
        .ok_or_else(|| SddsError::parse("not an SDDS file: missing SDDS<n> banner"))?;
    let version: u32 = caps[1]
        .parse()
        .map_err(|_| SddsError::parse(format!("bad SDDS banner \"{line}\"")))?;
    if version != SDDS_VERSION {
        return Err(SddsError::unsupported(format!(
            "unsupported SDDS protocol version {version} (only {SDDS_VERSION} is supported)"
        )));
    }
    Ok(version)
}

/// Read a header from the start of `reader` and leave it positioned at the
/// first page.
pub fn read_header(reader: &mut SddsReader) -> Result<Layout> {
    let origin = reader
        .path()
        .map_or_else(|| "<stream>".to_string(), |p| p.display().to_string());
    let banner = reader
        .read_line()
        .io_context(|| format!("read header of {origin}"))?
        .ok_or_else(|| SddsError::parse(format!("{origin} is empty")))?;
    check_banner(&banner)?;

    let base = reader.path().and_then(Path::parent).map(Path::to_path_buf);
    let mut parser = HeaderParser::default();
    if !parser.consume(reader, &origin, base.as_deref(), 0)? {
        return Err(SddsError::parse(format!("{origin}: header ends without &data")));
    }
    let layout = parser.finish()?;

    if layout.data_mode.encoding == DataEncoding::Ascii {
        for _ in 0..layout.data_mode.additional_header_lines.max(0) {
            if reader
                .read_line()
                .io_context(|| format!("read header of {origin}"))?
                .is_none()
            {
                break;
            }
        }
    }
    tracing::debug!(
        source = %origin,
        parameters = layout.parameters.len(),
        columns = layout.columns.len(),
        arrays = layout.arrays.len(),
        mode = layout.data_mode.encoding.name(),
        "read header"
    );
    Ok(layout)
}

#[derive(Default)]
struct HeaderParser {
    layout: Layout,
    declared_order: Option<ByteOrder>,
    fixed_row_count: bool,
}

impl HeaderParser {
    /// Feed lines until `&data` (true) or end of input (false).
    fn consume(
        &mut self,
        reader: &mut SddsReader,
        origin: &str,
        base: Option<&Path>,
        depth: usize,
    ) -> Result<bool> {
        let mut pending = String::new();
        while let Some(line) = reader
            .read_line()
            .io_context(|| format!("read header of {origin}"))?
        {
            if pending.is_empty() {
                let trimmed = line.trim_start();
                if trimmed.is_empty() {
                    continue;
                }
                if line.starts_with('!') || trimmed.starts_with('#') {
                    self.declaration(&line);
                    continue;
                }
            }
            pending.push_str(&line);
            pending.push('\n');
            while let Some(end) = find_end(&pending) {
                let namelist = parse_namelist(&pending[..end + 4])?;
                pending = pending[end + 4..].trim_start().to_string();
                if self.namelist(&namelist, base, depth)? {
                    return Ok(true);
                }
            }
        }
        if !pending.trim().is_empty() {
            return Err(SddsError::parse(format!(
                "{origin}: unterminated namelist \"{}\"",
                pending.trim()
            )));
        }
        Ok(false)
    }

    fn declaration(&mut self, line: &str) {
        let rest = line.strip_prefix('!').unwrap_or(line).trim_start();
        let Some(word) = rest.strip_prefix('#') else {
            return;
        };
        match word.trim().to_ascii_lowercase().as_str() {
            "big-endian" => self.declared_order = Some(ByteOrder::BigEndian),
            "little-endian" => self.declared_order = Some(ByteOrder::LittleEndian),
            "sddsfixedrowcount" | "fixed-rowcount" => self.fixed_row_count = true,
            _ => {}
        }
    }

    fn namelist(&mut self, namelist: &Namelist, base: Option<&Path>, depth: usize) -> Result<bool> {
        let layout = &mut self.layout;
        match namelist.kind.as_str() {
            "description" => layout.description = apply(namelist)?,
            "parameter" => {
                layout.parameters.push(apply(namelist)?)?;
            }
            "column" => {
                layout.columns.push(apply(namelist)?)?;
            }
            "array" => {
                let array: ArrayDefinition = apply(namelist)?;
                if array.dimensions < 1 {
                    return Err(SddsError::parse(format!(
                        "array {} declares {} dimensions",
                        array.name, array.dimensions
                    )));
                }
                layout.arrays.push(array)?;
            }
            "associate" => {
                layout.associates.push(apply(namelist)?)?;
            }
            "data" => {
                layout.data_mode = apply(namelist)?;
                return Ok(true);
            }
            "include" => return self.include(namelist, base, depth),
            other => {
                return Err(SddsError::parse(format!("unknown namelist kind &{other}")));
            }
        }
        Ok(false)
    }

    fn include(&mut self, namelist: &Namelist, base: Option<&Path>, depth: usize) -> Result<bool> {
        let mut filename = None;
        for (key, value) in &namelist.fields {
            match key.as_str() {
                "filename" => filename = Some(value.as_str()),
                other => {
                    return Err(SddsError::parse(format!(
                        "&include does not accept the field \"{other}\""
                    )));
                }
            }
        }
        let filename =
            filename.ok_or_else(|| SddsError::parse("&include is missing the field filename"))?;
        let limit = config::current().max_include_depth;
        if depth >= limit {
            return Err(SddsError::parse(format!(
                "&include of {filename} exceeds the nesting limit of {limit}"
            )));
        }
        let path = resolve_include(filename, base);
        tracing::debug!(path = %path.display(), depth = depth + 1, "including header");
        let mut reader = SddsReader::open(&path)?;
        let origin = path.display().to_string();
        // an included file may carry its own banner
        if let Some(first) = reader
            .read_line()
            .io_context(|| format!("read header of {origin}"))?
        {
            if BANNER.is_match(first.trim_end()) {
                check_banner(&first)?;
            } else {
                reader = SddsReader::open(&path)?;
            }
        }
        let nested_base = path.parent().map(Path::to_path_buf);
        self.consume(&mut reader, &origin, nested_base.as_deref(), depth + 1)
    }

    fn finish(self) -> Result<Layout> {
        let mut layout = self.layout;
        let mode = &mut layout.data_mode;
        mode.byte_order = mode.byte_order.or(self.declared_order);
        mode.fixed_row_count |= self.fixed_row_count;
        if mode.encoding == DataEncoding::Binary && mode.no_row_counts {
            return Err(SddsError::parse("binary data cannot omit row counts"));
        }
        Ok(layout)
    }
}

fn resolve_include(filename: &str, base: Option<&Path>) -> PathBuf {
    let candidate = Path::new(filename);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    if let Some(dir) = base {
        let joined = dir.join(candidate);
        if joined.exists() {
            return joined;
        }
    }
    candidate.to_path_buf()
}
