//! Binary page encoding.
//!
//! A page is a row-count sentinel followed by the parameter, array and
//! column blocks, every scalar in the byte order declared in the header:
//!
//! ```text
//! int32 count            (INT32_MIN means an int64 count follows)
//! [int64 count]
//! per non-fixed parameter: value
//! per array: int32 dims[n]; elements
//! columns: column-major or row-major
//! ```
//!
//! Strings are an `int32` byte length and the bytes, without a terminator.

use super::{PageFrame, PageRead};
use crate::error::{Result, SddsError};
use crate::io::SddsReader;
use crate::io::endian::{ByteOrder, Scalar, decode, decode_long_double, encode, encode_long_double};
use crate::layout::Layout;
use crate::storage::{ArrayValue, GROWTH_STEP, PageStore};
use crate::types::{SddsType, Value, ValueVec};
use std::io;

/// Sentinel announcing a 64-bit row count.
pub const WIDE_ROW_COUNT: i32 = i32::MIN;

/// Bytes occupied by a wide row count.
pub const WIDE_ROW_COUNT_LEN: u64 = 12;

/// Short read inside a page, or any other failure.
enum Fail {
    Short,
    Other(SddsError),
}

impl From<SddsError> for Fail {
    fn from(e: SddsError) -> Self {
        Fail::Other(e)
    }
}

type Step<T> = std::result::Result<T, Fail>;

fn read_bytes(reader: &mut SddsReader, out: &mut [u8]) -> Step<()> {
    reader.read_exact(out).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Fail::Short
        } else {
            Fail::Other(SddsError::io("read binary page", e))
        }
    })
}

fn length_prefix(len: usize, what: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| SddsError::bounds(format!("{what} of length {len} is too long")))
}

/// Encoder and decoder for one byte order.
#[derive(Clone, Copy, Debug)]
pub struct BinaryCodec {
    order: ByteOrder,
    swap: bool,
    check_sanity: bool,
}

impl BinaryCodec {
    #[must_use]
    pub fn new(order: ByteOrder) -> Self {
        Self {
            order,
            swap: order.needs_swap(),
            check_sanity: true,
        }
    }

    /// Turn the negative-row-count check on or off.
    #[must_use]
    pub fn with_sanity_check(mut self, enabled: bool) -> Self {
        self.check_sanity = enabled;
        self
    }

    #[must_use]
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    // ----- encoding -----

    /// Row-count sentinel; `wide` forces the 12-byte form.
    pub fn encode_row_count(&self, count: usize, wide: bool, out: &mut Vec<u8>) -> Result<()> {
        match i32::try_from(count) {
            Ok(narrow) if !wide => encode(narrow, self.swap, out),
            _ => {
                let count = i64::try_from(count)
                    .map_err(|_| SddsError::bounds(format!("row count {count} is too large")))?;
                encode(WIDE_ROW_COUNT, self.swap, out);
                encode(count, self.swap, out);
            }
        }
        Ok(())
    }

    fn encode_scalar(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        let s = self.swap;
        match value {
            Value::LongDouble(v) => out.extend_from_slice(&encode_long_double(*v, self.order)),
            Value::Double(v) => encode(*v, s, out),
            Value::Float(v) => encode(*v, s, out),
            Value::Int64(v) => encode(*v, s, out),
            Value::UInt64(v) => encode(*v, s, out),
            Value::Int32(v) => encode(*v, s, out),
            Value::UInt32(v) => encode(*v, s, out),
            Value::Short(v) => encode(*v, s, out),
            Value::UShort(v) => encode(*v, s, out),
            Value::Character(v) => out.push(*v),
            Value::String(text) => {
                encode(length_prefix(text.len(), "string")?, s, out);
                out.extend_from_slice(text.as_bytes());
            }
        }
        Ok(())
    }

    fn encode_element(&self, data: &ValueVec, index: usize, out: &mut Vec<u8>) -> Result<()> {
        let s = self.swap;
        match data {
            ValueVec::LongDouble(v) => out.extend_from_slice(&encode_long_double(v[index], self.order)),
            ValueVec::Double(v) => encode(v[index], s, out),
            ValueVec::Float(v) => encode(v[index], s, out),
            ValueVec::Int64(v) => encode(v[index], s, out),
            ValueVec::UInt64(v) => encode(v[index], s, out),
            ValueVec::Int32(v) => encode(v[index], s, out),
            ValueVec::UInt32(v) => encode(v[index], s, out),
            ValueVec::Short(v) => encode(v[index], s, out),
            ValueVec::UShort(v) => encode(v[index], s, out),
            ValueVec::Character(v) => out.push(v[index]),
            ValueVec::String(v) => {
                encode(length_prefix(v[index].len(), "string")?, s, out);
                out.extend_from_slice(v[index].as_bytes());
            }
        }
        Ok(())
    }

    /// Parameter and array blocks.
    pub fn encode_header_blocks(&self, layout: &Layout, store: &PageStore, out: &mut Vec<u8>) -> Result<()> {
        for (index, def) in layout.page_parameters() {
            let value = store.parameters[index].cast(def.sdds_type)?;
            self.encode_scalar(&value, out)?;
        }
        for (def, array) in layout.arrays.iter().zip(&store.arrays) {
            let n_dims = usize::try_from(def.dimensions).unwrap_or(1);
            for k in 0..n_dims {
                let size = array.dimensions.get(k).copied().unwrap_or(0);
                encode(length_prefix(size, "array dimension")?, self.swap, out);
            }
            let data = array.data.cast(def.sdds_type)?;
            for i in 0..array.element_count().min(data.len()) {
                self.encode_element(&data, i, out)?;
            }
        }
        Ok(())
    }

    /// Column data for the memory `rows` of the `columns` given.
    pub fn encode_columns(
        &self,
        store: &PageStore,
        columns: &[usize],
        rows: &[usize],
        column_major: bool,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        if column_major {
            for &c in columns {
                for &r in rows {
                    self.encode_element(&store.columns[c], r, out)?;
                }
            }
        } else {
            for &r in rows {
                for &c in columns {
                    self.encode_element(&store.columns[c], r, out)?;
                }
            }
        }
        Ok(())
    }

    /// A complete page.
    pub fn encode_page(
        &self,
        layout: &Layout,
        store: &PageStore,
        columns: &[usize],
        rows: &[usize],
        wide_count: bool,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_row_count(rows.len(), wide_count, &mut out)?;
        self.encode_header_blocks(layout, store, &mut out)?;
        self.encode_columns(store, columns, rows, layout.data_mode.column_major, &mut out)?;
        tracing::trace!(rows = rows.len(), bytes = out.len(), "encoded binary page");
        Ok(out)
    }

    // ----- decoding -----

    /// Read a row count; `None` at a clean or partial end of data.
    pub fn read_row_count(&self, reader: &mut SddsReader) -> Result<Option<(usize, bool)>> {
        let mut head = [0u8; 4];
        let n = reader
            .read_up_to(&mut head)
            .map_err(|e| SddsError::io("read row count", e))?;
        if n < 4 {
            if n > 0 {
                tracing::warn!(bytes = n, "partial row count at end of data");
            }
            return Ok(None);
        }
        let sentinel: i32 = decode(&head, self.swap);
        let (count, wide) = if sentinel == WIDE_ROW_COUNT {
            let mut wide = [0u8; 8];
            let n = reader
                .read_up_to(&mut wide)
                .map_err(|e| SddsError::io("read row count", e))?;
            if n < 8 {
                tracing::warn!("partial 64-bit row count at end of data");
                return Ok(None);
            }
            (decode::<i64>(&wide, self.swap), true)
        } else {
            (i64::from(sentinel), false)
        };
        if count < 0 {
            if self.check_sanity {
                return Err(SddsError::parse(format!(
                    "row count {count} is negative: the byte order is wrong or the file is corrupted"
                )));
            }
            tracing::warn!(count, "negative row count treated as end of data");
            return Ok(None);
        }
        let count = usize::try_from(count)
            .map_err(|_| SddsError::bounds(format!("row count {count} does not fit in memory")))?;
        Ok(Some((count, wide)))
    }

    /// Read the next page into `store`.
    pub fn read_page(&self, reader: &mut SddsReader, layout: &Layout, store: &mut PageStore) -> Result<PageRead> {
        let offset = reader.position();
        let Some((row_count, wide)) = self.read_row_count(reader)? else {
            return Ok(PageRead::End);
        };
        let frame = PageFrame {
            offset,
            count_offset: Some(offset),
            row_count,
            wide,
            count_width: 0,
        };
        // Buffers grow as rows arrive so a corrupt count cannot force a
        // huge allocation up front.
        store.reshape(layout, row_count.min(GROWTH_STEP));
        let mut complete = 0;
        match self.read_blocks(reader, layout, store, row_count, &mut complete) {
            Ok(()) => {
                store.n_rows = row_count;
                tracing::trace!(rows = row_count, "decoded binary page");
                Ok(PageRead::Complete(frame))
            }
            Err(Fail::Short) => {
                store.n_rows = complete;
                Ok(PageRead::Truncated { frame, rows: complete })
            }
            Err(Fail::Other(e)) => Err(e),
        }
    }

    fn read_blocks(
        &self,
        reader: &mut SddsReader,
        layout: &Layout,
        store: &mut PageStore,
        rows: usize,
        complete: &mut usize,
    ) -> Step<()> {
        for (index, def) in layout.page_parameters() {
            store.parameters[index] = self.read_scalar(reader, def.sdds_type)?;
        }
        for (slot, def) in layout.arrays.iter().enumerate() {
            let n_dims = usize::try_from(def.dimensions).unwrap_or(1);
            let mut dimensions = Vec::with_capacity(n_dims);
            for _ in 0..n_dims {
                let mut raw = [0u8; 4];
                read_bytes(reader, &mut raw)?;
                let size: i32 = decode(&raw, self.swap);
                let size = usize::try_from(size).map_err(|_| {
                    SddsError::parse(format!("array {} has negative dimension {size}", def.name))
                })?;
                dimensions.push(size);
            }
            let count = dimensions
                .iter()
                .try_fold(1usize, |n, &d| n.checked_mul(d))
                .ok_or_else(|| SddsError::parse(format!("array {} dimensions {dimensions:?} overflow", def.name)))?;
            let count = if dimensions.is_empty() { 0 } else { count };
            let mut data = ValueVec::zeros(def.sdds_type, 0);
            let mut start = 0;
            while start < count {
                let step = (count - start).min(GROWTH_STEP);
                data.resize(start + step);
                self.read_elements(reader, &mut data, start, step)
                    .map_err(|(_, fail)| fail)?;
                start += step;
            }
            store.arrays[slot] = ArrayValue { dimensions, data };
        }

        let column_major = layout.data_mode.column_major;
        let n_columns = store.columns.len();
        if column_major {
            for column in 0..n_columns {
                let mut start = 0;
                while start < rows {
                    let step = (rows - start).min(GROWTH_STEP);
                    store.ensure_capacity(start + step);
                    if let Err((read, fail)) = self.read_elements(reader, &mut store.columns[column], start, step) {
                        // A row is present only once every column holds it.
                        *complete = if column + 1 == n_columns { start + read } else { 0 };
                        return Err(fail);
                    }
                    start += step;
                }
            }
        } else {
            for row in 0..rows {
                if row == store.n_rows_allocated {
                    store.ensure_capacity(row + (rows - row).min(GROWTH_STEP));
                }
                for column in 0..n_columns {
                    if let Err((_, fail)) = self.read_elements(reader, &mut store.columns[column], row, 1) {
                        *complete = row;
                        return Err(fail);
                    }
                }
            }
        }
        *complete = rows;
        Ok(())
    }

    fn read_scalar(&self, reader: &mut SddsReader, ty: SddsType) -> Step<Value> {
        let mut data = ValueVec::zeros(ty, 1);
        self.read_elements(reader, &mut data, 0, 1)
            .map_err(|(_, fail)| fail)?;
        Ok(data.get(0).unwrap_or_else(|| Value::zero(ty)))
    }

    /// Fill `count` elements from `start`; on failure report how many were read.
    fn read_elements(
        &self,
        reader: &mut SddsReader,
        data: &mut ValueVec,
        start: usize,
        count: usize,
    ) -> std::result::Result<(), (usize, Fail)> {
        if let ValueVec::String(v) = data {
            for k in 0..count {
                let text = self.read_string(reader).map_err(|f| (k, f))?;
                v[start + k] = text;
            }
            return Ok(());
        }
        let Some(size) = data.sdds_type().binary_size() else {
            return Ok(());
        };
        let mut raw = vec![0u8; size * count];
        let got = reader
            .read_up_to(&mut raw)
            .map_err(|e| (0, Fail::Other(SddsError::io("read binary page", e))))?;
        let whole = got / size;
        let bytes = &raw[..whole * size];
        let swap = self.swap;
        match data {
            ValueVec::LongDouble(v) => {
                for (slot, chunk) in v[start..].iter_mut().zip(bytes.chunks_exact(16)) {
                    *slot = decode_long_double(chunk, self.order);
                }
            }
            ValueVec::Double(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::Float(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::Int64(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::UInt64(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::Int32(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::UInt32(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::Short(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::UShort(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::Character(v) => fill(&mut v[start..], bytes, swap),
            ValueVec::String(_) => {}
        }
        if whole < count {
            return Err((whole, Fail::Short));
        }
        Ok(())
    }

    fn read_string(&self, reader: &mut SddsReader) -> Step<String> {
        let mut raw = [0u8; 4];
        read_bytes(reader, &mut raw)?;
        let len: i32 = decode(&raw, self.swap);
        let len = usize::try_from(len)
            .map_err(|_| SddsError::parse(format!("negative string length {len}")))?;
        let mut bytes = Vec::with_capacity(len.min(GROWTH_STEP));
        let mut chunk = vec![0u8; len.min(GROWTH_STEP)];
        while bytes.len() < len {
            let n = (len - bytes.len()).min(chunk.len());
            read_bytes(reader, &mut chunk[..n])?;
            bytes.extend_from_slice(&chunk[..n]);
        }
        Ok(String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }
}

fn fill<T: Scalar>(slots: &mut [T], bytes: &[u8], swap: bool) {
    for (slot, chunk) in slots.iter_mut().zip(bytes.chunks_exact(T::SIZE)) {
        *slot = decode(chunk, swap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ArrayDefinition, ColumnDefinition, ParameterDefinition};

    fn layout(column_major: bool) -> Layout {
        let mut layout = Layout::new();
        layout
            .add_parameter(ParameterDefinition::new("label", SddsType::String))
            .unwrap();
        layout
            .add_array(ArrayDefinition::new("m", SddsType::Short, 2))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("x", SddsType::Double))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("e", SddsType::LongDouble))
            .unwrap();
        layout.data_mode.column_major = column_major;
        layout
    }

    fn filled(layout: &Layout) -> PageStore {
        let mut store = PageStore::for_layout(layout);
        store.parameters[0] = Value::from("run 7");
        store.arrays[0] =
            ArrayValue::new(vec![2, 2], ValueVec::from(vec![1i16, 2, 3, 4])).unwrap();
        store
            .set_column(0, SddsType::Double, &ValueVec::from(vec![0.5, 1.5, 2.5]))
            .unwrap();
        store
            .set_column(1, SddsType::LongDouble, &ValueVec::from(vec![1.0, -2.0, 1e300]))
            .unwrap();
        store
    }

    #[test]
    fn page_survives_both_orders_and_layouts() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            for column_major in [false, true] {
                let layout = layout(column_major);
                let store = filled(&layout);
                let codec = BinaryCodec::new(order);
                let bytes = codec.encode_page(&layout, &store, &[0, 1], &[0, 1, 2], false).unwrap();
                let mut reader = SddsReader::from_reader(std::io::Cursor::new(bytes));
                let mut back = PageStore::for_layout(&layout);
                let read = codec.read_page(&mut reader, &layout, &mut back).unwrap();
                assert!(matches!(read, PageRead::Complete(PageFrame { row_count: 3, .. })));
                assert_eq!(back.parameters[0], Value::from("run 7"));
                assert_eq!(back.arrays[0], store.arrays[0]);
                assert_eq!(back.column_rows(0), store.column_rows(0));
                assert_eq!(back.column_rows(1), store.column_rows(1));
                assert!(matches!(codec.read_page(&mut reader, &layout, &mut back).unwrap(), PageRead::End));
            }
        }
    }

    #[test]
    fn wide_count_and_sanity_check() {
        let codec = BinaryCodec::new(ByteOrder::BigEndian);
        let mut out = Vec::new();
        codec.encode_row_count(8, true, &mut out).unwrap();
        assert_eq!(out, [0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 8]);

        let mut reader = SddsReader::from_reader(std::io::Cursor::new(vec![0xff, 0xff, 0xff, 0xfe]));
        assert!(codec.read_row_count(&mut reader).is_err());
        let mut reader = SddsReader::from_reader(std::io::Cursor::new(vec![0xff, 0xff, 0xff, 0xfe]));
        assert_eq!(codec.with_sanity_check(false).read_row_count(&mut reader).unwrap(), None);
    }

    #[test]
    fn short_column_block_keeps_complete_rows() {
        let mut layout = Layout::new();
        layout
            .add_column(ColumnDefinition::new("x", SddsType::Double))
            .unwrap();
        layout.data_mode.column_major = true;
        let mut store = PageStore::for_layout(&layout);
        store
            .set_column(0, SddsType::Double, &ValueVec::from(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        let codec = BinaryCodec::new(ByteOrder::native());
        let mut bytes = codec.encode_page(&layout, &store, &[0], &[0, 1, 2, 3], false).unwrap();
        bytes.truncate(4 + 16 + 3);
        let mut reader = SddsReader::from_reader(std::io::Cursor::new(bytes));
        let mut back = PageStore::for_layout(&layout);
        let read = codec.read_page(&mut reader, &layout, &mut back).unwrap();
        assert!(matches!(read, PageRead::Truncated { rows: 2, .. }));
        assert_eq!(back.column_rows(0), Some(ValueVec::from(vec![1.0, 2.0])));
    }
}
