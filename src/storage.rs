//! In-memory page contents.
//!
//! A [`PageStore`] holds one value per parameter, one [`ArrayValue`] per
//! array and one [`ValueVec`] per column, all indexed by definition
//! position. Column buffers are `n_rows_allocated` long; only the first
//! `n_rows` entries are live. Row indices seen by callers are *virtual*:
//! after a partial flush the rows still in memory start at
//! `first_row_in_mem`.

use crate::error::{Result, SddsError};
use crate::layout::Layout;
use crate::types::{SddsType, Value, ValueVec};
use serde::{Deserialize, Serialize};

/// Rows added per step when a page grows while being filled or decoded.
pub const GROWTH_STEP: usize = 65_536;

/// Data of one array on the current page.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayValue {
    /// Size of each dimension, slowest-varying first.
    pub dimensions: Vec<usize>,
    /// Elements in row-major order.
    pub data: ValueVec,
}

impl ArrayValue {
    /// Empty array with `n_dims` zero-sized dimensions.
    #[must_use]
    pub fn empty(ty: SddsType, n_dims: usize) -> Self {
        Self {
            dimensions: vec![0; n_dims],
            data: ValueVec::empty(ty),
        }
    }

    /// Array whose element count must match the product of `dimensions`.
    pub fn new(dimensions: Vec<usize>, data: ValueVec) -> Result<Self> {
        let expected = element_count(&dimensions);
        if expected != data.len() {
            return Err(SddsError::bounds(format!(
                "array dimensions {dimensions:?} need {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { dimensions, data })
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        element_count(&self.dimensions)
    }

    #[must_use]
    pub fn sdds_type(&self) -> SddsType {
        self.data.sdds_type()
    }
}

pub(crate) fn element_count(dimensions: &[usize]) -> usize {
    if dimensions.is_empty() {
        0
    } else {
        dimensions.iter().product()
    }
}

/// How row counts are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowCountMode {
    /// Minimal-width count on each page.
    #[default]
    Variable,
    /// Fixed-width count that can be rewritten in place.
    Fixed,
    /// No counts; ASCII pages end at a blank line.
    None,
}

/// Parameter, array and column data for the current page.
#[derive(Clone, Debug, Default)]
pub struct PageStore {
    pub parameters: Vec<Value>,
    pub arrays: Vec<ArrayValue>,
    pub columns: Vec<ValueVec>,
    /// Row-of-interest flags, one per allocated row.
    pub row_flags: Vec<bool>,
    /// Live rows in memory.
    pub n_rows: usize,
    pub n_rows_allocated: usize,
    /// Virtual index of memory row 0.
    pub first_row_in_mem: usize,
    /// Memory rows already written by a partial update.
    pub rows_flushed_in_mem: usize,
    /// Rows of this page already on disk.
    pub n_rows_written: usize,
}

impl PageStore {
    /// Storage shaped for `layout` with no rows.
    #[must_use]
    pub fn for_layout(layout: &Layout) -> Self {
        let mut store = Self::default();
        store.reshape(layout, 0);
        store
    }

    /// Reallocate every slot for `layout` with `capacity` zeroed rows.
    pub fn reshape(&mut self, layout: &Layout, capacity: usize) {
        self.parameters = layout
            .parameters
            .iter()
            .map(|p| {
                p.fixed_value
                    .as_deref()
                    .and_then(|text| Value::scan(text, p.sdds_type).ok())
                    .unwrap_or_else(|| Value::zero(p.sdds_type))
            })
            .collect();
        self.arrays = layout
            .arrays
            .iter()
            .map(|a| ArrayValue::empty(a.sdds_type, usize::try_from(a.dimensions).unwrap_or(1)))
            .collect();
        self.columns = layout
            .columns
            .iter()
            .map(|c| ValueVec::zeros(c.sdds_type, capacity))
            .collect();
        self.row_flags = vec![true; capacity];
        self.n_rows_allocated = capacity;
        self.reset_counters();
    }

    fn reset_counters(&mut self) {
        self.n_rows = 0;
        self.first_row_in_mem = 0;
        self.rows_flushed_in_mem = 0;
        self.n_rows_written = 0;
    }

    /// Zero all data and counters, keeping the allocation.
    pub fn clear(&mut self, layout: &Layout) {
        let capacity = self.n_rows_allocated;
        if self.columns.len() != layout.columns.len() {
            self.reshape(layout, capacity);
            return;
        }
        for column in &mut self.columns {
            column.zero_fill();
        }
        self.row_flags.iter_mut().for_each(|f| *f = true);
        for (slot, def) in self.parameters.iter_mut().zip(layout.parameters.iter()) {
            *slot = def
                .fixed_value
                .as_deref()
                .and_then(|text| Value::scan(text, def.sdds_type).ok())
                .unwrap_or_else(|| Value::zero(def.sdds_type));
        }
        for (slot, def) in self.arrays.iter_mut().zip(layout.arrays.iter()) {
            *slot = ArrayValue::empty(def.sdds_type, usize::try_from(def.dimensions).unwrap_or(1));
        }
        self.reset_counters();
    }

    /// Make room for at least `rows` rows.
    pub fn ensure_capacity(&mut self, rows: usize) {
        if rows <= self.n_rows_allocated {
            return;
        }
        let capacity = rows.max(self.n_rows_allocated.saturating_mul(2)).max(16);
        for column in &mut self.columns {
            column.resize(capacity);
        }
        self.row_flags.resize(capacity, true);
        self.n_rows_allocated = capacity;
    }

    /// Add `extra` rows of capacity.
    pub fn lengthen(&mut self, extra: usize) {
        let target = self.n_rows_allocated + extra;
        for column in &mut self.columns {
            column.resize(target);
        }
        self.row_flags.resize(target, true);
        self.n_rows_allocated = target;
    }

    /// Drop rows past `rows`.
    pub fn shorten(&mut self, rows: usize) {
        if rows < self.n_rows {
            for column in &mut self.columns {
                column.truncate(rows);
                column.resize(self.n_rows_allocated);
            }
            for flag in self.row_flags.iter_mut().skip(rows) {
                *flag = true;
            }
            self.n_rows = rows;
            self.rows_flushed_in_mem = self.rows_flushed_in_mem.min(rows);
        }
    }

    /// Memory index of a virtual row.
    pub fn memory_row(&self, row: usize) -> Result<usize> {
        row.checked_sub(self.first_row_in_mem).ok_or_else(|| {
            SddsError::bounds(format!(
                "row {row} was already written; rows from {} are in memory",
                self.first_row_in_mem
            ))
        })
    }

    /// Store one value at a memory row, extending the page as needed.
    ///
    /// A row may lie at most [`GROWTH_STEP`] rows, or one doubling, past
    /// the current allocation.
    pub fn set_value(&mut self, column: usize, row: usize, value: &Value) -> Result<()> {
        let limit = self
            .n_rows_allocated
            .saturating_mul(2)
            .max(self.n_rows_allocated.saturating_add(GROWTH_STEP));
        if row >= limit {
            return Err(SddsError::bounds(format!(
                "row {row} is too far past the {} rows allocated",
                self.n_rows_allocated
            )));
        }
        self.ensure_capacity(row + 1);
        let slot = self
            .columns
            .get_mut(column)
            .ok_or_else(|| SddsError::bounds(format!("column index {column} out of range")))?;
        slot.set(row, value)?;
        self.n_rows = self.n_rows.max(row + 1);
        Ok(())
    }

    /// Replace a whole column. The first column set on an empty page fixes
    /// the row count; later ones must match it.
    pub fn set_column(&mut self, column: usize, ty: SddsType, data: &ValueVec) -> Result<()> {
        let rows = data.len();
        if self.n_rows != 0 && rows != self.n_rows {
            return Err(SddsError::bounds(format!(
                "column has {rows} rows but the page has {}",
                self.n_rows
            )));
        }
        if column >= self.columns.len() {
            return Err(SddsError::bounds(format!("column index {column} out of range")));
        }
        let mut values = data.cast(ty)?;
        self.ensure_capacity(rows);
        values.resize(self.n_rows_allocated);
        self.columns[column] = values;
        self.n_rows = rows;
        Ok(())
    }

    /// Live rows of one column.
    #[must_use]
    pub fn column_rows(&self, column: usize) -> Option<ValueVec> {
        let mut data = self.columns.get(column)?.clone();
        data.truncate(self.n_rows);
        Some(data)
    }

    /// Memory rows whose flag is set.
    #[must_use]
    pub fn rows_of_interest(&self) -> usize {
        self.row_flags
            .iter()
            .take(self.n_rows)
            .filter(|&&f| f)
            .count()
    }

    /// Flagged memory rows in `start..self.n_rows`.
    #[must_use]
    pub fn flagged_rows_from(&self, start: usize) -> Vec<usize> {
        (start..self.n_rows).filter(|&r| self.row_flags[r]).collect()
    }

    /// Remove rows whose flag is unset.
    pub fn delete_unset_rows(&mut self) -> usize {
        let flags: Vec<bool> = self.row_flags.iter().take(self.n_rows).copied().collect();
        let kept = flags.iter().filter(|&&f| f).count();
        for column in &mut self.columns {
            column.truncate(self.n_rows);
            column.retain(&flags);
            column.resize(self.n_rows_allocated);
        }
        self.row_flags.iter_mut().for_each(|f| *f = true);
        let removed = self.n_rows - kept;
        self.n_rows = kept;
        removed
    }

    /// Drop memory rows already written and shift the window forward.
    pub fn discard_flushed(&mut self) {
        let flushed = self.rows_flushed_in_mem.min(self.n_rows);
        if flushed == 0 {
            return;
        }
        let keep: Vec<bool> = (0..self.n_rows_allocated).map(|r| r >= flushed).collect();
        for column in &mut self.columns {
            column.retain(&keep);
            column.resize(self.n_rows_allocated);
        }
        self.row_flags.drain(..flushed);
        self.row_flags.resize(self.n_rows_allocated, true);
        self.first_row_in_mem += flushed;
        self.n_rows -= flushed;
        self.rows_flushed_in_mem = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ColumnDefinition, ParameterDefinition};

    fn layout() -> Layout {
        let mut layout = Layout::new();
        layout
            .add_parameter(ParameterDefinition::new("k", SddsType::Int32).fixed_value("7"))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("x", SddsType::Double))
            .unwrap();
        layout
            .add_column(ColumnDefinition::new("name", SddsType::String))
            .unwrap();
        layout
    }

    #[test]
    fn fixed_parameters_and_growth() {
        let layout = layout();
        let mut store = PageStore::for_layout(&layout);
        store.reshape(&layout, 2);
        assert_eq!(store.parameters[0], Value::Int32(7));
        store.set_value(0, 5, &Value::Int32(3)).unwrap();
        assert_eq!(store.n_rows, 6);
        assert!(store.n_rows_allocated >= 6);
        assert_eq!(store.columns[0].get(5), Some(Value::Double(3.0)));
        assert_eq!(store.columns[1].len(), store.n_rows_allocated);
    }

    #[test]
    fn far_rows_are_bounds_errors() {
        let layout = layout();
        let mut store = PageStore::for_layout(&layout);
        store.reshape(&layout, 4);
        let err = store.set_value(0, usize::MAX, &Value::Int32(1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Bounds);
        let err = store.set_value(0, GROWTH_STEP + 4, &Value::Int32(1)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Bounds);
        assert_eq!(store.n_rows_allocated, 4);
        store.set_value(0, GROWTH_STEP + 3, &Value::Int32(1)).unwrap();
        assert_eq!(store.n_rows, GROWTH_STEP + 4);
    }

    #[test]
    fn set_column_checks_row_count() {
        let layout = layout();
        let mut store = PageStore::for_layout(&layout);
        store
            .set_column(0, SddsType::Double, &ValueVec::from(vec![1i32, 2, 3]))
            .unwrap();
        assert_eq!(store.n_rows, 3);
        assert!(store
            .set_column(1, SddsType::String, &ValueVec::from(vec!["a"]))
            .is_err());
        assert_eq!(store.column_rows(0), Some(ValueVec::from(vec![1.0, 2.0, 3.0])));
    }

    #[test]
    fn discard_flushed_moves_window() {
        let layout = layout();
        let mut store = PageStore::for_layout(&layout);
        for r in 0..4 {
            store.set_value(0, r, &Value::Double(r as f64)).unwrap();
        }
        store.rows_flushed_in_mem = 3;
        store.discard_flushed();
        assert_eq!(store.first_row_in_mem, 3);
        assert_eq!(store.n_rows, 1);
        assert_eq!(store.columns[0].get(0), Some(Value::Double(3.0)));
        assert_eq!(store.memory_row(4).unwrap(), 1);
        assert!(store.memory_row(2).is_err());
    }

    #[test]
    fn array_element_count_must_match() {
        assert!(ArrayValue::new(vec![2, 3], ValueVec::zeros(SddsType::Short, 6)).is_ok());
        assert!(ArrayValue::new(vec![2, 3], ValueVec::zeros(SddsType::Short, 5)).is_err());
    }
}
