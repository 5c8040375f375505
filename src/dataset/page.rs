//! Page contents: starting pages and setting or getting their values.
//!
//! Row arguments of [`Dataset::set_row_values`] and [`Dataset::get_value`]
//! are virtual: they count from the start of the page on disk, so after
//! append-to-page or `update_page(true)` the first row in memory is not 0.

use super::{Dataset, State};
use crate::error::{Result, SddsError};
use crate::format::PrintfFormat;
use crate::layout::Definition;
use crate::layout::DefinitionTable;
use crate::storage::ArrayValue;
use crate::types::{SddsType, Value, ValueVec};

fn index_of<D: Definition>(table: &DefinitionTable<D>, name: &str) -> Result<usize> {
    table
        .find(name)
        .ok_or_else(|| SddsError::schema(format!("no {} named {name}", D::KIND)))
}

impl Dataset {
    /// Begin a new page with room for `expected_rows` rows.
    ///
    /// Parameters reset to zero (fixed parameters to their fixed value) and
    /// every row is of interest.
    pub fn start_page(&mut self, expected_rows: usize) -> Result<()> {
        self.require_writer("start_page")?;
        if !self.layout_written {
            return Err(SddsError::protocol("start_page: the layout has not been written"));
        }
        if self.state == State::InPage && self.current_frame.is_some() {
            return Err(SddsError::protocol(
                "start_page: the current page is partly written; call write_page first",
            ));
        }
        self.store.reshape(&self.layout, expected_rows);
        self.page_number += 1;
        self.state = State::InPage;
        tracing::trace!(page = self.page_number, expected_rows, "page started");
        Ok(())
    }

    /// Zero the page's data without releasing memory.
    pub fn clear_page(&mut self) -> Result<()> {
        self.require_page("clear_page")?;
        if self.current_frame.is_some() {
            return Err(SddsError::unsupported("clear_page: rows of this page are already on disk"));
        }
        self.store.clear(&self.layout);
        Ok(())
    }

    pub fn lengthen_page(&mut self, extra_rows: usize) -> Result<()> {
        self.require_page("lengthen_page")?;
        self.store.lengthen(extra_rows);
        Ok(())
    }

    /// Keep only the first `rows` rows in memory.
    pub fn shorten_page(&mut self, rows: usize) -> Result<()> {
        self.require_page("shorten_page")?;
        self.store.shorten(rows);
        Ok(())
    }

    /// Rows in memory.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.store.n_rows
    }

    /// Rows of the current page already on disk.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.store.n_rows_written
    }

    /// Virtual index of the first row in memory.
    #[must_use]
    pub fn first_row_in_memory(&self) -> usize {
        self.store.first_row_in_mem
    }

    // ----- parameters -----

    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.require_page("set_parameter")?;
        let index = index_of(&self.layout.parameters, name)?;
        self.set_parameter_by_index(index, value)
    }

    pub fn set_parameter_by_index(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.require_page("set_parameter")?;
        let def = self
            .layout
            .parameters
            .get(index)
            .ok_or_else(|| SddsError::bounds(format!("parameter index {index} out of range")))?;
        if def.fixed_value.is_some() {
            return Err(SddsError::schema(format!(
                "parameter {} has a fixed value",
                def.name
            )));
        }
        self.store.parameters[index] = value.into().cast(def.sdds_type)?;
        Ok(())
    }

    /// Set several parameters by name.
    pub fn set_parameters<'a, I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        for (name, value) in values {
            self.set_parameter(name, value)?;
        }
        Ok(())
    }

    pub fn get_parameter(&self, name: &str) -> Result<Value> {
        self.require_page("get_parameter")?;
        let index = index_of(&self.layout.parameters, name)?;
        Ok(self.store.parameters[index].clone())
    }

    pub fn get_parameter_as_f64(&self, name: &str) -> Result<f64> {
        self.get_parameter(name)?
            .cast(SddsType::Double)?
            .as_f64()
            .ok_or_else(|| SddsError::schema(format!("parameter {name} is not numeric")))
    }

    pub fn get_parameter_as_i64(&self, name: &str) -> Result<i64> {
        self.get_parameter(name)?
            .cast(SddsType::Int64)?
            .as_i64()
            .ok_or_else(|| SddsError::schema(format!("parameter {name} is not numeric")))
    }

    /// Parameter text, through its `format_string` when it has one.
    pub fn get_parameter_as_string(&self, name: &str) -> Result<String> {
        let value = self.get_parameter(name)?;
        let format = self
            .parameter_definition(name)
            .and_then(|d| d.format_string.as_deref())
            .map(PrintfFormat::parse)
            .transpose()?;
        Ok(match format {
            Some(f) => f.apply(&value),
            None => value.to_string(),
        })
    }

    pub fn take_parameter(&mut self, name: &str) -> Result<Value> {
        self.require_page("take_parameter")?;
        let index = index_of(&self.layout.parameters, name)?;
        let ty = self.layout.parameters.as_slice()[index].sdds_type;
        Ok(std::mem::replace(&mut self.store.parameters[index], Value::zero(ty)))
    }

    // ----- columns -----

    /// Replace a column. The first column set fixes the page's row count.
    pub fn set_column(&mut self, name: &str, data: impl Into<ValueVec>) -> Result<()> {
        self.require_page("set_column")?;
        let index = index_of(&self.layout.columns, name)?;
        self.set_column_by_index(index, data)
    }

    pub fn set_column_by_index(&mut self, index: usize, data: impl Into<ValueVec>) -> Result<()> {
        self.require_page("set_column")?;
        let ty = self
            .layout
            .column_type(index)
            .ok_or_else(|| SddsError::bounds(format!("column index {index} out of range")))?;
        self.store.set_column(index, ty, &data.into())
    }

    /// Set named columns of one virtual row, growing the page as needed.
    pub fn set_row_values(&mut self, row: usize, values: &[(&str, Value)]) -> Result<()> {
        self.require_page("set_row_values")?;
        let memory_row = self.store.memory_row(row)?;
        for (name, value) in values {
            let index = index_of(&self.layout.columns, name)?;
            self.store.set_value(index, memory_row, value)?;
        }
        self.auto_update()
    }

    /// Value of one cell at a virtual row.
    pub fn get_value(&self, column: &str, row: usize) -> Result<Value> {
        self.require_page("get_value")?;
        let index = index_of(&self.layout.columns, column)?;
        let memory_row = self.store.memory_row(row)?;
        if memory_row >= self.store.n_rows {
            return Err(SddsError::bounds(format!(
                "row {row} past the {} rows of the page",
                self.store.first_row_in_mem + self.store.n_rows
            )));
        }
        self.store.columns[index]
            .get(memory_row)
            .ok_or_else(|| SddsError::bounds(format!("row {row} out of range")))
    }

    fn live_column(&self, name: &str) -> Result<ValueVec> {
        let index = index_of(&self.layout.columns, name)?;
        self.store
            .column_rows(index)
            .ok_or_else(|| SddsError::bounds(format!("column {name} has no storage")))
    }

    fn live_flags(&self) -> &[bool] {
        &self.store.row_flags[..self.store.n_rows.min(self.store.row_flags.len())]
    }

    /// Rows of interest of a column.
    pub fn get_column(&self, name: &str) -> Result<ValueVec> {
        self.require_page("get_column")?;
        Ok(self.live_column(name)?.filter(self.live_flags()))
    }

    /// Every row in memory, ignoring row flags.
    pub fn get_internal_column(&self, name: &str) -> Result<ValueVec> {
        self.require_page("get_internal_column")?;
        self.live_column(name)
    }

    pub fn get_column_in_doubles(&self, name: &str) -> Result<Vec<f64>> {
        self.get_column(name)?
            .to_f64()
            .ok_or_else(|| SddsError::schema(format!("column {name} is not numeric")))
    }

    /// Rows of interest as text, through the column's `format_string` when set.
    pub fn get_column_in_strings(&self, name: &str) -> Result<Vec<String>> {
        let data = self.get_column(name)?;
        let format = self
            .column_definition(name)
            .and_then(|d| d.format_string.as_deref())
            .map(PrintfFormat::parse)
            .transpose()?;
        Ok(match format {
            Some(f) => (0..data.len())
                .filter_map(|i| data.get(i))
                .map(|v| f.apply(&v))
                .collect(),
            None => data.to_strings(),
        })
    }

    /// Move a column's rows of interest out, leaving zeros behind.
    pub fn take_column(&mut self, name: &str) -> Result<ValueVec> {
        self.require_page("take_column")?;
        let index = index_of(&self.layout.columns, name)?;
        let ty = self.layout.columns.as_slice()[index].sdds_type;
        let allocated = self.store.n_rows_allocated;
        let mut data = std::mem::replace(&mut self.store.columns[index], ValueVec::zeros(ty, allocated));
        data.truncate(self.store.n_rows);
        let flags = self.live_flags();
        if flags.iter().all(|&f| f) {
            Ok(data)
        } else {
            Ok(data.filter(flags))
        }
    }

    // ----- arrays -----

    pub fn set_array(&mut self, name: &str, dimensions: &[usize], data: impl Into<ValueVec>) -> Result<()> {
        self.require_page("set_array")?;
        let index = index_of(&self.layout.arrays, name)?;
        let def = &self.layout.arrays.as_slice()[index];
        let n_dims = usize::try_from(def.dimensions).unwrap_or(1);
        if dimensions.len() != n_dims {
            return Err(SddsError::bounds(format!(
                "array {name} has {n_dims} dimensions, got {}",
                dimensions.len()
            )));
        }
        let data = data.into().cast(def.sdds_type)?;
        self.store.arrays[index] = ArrayValue::new(dimensions.to_vec(), data)?;
        Ok(())
    }

    /// Append elements to an array and give it new `dimensions`.
    pub fn append_to_array(&mut self, name: &str, data: impl Into<ValueVec>, dimensions: &[usize]) -> Result<()> {
        self.require_page("append_to_array")?;
        let index = index_of(&self.layout.arrays, name)?;
        let ty = self.layout.arrays.as_slice()[index].sdds_type;
        let extra = data.into().cast(ty)?;
        let mut combined = self.store.arrays[index].data.clone();
        let start = combined.len();
        combined.resize(start + extra.len());
        combined.copy_range(start, &extra, 0, extra.len())?;
        self.set_array(name, dimensions, combined)
    }

    pub fn get_array(&self, name: &str) -> Result<&ArrayValue> {
        self.require_page("get_array")?;
        let index = index_of(&self.layout.arrays, name)?;
        Ok(&self.store.arrays[index])
    }

    pub fn get_array_in_doubles(&self, name: &str) -> Result<Vec<f64>> {
        self.get_array(name)?
            .data
            .to_f64()
            .ok_or_else(|| SddsError::schema(format!("array {name} is not numeric")))
    }

    pub fn take_array(&mut self, name: &str) -> Result<ArrayValue> {
        self.require_page("take_array")?;
        let index = index_of(&self.layout.arrays, name)?;
        let def = &self.layout.arrays.as_slice()[index];
        let empty = ArrayValue::empty(def.sdds_type, usize::try_from(def.dimensions).unwrap_or(1));
        Ok(std::mem::replace(&mut self.store.arrays[index], empty))
    }
}
