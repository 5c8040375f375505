//! Copying layouts and page data between datasets. Values are matched by
//! name and cast to the target's types.

use super::Dataset;
use crate::error::{Result, SddsError};
use crate::layout::{DataEncoding, Layout};
use crate::storage::ArrayValue;
use crate::types::ValueVec;
use std::path::Path;

impl Dataset {
    /// Open an output file that copies `source`'s layout, keeping only its
    /// columns of interest. `encoding` overrides the source's data mode.
    pub fn initialize_copy(source: &Dataset, path: Option<&Path>, encoding: Option<DataEncoding>) -> Result<Self> {
        source.check_active()?;
        let mode = &source.layout.data_mode;
        let mut target = Self::initialize_output(mode.encoding, mode.lines_per_row, None, None, path)?;
        target.copy_layout(source)?;
        if let Some(encoding) = encoding {
            let mode = &mut target.layout.data_mode;
            if encoding == DataEncoding::Binary {
                mode.no_row_counts = false;
                if mode.encoding == DataEncoding::Ascii {
                    mode.column_major = true;
                }
            }
            mode.encoding = encoding;
        }
        Ok(target)
    }

    /// Replace this dataset's layout with `source`'s, keeping only the
    /// source's columns of interest in definition order.
    pub fn copy_layout(&mut self, source: &Dataset) -> Result<()> {
        self.ensure_layout_editable("copy_layout")?;
        source.check_active()?;
        let mut layout = Layout {
            description: source.layout.description.clone(),
            parameters: source.layout.parameters.clone(),
            arrays: source.layout.arrays.clone(),
            associates: source.layout.associates.clone(),
            columns: Default::default(),
            data_mode: source.layout.data_mode.clone(),
        };
        layout.columns = source
            .layout
            .columns
            .iter()
            .zip(&source.column_flags)
            .filter(|(_, flag)| **flag)
            .map(|(def, _)| def.clone())
            .collect::<Vec<_>>()
            .into();
        layout.data_mode.byte_order = None;
        layout.data_mode.additional_header_lines = 0;
        self.replace_layout(layout);
        Ok(())
    }

    /// Start a page and fill it with `source`'s parameters, arrays and
    /// columns, row flags included.
    pub fn copy_page(&mut self, source: &Dataset) -> Result<()> {
        source.require_page("copy_page source")?;
        self.start_page(source.store.n_rows)?;
        self.copy_parameters(source)?;
        self.copy_arrays(source)?;
        self.copy_columns(source)
    }

    pub fn copy_parameters(&mut self, source: &Dataset) -> Result<()> {
        self.require_page("copy_parameters")?;
        source.require_page("copy_parameters source")?;
        for (i, def) in self.layout.parameters.iter().enumerate() {
            if def.fixed_value.is_some() {
                continue;
            }
            if let Some(j) = source.layout.parameters.find(&def.name) {
                self.store.parameters[i] = source.store.parameters[j].cast(def.sdds_type)?;
            }
        }
        Ok(())
    }

    pub fn copy_arrays(&mut self, source: &Dataset) -> Result<()> {
        self.require_page("copy_arrays")?;
        source.require_page("copy_arrays source")?;
        for (i, def) in self.layout.arrays.iter().enumerate() {
            if let Some(j) = source.layout.arrays.find(&def.name) {
                let from = &source.store.arrays[j];
                self.store.arrays[i] = ArrayValue {
                    dimensions: from.dimensions.clone(),
                    data: from.data.cast(def.sdds_type)?,
                };
            }
        }
        Ok(())
    }

    /// Copy every row in memory, with its row flag.
    pub fn copy_columns(&mut self, source: &Dataset) -> Result<()> {
        self.require_page("copy_columns")?;
        source.require_page("copy_columns source")?;
        let rows = source.store.n_rows;
        self.store.ensure_capacity(rows);
        let allocated = self.store.n_rows_allocated;
        for (i, def) in self.layout.columns.iter().enumerate() {
            let mut data = match source.layout.columns.find(&def.name) {
                Some(j) => source
                    .store
                    .column_rows(j)
                    .ok_or_else(|| SddsError::bounds(format!("column {} has no storage", def.name)))?
                    .cast(def.sdds_type)?,
                None => ValueVec::zeros(def.sdds_type, rows),
            };
            data.resize(allocated);
            self.store.columns[i] = data;
        }
        for r in 0..allocated {
            self.store.row_flags[r] = r >= rows || source.store.row_flags[r];
        }
        self.store.n_rows = rows;
        Ok(())
    }

    /// Copy only `source`'s rows of interest; all copied rows are of interest here.
    pub fn copy_rows_of_interest(&mut self, source: &Dataset) -> Result<()> {
        self.require_page("copy_rows_of_interest")?;
        source.require_page("copy_rows_of_interest source")?;
        let flags: Vec<bool> = source.store.row_flags[..source.store.n_rows].to_vec();
        let rows = flags.iter().filter(|&&f| f).count();
        self.store.ensure_capacity(rows);
        let allocated = self.store.n_rows_allocated;
        for (i, def) in self.layout.columns.iter().enumerate() {
            let mut data = match source.layout.columns.find(&def.name) {
                Some(j) => source
                    .store
                    .column_rows(j)
                    .ok_or_else(|| SddsError::bounds(format!("column {} has no storage", def.name)))?
                    .filter(&flags)
                    .cast(def.sdds_type)?,
                None => ValueVec::zeros(def.sdds_type, rows),
            };
            data.resize(allocated);
            self.store.columns[i] = data;
        }
        self.store.row_flags.iter_mut().for_each(|f| *f = true);
        self.store.n_rows = rows;
        Ok(())
    }

    /// Copy one row of `source` into virtual row `target_row` here.
    pub fn copy_row(&mut self, target_row: usize, source: &Dataset, source_row: usize) -> Result<()> {
        self.require_page("copy_row")?;
        source.require_page("copy_row source")?;
        let from = source.store.memory_row(source_row)?;
        if from >= source.store.n_rows {
            return Err(SddsError::bounds(format!(
                "source row {source_row} past the end of the page"
            )));
        }
        let to = self.store.memory_row(target_row)?;
        for i in 0..self.layout.columns.len() {
            let name = &self.layout.columns.as_slice()[i].name;
            if let Some(j) = source.layout.columns.find(name)
                && let Some(value) = source.store.columns[j].get(from)
            {
                self.store.set_value(i, to, &value)?;
            }
        }
        self.auto_update()
    }
}
