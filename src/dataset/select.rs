//! Columns and rows of interest, plus name searches over the layout.

use super::Dataset;
use crate::error::{Result, SddsError};
use crate::layout::Definition;
use crate::selection::{ColumnSelector, FindType, Logic, NumScanMode, WildcardPattern};
use crate::types::{SddsType, ValueVec};
use std::ops::Range;

fn names_matching<'a, I>(items: I, pattern: &str, find: FindType) -> Vec<String>
where
    I: Iterator<Item = (&'a str, SddsType)>,
{
    let pattern = WildcardPattern::new(pattern);
    items
        .filter(|(name, ty)| find.accepts(*ty) && pattern.matches(name, true))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn first_present<'a, I>(items: I, candidates: &[&str], find: FindType) -> Option<String>
where
    I: Iterator<Item = (&'a str, SddsType)> + Clone,
{
    candidates.iter().find_map(|candidate| {
        items
            .clone()
            .find(|(name, ty)| name == candidate && find.accepts(*ty))
            .map(|(name, _)| name.to_string())
    })
}

impl Dataset {
    // ----- columns -----

    /// Update column flags from `selector` under `logic`; returns the number
    /// of columns of interest.
    ///
    /// Newly selected columns join the selection order in the order the
    /// selector names them (definition order for patterns).
    pub fn set_columns_of_interest(&mut self, selector: &ColumnSelector, logic: Logic) -> Result<usize> {
        self.check_active()?;
        let names = self.layout.columns.names();
        let sensitive = logic.case_sensitive();
        let mut matched = vec![false; names.len()];
        let mut picked = Vec::new();
        match selector {
            ColumnSelector::Matching(pattern) => {
                let pattern = WildcardPattern::new(pattern);
                for (i, name) in names.iter().enumerate() {
                    if pattern.matches(name, sensitive) {
                        matched[i] = true;
                        picked.push(i);
                    }
                }
            }
            ColumnSelector::Names(_) | ColumnSelector::NamesString(_) => {
                for item in selector.items() {
                    let found = names.iter().position(|n| {
                        if sensitive {
                            *n == item
                        } else {
                            n.eq_ignore_ascii_case(&item)
                        }
                    });
                    let Some(i) = found else {
                        return Err(SddsError::schema(format!("no column named {item}")));
                    };
                    if !matched[i] {
                        matched[i] = true;
                        picked.push(i);
                    }
                }
            }
        }
        for (flag, &hit) in self.column_flags.iter_mut().zip(&matched) {
            *flag = logic.apply(*flag, hit);
        }
        let flags = &self.column_flags;
        let combines = (logic.contains(Logic::AND) || logic.contains(Logic::OR))
            && !logic.contains(Logic::ZERO_PREVIOUS)
            && !logic.contains(Logic::ONE_PREVIOUS);
        let mut order: Vec<usize> = if combines {
            self.column_order.iter().copied().filter(|&c| flags[c]).collect()
        } else {
            Vec::new()
        };
        for c in picked.into_iter().chain(0..flags.len()) {
            if flags[c] && !order.contains(&c) {
                order.push(c);
            }
        }
        self.column_order = order;
        tracing::trace!(selected = self.column_order.len(), ?logic, "columns of interest");
        Ok(self.column_order.len())
    }

    #[must_use]
    pub fn count_columns_of_interest(&self) -> usize {
        self.column_flags.iter().filter(|&&f| f).count()
    }

    /// Names of the columns of interest in selection order.
    #[must_use]
    pub fn columns_of_interest(&self) -> Vec<String> {
        self.column_order
            .iter()
            .filter_map(|&c| self.layout.columns.get(c))
            .map(|d| d.name.clone())
            .collect()
    }

    #[must_use]
    pub fn column_flags(&self) -> &[bool] {
        &self.column_flags
    }

    /// Replace every column flag; missing entries are unset.
    pub fn assert_column_flags(&mut self, flags: &[bool]) -> Result<()> {
        self.check_active()?;
        for (i, flag) in self.column_flags.iter_mut().enumerate() {
            *flag = flags.get(i).copied().unwrap_or(false);
        }
        self.column_order = (0..self.column_flags.len()).filter(|&c| self.column_flags[c]).collect();
        Ok(())
    }

    /// Set the flags of columns in `range` to `value`.
    pub fn assert_column_flags_range(&mut self, range: Range<usize>, value: bool) -> Result<()> {
        self.check_active()?;
        if range.end > self.column_flags.len() {
            return Err(SddsError::bounds(format!(
                "column range {range:?} past {} columns",
                self.column_flags.len()
            )));
        }
        for c in range {
            self.column_flags[c] = value;
            if value && !self.column_order.contains(&c) {
                self.column_order.push(c);
            }
        }
        let flags = &self.column_flags;
        self.column_order.retain(|&c| flags[c]);
        Ok(())
    }

    /// Remove column definitions that are not of interest.
    pub fn delete_unset_columns(&mut self) -> Result<()> {
        self.ensure_layout_editable("delete_unset_columns")?;
        let flags = self.column_flags.clone();
        let mut renumber = vec![None; flags.len()];
        let mut next = 0;
        for (i, &keep) in flags.iter().enumerate() {
            if keep {
                renumber[i] = Some(next);
                next += 1;
            }
        }
        self.layout.columns.retain_flagged(&flags);
        self.column_order = self.column_order.iter().filter_map(|&c| renumber[c]).collect();
        self.column_flags = vec![true; next];
        self.store.reshape(&self.layout, 0);
        Ok(())
    }

    // ----- rows -----

    #[must_use]
    pub fn count_rows_of_interest(&self) -> usize {
        self.store.rows_of_interest()
    }

    /// Flags of the rows in memory.
    #[must_use]
    pub fn row_flags(&self) -> &[bool] {
        &self.store.row_flags[..self.store.n_rows.min(self.store.row_flags.len())]
    }

    /// Replace the flags of the rows in memory; missing entries are unset.
    pub fn assert_row_flags(&mut self, flags: &[bool]) -> Result<()> {
        self.require_page("assert_row_flags")?;
        for (i, flag) in self.store.row_flags.iter_mut().take(self.store.n_rows).enumerate() {
            *flag = flags.get(i).copied().unwrap_or(false);
        }
        Ok(())
    }

    /// Set the flags of memory rows in `range` to `value`.
    pub fn assert_row_flags_range(&mut self, range: Range<usize>, value: bool) -> Result<()> {
        self.require_page("assert_row_flags_range")?;
        if range.end > self.store.n_rows {
            return Err(SddsError::bounds(format!(
                "row range {range:?} past {} rows",
                self.store.n_rows
            )));
        }
        for r in range {
            self.store.row_flags[r] = value;
        }
        Ok(())
    }

    fn combine_rows<F>(&mut self, logic: Logic, mut matched: F) -> usize
    where
        F: FnMut(usize) -> bool,
    {
        let rows = self.store.n_rows;
        for r in 0..rows {
            let hit = matched(r);
            self.store.row_flags[r] = logic.apply(self.store.row_flags[r], hit);
        }
        self.store.rows_of_interest()
    }

    fn string_column(&self, name: &str) -> Result<Vec<String>> {
        let index = self
            .layout
            .columns
            .find(name)
            .ok_or_else(|| SddsError::schema(format!("no column named {name}")))?;
        match self.store.column_rows(index) {
            Some(ValueVec::String(values)) => Ok(values),
            Some(_) => Err(SddsError::schema(format!("column {name} is not a string column"))),
            None => Err(SddsError::bounds(format!("column {name} has no storage"))),
        }
    }

    /// Select rows whose `column` value lies in `lower..=upper`.
    pub fn filter_rows_of_interest(&mut self, column: &str, lower: f64, upper: f64, logic: Logic) -> Result<usize> {
        self.require_page("filter_rows_of_interest")?;
        let index = self
            .layout
            .columns
            .find(column)
            .ok_or_else(|| SddsError::schema(format!("no column named {column}")))?;
        let values = self
            .store
            .column_rows(index)
            .and_then(|data| data.to_f64())
            .ok_or_else(|| SddsError::schema(format!("column {column} is not numeric")))?;
        Ok(self.combine_rows(logic, |r| lower <= values[r] && values[r] <= upper))
    }

    /// Select rows whose string `column` matches a wildcard pattern.
    ///
    /// With [`Logic::INDIRECT_MATCH`], `pattern` names another string
    /// column whose value in the same row is the pattern.
    pub fn match_rows_of_interest(&mut self, column: &str, pattern: &str, logic: Logic) -> Result<usize> {
        self.require_page("match_rows_of_interest")?;
        let values = self.string_column(column)?;
        let sensitive = logic.case_sensitive();
        if logic.contains(Logic::INDIRECT_MATCH) {
            let patterns = self.string_column(pattern)?;
            Ok(self.combine_rows(logic, |r| WildcardPattern::new(&patterns[r]).matches(&values[r], sensitive)))
        } else {
            let pattern = WildcardPattern::new(pattern);
            Ok(self.combine_rows(logic, |r| pattern.matches(&values[r], sensitive)))
        }
    }

    /// Unselect rows whose string `column` fails the numeric-scan test.
    pub fn filter_rows_by_num_scan(&mut self, column: &str, mode: NumScanMode) -> Result<usize> {
        self.require_page("filter_rows_by_num_scan")?;
        let values = self.string_column(column)?;
        Ok(self.combine_rows(Logic::AND, |r| mode.selects(&values[r])))
    }

    /// Drop rows that are not of interest; returns how many were removed.
    pub fn delete_unset_rows(&mut self) -> Result<usize> {
        self.require_page("delete_unset_rows")?;
        if self.store.rows_flushed_in_mem > 0 {
            return Err(SddsError::unsupported(
                "delete_unset_rows: rows of this page are already on disk",
            ));
        }
        Ok(self.store.delete_unset_rows())
    }

    // ----- name searches -----

    /// Column names matching a wildcard pattern and type class, in definition order.
    #[must_use]
    pub fn match_column_names(&self, pattern: &str, find: FindType) -> Vec<String> {
        names_matching(
            self.layout.columns.iter().map(|d| (d.name(), d.sdds_type)),
            pattern,
            find,
        )
    }

    #[must_use]
    pub fn match_parameter_names(&self, pattern: &str, find: FindType) -> Vec<String> {
        names_matching(
            self.layout.parameters.iter().map(|d| (d.name(), d.sdds_type)),
            pattern,
            find,
        )
    }

    #[must_use]
    pub fn match_array_names(&self, pattern: &str, find: FindType) -> Vec<String> {
        names_matching(
            self.layout.arrays.iter().map(|d| (d.name(), d.sdds_type)),
            pattern,
            find,
        )
    }

    /// First of `candidates` that names a column of an accepted type.
    #[must_use]
    pub fn find_column(&self, find: FindType, candidates: &[&str]) -> Option<String> {
        first_present(
            self.layout.columns.iter().map(|d| (d.name(), d.sdds_type)),
            candidates,
            find,
        )
    }

    #[must_use]
    pub fn find_parameter(&self, find: FindType, candidates: &[&str]) -> Option<String> {
        first_present(
            self.layout.parameters.iter().map(|d| (d.name(), d.sdds_type)),
            candidates,
            find,
        )
    }

    #[must_use]
    pub fn find_array(&self, find: FindType, candidates: &[&str]) -> Option<String> {
        first_present(
            self.layout.arrays.iter().map(|d| (d.name(), d.sdds_type)),
            candidates,
            find,
        )
    }
}
