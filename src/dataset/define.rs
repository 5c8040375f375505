//! Schema editing: define, transfer, inspect, change and delete definitions.

use super::{Dataset, State};
use crate::error::{Result, SddsError};
use crate::layout::{
    check_field_length, ArrayDefinition, AssociateDefinition, ColumnDefinition, Definition,
    DefinitionTable, FieldValue, Layout, ParameterDefinition,
};
use crate::types::SddsType;

/// Addresses a definition by position or by name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefinitionKey {
    Index(usize),
    Name(String),
}

impl From<usize> for DefinitionKey {
    fn from(index: usize) -> Self {
        DefinitionKey::Index(index)
    }
}

impl From<&str> for DefinitionKey {
    fn from(name: &str) -> Self {
        DefinitionKey::Name(name.to_string())
    }
}

impl From<String> for DefinitionKey {
    fn from(name: String) -> Self {
        DefinitionKey::Name(name)
    }
}

/// What a bulk transfer does when the target already has the name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// Fail on the first collision.
    #[default]
    Strict,
    /// Keep the target's definition.
    KeepOld,
    /// Replace the target's definition with the source's.
    Overwrite,
}

fn resolve<D: Definition>(table: &DefinitionTable<D>, key: &DefinitionKey) -> Result<usize> {
    match key {
        DefinitionKey::Index(i) if *i < table.len() => Ok(*i),
        DefinitionKey::Index(i) => Err(SddsError::bounds(format!(
            "{} index {i} out of range ({} defined)",
            D::KIND,
            table.len()
        ))),
        DefinitionKey::Name(name) => table
            .find(name)
            .ok_or_else(|| SddsError::schema(format!("no {} named {name}", D::KIND))),
    }
}

fn information<D: Definition>(table: &DefinitionTable<D>, field: &str, key: &DefinitionKey) -> Result<FieldValue> {
    let index = resolve(table, key)?;
    table
        .get(index)
        .and_then(|def| def.field(field))
        .ok_or_else(|| SddsError::schema(format!("&{} has no field \"{field}\"", D::KIND)))
}

fn change<D, F>(table: &mut DefinitionTable<D>, field: &str, value: &str, key: &DefinitionKey, check: F) -> Result<()>
where
    D: Definition,
    F: FnOnce(&D) -> Result<()>,
{
    let index = resolve(table, key)?;
    let spec = D::field_spec(field)
        .ok_or_else(|| SddsError::schema(format!("&{} has no field \"{field}\"", D::KIND)))?;
    let value = FieldValue::parse(spec, value).map_err(|e| SddsError::schema(e.to_string()))?;
    let mut updated = table
        .get(index)
        .cloned()
        .ok_or_else(|| SddsError::bounds(format!("{} index {index} out of range", D::KIND)))?;
    updated.set_field(field, value)?;
    check(&updated)?;
    table.replace(index, updated)
}

fn lookup<'a, D: Definition>(table: &'a DefinitionTable<D>, name: &str) -> Result<&'a D> {
    table
        .find(name)
        .and_then(|i| table.get(i))
        .ok_or_else(|| SddsError::schema(format!("no {} named {name}", D::KIND)))
}

impl Dataset {
    fn defined(&mut self) {
        if self.state == State::Idle {
            self.state = State::Defining;
        }
    }

    pub fn define_parameter(&mut self, def: ParameterDefinition) -> Result<usize> {
        self.ensure_layout_editable("define_parameter")?;
        let index = self.layout.add_parameter(def)?;
        self.defined();
        Ok(index)
    }

    pub fn define_column(&mut self, def: ColumnDefinition) -> Result<usize> {
        self.ensure_layout_editable("define_column")?;
        let index = self.layout.add_column(def)?;
        self.column_flags.push(true);
        self.column_order.push(index);
        self.defined();
        Ok(index)
    }

    pub fn define_array(&mut self, def: ArrayDefinition) -> Result<usize> {
        self.ensure_layout_editable("define_array")?;
        let index = self.layout.add_array(def)?;
        self.defined();
        Ok(index)
    }

    pub fn define_associate(&mut self, def: AssociateDefinition) -> Result<usize> {
        self.ensure_layout_editable("define_associate")?;
        let index = self.layout.add_associate(def)?;
        self.defined();
        Ok(index)
    }

    pub fn define_simple_column(&mut self, name: &str, units: Option<&str>, ty: SddsType) -> Result<usize> {
        let mut def = ColumnDefinition::new(name, ty);
        def.units = units.map(str::to_string);
        self.define_column(def)
    }

    pub fn define_simple_parameter(&mut self, name: &str, units: Option<&str>, ty: SddsType) -> Result<usize> {
        let mut def = ParameterDefinition::new(name, ty);
        def.units = units.map(str::to_string);
        self.define_parameter(def)
    }

    /// Define a column here shaped like parameter `name` of `source`.
    pub fn define_column_like_parameter(&mut self, source: &Dataset, name: &str, new_name: Option<&str>) -> Result<usize> {
        let p = lookup(&source.layout.parameters, name)?;
        self.define_column(ColumnDefinition {
            name: new_name.unwrap_or(name).to_string(),
            symbol: p.symbol.clone(),
            units: p.units.clone(),
            description: p.description.clone(),
            format_string: p.format_string.clone(),
            sdds_type: p.sdds_type,
            field_length: 0,
        })
    }

    /// Define a parameter here shaped like column `name` of `source`.
    pub fn define_parameter_like_column(&mut self, source: &Dataset, name: &str, new_name: Option<&str>) -> Result<usize> {
        let c = lookup(&source.layout.columns, name)?;
        self.define_parameter(ParameterDefinition {
            name: new_name.unwrap_or(name).to_string(),
            symbol: c.symbol.clone(),
            units: c.units.clone(),
            description: c.description.clone(),
            format_string: c.format_string.clone(),
            sdds_type: c.sdds_type,
            fixed_value: None,
        })
    }

    pub fn transfer_column_definition(&mut self, source: &Dataset, name: &str, new_name: Option<&str>) -> Result<usize> {
        let mut def = lookup(&source.layout.columns, name)?.clone();
        if let Some(new_name) = new_name {
            def.name = new_name.to_string();
        }
        self.define_column(def)
    }

    pub fn transfer_parameter_definition(&mut self, source: &Dataset, name: &str, new_name: Option<&str>) -> Result<usize> {
        let mut def = lookup(&source.layout.parameters, name)?.clone();
        if let Some(new_name) = new_name {
            def.name = new_name.to_string();
        }
        self.define_parameter(def)
    }

    pub fn transfer_array_definition(&mut self, source: &Dataset, name: &str, new_name: Option<&str>) -> Result<usize> {
        let mut def = lookup(&source.layout.arrays, name)?.clone();
        if let Some(new_name) = new_name {
            def.name = new_name.to_string();
        }
        self.define_array(def)
    }

    pub fn transfer_associate_definition(&mut self, source: &Dataset, name: &str, new_name: Option<&str>) -> Result<usize> {
        let mut def = lookup(&source.layout.associates, name)?.clone();
        if let Some(new_name) = new_name {
            def.name = new_name.to_string();
        }
        self.define_associate(def)
    }

    /// Transfer every column definition of `source`. Returns how many were added or replaced.
    pub fn transfer_all_column_definitions(&mut self, source: &Dataset, mode: TransferMode) -> Result<usize> {
        self.ensure_layout_editable("transfer_all_column_definitions")?;
        let mut moved = 0;
        for def in source.layout.columns.iter() {
            match (self.layout.columns.find(&def.name), mode) {
                (None, _) => {
                    self.define_column(def.clone())?;
                }
                (Some(_), TransferMode::KeepOld) => continue,
                (Some(i), TransferMode::Overwrite) => self.layout.columns.replace(i, def.clone())?,
                (Some(_), TransferMode::Strict) => {
                    return Err(SddsError::schema(format!("column {} already exists", def.name)));
                }
            }
            moved += 1;
        }
        self.defined();
        Ok(moved)
    }

    pub fn transfer_all_parameter_definitions(&mut self, source: &Dataset, mode: TransferMode) -> Result<usize> {
        self.ensure_layout_editable("transfer_all_parameter_definitions")?;
        let mut moved = 0;
        for def in source.layout.parameters.iter() {
            match (self.layout.parameters.find(&def.name), mode) {
                (None, _) => {
                    self.layout.add_parameter(def.clone())?;
                }
                (Some(_), TransferMode::KeepOld) => continue,
                (Some(i), TransferMode::Overwrite) => self.layout.parameters.replace(i, def.clone())?,
                (Some(_), TransferMode::Strict) => {
                    return Err(SddsError::schema(format!("parameter {} already exists", def.name)));
                }
            }
            moved += 1;
        }
        self.defined();
        Ok(moved)
    }

    pub fn transfer_all_array_definitions(&mut self, source: &Dataset, mode: TransferMode) -> Result<usize> {
        self.ensure_layout_editable("transfer_all_array_definitions")?;
        let mut moved = 0;
        for def in source.layout.arrays.iter() {
            match (self.layout.arrays.find(&def.name), mode) {
                (None, _) => {
                    self.layout.add_array(def.clone())?;
                }
                (Some(_), TransferMode::KeepOld) => continue,
                (Some(i), TransferMode::Overwrite) => self.layout.arrays.replace(i, def.clone())?,
                (Some(_), TransferMode::Strict) => {
                    return Err(SddsError::schema(format!("array {} already exists", def.name)));
                }
            }
            moved += 1;
        }
        self.defined();
        Ok(moved)
    }

    // ----- lookup -----

    #[must_use]
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.layout.columns.find(name)
    }

    #[must_use]
    pub fn get_parameter_index(&self, name: &str) -> Option<usize> {
        self.layout.parameters.find(name)
    }

    #[must_use]
    pub fn get_array_index(&self, name: &str) -> Option<usize> {
        self.layout.arrays.find(name)
    }

    #[must_use]
    pub fn get_associate_index(&self, name: &str) -> Option<usize> {
        self.layout.associates.find(name)
    }

    #[must_use]
    pub fn get_column_names(&self) -> Vec<String> {
        self.layout.columns.names()
    }

    #[must_use]
    pub fn get_parameter_names(&self) -> Vec<String> {
        self.layout.parameters.names()
    }

    #[must_use]
    pub fn get_array_names(&self) -> Vec<String> {
        self.layout.arrays.names()
    }

    #[must_use]
    pub fn column_definition(&self, name: &str) -> Option<&ColumnDefinition> {
        self.layout.columns.find(name).and_then(|i| self.layout.columns.get(i))
    }

    #[must_use]
    pub fn parameter_definition(&self, name: &str) -> Option<&ParameterDefinition> {
        self.layout.parameters.find(name).and_then(|i| self.layout.parameters.get(i))
    }

    #[must_use]
    pub fn array_definition(&self, name: &str) -> Option<&ArrayDefinition> {
        self.layout.arrays.find(name).and_then(|i| self.layout.arrays.get(i))
    }

    // ----- field access -----

    /// One field of a column definition, e.g. `units` or `type`.
    pub fn get_column_information(&self, field: &str, key: impl Into<DefinitionKey>) -> Result<FieldValue> {
        self.check_active()?;
        information(&self.layout.columns, field, &key.into())
    }

    pub fn get_parameter_information(&self, field: &str, key: impl Into<DefinitionKey>) -> Result<FieldValue> {
        self.check_active()?;
        information(&self.layout.parameters, field, &key.into())
    }

    pub fn get_array_information(&self, field: &str, key: impl Into<DefinitionKey>) -> Result<FieldValue> {
        self.check_active()?;
        information(&self.layout.arrays, field, &key.into())
    }

    pub fn get_associate_information(&self, field: &str, key: impl Into<DefinitionKey>) -> Result<FieldValue> {
        self.check_active()?;
        information(&self.layout.associates, field, &key.into())
    }

    /// Change one field from its text form. Renames must stay unique.
    pub fn change_column_information(&mut self, field: &str, value: &str, key: impl Into<DefinitionKey>) -> Result<()> {
        self.ensure_layout_editable("change_column_information")?;
        change(&mut self.layout.columns, field, value, &key.into(), |def| {
            check_field_length(def.field_length, def.sdds_type, &def.name)
        })
    }

    pub fn change_parameter_information(&mut self, field: &str, value: &str, key: impl Into<DefinitionKey>) -> Result<()> {
        self.ensure_layout_editable("change_parameter_information")?;
        change(&mut self.layout.parameters, field, value, &key.into(), |_| Ok(()))
    }

    pub fn change_array_information(&mut self, field: &str, value: &str, key: impl Into<DefinitionKey>) -> Result<()> {
        self.ensure_layout_editable("change_array_information")?;
        change(&mut self.layout.arrays, field, value, &key.into(), |def| {
            check_field_length(def.field_length, def.sdds_type, &def.name)
        })
    }

    pub fn change_associate_information(&mut self, field: &str, value: &str, key: impl Into<DefinitionKey>) -> Result<()> {
        self.ensure_layout_editable("change_associate_information")?;
        change(&mut self.layout.associates, field, value, &key.into(), |_| Ok(()))
    }

    // ----- removal -----

    pub fn delete_column(&mut self, name: &str) -> Result<()> {
        self.ensure_layout_editable("delete_column")?;
        let index = resolve(&self.layout.columns, &name.into())?;
        self.layout.columns.remove(index)?;
        self.column_flags.remove(index);
        self.column_order.retain(|&c| c != index);
        for c in &mut self.column_order {
            if *c > index {
                *c -= 1;
            }
        }
        Ok(())
    }

    pub fn delete_parameter(&mut self, name: &str) -> Result<()> {
        self.ensure_layout_editable("delete_parameter")?;
        let index = resolve(&self.layout.parameters, &name.into())?;
        self.layout.parameters.remove(index).map(drop)
    }

    pub fn delete_array(&mut self, name: &str) -> Result<()> {
        self.ensure_layout_editable("delete_array")?;
        let index = resolve(&self.layout.arrays, &name.into())?;
        self.layout.arrays.remove(index).map(drop)
    }

    // ----- whole-layout operations -----

    /// Keep a copy of the current layout for [`restore_layout`](Self::restore_layout).
    pub fn save_layout(&mut self) -> Result<()> {
        self.check_active()?;
        self.saved_layout = Some(self.layout.clone());
        Ok(())
    }

    pub fn restore_layout(&mut self) -> Result<()> {
        self.ensure_layout_editable("restore_layout")?;
        let layout = self
            .saved_layout
            .clone()
            .ok_or_else(|| SddsError::protocol("restore_layout: no layout was saved"))?;
        self.replace_layout(layout);
        Ok(())
    }

    /// Swap in a whole layout before it is written; all columns become of interest.
    pub(crate) fn replace_layout(&mut self, layout: Layout) {
        let columns = layout.columns.len();
        self.layout = layout;
        self.column_flags = vec![true; columns];
        self.column_order = (0..columns).collect();
        self.store.reshape(&self.layout, 0);
        self.defined();
    }

    pub fn set_description(&mut self, text: Option<&str>, contents: Option<&str>) -> Result<()> {
        self.ensure_layout_editable("set_description")?;
        self.layout.description.text = text.map(str::to_string);
        self.layout.description.contents = contents.map(str::to_string);
        Ok(())
    }

    /// The layout as pretty-printed JSON.
    pub fn layout_json(&self) -> Result<String> {
        self.layout
            .to_json()
            .map_err(|e| SddsError::unsupported(format!("layout JSON: {e}")))
    }
}
