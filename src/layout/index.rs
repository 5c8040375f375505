//! Definition tables with a sorted name index.

use super::definitions::{Definition, FieldValue};
use crate::error::{Result, SddsError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name -> position map kept sorted for binary search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct NameIndex {
    sorted: Vec<(String, usize)>,
}

impl NameIndex {
    fn find(&self, name: &str) -> Option<usize> {
        self.sorted
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .ok()
            .map(|i| self.sorted[i].1)
    }

    fn insert(&mut self, name: &str, position: usize) {
        let at = self
            .sorted
            .binary_search_by(|(n, _)| n.as_str().cmp(name))
            .unwrap_or_else(|i| i);
        self.sorted.insert(at, (name.to_string(), position));
    }

    fn rebuild<'a>(&mut self, names: impl Iterator<Item = &'a str>) {
        self.sorted = names
            .enumerate()
            .map(|(i, n)| (n.to_string(), i))
            .collect();
        self.sorted.sort();
    }
}

/// Ordered definitions of one class plus their name index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinitionTable<D> {
    defs: Vec<D>,
    index: NameIndex,
}

impl<D> Default for DefinitionTable<D> {
    fn default() -> Self {
        Self {
            defs: Vec::new(),
            index: NameIndex::default(),
        }
    }
}

impl<D: Definition> DefinitionTable<D> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[D] {
        &self.defs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, D> {
        self.defs.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&D> {
        self.defs.get(index)
    }

    /// Position of `name`, in `O(log n)`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.index.find(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.defs.iter().map(|d| d.name().to_string()).collect()
    }

    /// Append a definition whose name must be unused.
    pub fn push(&mut self, def: D) -> Result<usize> {
        if self.find(def.name()).is_some() {
            return Err(SddsError::schema(format!(
                "{} {} already exists",
                D::KIND,
                def.name()
            )));
        }
        let position = self.defs.len();
        self.index.insert(def.name(), position);
        self.defs.push(def);
        Ok(position)
    }

    /// Replace the definition at `index`, keeping its position.
    pub fn replace(&mut self, index: usize, def: D) -> Result<()> {
        if let Some(existing) = self.find(def.name())
            && existing != index
        {
            return Err(SddsError::schema(format!(
                "{} {} already exists",
                D::KIND,
                def.name()
            )));
        }
        let slot = self
            .defs
            .get_mut(index)
            .ok_or_else(|| SddsError::bounds(format!("{} index {index} out of range", D::KIND)))?;
        *slot = def;
        self.reindex();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<D> {
        if index >= self.defs.len() {
            return Err(SddsError::bounds(format!("{} index {index} out of range", D::KIND)));
        }
        let def = self.defs.remove(index);
        self.reindex();
        Ok(def)
    }

    /// Keep the definitions whose flag is set.
    pub fn retain_flagged(&mut self, flags: &[bool]) {
        let mut i = 0;
        self.defs.retain(|_| {
            let keep = flags.get(i).copied().unwrap_or(false);
            i += 1;
            keep
        });
        self.reindex();
    }

    /// Change one field; renames keep names unique.
    pub fn set_field(&mut self, index: usize, field: &str, value: FieldValue) -> Result<()> {
        let mut updated = self
            .defs
            .get(index)
            .cloned()
            .ok_or_else(|| SddsError::bounds(format!("{} index {index} out of range", D::KIND)))?;
        updated.set_field(field, value)?;
        self.replace(index, updated)
    }

    fn reindex(&mut self) {
        self.index.rebuild(self.defs.iter().map(Definition::name));
    }
}

impl<D: Definition> From<Vec<D>> for DefinitionTable<D> {
    fn from(defs: Vec<D>) -> Self {
        let mut table = Self {
            defs,
            index: NameIndex::default(),
        };
        table.reindex();
        table
    }
}

impl<D: Definition + Serialize> Serialize for DefinitionTable<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.defs.serialize(serializer)
    }
}

impl<'de, D: Definition + Deserialize<'de>> Deserialize<'de> for DefinitionTable<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> std::result::Result<Self, De::Error> {
        Vec::<D>::deserialize(deserializer).map(Self::from)
    }
}
