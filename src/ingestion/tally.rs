//! Per-column frequency of raw values.

use std::collections::HashMap;

use crate::types::{VariableCategory, VAR_QUANTITY};

/// Insertion-ordered map from a raw value to its occurrence count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyMap {
    entries: Vec<VariableCategory>,
    index: HashMap<String, usize>,
}

impl FrequencyMap {
    pub fn increment(&mut self, raw: &str) {
        match self.index.get(raw) {
            Some(&i) => self.entries[i].frequency += 1,
            None => {
                self.index.insert(raw.to_string(), self.entries.len());
                self.entries.push(VariableCategory {
                    value: raw.to_string(),
                    frequency: 1,
                });
            }
        }
    }

    pub fn frequency(&self, raw: &str) -> u64 {
        self.index.get(raw).map_or(0, |&i| self.entries[i].frequency)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct values with their counts, first-seen first.
    pub fn categories(&self) -> &[VariableCategory] {
        &self.entries
    }

    pub fn into_categories(self) -> Vec<VariableCategory> {
        self.entries
    }
}

/// Raw value frequencies for each of the output columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTally {
    columns: [FrequencyMap; VAR_QUANTITY],
}

impl Default for CategoryTally {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryTally {
    pub fn new() -> Self {
        Self {
            columns: std::array::from_fn(|_| FrequencyMap::default()),
        }
    }

    /// Count one raw value of column `column`. Indices past the schema are ignored.
    pub fn observe(&mut self, column: usize, raw: &str) {
        if let Some(map) = self.columns.get_mut(column) {
            map.increment(raw);
        }
    }

    /// Count every field of one line.
    pub fn observe_line<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        for (column, raw) in fields.into_iter().enumerate() {
            self.observe(column, raw);
        }
    }

    pub fn column(&self, column: usize) -> Option<&FrequencyMap> {
        self.columns.get(column)
    }

    /// Category lists in column order.
    pub fn into_categories(self) -> [Vec<VariableCategory>; VAR_QUANTITY] {
        self.columns.map(FrequencyMap::into_categories)
    }
}
