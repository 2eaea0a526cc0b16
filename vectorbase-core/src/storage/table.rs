//! In-memory typed tables.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::error::RowError;
use crate::field::PhysicalType;
use crate::ident::Ident;
use crate::value::{IndexKey, Value};

/// Internal row identifier, increasing in insertion order.
pub type RowId = u64;

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: Ident,
    pub ty: PhysicalType,
    #[serde(default)]
    pub primary_key: bool,
    /// Column metadata: callers may supply text to be embedded.
    #[serde(default)]
    pub embeddable: bool,
}

impl ColumnDef {
    pub fn new(name: Ident, ty: PhysicalType) -> Self {
        Self {
            name,
            ty,
            primary_key: false,
            embeddable: false,
        }
    }

    /// Marks the column as the primary key. Chainable.
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as embeddable. Chainable.
    pub fn embeddable(mut self) -> Self {
        self.embeddable = true;
        self
    }
}

/// A table definition: name and ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: Ident,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: Ident, columns: Vec<ColumnDef>) -> Self {
        Self { name, columns }
    }

    /// Finds a column by name, returning its position.
    pub fn column(&self, name: &str) -> Option<(usize, &ColumnDef)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name.as_str() == name)
    }

    /// Returns the primary-key column, if any.
    pub fn primary_key(&self) -> Option<(usize, &ColumnDef)> {
        self.columns.iter().enumerate().find(|(_, c)| c.primary_key)
    }
}

/// A row returned by a select.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRow {
    pub row_id: RowId,
    /// Values in column order.
    pub values: Vec<Value>,
    /// Distance from the query, for nearest-neighbor selects.
    pub distance: Option<f32>,
}

/// A table's rows plus its primary-key index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    def: TableDef,
    rows: BTreeMap<RowId, Vec<Value>>,
    next_row_id: RowId,
    #[serde(skip)]
    keys: HashMap<IndexKey, RowId>,
}

impl Table {
    /// Creates an empty table.
    pub fn new(def: TableDef) -> Self {
        Self {
            def,
            rows: BTreeMap::new(),
            next_row_id: 1,
            keys: HashMap::new(),
        }
    }

    #[inline]
    pub fn def(&self) -> &TableDef {
        &self.def
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inserts a row given as `(column position, value)` pairs.
    ///
    /// Columns not mentioned are NULL. Checks types, dimensions, and the
    /// primary key's NOT NULL and uniqueness constraints.
    pub fn insert(&mut self, cells: Vec<(usize, Value)>) -> Result<RowId, RowError> {
        let mut row = vec![Value::Null; self.def.columns.len()];
        let mut seen = vec![false; self.def.columns.len()];

        for (position, value) in cells {
            let column = &self.def.columns[position];
            if std::mem::replace(&mut seen[position], true) {
                return Err(RowError::DuplicateColumn(column.name.to_string()));
            }
            value.check_fits(column.name.as_str(), &column.ty)?;
            row[position] = value;
        }

        let key = match self.def.primary_key() {
            Some((position, column)) => {
                let key = row[position]
                    .index_key()
                    .ok_or_else(|| RowError::NullPrimaryKey(column.name.to_string()))?;
                if self.keys.contains_key(&key) {
                    return Err(RowError::DuplicateKey(column.name.to_string()));
                }
                Some(key)
            }
            None => None,
        };

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        if let Some(key) = key {
            self.keys.insert(key, row_id);
        }
        self.rows.insert(row_id, row);

        Ok(row_id)
    }

    /// Removes rows matching every condition, returning them.
    pub fn delete_where(&mut self, conditions: &[(usize, Value)]) -> Vec<(RowId, Vec<Value>)> {
        let ids: Vec<RowId> = self
            .rows
            .iter()
            .filter(|(_, row)| matches_all(row, conditions))
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.remove_row(id).map(|row| (id, row)))
            .collect()
    }

    /// Removes a single row.
    pub fn remove_row(&mut self, row_id: RowId) -> Option<Vec<Value>> {
        let row = self.rows.remove(&row_id)?;
        if let Some(key) = self.key_of(&row) {
            self.keys.remove(&key);
        }
        Some(row)
    }

    /// Puts back a row removed earlier, under its original id.
    pub fn restore_row(&mut self, row_id: RowId, row: Vec<Value>) {
        if let Some(key) = self.key_of(&row) {
            self.keys.insert(key, row_id);
        }
        self.rows.insert(row_id, row);
    }

    /// Selects rows matching every condition.
    ///
    /// With `nearest`, rows are ordered by distance ascending, ties by row id;
    /// rows whose vector is NULL are skipped. Without it, rows come back in
    /// insertion order.
    pub fn select(
        &self,
        conditions: &[(usize, Value)],
        nearest: Option<(usize, Metric, &[f32])>,
        limit: Option<usize>,
    ) -> Vec<SelectedRow> {
        let limit = limit.unwrap_or(usize::MAX);
        let matching = self
            .rows
            .iter()
            .filter(|(_, row)| matches_all(row, conditions));

        let Some((position, metric, query)) = nearest else {
            return matching
                .take(limit)
                .map(|(id, row)| SelectedRow {
                    row_id: *id,
                    values: row.clone(),
                    distance: None,
                })
                .collect();
        };

        let mut scored: Vec<(RowId, f32)> = matching
            .filter_map(|(id, row)| {
                row[position]
                    .as_vector()
                    .map(|v| (*id, ranked_distance(metric, query, v)))
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);

        scored
            .into_iter()
            .filter_map(|(id, distance)| {
                self.rows.get(&id).map(|row| SelectedRow {
                    row_id: id,
                    values: row.clone(),
                    distance: Some(distance),
                })
            })
            .collect()
    }

    /// Rebuilds the primary-key index after deserialization.
    pub(crate) fn rebuild_keys(&mut self) {
        let keys: HashMap<IndexKey, RowId> = self
            .rows
            .iter()
            .filter_map(|(id, row)| self.key_of(row).map(|key| (key, *id)))
            .collect();
        self.keys = keys;
    }

    fn key_of(&self, row: &[Value]) -> Option<IndexKey> {
        let (position, _) = self.def.primary_key()?;
        row[position].index_key()
    }
}

/// Distance used for ranking. An undefined (NaN) distance ranks last.
fn ranked_distance(metric: Metric, query: &[f32], vector: &[f32]) -> f32 {
    let distance = metric.distance(query, vector);
    if distance.is_nan() {
        f32::INFINITY
    } else {
        distance
    }
}

fn matches_all(row: &[Value], conditions: &[(usize, Value)]) -> bool {
    conditions
        .iter()
        .all(|(position, value)| !value.is_null() && row[*position] == *value)
}
