//! Read-only resource catalog.
//!
//! Resources are registered by an outside collaborator into a table with an
//! integer `id` column and a text address column (`resources` / `pc` unless
//! configured otherwise). The engine only reads it.

use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::error::CatalogError;
use crate::field::PhysicalType;
use crate::record::Record;
use crate::storage::{Command, Condition, SelectedRow, TableDef};
use crate::value::Value;

const ID_COLUMN: &str = "id";

/// Filters for [`Engine::get_resources`]. Either may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuery {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "pc")]
    pub address: Option<String>,
}

impl ResourceQuery {
    /// Matches every resource.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches the resource with this id and address.
    pub fn exact(id: i64, address: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            address: Some(address.into()),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// A registered resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: i64,
    pub address: String,
    /// Every other column of the row.
    #[serde(flatten)]
    pub fields: Record,
}

/// The answer to a resource lookup: one record for an exact lookup, a list
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Resources {
    #[serde(rename = "resource")]
    One(ResourceRecord),
    #[serde(rename = "resources")]
    Many(Vec<ResourceRecord>),
}

impl Resources {
    /// Flattens the answer into a list.
    pub fn into_vec(self) -> Vec<ResourceRecord> {
        match self {
            Resources::One(record) => vec![record],
            Resources::Many(records) => records,
        }
    }
}

impl Engine {
    /// Looks up registered resources.
    ///
    /// With both `id` and `address`, returns the single match or
    /// [`CatalogError::NotFound`]. Otherwise returns every resource matching
    /// the filters that are given, ordered by id.
    #[tracing::instrument(skip(self))]
    pub fn get_resources(&self, query: &ResourceQuery) -> Result<Resources, CatalogError> {
        self.check_health()?;

        let Some(def) = self.describe(&self.resources.table)? else {
            return not_found_or_empty(query);
        };

        let (id_position, id_type) = column_of(&def, ID_COLUMN)?;
        let (address_position, address_type) = column_of(&def, self.resources.address.as_str())?;
        if !matches!(id_type, PhysicalType::Integer | PhysicalType::BigInt) {
            return Err(CatalogError::Malformed(format!(
                "`{ID_COLUMN}` is {id_type}, expected an integer"
            )));
        }
        if address_type != PhysicalType::Text {
            return Err(CatalogError::Malformed(format!(
                "`{}` is {address_type}, expected TEXT",
                self.resources.address
            )));
        }

        let mut conditions = Vec::new();
        if let Some(id) = query.id {
            let value = match id_type {
                PhysicalType::Integer => match i32::try_from(id) {
                    Ok(id) => Value::Int32(id),
                    // No INTEGER column can hold it.
                    Err(_) => return not_found_or_empty(query),
                },
                _ => Value::Int64(id),
            };
            conditions.push(Condition::new(def.columns[id_position].name.clone(), value));
        }
        if let Some(address) = &query.address {
            conditions.push(Condition::new(
                self.resources.address.clone(),
                Value::Text(address.clone()),
            ));
        }

        let rows = self
            .execute_one(Command::Select {
                table: self.resources.table.clone(),
                conditions,
                nearest: None,
                limit: None,
            })?
            .into_rows()?;

        let mut records: Vec<ResourceRecord> = rows
            .into_iter()
            .filter_map(|row| to_resource(&def, id_position, address_position, row))
            .collect();
        records.sort_by_key(|r| r.id);

        match (query.id, &query.address) {
            (Some(id), Some(address)) => records
                .into_iter()
                .next()
                .map(Resources::One)
                .ok_or_else(|| CatalogError::NotFound {
                    id,
                    address: address.clone(),
                }),
            _ => Ok(Resources::Many(records)),
        }
    }
}

fn not_found_or_empty(query: &ResourceQuery) -> Result<Resources, CatalogError> {
    match (query.id, &query.address) {
        (Some(id), Some(address)) => Err(CatalogError::NotFound {
            id,
            address: address.clone(),
        }),
        _ => Ok(Resources::Many(Vec::new())),
    }
}

fn column_of(def: &TableDef, name: &str) -> Result<(usize, PhysicalType), CatalogError> {
    def.column(name)
        .map(|(position, column)| (position, column.ty))
        .ok_or_else(|| CatalogError::Malformed(format!("missing column `{name}`")))
}

/// Converts a row, skipping rows without an id or an address.
fn to_resource(
    def: &TableDef,
    id_position: usize,
    address_position: usize,
    row: SelectedRow,
) -> Option<ResourceRecord> {
    let (Some(id), Some(address)) = (
        row.values[id_position].as_i64(),
        row.values[address_position].as_str(),
    ) else {
        tracing::warn!(row_id = row.row_id, "skipping resource without id or address");
        return None;
    };
    let address = address.to_string();

    let fields = def
        .columns
        .iter()
        .zip(&row.values)
        .enumerate()
        .filter(|(position, _)| *position != id_position && *position != address_position)
        .map(|(_, (column, value))| (column.name.to_string(), value.to_json()))
        .collect();

    Some(ResourceRecord {
        id,
        address,
        fields,
    })
}
