//! Conditional deletion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::{Deadline, Engine};
use crate::error::{DeleteError, RowError, StorageError};
use crate::ident::Ident;
use crate::storage::{Command, Condition, TableDef};
use crate::value::Value;

/// An equality conjunction: every `field = value` must hold.
pub type Conditions = BTreeMap<String, JsonValue>;

/// Acknowledges a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAck {
    pub deleted_count: u64,
}

/// Why a condition could not be turned into a storage condition.
pub(crate) enum ConditionError {
    UnknownField(String),
    Invalid(RowError),
}

/// Resolves caller conditions against a table definition.
///
/// Values are coerced to their column type; `null` never matches under
/// equality, so it is rejected rather than silently matching nothing.
pub(crate) fn resolve_conditions(
    def: &TableDef,
    conditions: &Conditions,
) -> Result<Vec<Condition>, ConditionError> {
    conditions
        .iter()
        .map(|(field, json)| {
            let (_, column) = def
                .column(field)
                .ok_or_else(|| ConditionError::UnknownField(field.clone()))?;
            let value = Value::from_json(field, json, &column.ty).map_err(ConditionError::Invalid)?;
            if value.is_null() {
                return Err(ConditionError::Invalid(RowError::TypeMismatch {
                    field: field.clone(),
                    expected: column.ty.to_string(),
                    got: "null".into(),
                }));
            }
            Ok(Condition::new(column.name.clone(), value))
        })
        .collect()
}

impl Engine {
    /// Deletes every row of `collection` matching all `conditions`.
    ///
    /// Empty conditions are refused with [`DeleteError::UnsafeDeleteAll`].
    pub fn delete(&self, collection: &str, conditions: &Conditions) -> Result<DeleteAck, DeleteError> {
        self.delete_within(collection, conditions, Deadline::none())
    }

    #[tracing::instrument(skip(self, conditions, deadline), fields(conditions = conditions.len()))]
    pub(crate) fn delete_within(
        &self,
        collection: &str,
        conditions: &Conditions,
        deadline: Deadline,
    ) -> Result<DeleteAck, DeleteError> {
        if conditions.is_empty() {
            tracing::debug!("refusing unconditional delete");
            return Err(DeleteError::UnsafeDeleteAll);
        }
        self.check_health()?;
        let table = Ident::new(collection)?;

        let def = self
            .describe(&table)?
            .ok_or_else(|| DeleteError::UnknownCollection(collection.to_string()))?;
        let conditions = resolve_conditions(&def, conditions).map_err(|e| match e {
            ConditionError::UnknownField(field) => DeleteError::UnknownField(field),
            ConditionError::Invalid(cause) => DeleteError::InvalidCondition(cause),
        })?;

        let outcome = match self.execute_one_within(Command::Delete { table, conditions }, deadline) {
            Ok(outcome) => outcome,
            Err(StorageError::NoSuchTable(_)) => {
                return Err(DeleteError::UnknownCollection(collection.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let deleted_count = outcome.into_deleted()?;
        tracing::debug!(deleted_count, "rows deleted");
        Ok(DeleteAck { deleted_count })
    }
}
