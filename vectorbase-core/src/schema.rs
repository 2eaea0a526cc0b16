//! Collection schemas and the schema operations of the engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::engine::{Ack, Deadline, Engine};
use crate::error::{FieldIssue, FieldProblem, SchemaError, SearchError, StorageError};
use crate::field::FieldSpec;
use crate::ident::Ident;
use crate::storage::{ColumnDef, Command, Outcome, TableDef};

/// A collection definition: a name and its ordered fields.
///
/// # Example
///
/// ```
/// use vectorbase_core::{CollectionSchema, FieldSpec};
///
/// let schema = CollectionSchema::new("docs")
///     .with_field(FieldSpec::int64("id").primary())
///     .with_field(FieldSpec::string("text"))
///     .with_field(FieldSpec::vector("embedding", 3));
///
/// assert_eq!(schema.primary_key().map(|f| f.name.as_str()), Some("id"));
/// assert!(schema.to_table_def().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field. Chainable.
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.is_primary)
    }

    /// Validates the schema and builds the table definition for it.
    ///
    /// Every field is checked; all problems are reported together in
    /// [`SchemaError::InvalidFields`].
    pub fn to_table_def(&self) -> Result<TableDef, SchemaError> {
        let name = Ident::new(self.name.as_str())?;
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields(self.name.clone()));
        }

        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let mut problem = |problem: FieldProblem| {
                issues.push(FieldIssue {
                    field: field.name.clone(),
                    problem,
                })
            };

            if !seen.insert(field.name.as_str()) {
                problem(FieldProblem::Duplicate);
                continue;
            }

            let ident = Ident::new(field.name.as_str()).map_err(|e| problem(e.into()));
            let ty = field.resolve().map_err(|e| problem(e.into()));
            if let Ok(ty) = ty {
                if field.is_primary && ty.is_vector() {
                    problem(FieldProblem::VectorPrimaryKey);
                    continue;
                }
            }

            if let (Ok(ident), Ok(ty)) = (ident, ty) {
                let mut column = ColumnDef::new(ident, ty);
                column.primary_key = field.is_primary;
                column.embeddable = field.embeddable;
                columns.push(column);
            }
        }

        if !issues.is_empty() {
            return Err(SchemaError::InvalidFields(issues));
        }

        let primaries = columns.iter().filter(|c| c.primary_key).count();
        if primaries > 1 {
            return Err(SchemaError::MultiplePrimaryKeys(primaries));
        }

        Ok(TableDef::new(name, columns))
    }

    /// Reads a schema back from a table definition.
    pub fn from_table_def(def: &TableDef) -> Self {
        let fields = def
            .columns
            .iter()
            .map(|column| {
                let mut field = FieldSpec::new(column.name.as_str(), column.ty.logical());
                field.dimension = column.ty.dimension().map(|d| d as u32);
                field.is_primary = column.primary_key;
                field.embeddable = column.embeddable;
                field
            })
            .collect();

        Self {
            name: def.name.to_string(),
            fields,
        }
    }
}

impl Engine {
    /// Creates the table backing `schema`, or accepts an identical one.
    ///
    /// A table of the same name with a different shape is a
    /// [`SchemaError::SchemaConflict`].
    pub fn create_collection(&self, schema: &CollectionSchema) -> Result<Ack, SchemaError> {
        self.create_collection_within(schema, Deadline::none())
    }

    #[tracing::instrument(skip(self, schema, deadline), fields(collection = %schema.name))]
    pub(crate) fn create_collection_within(
        &self,
        schema: &CollectionSchema,
        deadline: Deadline,
    ) -> Result<Ack, SchemaError> {
        self.check_health()?;

        let def = schema.to_table_def().map_err(|e| {
            tracing::debug!(error = %e, "schema rejected");
            e
        })?;
        if def.name.as_str().eq_ignore_ascii_case(self.resources.table.as_str()) {
            return Err(SchemaError::ReservedName(schema.name.clone()));
        }

        let outcome = self.execute_one_within(
            Command::CreateTable {
                def: def.clone(),
                if_not_exists: true,
            },
            deadline,
        )?;

        match outcome {
            Outcome::Created => {
                tracing::info!(columns = def.columns.len(), "collection created");
                Ok(Ack::new(def.name.as_str()))
            }
            Outcome::Existing(existing) if existing == def => Ok(Ack::new(def.name.as_str())),
            Outcome::Existing(_) => Err(SchemaError::SchemaConflict(schema.name.clone())),
            _ => Err(StorageError::UnexpectedOutcome("table creation").into()),
        }
    }

    /// Drops a collection. Dropping a missing collection succeeds.
    pub fn drop_collection(&self, name: &str) -> Result<Ack, SchemaError> {
        self.drop_collection_within(name, Deadline::none())
    }

    #[tracing::instrument(skip(self, deadline))]
    pub(crate) fn drop_collection_within(
        &self,
        name: &str,
        deadline: Deadline,
    ) -> Result<Ack, SchemaError> {
        self.check_health()?;
        let name = Ident::new(name)?;

        let outcome = self.execute_one_within(
            Command::DropTable {
                name: name.clone(),
                if_exists: true,
            },
            deadline,
        )?;
        if let Outcome::Dropped(true) = outcome {
            tracing::info!("collection dropped");
        }
        Ok(Ack::new(name.as_str()))
    }

    /// Returns the schema of a collection, if it exists.
    pub fn describe_collection(&self, name: &str) -> Result<Option<CollectionSchema>, SchemaError> {
        self.check_health()?;
        let name = Ident::new(name)?;
        Ok(self
            .describe(&name)?
            .as_ref()
            .map(CollectionSchema::from_table_def))
    }

    /// Lists collection names in order. The resource table is not listed.
    pub fn list_collections(&self) -> Result<Vec<String>, SchemaError> {
        self.check_health()?;
        let names = self.execute_one(Command::ListTables)?.into_tables()?;
        Ok(names
            .into_iter()
            .filter(|name| *name != self.resources.table)
            .map(String::from)
            .collect())
    }

    /// Counts the rows of a collection.
    pub fn count(&self, collection: &str) -> Result<u64, SearchError> {
        self.check_health()?;
        let table = Ident::new(collection)?;
        match self.execute_one(Command::Count { table }) {
            Ok(outcome) => Ok(outcome.into_count()?),
            Err(StorageError::NoSuchTable(_)) => {
                Err(SearchError::UnknownCollection(collection.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
