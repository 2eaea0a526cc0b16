//! The storage command interface.
//!
//! Commands are the SQL-equivalent vocabulary between the engine and a
//! [`Store`](crate::storage::Store). Identifiers are [`Ident`]s and data are
//! [`Value`]s, so a command cannot carry an unvalidated name, and data are
//! never part of the command text: [`Display`](fmt::Display) renders
//! positional placeholders in their place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::error::{StorageError, StorageResult};
use crate::ident::Ident;
use crate::storage::table::{RowId, SelectedRow, TableDef};
use crate::value::Value;

/// An equality test `column = value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: Ident,
    pub value: Value,
}

impl Condition {
    pub fn new(column: Ident, value: Value) -> Self {
        Self { column, value }
    }
}

/// Order rows by distance from `query` in `column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nearest {
    pub column: Ident,
    pub metric: Metric,
    pub query: Vec<f32>,
}

/// A storage command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    CreateTable {
        def: TableDef,
        if_not_exists: bool,
    },
    DropTable {
        name: Ident,
        if_exists: bool,
    },
    Describe {
        table: Ident,
    },
    ListTables,
    Insert {
        table: Ident,
        columns: Vec<Ident>,
        values: Vec<Value>,
    },
    /// Deletes rows matching every condition.
    Delete {
        table: Ident,
        conditions: Vec<Condition>,
    },
    /// Selects rows matching every condition, optionally ranked by distance.
    Select {
        table: Ident,
        conditions: Vec<Condition>,
        nearest: Option<Nearest>,
        limit: Option<usize>,
    },
    Count {
        table: Ident,
    },
}

impl Command {
    /// Returns true if the command never changes state.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Command::Describe { .. }
                | Command::ListTables
                | Command::Select { .. }
                | Command::Count { .. }
        )
    }
}

/// The result of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The table was created.
    Created,
    /// The table already existed with this definition.
    Existing(TableDef),
    /// Whether a table was dropped.
    Dropped(bool),
    Table(Option<TableDef>),
    Tables(Vec<Ident>),
    Inserted(RowId),
    Deleted(u64),
    Rows(Vec<SelectedRow>),
    Count(u64),
}

impl Outcome {
    pub fn into_table(self) -> StorageResult<Option<TableDef>> {
        match self {
            Outcome::Table(def) => Ok(def),
            _ => Err(StorageError::UnexpectedOutcome("table definition")),
        }
    }

    pub fn into_tables(self) -> StorageResult<Vec<Ident>> {
        match self {
            Outcome::Tables(names) => Ok(names),
            _ => Err(StorageError::UnexpectedOutcome("table list")),
        }
    }

    pub fn into_rows(self) -> StorageResult<Vec<SelectedRow>> {
        match self {
            Outcome::Rows(rows) => Ok(rows),
            _ => Err(StorageError::UnexpectedOutcome("rows")),
        }
    }

    pub fn into_deleted(self) -> StorageResult<u64> {
        match self {
            Outcome::Deleted(n) => Ok(n),
            _ => Err(StorageError::UnexpectedOutcome("deleted count")),
        }
    }

    pub fn into_count(self) -> StorageResult<u64> {
        match self {
            Outcome::Count(n) => Ok(n),
            _ => Err(StorageError::UnexpectedOutcome("count")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateTable { def, if_not_exists } => {
                write!(f, "CREATE TABLE ")?;
                if *if_not_exists {
                    write!(f, "IF NOT EXISTS ")?;
                }
                write!(f, "{} (", def.name.quoted())?;
                for (i, column) in def.columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", column.name.quoted(), column.ty)?;
                    if column.primary_key {
                        write!(f, " PRIMARY KEY")?;
                    }
                }
                write!(f, ")")
            }
            Command::DropTable { name, if_exists } => {
                write!(f, "DROP TABLE ")?;
                if *if_exists {
                    write!(f, "IF EXISTS ")?;
                }
                write!(f, "{}", name.quoted())
            }
            Command::Describe { table } => write!(f, "DESCRIBE {}", table.quoted()),
            Command::ListTables => write!(f, "SHOW TABLES"),
            Command::Insert { table, columns, .. } => {
                let names: Vec<String> = columns.iter().map(Ident::quoted).collect();
                let params: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES ({})",
                    table.quoted(),
                    names.join(", "),
                    params.join(", ")
                )
            }
            Command::Delete { table, conditions } => {
                write!(f, "DELETE FROM {}", table.quoted())?;
                write_where(f, conditions)
            }
            Command::Select {
                table,
                conditions,
                nearest,
                limit,
            } => {
                write!(f, "SELECT *")?;
                if let Some(nearest) = nearest {
                    write!(
                        f,
                        ", {} {} ${} AS distance",
                        nearest.column.quoted(),
                        nearest.metric.operator(),
                        conditions.len() + 1
                    )?;
                }
                write!(f, " FROM {}", table.quoted())?;
                write_where(f, conditions)?;
                if nearest.is_some() {
                    write!(f, " ORDER BY distance")?;
                }
                if let Some(limit) = limit {
                    write!(f, " LIMIT {limit}")?;
                }
                Ok(())
            }
            Command::Count { table } => write!(f, "SELECT count(*) FROM {}", table.quoted()),
        }
    }
}

fn write_where(f: &mut fmt::Formatter<'_>, conditions: &[Condition]) -> fmt::Result {
    for (i, condition) in conditions.iter().enumerate() {
        let keyword = if i == 0 { "WHERE" } else { "AND" };
        write!(f, " {} {} = ${}", keyword, condition.column.quoted(), i + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::PhysicalType;
    use crate::storage::table::ColumnDef;

    fn ident(name: &str) -> Ident {
        Ident::new(name).unwrap()
    }

    #[test]
    fn test_render_create_table() {
        let def = TableDef::new(
            ident("docs"),
            vec![
                ColumnDef::new(ident("id"), PhysicalType::BigInt).primary(),
                ColumnDef::new(ident("text"), PhysicalType::Text),
                ColumnDef::new(ident("embedding"), PhysicalType::Vector(3)),
            ],
        );
        let command = Command::CreateTable {
            def,
            if_not_exists: true,
        };
        assert_eq!(
            command.to_string(),
            r#"CREATE TABLE IF NOT EXISTS "docs" ("id" BIGINT PRIMARY KEY, "text" TEXT, "embedding" VECTOR(3))"#
        );
    }

    #[test]
    fn test_render_insert_uses_placeholders() {
        let command = Command::Insert {
            table: ident("docs"),
            columns: vec![ident("id"), ident("text")],
            values: vec![Value::Int64(1), Value::Text("'; DROP TABLE docs; --".into())],
        };
        let sql = command.to_string();
        assert_eq!(sql, r#"INSERT INTO "docs" ("id", "text") VALUES ($1, $2)"#);
        assert!(!sql.contains("DROP"));
    }

    #[test]
    fn test_render_delete() {
        let command = Command::Delete {
            table: ident("docs"),
            conditions: vec![
                Condition::new(ident("id"), Value::Int64(1)),
                Condition::new(ident("text"), Value::Text("a".into())),
            ],
        };
        assert_eq!(
            command.to_string(),
            r#"DELETE FROM "docs" WHERE "id" = $1 AND "text" = $2"#
        );
    }

    #[test]
    fn test_render_nearest_select() {
        let command = Command::Select {
            table: ident("docs"),
            conditions: vec![Condition::new(ident("lang"), Value::Text("en".into()))],
            nearest: Some(Nearest {
                column: ident("embedding"),
                metric: Metric::Cosine,
                query: vec![1.0, 0.0, 0.0],
            }),
            limit: Some(10),
        };
        assert_eq!(
            command.to_string(),
            r#"SELECT *, "embedding" <=> $2 AS distance FROM "docs" WHERE "lang" = $1 ORDER BY distance LIMIT 10"#
        );
    }

    #[test]
    fn test_read_only_classification() {
        assert!(Command::ListTables.is_read_only());
        assert!(Command::Count { table: ident("t") }.is_read_only());
        assert!(!Command::DropTable {
            name: ident("t"),
            if_exists: true
        }
        .is_read_only());
    }

    #[test]
    fn test_outcome_accessors() {
        assert_eq!(Outcome::Count(3).into_count(), Ok(3));
        assert_eq!(
            Outcome::Created.into_rows(),
            Err(StorageError::UnexpectedOutcome("rows"))
        );
    }
}
