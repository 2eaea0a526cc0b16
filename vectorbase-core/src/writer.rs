//! Record insertion.
//!
//! A batch is validated as a whole before anything is written: every field
//! must exist in the collection and every value must coerce to its column.
//! Embeddable vector fields may hold text instead of a vector; that text is
//! embedded only once the whole batch has passed validation. The rows are
//! then written in a single transaction, so a batch lands completely or not
//! at all.
//!
//! Embedding runs on a worker thread so that a provider that hangs costs the
//! caller at most the embedding timeout. The worker is left to finish on its
//! own; its late results are discarded.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::{Deadline, Engine};
use crate::error::{EmbeddingError, RowError, StorageError, WriteError};
use crate::ident::Ident;
use crate::record::Record;
use crate::storage::{ColumnDef, Command, TableDef};
use crate::value::Value;

/// Acknowledges an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertAck {
    /// Number of records written.
    pub count: usize,
}

/// A validated cell, or text still waiting to be embedded.
enum Pending {
    Ready(Value),
    Embed { text: String, dimension: usize },
}

/// Text to embed and the cell its vector belongs in.
struct EmbedJob {
    row_index: usize,
    cell: usize,
    field: Ident,
    text: String,
    dimension: usize,
}

impl Engine {
    /// Inserts `records` into `collection` in one transaction.
    pub fn insert(&self, collection: &str, records: &[Record]) -> Result<InsertAck, WriteError> {
        self.insert_within(collection, records, Deadline::none())
    }

    #[tracing::instrument(skip(self, records, deadline), fields(rows = records.len()))]
    pub(crate) fn insert_within(
        &self,
        collection: &str,
        records: &[Record],
        deadline: Deadline,
    ) -> Result<InsertAck, WriteError> {
        self.check_health()?;
        let table = Ident::new(collection)?;

        if records.is_empty() {
            return Ok(InsertAck { count: 0 });
        }

        let def = self
            .describe(&table)?
            .ok_or_else(|| WriteError::UnknownCollection(collection.to_string()))?;

        let pending = records
            .iter()
            .enumerate()
            .map(|(row_index, record)| validate_record(&def, row_index, record))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                tracing::debug!(error = %e, "batch rejected");
                e
            })?;

        let mut rows: Vec<(Vec<Ident>, Vec<Value>)> = Vec::with_capacity(pending.len());
        let mut jobs = Vec::new();
        for (row_index, row) in pending.into_iter().enumerate() {
            let mut columns = Vec::with_capacity(row.len());
            let mut values = Vec::with_capacity(row.len());
            for (cell, (column, pending)) in row.into_iter().enumerate() {
                match pending {
                    Pending::Ready(value) => values.push(value),
                    Pending::Embed { text, dimension } => {
                        jobs.push(EmbedJob {
                            row_index,
                            cell,
                            field: column.clone(),
                            text,
                            dimension,
                        });
                        values.push(Value::Null);
                    }
                }
                columns.push(column);
            }
            rows.push((columns, values));
        }

        for (job, vector) in jobs.iter().zip(self.embed_batch(&jobs, deadline)?) {
            rows[job.row_index].1[job.cell] = Value::Vector(vector);
        }

        let commands: Vec<Command> = rows
            .into_iter()
            .map(|(columns, values)| Command::Insert {
                table: table.clone(),
                columns,
                values,
            })
            .collect();

        match self.execute_within(&commands, deadline) {
            Ok(_) => {
                tracing::debug!(count = commands.len(), "batch inserted");
                Ok(InsertAck {
                    count: commands.len(),
                })
            }
            // One command per record, so the command index is the row index.
            Err(StorageError::Rejected { index, cause }) => Err(WriteError::Row {
                row_index: index,
                cause,
            }),
            Err(StorageError::NoSuchTable(_)) => {
                Err(WriteError::UnknownCollection(collection.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Embeds every job in order on a worker thread.
    ///
    /// Each result is awaited for at most the embedding timeout, or less if
    /// the deadline is nearer.
    fn embed_batch(&self, jobs: &[EmbedJob], deadline: Deadline) -> Result<Vec<Vec<f32>>, WriteError> {
        let Some(first) = jobs.first() else {
            return Ok(Vec::new());
        };

        let embedder = Arc::clone(&self.embedder);
        let texts: Vec<String> = jobs.iter().map(|job| job.text.clone()).collect();
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("vectorbase-embed".into())
            .spawn(move || {
                for text in texts {
                    if tx.send(embedder.embed(&text)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| WriteError::Embedding {
                row_index: first.row_index,
                field: first.field.to_string(),
                reason: EmbeddingError::Provider(format!("cannot start worker: {}", e)),
            })?;

        let mut vectors = Vec::with_capacity(jobs.len());
        for job in jobs {
            deadline.check()?;
            let limit = match deadline.remaining() {
                Some(left) => left.min(self.config.embed_timeout),
                None => self.config.embed_timeout,
            };

            let started = Instant::now();
            let embedded = match rx.recv_timeout(limit) {
                Ok(embedded) => embedded,
                Err(RecvTimeoutError::Timeout) => {
                    deadline.check()?;
                    Err(EmbeddingError::TimedOut {
                        elapsed: started.elapsed(),
                        limit,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => Err(EmbeddingError::Provider(
                    "embedding worker stopped".into(),
                )),
            };

            let vector = embedded
                .and_then(|vector| check_embedding(vector, job.dimension))
                .map_err(|reason| WriteError::Embedding {
                    row_index: job.row_index,
                    field: job.field.to_string(),
                    reason,
                })?;
            vectors.push(vector);
        }
        Ok(vectors)
    }
}

fn check_embedding(vector: Vec<f32>, dimension: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.len() != dimension {
        return Err(EmbeddingError::WrongDimension {
            expected: dimension,
            got: vector.len(),
        });
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }
    Ok(vector)
}

fn validate_record(
    def: &TableDef,
    row_index: usize,
    record: &Record,
) -> Result<Vec<(Ident, Pending)>, WriteError> {
    record
        .iter()
        .map(|(field, json)| {
            let (_, column) = def
                .column(field)
                .ok_or_else(|| WriteError::UnknownField {
                    row_index,
                    field: field.clone(),
                })?;
            let cell = coerce(column, json).map_err(|cause| WriteError::Row { row_index, cause })?;
            Ok((column.name.clone(), cell))
        })
        .collect()
}

fn coerce(column: &ColumnDef, json: &JsonValue) -> Result<Pending, RowError> {
    match (column.embeddable, column.ty.dimension(), json) {
        (true, Some(dimension), JsonValue::String(text)) => Ok(Pending::Embed {
            text: text.clone(),
            dimension,
        }),
        _ => Value::from_json(column.name.as_str(), json, &column.ty).map(Pending::Ready),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingEmbedder, NoEmbedder};
    use crate::error::RowError;
    use crate::field::FieldSpec;
    use crate::schema::CollectionSchema;
    use crate::EngineConfig;
    use serde_json::json;
    use std::time::Duration;

    fn docs_engine() -> Engine {
        let engine = Engine::in_memory(HashingEmbedder::new(3)).unwrap();
        engine
            .create_collection(
                &CollectionSchema::new("docs")
                    .with_field(FieldSpec::int64("id").primary())
                    .with_field(FieldSpec::string("text"))
                    .with_field(FieldSpec::vector("embedding", 3).embeddable()),
            )
            .unwrap();
        engine
    }

    fn doc(id: i64, text: &str, embedding: JsonValue) -> Record {
        Record::new()
            .with_field("id", id)
            .with_field("text", text)
            .with_field("embedding", embedding)
    }

    #[test]
    fn test_insert_batch() {
        let engine = docs_engine();
        let ack = engine
            .insert(
                "docs",
                &[
                    doc(1, "a", json!([1.0, 0.0, 0.0])),
                    doc(2, "b", json!([0.0, 1.0, 0.0])),
                ],
            )
            .unwrap();
        assert_eq!(ack.count, 2);
        assert_eq!(engine.count("docs").unwrap(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let engine = docs_engine();
        assert_eq!(engine.insert("docs", &[]).unwrap().count, 0);
    }

    #[test]
    fn test_unknown_collection_and_field() {
        let engine = docs_engine();
        assert!(matches!(
            engine.insert("nope", &[doc(1, "a", json!([1, 0, 0]))]),
            Err(WriteError::UnknownCollection(_))
        ));

        let err = engine
            .insert(
                "docs",
                &[
                    doc(1, "a", json!([1, 0, 0])),
                    doc(2, "b", json!([1, 0, 0])).with_field("color", "red"),
                ],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::UnknownField { row_index: 1, ref field } if field == "color"
        ));
        assert_eq!(engine.count("docs").unwrap(), 0);
    }

    #[test]
    fn test_embeds_text_into_declared_dimension() {
        let engine = docs_engine();
        engine
            .insert("docs", &[doc(1, "hello", json!("hello world"))])
            .unwrap();

        let rows = engine
            .execute_one(Command::Select {
                table: Ident::new("docs").unwrap(),
                conditions: vec![],
                nearest: None,
                limit: None,
            })
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows[0].values[2].as_vector().map(<[f32]>::len), Some(3));
    }

    #[test]
    fn test_text_in_plain_vector_field_is_mismatch() {
        let engine = Engine::in_memory(HashingEmbedder::new(3)).unwrap();
        engine
            .create_collection(&CollectionSchema::new("t").with_field(FieldSpec::vector("v", 3)))
            .unwrap();
        let err = engine
            .insert("t", &[Record::new().with_field("v", "some text")])
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::Row {
                row_index: 0,
                cause: RowError::TypeMismatch { .. }
            }
        ));
    }

    #[test]
    fn test_embedding_failures_fail_the_batch() {
        let store = std::sync::Arc::new(crate::storage::TableStore::in_memory(
            crate::StoreConfig::default(),
        ));
        let schema = CollectionSchema::new("docs")
            .with_field(FieldSpec::int64("id").primary())
            .with_field(FieldSpec::vector("embedding", 3).embeddable());

        let engine = Engine::new(
            store.clone(),
            std::sync::Arc::new(NoEmbedder),
            EngineConfig::default(),
        )
        .unwrap();
        engine.create_collection(&schema).unwrap();
        let records = [
            Record::new().with_field("id", 1).with_field("embedding", json!([1, 0, 0])),
            Record::new().with_field("id", 2).with_field("embedding", "text"),
        ];
        let err = engine.insert("docs", &records).unwrap_err();
        assert!(matches!(
            err,
            WriteError::Embedding {
                row_index: 1,
                reason: EmbeddingError::Provider(_),
                ..
            }
        ));

        let wrong_size = Engine::new(
            store.clone(),
            std::sync::Arc::new(HashingEmbedder::new(5)),
            EngineConfig::default(),
        )
        .unwrap();
        assert!(matches!(
            wrong_size.insert("docs", &records),
            Err(WriteError::Embedding {
                reason: EmbeddingError::WrongDimension {
                    expected: 3,
                    got: 5
                },
                ..
            })
        ));

        let slow = |_: &str| -> Result<Vec<f32>, EmbeddingError> {
            std::thread::sleep(Duration::from_millis(30));
            Ok(vec![1.0, 0.0, 0.0])
        };
        let impatient = Engine::new(
            store,
            std::sync::Arc::new(slow),
            EngineConfig::default().with_embed_timeout(Duration::from_millis(5)),
        )
        .unwrap();
        assert!(matches!(
            impatient.insert("docs", &records),
            Err(WriteError::Embedding {
                reason: EmbeddingError::TimedOut { .. },
                ..
            })
        ));

        assert_eq!(engine.count("docs").unwrap(), 0);
    }

    fn embeddable_engine<E: crate::EmbeddingProvider + 'static>(
        embedder: E,
        config: EngineConfig,
    ) -> Engine {
        let store = std::sync::Arc::new(crate::storage::TableStore::in_memory(
            crate::StoreConfig::default(),
        ));
        let engine = Engine::new(store, std::sync::Arc::new(embedder), config).unwrap();
        engine
            .create_collection(
                &CollectionSchema::new("docs")
                    .with_field(FieldSpec::int64("id").primary())
                    .with_field(FieldSpec::vector("embedding", 3).embeddable()),
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_hung_provider_is_abandoned() {
        let hung = |_: &str| -> Result<Vec<f32>, EmbeddingError> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(vec![1.0, 0.0, 0.0])
        };
        let engine = embeddable_engine(
            hung,
            EngineConfig::default().with_embed_timeout(Duration::from_millis(20)),
        );

        let started = std::time::Instant::now();
        let err = engine
            .insert(
                "docs",
                &[Record::new().with_field("id", 1).with_field("embedding", "text")],
            )
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            err,
            WriteError::Embedding {
                row_index: 0,
                reason: EmbeddingError::TimedOut { .. },
                ..
            }
        ));
        assert_eq!(engine.count("docs").unwrap(), 0);
    }

    #[test]
    fn test_deadline_passing_during_embedding_writes_nothing() {
        let slow = |_: &str| -> Result<Vec<f32>, EmbeddingError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(vec![1.0, 0.0, 0.0])
        };
        let engine = embeddable_engine(slow, EngineConfig::default());

        let err = engine
            .insert_within(
                "docs",
                &[Record::new().with_field("id", 1).with_field("embedding", "text")],
                Deadline::after(Duration::from_millis(50)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::Storage(StorageError::DeadlineExceeded)
        ));

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(engine.count("docs").unwrap(), 0);
    }

    #[test]
    fn test_failing_row_rolls_back_batch() {
        let engine = docs_engine();
        let err = engine
            .insert(
                "docs",
                &[
                    doc(1, "a", json!([1, 0, 0])),
                    doc(2, "b", json!([1, 0])),
                    doc(3, "c", json!([0, 0, 1])),
                ],
            )
            .unwrap_err();
        assert_eq!(err.row_index(), Some(1));
        assert_eq!(engine.count("docs").unwrap(), 0);

        let err = engine
            .insert(
                "docs",
                &[doc(1, "a", json!([1, 0, 0])), doc(1, "b", json!([0, 1, 0]))],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::Row {
                row_index: 1,
                cause: RowError::DuplicateKey(_)
            }
        ));
        assert_eq!(engine.count("docs").unwrap(), 0);
    }

    #[test]
    fn test_missing_primary_key_is_rejected() {
        let engine = docs_engine();
        let err = engine
            .insert("docs", &[Record::new().with_field("text", "no id")])
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::Row {
                row_index: 0,
                cause: RowError::NullPrimaryKey(_)
            }
        ));
    }
}
