//! The engine handle.
//!
//! An [`Engine`] owns a [`Store`], an [`EmbeddingProvider`] and an
//! [`EngineConfig`]. It is built once and passed to whatever serves requests;
//! there is no global state. Every operation checks store health first, and
//! [`Engine::close`] checkpoints and closes the store.
//!
//! The operations themselves live next to their types: schemas in
//! [`schema`](crate::schema), inserts in [`writer`](crate::writer), deletes
//! in [`deleter`](crate::deleter), similarity search in
//! [`search`](crate::search), resources in [`catalog`](crate::catalog), and
//! content in [`content`](crate::content).

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, StoreConfig};
use crate::content::ContentStore;
use crate::embedding::EmbeddingProvider;
use crate::error::{ConfigError, Error, Result, StorageError, StorageResult};
use crate::ident::Ident;
use crate::storage::{Command, Outcome, Store, TableDef, TableStore};

/// Acknowledges a schema operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub collection: String,
}

impl Ack {
    pub(crate) fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
        }
    }
}

/// The instant by which a mutating operation must have committed.
///
/// Checked right before the commit and while waiting on the embedding
/// provider. A transaction that has started committing is never abandoned.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    pub(crate) fn none() -> Self {
        Self(None)
    }

    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn after(limit: Duration) -> Self {
        Self(Instant::now().checked_add(limit))
    }

    /// Time left, or `None` without a deadline.
    pub(crate) fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn expired(&self) -> bool {
        self.remaining().map_or(false, |left| left.is_zero())
    }

    pub(crate) fn check(&self) -> StorageResult<()> {
        if self.expired() {
            return Err(StorageError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Where the resource catalog reads from.
#[derive(Debug, Clone)]
pub(crate) struct ResourceTable {
    pub table: Ident,
    pub address: Ident,
}

/// A handle to a collection engine.
///
/// # Example
///
/// ```
/// use vectorbase_core::prelude::*;
///
/// let engine = Engine::in_memory(HashingEmbedder::new(3)).unwrap();
///
/// let schema = CollectionSchema::new("docs")
///     .with_field(FieldSpec::int64("id").primary())
///     .with_field(FieldSpec::vector("embedding", 3));
/// engine.create_collection(&schema).unwrap();
///
/// let record = Record::new()
///     .with_field("id", 1)
///     .with_field("embedding", vec![1.0, 0.0, 0.0]);
/// engine.insert("docs", &[record]).unwrap();
///
/// let hits = engine
///     .search(&SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0]))
///     .unwrap();
/// assert_eq!(hits[0].record.get_i64("id"), Some(1));
/// ```
pub struct Engine {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) config: EngineConfig,
    pub(crate) resources: ResourceTable,
    pub(crate) content: ContentStore,
}

impl Engine {
    /// Creates an engine over an existing store.
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let resources = ResourceTable {
            table: Ident::new(config.resource_table.as_str())?,
            address: Ident::new(config.resource_address_column.as_str())?,
        };

        Ok(Self {
            store,
            embedder,
            config,
            resources,
            content: ContentStore::default(),
        })
    }

    /// Creates an engine over a fresh in-memory store with default config.
    pub fn in_memory<E: EmbeddingProvider + 'static>(embedder: E) -> Result<Self> {
        let store = TableStore::in_memory(StoreConfig::default());
        Ok(Self::new(
            Arc::new(store),
            Arc::new(embedder),
            EngineConfig::default(),
        )?)
    }

    /// Opens a durable engine in `dir`.
    pub fn open<P: AsRef<Path>, E: EmbeddingProvider + 'static>(
        dir: P,
        store_config: StoreConfig,
        embedder: E,
        config: EngineConfig,
    ) -> Result<Self> {
        let store = TableStore::open(dir, store_config)?;
        Ok(Self::new(Arc::new(store), Arc::new(embedder), config)?)
    }

    /// Replaces the content store used by [`get_details`](Self::get_details).
    pub fn with_content_store(mut self, content: ContentStore) -> Self {
        self.content = content;
        self
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Checks that the store can serve requests.
    pub fn health(&self) -> Result<()> {
        Ok(self.check_health()?)
    }

    /// Closes the store, which checkpoints a durable one. Every later
    /// operation fails with [`StorageError::Closed`]. Closing twice is fine.
    #[tracing::instrument(skip(self))]
    pub fn close(&self) -> Result<()> {
        self.store.close().map_err(Error::from)
    }

    pub(crate) fn check_health(&self) -> StorageResult<()> {
        self.store.health().map_err(|e| {
            tracing::warn!(error = %e, "store unhealthy");
            e
        })
    }

    /// Runs a transaction, logging storage failures.
    pub(crate) fn execute(&self, commands: &[Command]) -> StorageResult<Vec<Outcome>> {
        self.store.transact(commands).map_err(|e| {
            match &e {
                StorageError::Rejected { .. } | StorageError::NoSuchTable(_) => {
                    tracing::debug!(error = %e, "transaction rejected")
                }
                _ => tracing::warn!(error = %e, "transaction failed"),
            }
            e
        })
    }

    /// Runs a transaction unless `deadline` has already passed.
    pub(crate) fn execute_within(
        &self,
        commands: &[Command],
        deadline: Deadline,
    ) -> StorageResult<Vec<Outcome>> {
        deadline.check().map_err(|e| {
            tracing::warn!(commands = commands.len(), "deadline passed before commit");
            e
        })?;
        self.execute(commands)
    }

    pub(crate) fn execute_one(&self, command: Command) -> StorageResult<Outcome> {
        self.execute_one_within(command, Deadline::none())
    }

    pub(crate) fn execute_one_within(
        &self,
        command: Command,
        deadline: Deadline,
    ) -> StorageResult<Outcome> {
        self.execute_within(std::slice::from_ref(&command), deadline)?
            .pop()
            .ok_or(StorageError::UnexpectedOutcome("one outcome"))
    }

    pub(crate) fn describe(&self, table: &Ident) -> StorageResult<Option<TableDef>> {
        self.execute_one(Command::Describe {
            table: table.clone(),
        })?
        .into_table()
    }
}

#[cfg(feature = "async")]
mod async_api {
    use super::*;
    use crate::catalog::{ResourceQuery, Resources};
    use crate::deleter::{Conditions, DeleteAck};
    use crate::record::Record;
    use crate::schema::CollectionSchema;
    use crate::search::{SearchResult, SimilarityQuery};
    use crate::writer::InsertAck;

    /// Async wrapper for [`Engine`].
    ///
    /// Every operation runs on tokio's blocking pool and is bounded by
    /// [`EngineConfig::operation_timeout`]; exceeding it yields
    /// [`Error::TimedOut`].
    ///
    /// Reads are abandoned when the timeout fires. Writes carry the timeout
    /// into the blocking task as a deadline and are awaited to the end: a
    /// write that misses its deadline commits nothing and reports
    /// [`Error::TimedOut`], and a write that committed is reported as done.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use vectorbase_core::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> vectorbase_core::Result<()> {
    ///     let engine = AsyncEngine::new(Engine::in_memory(HashingEmbedder::new(8))?);
    ///     engine
    ///         .create_collection(
    ///             CollectionSchema::new("docs").with_field(FieldSpec::vector("embedding", 8)),
    ///         )
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    #[derive(Clone)]
    pub struct AsyncEngine {
        inner: Arc<Engine>,
    }

    impl AsyncEngine {
        pub fn new(engine: Engine) -> Self {
            Self {
                inner: Arc::new(engine),
            }
        }

        /// Returns the wrapped engine.
        pub fn inner(&self) -> &Engine {
            &self.inner
        }

        async fn run<T, F>(&self, f: F) -> Result<T>
        where
            F: FnOnce(&Engine) -> Result<T> + Send + 'static,
            T: Send + 'static,
        {
            let inner = Arc::clone(&self.inner);
            let limit = inner.config.operation_timeout;
            let task = tokio::task::spawn_blocking(move || f(&inner));

            match tokio::time::timeout(limit, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(Error::Runtime(format!("spawn_blocking failed: {}", e))),
                Err(_) => {
                    tracing::warn!(?limit, "operation timed out");
                    Err(Error::TimedOut(limit))
                }
            }
        }

        /// Runs a write with a deadline and waits for its real outcome.
        async fn run_write<T, F>(&self, f: F) -> Result<T>
        where
            F: FnOnce(&Engine, Deadline) -> Result<T> + Send + 'static,
            T: Send + 'static,
        {
            let inner = Arc::clone(&self.inner);
            let limit = inner.config.operation_timeout;
            let deadline = Deadline::after(limit);
            let task = tokio::task::spawn_blocking(move || f(&inner, deadline));

            match task.await {
                Ok(Err(e)) if e.storage() == Some(&StorageError::DeadlineExceeded) => {
                    tracing::warn!(?limit, "write missed its deadline");
                    Err(Error::TimedOut(limit))
                }
                Ok(result) => result,
                Err(e) => Err(Error::Runtime(format!("spawn_blocking failed: {}", e))),
            }
        }

        pub async fn create_collection(&self, schema: CollectionSchema) -> Result<Ack> {
            self.run_write(move |engine, deadline| {
                Ok(engine.create_collection_within(&schema, deadline)?)
            })
            .await
        }

        pub async fn drop_collection(&self, name: String) -> Result<Ack> {
            self.run_write(move |engine, deadline| {
                Ok(engine.drop_collection_within(&name, deadline)?)
            })
            .await
        }

        pub async fn describe_collection(&self, name: String) -> Result<Option<CollectionSchema>> {
            self.run(move |engine| Ok(engine.describe_collection(&name)?))
                .await
        }

        pub async fn list_collections(&self) -> Result<Vec<String>> {
            self.run(|engine| Ok(engine.list_collections()?)).await
        }

        pub async fn count(&self, collection: String) -> Result<u64> {
            self.run(move |engine| Ok(engine.count(&collection)?)).await
        }

        pub async fn insert(&self, collection: String, records: Vec<Record>) -> Result<InsertAck> {
            self.run_write(move |engine, deadline| {
                Ok(engine.insert_within(&collection, &records, deadline)?)
            })
            .await
        }

        pub async fn delete(&self, collection: String, conditions: Conditions) -> Result<DeleteAck> {
            self.run_write(move |engine, deadline| {
                Ok(engine.delete_within(&collection, &conditions, deadline)?)
            })
            .await
        }

        pub async fn search(&self, query: SimilarityQuery) -> Result<SearchResult> {
            self.run(move |engine| Ok(engine.search(&query)?)).await
        }

        pub async fn get_resources(&self, query: ResourceQuery) -> Result<Resources> {
            self.run(move |engine| Ok(engine.get_resources(&query)?))
                .await
        }

        pub async fn get_details(&self, cids: Vec<String>) -> Result<Vec<String>> {
            self.run(move |engine| Ok(engine.get_details(cids.as_slice())?))
                .await
        }

        pub async fn close(&self) -> Result<()> {
            self.run_write(|engine, _| engine.close()).await
        }
    }
}

#[cfg(feature = "async")]
pub use async_api::AsyncEngine;
