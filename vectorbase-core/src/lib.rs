//! # VectorBase Core
//!
//! Core library for VectorBase: typed collections of records with embedding
//! vectors and exact nearest-neighbor search.
//!
//! A caller defines a collection schema, inserts typed records (optionally
//! letting an [`EmbeddingProvider`] turn text into vectors), deletes by
//! equality conditions, and searches by similarity under L2, inner-product,
//! or cosine distance. Everything runs through an explicit [`Engine`] handle
//! on top of a transactional [`Store`](storage::Store).
//!
//! ## Crate Features
//!
//! - `async` - Enables [`AsyncEngine`] for tokio-compatible async operations
//!
//! ## Core Types
//!
//! ### Engine
//!
//! - [`Engine`] - Owns the store, embedding provider, and configuration
//! - [`AsyncEngine`] - Async wrapper with per-operation timeouts (requires `async` feature)
//! - [`EngineConfig`] / [`StoreConfig`] - Limits, timeouts, durability
//!
//! ### Schemas and Records
//!
//! - [`CollectionSchema`] / [`FieldSpec`] - Collection definitions
//! - [`LogicalType`] / [`PhysicalType`] - Field type registry
//! - [`Ident`] - Validated storage identifiers
//! - [`Record`] - JSON-like rows exchanged with callers
//!
//! ### Queries
//!
//! - [`SimilarityQuery`] / [`SearchHit`] - Nearest-neighbor search
//! - [`Metric`] - Supported distance functions
//! - [`ResourceQuery`] / [`Resources`] - Resource catalog lookups
//! - [`ContentStore`] - Text blobs by content identifier
//!
//! ### Storage
//!
//! - [`storage::TableStore`] - Embedded in-memory store with WAL durability
//! - [`storage::Command`] - SQL-equivalent command interface

pub mod catalog;
pub mod config;
pub mod content;
pub mod deleter;
pub mod distance;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod field;
pub mod ident;
pub mod record;
pub mod schema;
pub mod search;
pub mod storage;
pub mod value;
pub mod writer;

// Re-exports for convenient access
pub use catalog::{ResourceQuery, ResourceRecord, Resources};
pub use config::{EngineConfig, StoreConfig};
pub use content::ContentStore;
pub use deleter::{Conditions, DeleteAck};
pub use distance::Metric;
#[cfg(feature = "async")]
pub use engine::AsyncEngine;
pub use engine::{Ack, Engine};
pub use embedding::{EmbeddingProvider, HashingEmbedder, NoEmbedder};
pub use error::{
    CatalogError, ConfigError, DeleteError, DetailsError, EmbeddingError, Error, FieldTypeError,
    IdentError, Result, RowError, SchemaError, SearchError, StorageError, WriteError,
};
pub use field::{FieldSpec, LogicalType, PhysicalType};
pub use ident::Ident;
pub use record::Record;
pub use schema::CollectionSchema;
pub use search::{SearchHit, SearchResult, SimilarityQuery};
pub use value::Value;
pub use writer::InsertAck;

/// Re-export commonly used types for convenience.
///
/// # Example
///
/// ```rust
/// use vectorbase_core::prelude::*;
///
/// let engine = Engine::in_memory(HashingEmbedder::new(4)).unwrap();
/// let schema = CollectionSchema::new("notes")
///     .with_field(FieldSpec::int64("id").primary())
///     .with_field(FieldSpec::vector("embedding", 4).embeddable());
/// engine.create_collection(&schema).unwrap();
///
/// let note = Record::new()
///     .with_field("id", 1)
///     .with_field("embedding", "remember the milk");
/// engine.insert("notes", &[note]).unwrap();
/// assert_eq!(engine.count("notes").unwrap(), 1);
/// ```
pub mod prelude {
    #[cfg(feature = "async")]
    pub use crate::AsyncEngine;
    pub use crate::{
        CollectionSchema, Conditions, EmbeddingProvider, Engine, EngineConfig, Error, FieldSpec,
        HashingEmbedder, LogicalType, Metric, Record, ResourceQuery, Resources, Result,
        SearchHit, SimilarityQuery, StoreConfig,
    };
}
