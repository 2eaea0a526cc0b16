//! # VectorBase
//!
//! **Typed collections of records with embedding vectors and exact
//! nearest-neighbor search.**
//!
//! VectorBase keeps records in named collections whose fields are declared up
//! front. Vector fields have a fixed dimension; a vector field marked
//! embeddable also accepts text, which the configured [`EmbeddingProvider`]
//! turns into a vector on insert.
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | **Typed Schemas** | `string`, `int32`, `int64`, `float`, `bool`, `vector` fields |
//! | **Safe Identifiers** | Every collection and field name is allow-listed |
//! | **Atomic Batches** | An insert batch lands whole or not at all |
//! | **Distance Metrics** | L2, inner product, cosine |
//! | **Persistence** | WAL plus snapshot, replayed on open |
//! | **Async API** | Tokio-compatible wrapper with timeouts (feature flag) |
//!
//! ## Quick Start
//!
//! ```rust
//! use vectorbase::prelude::*;
//!
//! let engine = Engine::in_memory(HashingEmbedder::new(3)).unwrap();
//!
//! let schema = CollectionSchema::new("docs")
//!     .with_field(FieldSpec::int64("id").primary())
//!     .with_field(FieldSpec::string("content"))
//!     .with_field(FieldSpec::vector("embedding", 3));
//! engine.create_collection(&schema).unwrap();
//!
//! let doc = Record::new()
//!     .with_field("id", 1)
//!     .with_field("content", "a")
//!     .with_field("embedding", vec![1.0, 0.0, 0.0]);
//! engine.insert("docs", &[doc]).unwrap();
//!
//! let hits = engine
//!     .search(&SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0]).with_limit(5))
//!     .unwrap();
//! assert_eq!(hits[0].similarity, 1.0);
//! ```
//!
//! ### Durable Engine
//!
//! ```no_run
//! use vectorbase::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let engine = Engine::open(
//!         "./vectorbase_data",
//!         StoreConfig::default(),
//!         HashingEmbedder::new(384),
//!         EngineConfig::from_env()?,
//!     )?;
//!
//!     let schema = CollectionSchema::new("notes")
//!         .with_field(FieldSpec::int64("id").primary())
//!         .with_field(FieldSpec::vector("embedding", 384).embeddable());
//!     engine.create_collection(&schema)?;
//!     engine.insert(
//!         "notes",
//!         &[Record::new().with_field("id", 1).with_field("embedding", "buy milk")],
//!     )?;
//!
//!     engine.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Crate Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | Enables `AsyncEngine` for tokio compatibility |
//!
//! ```toml
//! [dependencies]
//! vectorbase = { version = "0.1", features = ["async"] }
//! ```
//!
//! ## Architecture
//!
//! VectorBase is organized into two crates:
//!
//! - **`vectorbase-core`** - Engine, schemas, storage; no async runtime dependency
//! - **`vectorbase`** - Main crate that re-exports everything
//!
//! ### Core Components
//!
//! - [`Engine`] - Collection operations over a [`storage::Store`]
//! - [`CollectionSchema`] / [`FieldSpec`] - Collection definitions
//! - [`SimilarityQuery`] - Nearest-neighbor search with equality filters
//! - [`ResourceQuery`] - Lookups in the read-only resource catalog
//! - [`ContentStore`] - Text blobs addressed by content identifier
//! - [`storage::TableStore`] - Embedded transactional store with WAL durability
//!
//! ## Error Handling
//!
//! Each operation returns its own error enum ([`SchemaError`],
//! [`WriteError`], [`SearchError`], ...). All of them convert into [`Error`],
//! so `?` works inside functions returning [`Result<T>`](crate::Result).
//!
//! ## Thread Safety
//!
//! - [`Engine`] is `Send + Sync`; share it behind an `Arc`
//! - [`storage::TableStore`] serializes writers and lets readers run together
//! - `AsyncEngine` is `Clone` and safe to share across tasks

// Re-export everything from core
pub use vectorbase_core::*;
