//! End-to-end behavior of the engine through its public API.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use vectorbase_core::prelude::*;
use vectorbase_core::{
    DeleteError, FieldTypeError, NoEmbedder, SchemaError, SearchError, WriteError,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "vectorbase_scenario_{}_{}",
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn docs_schema() -> CollectionSchema {
    CollectionSchema::new("docs")
        .with_field(FieldSpec::int64("id").primary())
        .with_field(FieldSpec::string("content"))
        .with_field(FieldSpec::vector("embedding", 3))
}

fn doc(id: i64, content: &str, embedding: [f32; 3]) -> Record {
    Record::new()
        .with_field("id", id)
        .with_field("content", content)
        .with_field("embedding", embedding.to_vec())
}

#[test]
fn test_create_twice_keeps_shape() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    let schema = docs_schema();

    engine.create_collection(&schema).unwrap();
    engine.insert("docs", &[doc(1, "a", [1.0, 0.0, 0.0])]).unwrap();
    let ack = engine.create_collection(&schema).unwrap();

    assert_eq!(ack.collection, "docs");
    assert_eq!(engine.describe_collection("docs").unwrap(), Some(schema));
    assert_eq!(engine.count("docs").unwrap(), 1);
}

#[test]
fn test_conflicting_schema_rejected() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();

    let other = CollectionSchema::new("docs").with_field(FieldSpec::vector("embedding", 4));
    assert!(matches!(
        engine.create_collection(&other),
        Err(SchemaError::SchemaConflict(_))
    ));
    assert_eq!(engine.describe_collection("docs").unwrap(), Some(docs_schema()));
}

#[test]
fn test_unknown_field_type_creates_nothing() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    let schema = CollectionSchema::new("docs")
        .with_field(FieldSpec::int64("id"))
        .with_field(FieldSpec::named("blob", "bytes"));

    let err = engine.create_collection(&schema).unwrap_err();
    assert!(matches!(err, SchemaError::InvalidFields(_)));
    assert_eq!(
        err.field_type_errors(),
        vec![&FieldTypeError::UnknownFieldType("bytes".to_string())]
    );
    assert!(engine.list_collections().unwrap().is_empty());
    assert_eq!(engine.describe_collection("docs").unwrap(), None);
}

#[test]
fn test_hostile_collection_name_rejected() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    let schema = CollectionSchema::new("docs\"; DROP TABLE docs; --")
        .with_field(FieldSpec::string("content"));

    assert!(matches!(
        engine.create_collection(&schema),
        Err(SchemaError::InvalidName(_))
    ));
    assert!(engine.list_collections().unwrap().is_empty());
}

#[test]
fn test_empty_delete_removes_nothing() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();
    engine
        .insert(
            "docs",
            &[doc(1, "a", [1.0, 0.0, 0.0]), doc(2, "b", [0.0, 1.0, 0.0])],
        )
        .unwrap();

    assert!(matches!(
        engine.delete("docs", &Conditions::new()),
        Err(DeleteError::UnsafeDeleteAll)
    ));
    assert_eq!(engine.count("docs").unwrap(), 2);

    let mut conditions = Conditions::new();
    conditions.insert("content".to_string(), json!("a"));
    assert_eq!(engine.delete("docs", &conditions).unwrap().deleted_count, 1);
    assert_eq!(engine.count("docs").unwrap(), 1);
}

#[test]
fn test_embeddable_text_is_stored_as_vector() {
    let engine = Engine::in_memory(HashingEmbedder::new(16)).unwrap();
    engine
        .create_collection(
            &CollectionSchema::new("notes")
                .with_field(FieldSpec::int64("id").primary())
                .with_field(FieldSpec::vector("embedding", 16).embeddable()),
        )
        .unwrap();

    let ack = engine
        .insert(
            "notes",
            &[Record::new()
                .with_field("id", 1)
                .with_field("embedding", "the quick brown fox")],
        )
        .unwrap();
    assert_eq!(ack.count, 1);

    let query = HashingEmbedder::new(16).embed("the quick brown fox").unwrap();
    let hits = engine
        .search(&SimilarityQuery::new("notes", "embedding", query))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.get_vector("embedding").unwrap().len(), 16);
    assert!((hits[0].similarity - 1.0).abs() < 1e-5);
}

#[test]
fn test_docs_search_exact_match() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();
    engine.insert("docs", &[doc(1, "a", [1.0, 0.0, 0.0])]).unwrap();

    let hits = engine
        .search(&SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0]).with_limit(5))
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.get_i64("id"), Some(1));
    assert_eq!(hits[0].record.get_str("content"), Some("a"));
    assert_eq!(hits[0].similarity, 1.0);
}

#[test]
fn test_search_orders_and_limits() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();
    engine
        .insert(
            "docs",
            &[
                doc(1, "x", [0.0, 1.0, 0.0]),
                doc(2, "near", [0.9, 0.1, 0.0]),
                doc(3, "exact", [1.0, 0.0, 0.0]),
                doc(4, "far", [-1.0, 0.0, 0.0]),
            ],
        )
        .unwrap();

    let hits = engine
        .search(&SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0]).with_limit(2))
        .unwrap();
    let ids: Vec<_> = hits.iter().filter_map(|h| h.record.get_i64("id")).collect();
    assert_eq!(ids, vec![3, 2]);

    let filtered = engine
        .search(
            &SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0])
                .with_filter("content", "far"),
        )
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].record.get_i64("id"), Some(4));

    assert!(matches!(
        engine.search(&SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0])),
        Err(SearchError::DimensionMismatch {
            expected: 3,
            got: 2
        })
    ));
}

#[test]
fn test_drop_twice_succeeds() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();

    engine.drop_collection("docs").unwrap();
    engine.drop_collection("docs").unwrap();
    assert!(engine.list_collections().unwrap().is_empty());
    assert!(matches!(
        engine.count("docs"),
        Err(SearchError::UnknownCollection(_))
    ));
}

#[test]
fn test_bad_row_rejects_whole_batch() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();

    let records = [
        doc(1, "a", [1.0, 0.0, 0.0]),
        Record::new()
            .with_field("id", 2)
            .with_field("embedding", vec![1.0, 0.0]),
        doc(3, "c", [0.0, 0.0, 1.0]),
    ];
    let err = engine.insert("docs", &records).unwrap_err();

    assert_eq!(err.row_index(), Some(1));
    assert_eq!(engine.count("docs").unwrap(), 0);
}

#[test]
fn test_duplicate_key_in_batch_rolls_back() {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine.create_collection(&docs_schema()).unwrap();

    let err = engine
        .insert(
            "docs",
            &[
                doc(1, "a", [1.0, 0.0, 0.0]),
                doc(2, "b", [0.0, 1.0, 0.0]),
                doc(1, "c", [0.0, 0.0, 1.0]),
            ],
        )
        .unwrap_err();

    assert!(matches!(err, WriteError::Row { row_index: 2, .. }));
    assert_eq!(engine.count("docs").unwrap(), 0);
}

#[test]
fn test_state_survives_reopen() {
    let dir = temp_dir();
    {
        let engine =
            Engine::open(&dir, StoreConfig::default(), NoEmbedder, EngineConfig::default())
                .unwrap();
        engine.create_collection(&docs_schema()).unwrap();
        engine
            .insert(
                "docs",
                &[doc(1, "a", [1.0, 0.0, 0.0]), doc(2, "b", [0.0, 1.0, 0.0])],
            )
            .unwrap();
        let mut conditions = Conditions::new();
        conditions.insert("id".to_string(), json!(2));
        engine.delete("docs", &conditions).unwrap();
        // Dropped without close: recovery replays the log.
    }

    let engine =
        Engine::open(&dir, StoreConfig::default(), NoEmbedder, EngineConfig::default()).unwrap();
    assert_eq!(engine.count("docs").unwrap(), 1);
    let hits = engine
        .search(&SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0]))
        .unwrap();
    assert_eq!(hits[0].record.get_str("content"), Some("a"));
    engine.close().unwrap();

    let engine =
        Engine::open(&dir, StoreConfig::default(), NoEmbedder, EngineConfig::default()).unwrap();
    assert_eq!(engine.count("docs").unwrap(), 1);
    engine.close().unwrap();

    std::fs::remove_dir_all(&dir).unwrap();
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_async_engine_round_trip() {
    let engine = AsyncEngine::new(Engine::in_memory(NoEmbedder).unwrap());
    engine.create_collection(docs_schema()).await.unwrap();
    engine
        .insert("docs".to_string(), vec![doc(1, "a", [1.0, 0.0, 0.0])])
        .await
        .unwrap();

    let hits = engine
        .search(SimilarityQuery::new("docs", "embedding", vec![1.0, 0.0, 0.0]))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);

    engine.close().await.unwrap();
    assert!(engine.list_collections().await.is_err());
}

#[cfg(feature = "async")]
#[tokio::test]
async fn test_async_write_timeout_leaves_no_row() {
    use std::sync::Arc;
    use std::time::Duration;
    use vectorbase_core::storage::TableStore;
    use vectorbase_core::EmbeddingError;

    let slow = |_: &str| -> std::result::Result<Vec<f32>, EmbeddingError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(vec![1.0, 0.0, 0.0])
    };
    let inner = Engine::new(
        Arc::new(TableStore::in_memory(StoreConfig::default())),
        Arc::new(slow),
        EngineConfig::default().with_operation_timeout(Duration::from_millis(50)),
    )
    .unwrap();
    inner
        .create_collection(
            &CollectionSchema::new("notes")
                .with_field(FieldSpec::int64("id").primary())
                .with_field(FieldSpec::vector("embedding", 3).embeddable()),
        )
        .unwrap();
    let engine = AsyncEngine::new(inner);

    let result = engine
        .insert(
            "notes".to_string(),
            vec![Record::new().with_field("id", 1).with_field("embedding", "text")],
        )
        .await;
    assert!(matches!(result, Err(Error::TimedOut(_))));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(engine.count("notes".to_string()).await.unwrap(), 0);

    // Vectors need no embedding and commit well inside the limit.
    let ack = engine
        .insert(
            "notes".to_string(),
            vec![Record::new()
                .with_field("id", 2)
                .with_field("embedding", vec![0.0, 1.0, 0.0])],
        )
        .await
        .unwrap();
    assert_eq!(ack.count, 1);
}
