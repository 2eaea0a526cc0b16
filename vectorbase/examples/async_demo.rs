//! Async API demo using AsyncEngine.
//!
//! Run with: cargo run --example async_demo --features async
//!
//! Set `RUST_LOG=vectorbase_core=debug` to see each storage command.

use vectorbase::prelude::*;

#[cfg(feature = "async")]
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Async VectorBase Demo\n");

    let engine = AsyncEngine::new(Engine::in_memory(HashingEmbedder::new(128))?);
    engine
        .create_collection(
            CollectionSchema::new("items")
                .with_field(FieldSpec::int64("id").primary())
                .with_field(FieldSpec::string("category"))
                .with_field(FieldSpec::vector("embedding", 128)),
        )
        .await?;

    println!("Inserting 100 batches of 10 concurrently...");
    let start = std::time::Instant::now();

    let mut handles = vec![];
    for batch in 0..100i64 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let records: Vec<Record> = (0..10)
                .map(|j| {
                    let i = batch * 10 + j;
                    let vector: Vec<f32> = (0..128).map(|k| ((i * 128 + k) as f32).sin()).collect();
                    Record::new()
                        .with_field("id", i)
                        .with_field("category", if i % 2 == 0 { "even" } else { "odd" })
                        .with_field("embedding", vector)
                })
                .collect();
            engine.insert("items".to_string(), records).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| Error::Runtime(format!("task failed: {}", e)))??;
    }

    println!("   [OK] Inserted in {:?}", start.elapsed());
    println!("   Total rows: {}\n", engine.count("items".to_string()).await?);

    println!("Searching...");
    let query: Vec<f32> = (0..128).map(|i| (i as f32 * 0.1).cos()).collect();
    let hits = engine
        .search(
            SimilarityQuery::new("items", "embedding", query)
                .with_filter("category", "odd")
                .with_limit(5),
        )
        .await?;

    println!("   Top 5 odd results:");
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "     {}. ID {} (similarity: {:.4})",
            i + 1,
            hit.record.get_i64("id").unwrap_or_default(),
            hit.similarity
        );
    }

    engine.close().await?;
    println!("\nAsync demo complete!");
    Ok(())
}

#[cfg(not(feature = "async"))]
fn main() {
    println!("Run with: cargo run --example async_demo --features async");
}
