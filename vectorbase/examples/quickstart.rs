//! Quick start example for VectorBase.
//!
//! Creates a collection, inserts a few documents and searches them.

use vectorbase::prelude::*;

fn main() -> Result<()> {
    println!("VectorBase Quick Start Example\n");

    // Small dimension for demonstration; real embeddings are 384-1536 dim
    let engine = Engine::in_memory(HashingEmbedder::new(8))?;

    let schema = CollectionSchema::new("articles")
        .with_field(FieldSpec::int64("id").primary())
        .with_field(FieldSpec::string("title"))
        .with_field(FieldSpec::string("topic"))
        .with_field(FieldSpec::vector("embedding", 8));
    engine.create_collection(&schema)?;

    let documents = [
        (1, "Introduction to Rust programming", "rust", [0.9, 0.8, 0.1, 0.0, 0.1, 0.0, 0.2, 0.1]),
        (2, "Advanced Rust patterns and idioms", "rust", [0.85, 0.9, 0.15, 0.05, 0.1, 0.0, 0.25, 0.15]),
        (3, "Python for data science", "python", [0.1, 0.2, 0.9, 0.85, 0.0, 0.1, 0.0, 0.2]),
        (4, "Machine learning fundamentals", "ml", [0.2, 0.1, 0.7, 0.8, 0.6, 0.7, 0.1, 0.3]),
        (5, "Systems programming with Rust", "rust", [0.8, 0.7, 0.2, 0.1, 0.15, 0.05, 0.3, 0.2]),
    ];

    let records: Vec<Record> = documents
        .iter()
        .map(|(id, title, topic, embedding)| {
            Record::new()
                .with_field("id", *id)
                .with_field("title", *title)
                .with_field("topic", *topic)
                .with_field("embedding", embedding.to_vec())
        })
        .collect();

    println!("Inserting {} documents...", records.len());
    let ack = engine.insert("articles", &records)?;
    println!("Inserted {} rows\n", ack.count);

    let query = vec![0.88, 0.85, 0.12, 0.03, 0.12, 0.02, 0.22, 0.12];
    println!("Searching for documents similar to 'Rust programming'...\n");
    let hits = engine.search(&SimilarityQuery::new("articles", "embedding", query.clone()).with_limit(3))?;
    print_hits("Top 3 Results", &hits);

    println!("Searching with filter (topic = 'python')...\n");
    let filtered = engine.search(
        &SimilarityQuery::new("articles", "embedding", query)
            .with_metric(Metric::L2)
            .with_filter("topic", "python"),
    )?;
    print_hits("Filtered Results", &filtered);

    println!("Done!");
    Ok(())
}

fn print_hits(heading: &str, hits: &[SearchHit]) {
    println!("{heading}:");
    println!("{:-<60}", "");
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "  {}. [ID: {}] {} (similarity: {:.4})",
            rank + 1,
            hit.record.get_i64("id").unwrap_or_default(),
            hit.record.get_str("title").unwrap_or("Unknown"),
            hit.similarity
        );
    }
    println!("{:-<60}\n", "");
}
