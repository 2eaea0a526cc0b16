//! Persistence demonstration for VectorBase.
//!
//! This example shows how to:
//! 1. Open a durable engine
//! 2. Insert records, with text embedded on the way in
//! 3. Close and reopen (simulating restart)
//! 4. Verify data persists

use serde_json::json;
use std::fs;
use vectorbase::prelude::*;

const DIM: usize = 64;

fn open(path: &str) -> Result<Engine> {
    Engine::open(
        path,
        StoreConfig::default(),
        HashingEmbedder::new(DIM),
        EngineConfig::default(),
    )
}

fn main() -> Result<()> {
    let data_path = "./demo_vectorbase";

    // Clean up any previous run
    let _ = fs::remove_dir_all(data_path);

    println!("VectorBase Persistence Demo\n");

    println!("Phase 1: Creating collection and inserting notes...");
    {
        let engine = open(data_path)?;
        let schema = CollectionSchema::new("notes")
            .with_field(FieldSpec::int64("id").primary())
            .with_field(FieldSpec::string("text"))
            .with_field(FieldSpec::vector("embedding", DIM as u32).embeddable());
        engine.create_collection(&schema)?;

        let notes = [
            (1, "Rust programming basics"),
            (2, "Advanced Rust patterns"),
            (3, "Python data science"),
            (4, "Machine learning"),
            (5, "Systems with Rust"),
        ];
        let records: Vec<Record> = notes
            .iter()
            .map(|(id, text)| {
                Record::new()
                    .with_field("id", *id)
                    .with_field("text", *text)
                    .with_field("embedding", *text)
            })
            .collect();
        engine.insert("notes", &records)?;

        let mut conditions = Conditions::new();
        conditions.insert("id".to_string(), json!(4));
        let deleted = engine.delete("notes", &conditions)?;
        println!("   Inserted {}, deleted {}", records.len(), deleted.deleted_count);

        engine.close()?;
        println!("   Engine closed\n");
    }

    println!("Phase 2: Reopening...");
    {
        let engine = open(data_path)?;
        println!("   Collections: {:?}", engine.list_collections()?);
        println!("   Notes: {}\n", engine.count("notes")?);

        let query = HashingEmbedder::new(DIM).embed("Rust patterns")?;
        let hits = engine.search(&SimilarityQuery::new("notes", "embedding", query).with_limit(3))?;
        println!("   Nearest to 'Rust patterns':");
        for hit in &hits {
            println!(
                "     {} (similarity: {:.4})",
                hit.record.get_str("text").unwrap_or("?"),
                hit.similarity
            );
        }

        engine.close()?;
    }

    let _ = fs::remove_dir_all(data_path);
    println!("\nPersistence demo complete!");
    Ok(())
}
