use proptest::prelude::*;
use vectorbase_core::distance::{cosine_distance, dot_product};
use vectorbase_core::prelude::*;
use vectorbase_core::{DeleteError, Ident, NoEmbedder};

const DIM: usize = 4;

fn metric_strategy() -> impl Strategy<Value = Metric> {
    prop_oneof![
        Just(Metric::L2),
        Just(Metric::InnerProduct),
        Just(Metric::Cosine)
    ]
}

fn vector_strategy() -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, DIM)
}

fn engine_with(vectors: &[Vec<f32>]) -> Engine {
    let engine = Engine::in_memory(NoEmbedder).unwrap();
    engine
        .create_collection(
            &CollectionSchema::new("points")
                .with_field(FieldSpec::int64("id").primary())
                .with_field(FieldSpec::vector("v", DIM as u32)),
        )
        .unwrap();
    let records: Vec<Record> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Record::new()
                .with_field("id", i as i64)
                .with_field("v", v.clone())
        })
        .collect();
    engine.insert("points", &records).unwrap();
    engine
}

proptest! {
    #[test]
    fn test_search_respects_limit_and_order(
        vectors in proptest::collection::vec(vector_strategy(), 0..30),
        query in vector_strategy(),
        limit in 1usize..20,
        metric in metric_strategy(),
    ) {
        let engine = engine_with(&vectors);
        let hits = engine
            .search(&SimilarityQuery::new("points", "v", query).with_metric(metric).with_limit(limit))
            .unwrap();

        prop_assert!(hits.len() <= limit);
        prop_assert_eq!(hits.len(), limit.min(vectors.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_inserted_vector_is_its_own_nearest(
        target in proptest::collection::vec(0.1f32..1.0f32, DIM),
        others in proptest::collection::vec(vector_strategy(), 0..10),
    ) {
        let mut vectors = vec![target.clone()];
        vectors.extend(others);
        let engine = engine_with(&vectors);

        let hits = engine
            .search(&SimilarityQuery::new("points", "v", target).with_limit(1))
            .unwrap();
        prop_assert_eq!(hits.len(), 1);
        prop_assert_eq!(hits[0].record.get_i64("id"), Some(0));
        prop_assert!((hits[0].similarity - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_similarity_decreases_with_distance(
        metric in metric_strategy(),
        a in 0.0f32..2.0,
        b in 0.0f32..2.0,
    ) {
        let (near, far) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(metric.similarity(near) >= metric.similarity(far));
    }

    #[test]
    fn test_cosine_matches_naive(
        a in proptest::collection::vec(-1.0f32..1.0f32, 1..64),
        b in proptest::collection::vec(-1.0f32..1.0f32, 1..64)
    ) {
        let len = std::cmp::min(a.len(), b.len());
        let a = &a[..len];
        let b = &b[..len];

        // Skip near-zero vectors
        if dot_product(a, a) < 1e-6 || dot_product(b, b) < 1e-6 {
            return Ok(());
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        let naive = 1.0 - (dot / (norm_a * norm_b));

        prop_assert!((cosine_distance(a, b) - naive).abs() < 1e-4);
    }

    #[test]
    fn test_plain_identifiers_accepted(name in "c_[a-z0-9_]{0,40}") {
        prop_assert!(Ident::new(name).is_ok());
    }

    #[test]
    fn test_identifiers_with_metacharacters_rejected(
        prefix in "[a-z]{1,10}",
        bad in prop::sample::select(vec!['"', '\'', ';', ' ', '-', '(', ')', '.', '*', '\\']),
        suffix in "[a-z]{0,10}",
    ) {
        let name = format!("{prefix}{bad}{suffix}");
        prop_assert!(Ident::new(name).is_err());
    }

    #[test]
    fn test_create_collection_is_idempotent(
        fields in proptest::collection::btree_map("f_[a-z]{1,8}", 0u8..6, 1..6),
        dimension in 1u32..64,
    ) {
        let engine = Engine::in_memory(NoEmbedder).unwrap();
        let schema = fields.iter().fold(CollectionSchema::new("generated"), |schema, (name, kind)| {
            let field = match kind {
                0 => FieldSpec::string(name.as_str()),
                1 => FieldSpec::int32(name.as_str()),
                2 => FieldSpec::int64(name.as_str()),
                3 => FieldSpec::float(name.as_str()),
                4 => FieldSpec::bool(name.as_str()),
                _ => FieldSpec::vector(name.as_str(), dimension),
            };
            schema.with_field(field)
        });

        engine.create_collection(&schema).unwrap();
        engine.create_collection(&schema).unwrap();
        prop_assert_eq!(engine.describe_collection("generated").unwrap(), Some(schema));
        prop_assert_eq!(engine.list_collections().unwrap(), vec!["generated".to_string()]);
    }

    #[test]
    fn test_unconditional_delete_always_refused(
        vectors in proptest::collection::vec(vector_strategy(), 0..10),
    ) {
        let engine = engine_with(&vectors);
        prop_assert!(matches!(
            engine.delete("points", &Conditions::new()),
            Err(DeleteError::UnsafeDeleteAll)
        ));
        prop_assert_eq!(engine.count("points").unwrap(), vectors.len() as u64);
    }
}
