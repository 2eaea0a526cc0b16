//! Embedding providers.
//!
//! The engine treats the embedding model as an opaque `embed(text) -> vector`
//! collaborator. Anything implementing [`EmbeddingProvider`] can be plugged
//! in, including plain closures:
//!
//! ```
//! use vectorbase_core::{EmbeddingError, EmbeddingProvider};
//!
//! let constant = |_text: &str| -> Result<Vec<f32>, EmbeddingError> { Ok(vec![1.0, 0.0]) };
//! assert_eq!(constant.embed("anything").unwrap(), vec![1.0, 0.0]);
//! ```

use crate::error::EmbeddingError;

/// Turns text into a fixed-dimension vector.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

impl<F> EmbeddingProvider for F
where
    F: Fn(&str) -> Result<Vec<f32>, EmbeddingError> + Send + Sync,
{
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self(text)
    }
}

/// A provider for engines that never embed. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEmbedder;

impl EmbeddingProvider for NoEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Provider(
            "no embedding provider configured".into(),
        ))
    }
}

/// Deterministic bag-of-words embedder based on feature hashing.
///
/// Each lowercase alphanumeric token is hashed with CRC32 into one of
/// `dimension` buckets with a hash-derived sign, and the result is
/// L2-normalized. Texts sharing words land close under cosine distance, which
/// makes it useful for tests and demos; it has no semantic understanding.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Provider("dimension must be positive".into()));
        }

        let mut v = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = crc32fast::hash(token.to_lowercase().as_bytes());
            let bucket = hash as usize % self.dimension;
            let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::cosine_distance;

    #[test]
    fn test_hashing_embedder_dimension_and_norm() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed("hello vector world").unwrap();
        assert_eq!(v.len(), 16);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_case_insensitive() {
        let embedder = HashingEmbedder::new(32);
        assert_eq!(
            embedder.embed("Rust is fast").unwrap(),
            embedder.embed("rust IS fast").unwrap()
        );
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("vector databases store embeddings").unwrap();
        let b = embedder.embed("embeddings in vector databases").unwrap();
        let c = embedder.embed("tomatoes grow in summer").unwrap();
        assert!(cosine_distance(&a, &b) < cosine_distance(&a, &c));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(4).embed("  ").unwrap();
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn test_no_embedder_fails() {
        assert!(matches!(
            NoEmbedder.embed("x"),
            Err(EmbeddingError::Provider(_))
        ));
    }

    #[test]
    fn test_closure_provider() {
        let provider = |text: &str| -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32])
        };
        assert_eq!(provider.embed("abc").unwrap(), vec![3.0]);
    }
}
