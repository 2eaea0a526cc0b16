//! Distance metrics and similarity scores.
//!
//! The store ranks rows by *distance* (lower is nearer). Callers see a
//! *similarity* (higher is better) derived per metric:
//!
//! | Metric | Distance `d` | Similarity |
//! |---|---|---|
//! | `L2` | `‖q − v‖` | `1 / (1 + d)`, in `(0, 1]` |
//! | `InnerProduct` | `−(q · v)` | `q · v` |
//! | `Cosine` | `1 − cos(q, v)` | `1 − d`, the cosine similarity |
//!
//! Every similarity is strictly decreasing in its distance, so ordering by
//! distance ascending and by similarity descending agree.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean distance.
    #[serde(rename = "l2", alias = "L2")]
    L2,
    /// Negative inner product.
    #[serde(rename = "ip", alias = "InnerProduct")]
    InnerProduct,
    /// Cosine distance.
    #[default]
    #[serde(rename = "cosine", alias = "Cosine")]
    Cosine,
}

impl Metric {
    /// Computes the distance between two vectors. Lower is nearer.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if the vectors have different dimensions.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");

        match self {
            Metric::L2 => euclidean_distance(a, b),
            Metric::InnerProduct => -dot_product(a, b),
            Metric::Cosine => cosine_distance(a, b),
        }
    }

    /// Converts a distance produced by [`Metric::distance`] into a similarity.
    #[inline]
    pub fn similarity(&self, distance: f32) -> f32 {
        match self {
            Metric::L2 => 1.0 / (1.0 + distance),
            Metric::InnerProduct => -distance,
            Metric::Cosine => 1.0 - distance,
        }
    }

    /// Returns the wire name of the metric.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::L2 => "l2",
            Metric::InnerProduct => "ip",
            Metric::Cosine => "cosine",
        }
    }

    /// Returns the distance operator used in rendered commands.
    pub fn operator(&self) -> &'static str {
        match self {
            Metric::L2 => "<->",
            Metric::InnerProduct => "<#>",
            Metric::Cosine => "<=>",
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l2" | "L2" => Ok(Metric::L2),
            "ip" | "InnerProduct" => Ok(Metric::InnerProduct),
            "cosine" | "Cosine" => Ok(Metric::Cosine),
            other => Err(format!("unknown metric `{other}`")),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes Euclidean (L2) distance between two vectors.
///
/// Formula: sqrt(sum((a[i] - b[i])^2))
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    euclidean_distance_squared(a, b).sqrt()
}

/// Computes squared Euclidean distance.
#[inline]
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Computes cosine distance between two vectors.
///
/// Formula: 1 - (a · b) / (||a|| * ||b||)
/// Range: [0, 2]. A zero-norm vector is at distance 1 from everything.
///
/// Accumulates in `f64` so that large finite components cannot overflow.
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    let ratio = dot / denominator;
    if denominator == 0.0 || !ratio.is_finite() {
        return 1.0;
    }

    // Rounding can push the ratio slightly past ±1.
    (1.0 - ratio.clamp(-1.0, 1.0)) as f32
}

/// Computes dot product (inner product) between two vectors.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
