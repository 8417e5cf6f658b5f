//! Cosine distance, the only metric the index supports.
//!
//! Vectors are put into unit form once, on the way into the index, so the
//! hot path only needs a dot product.

use crate::error::{AnnError, Result};
use serde::{Deserialize, Serialize};

/// Distance metric tag recorded in index files and manifests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// 1 - cosine similarity, in [0, 2]
    Cosine,
}

impl DistanceMetric {
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
        }
    }
}

/// L2 norm.
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Unit-length copy of `v` for cosine storage.
///
/// A zero vector stays zero and so sits at distance 1.0 from everything.
/// NaN or infinite components are rejected.
pub fn to_unit(v: &[f32]) -> Result<Vec<f32>> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(AnnError::InvalidVector {
            reason: "Embedding contains NaN or infinite values".to_string(),
        });
    }
    let n = norm(v);
    if n == 0.0 {
        return Ok(v.to_vec());
    }
    Ok(v.iter().map(|x| x / n).collect())
}

/// Distance between two vectors already in unit form: 1 - dot.
pub fn unit_cosine_distance(v1: &[f32], v2: &[f32]) -> f32 {
    let dot: f32 = v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}

/// Cosine distance between two arbitrary vectors.
pub fn cosine_distance(v1: &[f32], v2: &[f32]) -> f32 {
    let (n1, n2) = (norm(v1), norm(v2));
    if n1 == 0.0 || n2 == 0.0 {
        return 1.0;
    }
    let dot: f32 = v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum();
    1.0 - (dot / (n1 * n2)).clamp(-1.0, 1.0)
}
