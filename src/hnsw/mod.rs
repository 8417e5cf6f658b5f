//! HNSW (Hierarchical Navigable Small World) vector index.
//!
//! The index is fixed-capacity and append-only: `init` declares capacity and
//! dimension, `add_items` assigns IDs in call order, and `load` must declare
//! the same capacity the index was saved with.

pub mod graph;
pub mod neighbor_queue;

pub use graph::{HnswGraph, HnswParams};

use std::ops::Range;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance::{to_unit, unit_cosine_distance, DistanceMetric};
use crate::error::{AnnError, Result};
use crate::persistence::index_file;

use neighbor_queue::{Neighbor, ResultSet};

/// A cosine HNSW index with a fixed element capacity.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswIndex {
    graph: HnswGraph,
    capacity: usize,
    dimension: usize,
    metric: DistanceMetric,
    /// Fingerprint of the collection the vectors came from, when known.
    collection_fingerprint: Option<String>,
}

impl HnswIndex {
    /// Create an empty index holding at most `capacity` vectors of width `dimension`.
    pub fn init(capacity: usize, dimension: usize, params: HnswParams) -> Self {
        Self {
            graph: HnswGraph::new(params),
            capacity,
            dimension,
            metric: DistanceMetric::Cosine,
            collection_fingerprint: None,
        }
    }

    /// Append vectors in call order. Returns the ID range assigned to them.
    ///
    /// Fails without inserting anything if the batch would exceed capacity or
    /// any vector has the wrong width.
    pub fn add_items(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>> {
        let start = self.graph.len();
        let requested = start + vectors.len();
        if requested > self.capacity {
            return Err(AnnError::CapacityExceeded {
                capacity: self.capacity,
                requested,
            });
        }

        let prepared = vectors
            .iter()
            .map(|v| self.prepare(v))
            .collect::<Result<Vec<_>>>()?;

        for v in prepared {
            self.graph.insert(v);
        }
        Ok(start..self.graph.len())
    }

    /// k nearest neighbors of `query`, ascending by distance.
    ///
    /// Asking for more neighbors than the index holds is an error, never a
    /// silent truncation.
    pub fn knn_query(&self, query: &[f32], k: usize) -> Result<(Vec<usize>, Vec<f32>)> {
        if k > self.len() {
            return Err(AnnError::InsufficientElements {
                requested: k,
                available: self.len(),
            });
        }
        if k == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let query = self.prepare(query)?;
        let mut found = self.graph.search_knn(&query, k, self.graph.params().ef_search);
        if found.len() < k {
            tracing::debug!(
                found = found.len(),
                k,
                "graph search came up short, falling back to exhaustive scan"
            );
            found = self.exhaustive_knn(&query, k);
        }

        Ok(found.into_iter().map(|n| (n.id, n.distance)).unzip())
    }

    fn exhaustive_knn(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let scored: Vec<Neighbor> = (0..self.len())
            .into_par_iter()
            .filter_map(|id| {
                self.graph
                    .vector(id)
                    .map(|v| Neighbor::new(id, unit_cosine_distance(query, v)))
            })
            .collect();

        let mut best = ResultSet::with_limit(k);
        for n in scored {
            best.offer(n);
        }
        best.into_sorted_vec()
    }

    fn prepare(&self, v: &[f32]) -> Result<Vec<f32>> {
        if v.len() != self.dimension {
            return Err(AnnError::DimensionMismatch {
                expected: self.dimension,
                actual: v.len(),
            });
        }
        to_unit(v)
    }

    /// Serialize the index to a single file at `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        index_file::write(path.as_ref(), self)
    }

    /// Reload an index, declaring the capacity it is expected to have.
    pub fn load(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let mut index: HnswIndex = index_file::read(path.as_ref())?;
        if index.len() != capacity {
            return Err(AnnError::CapacityMismatch {
                indexed: index.len(),
                collection: capacity,
            });
        }
        index.capacity = capacity;
        index.graph.reseed();
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn params(&self) -> &HnswParams {
        self.graph.params()
    }

    /// Tag the index with the fingerprint of its source collection. It is
    /// saved with the vectors, so it cannot drift from them.
    pub fn set_collection_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.collection_fingerprint = Some(fingerprint.into());
    }

    pub fn collection_fingerprint(&self) -> Option<&str> {
        self.collection_fingerprint.as_deref()
    }

    /// Change the search beam width. Takes effect on the next query.
    pub fn set_ef_search(&mut self, ef: usize) {
        self.graph.set_ef_search(ef);
    }
}
