//! HNSW graph — core data structures and algorithms.
//!
//! Implements the Hierarchical Navigable Small World graph from:
//! "Efficient and robust approximate nearest neighbor search using
//!  Hierarchical Navigable Small World graphs" (Malkov & Yashunin, 2016/2018).
//!
//! Nodes are append-only: a node's ID is its insertion position, which is also
//! the ordinal of the example it was embedded from. All stored vectors are in
//! unit form, so distances reduce to `1 - dot`.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::distance::unit_cosine_distance;

use super::neighbor_queue::{Frontier, Neighbor, ResultSet};

/// Configuration parameters for the HNSW index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Max number of connections per node (layers > 0).
    pub m: usize,
    /// Max connections at layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Number of candidates during construction.
    pub ef_construction: usize,
    /// Number of candidates during search.
    pub ef_search: usize,
    /// Level generation factor: 1 / ln(m).
    pub ml: f64,
    /// Maximum number of layers.
    pub max_layers: usize,
    /// Seed for level generation, so identical inputs build identical graphs.
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::new(16, 200, 50)
    }
}

impl HnswParams {
    pub fn new(m: usize, ef_construction: usize, ef_search: usize) -> Self {
        let m = m.max(2);
        Self {
            m,
            m_max0: 2 * m,
            ef_construction,
            ef_search,
            ml: 1.0 / (m as f64).ln(),
            max_layers: 16,
            seed: 100,
        }
    }
}

/// A node in the HNSW graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    vector: Vec<f32>,
    /// Neighbors per layer. neighbors[l] is the list of neighbor IDs at layer l.
    neighbors: Vec<Vec<usize>>,
    /// The maximum layer this node was inserted into.
    level: usize,
}

fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(HnswParams::default().seed)
}

/// The HNSW graph structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswGraph {
    nodes: Vec<HnswNode>,
    /// Entry point node ID (highest-level node).
    entry_point: Option<usize>,
    /// Current maximum level in the graph.
    max_level: usize,
    params: HnswParams,
    #[serde(skip, default = "seeded_rng")]
    rng: StdRng,
}

impl HnswGraph {
    pub fn new(params: HnswParams) -> Self {
        let rng = StdRng::seed_from_u64(params.seed);
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            params,
            rng,
        }
    }

    /// Re-derive the level RNG after deserialization so further inserts stay
    /// deterministic for a given params/size pair.
    pub(crate) fn reseed(&mut self) {
        self.rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(self.nodes.len() as u64));
    }

    pub fn params(&self) -> &HnswParams {
        &self.params
    }

    pub(crate) fn set_ef_search(&mut self, ef: usize) {
        self.params.ef_search = ef.max(1);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The stored (unit-form) vector for a node.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        self.nodes.get(id).map(|n| n.vector.as_slice())
    }

    /// Generate a random level for a new node.
    fn random_level(&mut self) -> usize {
        let r: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let level = (-r.ln() * self.params.ml).floor() as usize;
        level.min(self.params.max_layers - 1)
    }

    fn distance(&self, query: &[f32], node_id: usize) -> f32 {
        unit_cosine_distance(query, &self.nodes[node_id].vector)
    }

    /// SEARCH-LAYER: Algorithm 2 from the HNSW paper.
    ///
    /// Returns up to `ef` closest neighbors found on `layer`, ascending.
    fn search_layer(&self, query: &[f32], ep: &[usize], ef: usize, layer: usize) -> Vec<Neighbor> {
        let mut visited = HashSet::new();
        let mut frontier = Frontier::new();
        let mut results = ResultSet::with_limit(ef);

        for &ep_id in ep {
            if visited.insert(ep_id) {
                let n = Neighbor::new(ep_id, self.distance(query, ep_id));
                frontier.push(n);
                results.offer(n);
            }
        }

        while let Some(c) = frontier.pop_closest() {
            // Once the result set is full, nothing closer than its worst entry remains.
            if results.is_full() && results.worst_distance().is_some_and(|w| c.distance > w) {
                break;
            }

            let Some(links) = self.nodes[c.id].neighbors.get(layer) else {
                continue;
            };
            for &neighbor_id in links {
                if !visited.insert(neighbor_id) {
                    continue;
                }
                let n = Neighbor::new(neighbor_id, self.distance(query, neighbor_id));
                if results.offer(n) {
                    frontier.push(n);
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Prune a node's neighbor list at a given layer to at most `m` neighbors.
    fn prune_neighbors(&mut self, node_id: usize, layer: usize, m: usize) {
        let node = &self.nodes[node_id];
        let mut scored: Vec<Neighbor> = node.neighbors[layer]
            .iter()
            .map(|&nid| Neighbor::new(nid, unit_cosine_distance(&node.vector, &self.nodes[nid].vector)))
            .collect();

        scored.sort();
        scored.truncate(m);

        self.nodes[node_id].neighbors[layer] = scored.into_iter().map(|n| n.id).collect();
    }

    /// INSERT: Algorithm 1 from the HNSW paper. Returns the new node's ID.
    pub fn insert(&mut self, vector: Vec<f32>) -> usize {
        let level = self.random_level();
        let id = self.nodes.len();

        self.nodes.push(HnswNode {
            vector,
            neighbors: vec![Vec::new(); level + 1],
            level,
        });

        let entry_point = match self.entry_point {
            None => {
                self.entry_point = Some(id);
                self.max_level = level;
                return id;
            }
            Some(ep) => ep,
        };

        let query = self.nodes[id].vector.clone();
        let mut ep_id = entry_point;
        let current_max_level = self.max_level;

        // Phase 1: Greedy descent from top layer down to level+1 (ef=1)
        if current_max_level > level {
            for l in (level + 1..=current_max_level).rev() {
                if let Some(n) = self.search_layer(&query, &[ep_id], 1, l).first() {
                    ep_id = n.id;
                }
            }
        }

        // Phase 2: Insert at layers min(level, current_max_level) down to 0
        for l in (0..=level.min(current_max_level)).rev() {
            let m = if l == 0 { self.params.m_max0 } else { self.params.m };

            let nearest = self.search_layer(&query, &[ep_id], self.params.ef_construction, l);
            let neighbors: Vec<usize> = nearest
                .iter()
                .filter(|n| n.id != id)
                .take(m)
                .map(|n| n.id)
                .collect();

            self.nodes[id].neighbors[l] = neighbors.clone();

            for &neighbor_id in &neighbors {
                let list = &mut self.nodes[neighbor_id].neighbors[l];
                list.push(id);
                if list.len() > m {
                    self.prune_neighbors(neighbor_id, l, m);
                }
            }

            if let Some(n) = nearest.first() {
                ep_id = n.id;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }

        id
    }

    /// SEARCH: Algorithm 5 from the HNSW paper.
    ///
    /// `query` must already be in unit form. Returns at most `k` neighbors.
    pub fn search_knn(&self, query: &[f32], k: usize, ef: usize) -> Vec<Neighbor> {
        let Some(mut ep_id) = self.entry_point else {
            return Vec::new();
        };

        for l in (1..=self.max_level).rev() {
            if let Some(n) = self.search_layer(query, &[ep_id], 1, l).first() {
                ep_id = n.id;
            }
        }

        let mut results = self.search_layer(query, &[ep_id], ef.max(k), 0);
        results.truncate(k);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::to_unit;

    fn make_params() -> HnswParams {
        HnswParams::new(4, 32, 16)
    }

    fn unit(data: Vec<f32>) -> Vec<f32> {
        to_unit(&data).unwrap()
    }

    #[test]
    fn test_insert_assigns_sequential_ids() {
        let mut graph = HnswGraph::new(make_params());
        for i in 0..10 {
            let id = graph.insert(unit(vec![1.0 + i as f32, 1.0, 0.5]));
            assert_eq!(id, i);
        }
        assert_eq!(graph.len(), 10);
        assert!(graph.entry_point.is_some());
    }

    #[test]
    fn test_self_search() {
        let mut graph = HnswGraph::new(make_params());
        let vectors: Vec<Vec<f32>> = (0..100)
            .map(|i| {
                unit(vec![
                    1.0 + (i as f32) * 0.1,
                    ((i * 7 % 11) as f32) * 0.3,
                    ((i * 13 % 17) as f32) * 0.2,
                ])
            })
            .collect();

        for v in &vectors {
            graph.insert(v.clone());
        }

        for (i, v) in vectors.iter().enumerate() {
            let results = graph.search_knn(v, 1, 32);
            assert!(!results.is_empty(), "No results for vector {}", i);
            assert!(
                results[0].distance < 1e-4,
                "Self-search for {} returned distance {} (id={})",
                i,
                results[0].distance,
                results[0].id
            );
        }
    }

    #[test]
    fn test_search_knn_orders_by_angle() {
        let mut graph = HnswGraph::new(make_params());
        graph.insert(unit(vec![1.0, 0.0]));
        graph.insert(unit(vec![1.0, 1.0]));
        graph.insert(unit(vec![0.0, 1.0]));
        graph.insert(unit(vec![-1.0, 0.0]));

        let results = graph.search_knn(&unit(vec![1.0, 0.1]), 4, 16);
        let ids: Vec<usize> = results.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_same_seed_builds_same_graph() {
        let data: Vec<Vec<f32>> = (0..50).map(|i| unit(vec![1.0, i as f32, (i % 5) as f32])).collect();
        let mut a = HnswGraph::new(make_params());
        let mut b = HnswGraph::new(make_params());
        for v in &data {
            a.insert(v.clone());
            b.insert(v.clone());
        }
        let q = unit(vec![1.0, 3.3, 2.0]);
        let ra: Vec<usize> = a.search_knn(&q, 5, 16).iter().map(|n| n.id).collect();
        let rb: Vec<usize> = b.search_knn(&q, 5, 16).iter().map(|n| n.id).collect();
        assert_eq!(ra, rb);
    }

    #[test]
    fn test_empty_graph_search() {
        let graph = HnswGraph::new(make_params());
        assert!(graph.search_knn(&[1.0, 0.0], 3, 16).is_empty());
    }
}
