//! Candidate and result queues for graph search, ordered by distance with the
//! node ID as tie-breaker so runs are reproducible.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A node ID plus its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub distance: f32,
    pub id: usize,
}

impl Neighbor {
    pub fn new(id: usize, distance: f32) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// The best `limit` neighbors seen so far. The worst one is evicted first.
#[derive(Debug)]
pub struct ResultSet {
    heap: BinaryHeap<Neighbor>,
    limit: usize,
}

impl ResultSet {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(limit + 1),
            limit: limit.max(1),
        }
    }

    /// Keep `n` if there is room or it beats the current worst entry.
    pub fn offer(&mut self, n: Neighbor) -> bool {
        if self.is_full() && self.heap.peek().is_some_and(|worst| n >= *worst) {
            return false;
        }
        self.heap.push(n);
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
        true
    }

    /// Distance of the worst kept neighbor.
    pub fn worst_distance(&self) -> Option<f32> {
        self.heap.peek().map(|n| n.distance)
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.limit
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Ascending by distance.
    pub fn into_sorted_vec(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}

/// Nodes still to expand, closest first.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Reverse<Neighbor>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, n: Neighbor) {
        self.heap.push(Reverse(n));
    }

    pub fn pop_closest(&mut self) -> Option<Neighbor> {
        self.heap.pop().map(|Reverse(n)| n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontier_pops_closest_first() {
        let mut frontier = Frontier::new();
        for (id, d) in [(0, 3.0), (1, 1.0), (2, 2.0)] {
            frontier.push(Neighbor::new(id, d));
        }
        let order: Vec<usize> = std::iter::from_fn(|| frontier.pop_closest()).map(|n| n.id).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_result_set_keeps_best() {
        let mut results = ResultSet::with_limit(2);
        assert!(results.offer(Neighbor::new(0, 5.0)));
        assert!(results.offer(Neighbor::new(1, 1.0)));
        assert!(results.offer(Neighbor::new(2, 3.0)));
        assert!(!results.offer(Neighbor::new(3, 4.0)));

        assert_eq!(results.len(), 2);
        assert_eq!(results.worst_distance(), Some(3.0));
        let ids: Vec<usize> = results.into_sorted_vec().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_ties_break_on_id() {
        let mut results = ResultSet::with_limit(1);
        results.offer(Neighbor::new(7, 0.5));
        results.offer(Neighbor::new(3, 0.5));
        assert_eq!(results.into_sorted_vec()[0].id, 3);
    }
}
