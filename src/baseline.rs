//! Sequential reference labelling
//!
//! A single-threaded union-find over the whole edge list. Used by the CLI's
//! `--verify` flag and by the tests to check distributed results; label
//! values differ between strategies, so comparisons go through
//! [`same_partition`].

use rustc_hash::{FxHashMap, FxHashSet};

use crate::dsu::DisjointSet;
use crate::graph::{Edge, VertexId};

/// Component representative for every vertex in `[0, vertex_count)`
pub fn union_find_components(vertex_count: u32, edges: &[Edge]) -> Vec<VertexId> {
    let mut dsu = DisjointSet::new(vertex_count as usize);
    for edge in edges {
        dsu.unify(edge.from, edge.to);
    }
    (0..vertex_count).map(|v| dsu.find(v)).collect()
}

/// Number of distinct labels
pub fn count_components(labels: &[VertexId]) -> usize {
    labels.iter().collect::<FxHashSet<_>>().len()
}

/// True when both labellings group the vertices identically
///
/// Label values themselves are ignored; only the induced partition matters.
pub fn same_partition(a: &[VertexId], b: &[VertexId]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut forward: FxHashMap<VertexId, VertexId> = FxHashMap::default();
    let mut backward: FxHashMap<VertexId, VertexId> = FxHashMap::default();
    for (&x, &y) in a.iter().zip(b) {
        if *forward.entry(x).or_insert(y) != y || *backward.entry(y).or_insert(x) != x {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_and_isolated_vertex() {
        let edges = [Edge::new(0, 1), Edge::new(1, 2), Edge::new(0, 2)];
        let labels = union_find_components(4, &edges);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_ne!(labels[3], labels[0]);
        assert_eq!(count_components(&labels), 2);
    }

    #[test]
    fn test_same_partition_ignores_label_values() {
        assert!(same_partition(&[0, 0, 2], &[7, 7, 1]));
        assert!(!same_partition(&[0, 0, 2], &[7, 1, 1]));
        // b merges what a keeps apart
        assert!(!same_partition(&[0, 1], &[5, 5]));
        // a merges what b keeps apart
        assert!(!same_partition(&[5, 5], &[0, 1]));
        assert!(!same_partition(&[0], &[0, 0]));
    }

    #[test]
    fn test_empty_graph() {
        assert!(union_find_components(0, &[]).is_empty());
        assert_eq!(count_components(&[]), 0);
    }
}
