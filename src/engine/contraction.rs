//! Edge relabelling after a round
//!
//! Both strategies end a round the same way: map both endpoints through the
//! round's labelling, drop edges whose endpoints now coincide, normalize the
//! rest. The surviving edges keep their relative order.

use rayon::prelude::*;

use crate::graph::{Edge, VertexId};

/// Relabel `shard` through `map` and keep only edges between distinct vertices
pub fn contract_edges(shard: &[Edge], map: &[VertexId]) -> Vec<Edge> {
    shard
        .par_iter()
        .filter_map(|edge| {
            let from = map[edge.from as usize];
            let to = map[edge.to as usize];
            (from != to).then(|| Edge::new(from, to).normalized())
        })
        .collect()
}
