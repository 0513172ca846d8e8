//! Iterated sparse sampling
//!
//! A round draws roughly `N^(1 + epsilon/2)` edges from all shards combined,
//! where N is the vertex count of the input graph. Each rank's share (its
//! quota) is set by the root from the per-rank edge counts:
//!
//! 1. ranks at or below the sparsity threshold hand over their whole shard
//!    (capped by what is still left to sample)
//! 2. the rest is split over the dense ranks in proportion to their edge
//!    counts, rounded down
//! 3. rounding leftovers are topped up greedily in rank order
//!
//! Dense ranks sample with replacement, so a round may see the same edge
//! twice; that only wastes a union. The root shuffles the pooled sample,
//! runs union-find over it until `target_size` components remain and
//! broadcasts a dense relabelling of the current vertices.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::comm::Communicator;
use crate::core::config::SamplingParams;
use crate::core::error::{Error, Result};
use crate::dsu::DisjointSet;
use crate::graph::{Edge, VertexId};
use crate::partition::Partition;

/// Split `edges_to_sample` over ranks holding `available` edges each
///
/// Panics if more edges are requested than exist; callers cap the request
/// with [`SamplingParams::edges_to_sample`].
pub fn compute_quotas(
    available: &[u64],
    edges_to_sample: u64,
    sparsity_threshold: u64,
) -> Vec<u64> {
    let total: u64 = available.iter().sum();
    assert!(
        edges_to_sample <= total,
        "asked for {edges_to_sample} samples from {total} edges"
    );

    let mut quotas = vec![0u64; available.len()];
    let mut remaining = edges_to_sample;

    let mut dense_total = 0u64;
    for (quota, &avail) in quotas.iter_mut().zip(available) {
        if avail <= sparsity_threshold {
            *quota = avail.min(remaining);
            remaining -= *quota;
        } else {
            dense_total += avail;
        }
    }

    if dense_total > 0 {
        let pool = remaining;
        for (quota, &avail) in quotas.iter_mut().zip(available) {
            if avail > sparsity_threshold {
                let share = (pool as u128 * avail as u128 / dense_total as u128) as u64;
                *quota = share.min(avail);
                remaining -= *quota;
            }
        }
    }

    for (quota, &avail) in quotas.iter_mut().zip(available) {
        if remaining == 0 {
            break;
        }
        let top_up = (avail - *quota).min(remaining);
        *quota += top_up;
        remaining -= top_up;
    }

    debug_assert_eq!(remaining, 0);
    quotas
}

/// Draw `quota` edges from `shard`
///
/// A quota equal to the shard size returns the shard as is; anything
/// smaller draws uniformly with replacement.
pub fn sample_shard<R: Rng + ?Sized>(shard: &[Edge], quota: usize, rng: &mut R) -> Vec<Edge> {
    assert!(
        quota <= shard.len(),
        "quota {quota} exceeds shard of {} edges",
        shard.len()
    );
    if quota == shard.len() {
        return shard.to_vec();
    }
    (0..quota)
        .map(|_| shard[rng.random_range(0..shard.len())])
        .collect()
}

/// Outcome of a prefix union-find over one round's sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixContraction {
    /// Current vertex id to new dense id in `[0, vertex_count)`
    pub vertex_map: Vec<VertexId>,
    pub vertex_count: u32,
    /// Edges consumed before the target was reached (or the sample ran out)
    pub edges_used: usize,
}

const UNASSIGNED: VertexId = VertexId::MAX;

/// Merge sample edges in order until `target_size` components remain
///
/// New ids are handed out in order of first appearance of each component
/// while scanning vertices `0..vertex_count`. A target of zero, or one at or
/// above the current vertex count, leaves the vertices untouched.
pub fn prefix_contract(sample: &[Edge], vertex_count: u32, target_size: u32) -> PrefixContraction {
    if target_size == 0 || target_size >= vertex_count {
        return PrefixContraction {
            vertex_map: (0..vertex_count).collect(),
            vertex_count,
            edges_used: 0,
        };
    }

    let mut dsu = DisjointSet::new(vertex_count as usize);
    let mut components = vertex_count;
    let mut edges_used = 0;
    for edge in sample {
        if components <= target_size {
            break;
        }
        edges_used += 1;
        if dsu.unify(edge.from, edge.to) {
            components -= 1;
        }
    }

    let mut dense = vec![UNASSIGNED; vertex_count as usize];
    let mut next: VertexId = 0;
    let vertex_map = (0..vertex_count)
        .map(|v| {
            let root = dsu.find(v) as usize;
            if dense[root] == UNASSIGNED {
                dense[root] = next;
                next += 1;
            }
            dense[root]
        })
        .collect();
    debug_assert_eq!(next, components);

    PrefixContraction {
        vertex_map,
        vertex_count: components,
        edges_used,
    }
}

/// Turn dense component ids into representative labels, in place
///
/// Every vertex ends up labelled with the smallest original vertex of its
/// component, which is a fixed point of the labelling.
pub fn to_representatives(components: &mut [VertexId], component_count: u32) {
    let mut representative = vec![UNASSIGNED; component_count as usize];
    for (v, &dense) in components.iter().enumerate() {
        let slot = &mut representative[dense as usize];
        if *slot == UNASSIGNED {
            *slot = v as VertexId;
        }
    }
    components
        .par_iter_mut()
        .for_each(|c| *c = representative[*c as usize]);
}

/// Root-side bookkeeping of one sampling round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleStats {
    pub sparsity_threshold: u64,
    pub edges_to_sample: u64,
    pub quotas: Vec<u64>,
    pub edges_used: usize,
    pub target_size: u32,
}

/// One sampling round as seen by a rank
#[derive(Debug, Clone)]
pub struct SampleRound {
    pub vertex_map: Vec<VertexId>,
    pub vertex_count: u32,
    /// Present at the root only
    pub stats: Option<SampleStats>,
}

/// Per-rank sampling state that outlives a round
#[derive(Debug)]
pub struct SparseSampler {
    params: SamplingParams,
    initial_vertices: u32,
    sparsity_threshold: u64,
    rng: StdRng,
}

impl SparseSampler {
    pub fn new(params: SamplingParams, initial_vertices: u32, workers: usize, rng: StdRng) -> Self {
        let sparsity_threshold = params.sparsity_threshold(workers);
        Self {
            params,
            initial_vertices,
            sparsity_threshold,
            rng,
        }
    }

    pub fn sparsity_threshold(&self) -> u64 {
        self.sparsity_threshold
    }

    /// Run one round over the resident `shard`
    ///
    /// Every rank must call this with the current vertex count and the same
    /// `target_size`. All ranks return the same vertex map; the shard itself
    /// is left for the caller to contract.
    pub fn round<C: Communicator + ?Sized>(
        &mut self,
        comm: &C,
        shard: &[Edge],
        vertex_count: u32,
        target_size: u32,
    ) -> Result<SampleRound> {
        let available = u32::try_from(shard.len()).map_err(|_| {
            Error::Protocol(format!(
                "shard of {} edges exceeds the wire count",
                shard.len()
            ))
        })?;
        let gathered = comm.gather_word(available)?;

        let plan = gathered.map(|available| {
            let available: Vec<u64> = available.into_iter().map(u64::from).collect();
            let total: u64 = available.iter().sum();
            let edges_to_sample = self.params.edges_to_sample(self.initial_vertices, total);
            let quotas = compute_quotas(&available, edges_to_sample, self.sparsity_threshold);
            (edges_to_sample, quotas)
        });
        let quota_words: Option<Vec<u32>> = plan
            .as_ref()
            .map(|(_, quotas)| quotas.iter().map(|&q| q as u32).collect());

        let quota = comm.scatter_word(quota_words.as_deref())? as usize;
        let sample = sample_shard(shard, quota, &mut self.rng);
        debug!(rank = comm.rank(), available, quota, "sampled shard");

        let layout = quota_words
            .as_ref()
            .map(|q| Partition::from_counts(q.iter().map(|&c| c as usize).collect()));
        let pooled = comm.gatherv_edges(&sample, layout.as_ref())?;

        let mut stats = None;
        let mut words = match pooled {
            Some(mut pooled) => {
                pooled.shuffle(&mut self.rng);
                let contraction = prefix_contract(&pooled, vertex_count, target_size);
                if let Some((edges_to_sample, quotas)) = plan {
                    stats = Some(SampleStats {
                        sparsity_threshold: self.sparsity_threshold,
                        edges_to_sample,
                        quotas,
                        edges_used: contraction.edges_used,
                        target_size,
                    });
                }
                let mut words = contraction.vertex_map;
                words.push(contraction.vertex_count);
                words
            }
            None => Vec::new(),
        };

        comm.broadcast_words(&mut words)?;
        let new_count = words
            .pop()
            .ok_or_else(|| Error::Protocol("empty vertex map broadcast".to_string()))?;
        if words.len() != vertex_count as usize {
            return Err(Error::Protocol(format!(
                "vertex map covers {} vertices, expected {vertex_count}",
                words.len()
            )));
        }

        Ok(SampleRound {
            vertex_map: words,
            vertex_count: new_count,
            stats,
        })
    }
}
