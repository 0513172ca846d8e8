//! Random-mate hooking
//!
//! Every round the root tosses one coin per vertex and broadcasts the coins
//! as a bitset. A root vertex that came up tails hooks onto a neighbour that
//! came up heads; heads never move, so a round's hooks form stars of depth
//! one and need no ordering between ranks. When a tails root sees several
//! heads neighbours the smallest one wins, both between the threads of a rank
//! (`fetch_min`) and between ranks (`Min` all-reduce).
//!
//! A round may hook nothing at all. Each inter-component edge merges with
//! probability 1/4, so the run still ends with probability one.

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::comm::{Communicator, ReduceOp};
use crate::core::error::{Error, Result};
use crate::graph::{Edge, VertexId};
use crate::labels::{LabelArray, SharedLabels};

/// Placeholder label of a tails root that has not hooked yet
const UNHOOKED: VertexId = VertexId::MAX;

/// Words needed for one coin per vertex
pub fn coin_words(vertex_count: usize) -> usize {
    vertex_count.div_ceil(32)
}

/// Bit `v` of the coin bitset, set for tails
pub fn is_tails(coins: &[u32], v: VertexId) -> bool {
    (coins[(v / 32) as usize] >> (v % 32)) & 1 == 1
}

/// Hook every edge of `shard` that joins a tails vertex to a heads vertex;
/// returns the number of hooks written
///
/// Tails roots must already hold [`UNHOOKED`] in `labels`.
pub fn apply_mate_hooks(shard: &[Edge], coins: &[u32], labels: &SharedLabels) -> u64 {
    shard
        .par_iter()
        .filter_map(|edge| {
            match (is_tails(coins, edge.from), is_tails(coins, edge.to)) {
                (true, false) => labels.lower(edge.from, edge.to),
                (false, true) => labels.lower(edge.to, edge.from),
                _ => return None,
            }
            Some(1u64)
        })
        .sum()
}

/// Result of one random-mate round, identical on every rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MateRound {
    /// Root vertices that came up tails
    pub tails: u64,
}

/// Coin source and coin buffer of one rank
///
/// Only the root's generator is ever drawn from; the others receive the
/// root's coins.
#[derive(Debug)]
pub struct RandomMate {
    coins: Vec<u32>,
    rng: StdRng,
}

impl RandomMate {
    pub fn new(vertex_count: u32, rng: StdRng) -> Self {
        Self {
            coins: vec![0; coin_words(vertex_count as usize)],
            rng,
        }
    }

    /// Toss, hook and merge labels across all ranks
    ///
    /// Same contract as the deterministic round: `labels` matches on every
    /// rank on entry and holds the same merged, not yet root-resolved, array
    /// on return.
    pub fn round<C: Communicator + ?Sized>(
        &mut self,
        comm: &C,
        shard: &[Edge],
        labels: &mut LabelArray,
    ) -> Result<MateRound> {
        if comm.is_root() {
            let rng = &mut self.rng;
            self.coins.iter_mut().for_each(|word| *word = rng.random());
        }
        comm.broadcast_words(&mut self.coins)?;
        if self.coins.len() != coin_words(labels.len()) {
            return Err(Error::Protocol(format!(
                "received {} coin words for {} vertices",
                self.coins.len(),
                labels.len()
            )));
        }

        let coins = &self.coins;
        let vertex_count = labels.len() as VertexId;
        let (tails, hooked) = labels.hook_with(|shared| {
            let tails = (0..vertex_count)
                .into_par_iter()
                .filter(|&v| shared.get(v) == v && is_tails(coins, v))
                .map(|v| {
                    shared.set(v, UNHOOKED);
                    1u64
                })
                .sum::<u64>();
            (tails, apply_mate_hooks(shard, coins, shared))
        });
        debug!(rank = comm.rank(), tails, hooked, "mates hooked");

        comm.all_reduce_u32(labels.as_mut_slice(), ReduceOp::Min)?;
        labels
            .as_mut_slice()
            .par_iter_mut()
            .enumerate()
            .filter(|(_, label)| **label == UNHOOKED)
            .for_each(|(v, label)| *label = v as VertexId);

        Ok(MateRound { tails })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::run_local;
    use rand::SeedableRng;

    #[test]
    fn test_coin_bits() {
        assert_eq!(coin_words(0), 0);
        assert_eq!(coin_words(32), 1);
        assert_eq!(coin_words(33), 2);

        let coins = [0b101, 1 << 1];
        assert!(is_tails(&coins, 0));
        assert!(!is_tails(&coins, 1));
        assert!(is_tails(&coins, 2));
        assert!(is_tails(&coins, 33));
        assert!(!is_tails(&coins, 32));
    }

    #[test]
    fn test_only_tails_to_heads_edges_hook() {
        // 0 and 2 tails, 1 and 3 heads
        let coins = [0b0101];
        let labels = SharedLabels::from_slice(&[UNHOOKED, 1, UNHOOKED, 3]);
        let shard = [Edge::new(0, 3), Edge::new(1, 0), Edge::new(1, 3), Edge::new(0, 2)];
        let hooked = apply_mate_hooks(&shard, &coins, &labels);
        // (0, 3) and (1, 0) both hook vertex 0; the smaller heads wins
        assert_eq!(hooked, 2);
        assert_eq!(labels.into_vec(), vec![1, 1, UNHOOKED, 3]);
    }

    #[test]
    fn test_round_agrees_on_every_rank() {
        let results = run_local(3, |comm| {
            let shard: Vec<Edge> = (0..39u32)
                .filter(|&v| v as usize % comm.size() == comm.rank())
                .map(|v| Edge::new(v, v + 1))
                .collect();
            let mut mate = RandomMate::new(40, StdRng::seed_from_u64(comm.rank() as u64));
            let mut labels = LabelArray::identity(40);
            let round = mate.round(&comm, &shard, &mut labels)?;
            Ok((round, mate.coins.clone(), labels.into_vec()))
        })
        .unwrap();

        let (round, coins, labels) = results[0].clone();
        assert_eq!(round.tails as usize, (0..40).filter(|&v| is_tails(&coins, v)).count());
        for v in 0..40u32 {
            let label = labels[v as usize];
            if is_tails(&coins, v) {
                // a tails vertex stays put or moves onto a heads neighbour
                assert!(label == v || (label.abs_diff(v) == 1 && !is_tails(&coins, label)));
            } else {
                assert_eq!(label, v);
            }
        }
        for other in &results[1..] {
            assert_eq!(other, &(round, coins.clone(), labels.clone()));
        }
    }

    #[test]
    fn test_tails_root_takes_smallest_heads_neighbour() {
        // Vertex 2 tails, all others heads; its neighbours sit on different ranks
        let results = run_local(2, |comm| {
            let shard = if comm.is_root() {
                vec![Edge::new(2, 3)]
            } else {
                vec![Edge::new(1, 2), Edge::new(2, 0)]
            };
            let mut labels = LabelArray::identity(4);
            let coins = [0b0100];
            labels.hook_with(|shared| {
                shared.set(2, UNHOOKED);
                apply_mate_hooks(&shard, &coins, shared)
            });
            comm.all_reduce_u32(labels.as_mut_slice(), ReduceOp::Min)?;
            Ok(labels.into_vec())
        })
        .unwrap();

        for labels in results {
            assert_eq!(labels, vec![0, 1, 0, 3]);
        }
    }
}
