//! Majority-direction hooking
//!
//! One round: every rank counts the small-to-large and large-to-small edges
//! in its shard, the counts are summed over all ranks, and the larger side
//! (ties go to small-to-large) is hooked everywhere. Local label arrays are
//! then merged with the reduction that matches the direction, so the most
//! advanced pointer wins on every vertex.
//!
//! The vote must use the global sums. Deciding per rank lets two ranks hook
//! the same vertex in opposite directions and the merged labels stop
//! describing a forest.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::comm::{Communicator, ReduceOp};
use crate::core::error::Result;
use crate::graph::Edge;
use crate::labels::{LabelArray, SharedLabels};

/// Which orientation gets hooked this round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookDirection {
    /// Edges with `from < to` set `label[from] = to`
    SmallToLarge,
    /// Edges with `from > to` set `label[from] = to`
    LargeToSmall,
}

impl HookDirection {
    pub fn from_votes(votes: &HookVotes) -> Self {
        if votes.small_to_large >= votes.large_to_small {
            HookDirection::SmallToLarge
        } else {
            HookDirection::LargeToSmall
        }
    }

    /// Label merge operator matching this direction
    pub fn reduce_op(self) -> ReduceOp {
        match self {
            HookDirection::SmallToLarge => ReduceOp::Max,
            HookDirection::LargeToSmall => ReduceOp::Min,
        }
    }

    pub fn selects(self, edge: &Edge) -> bool {
        match self {
            HookDirection::SmallToLarge => edge.from < edge.to,
            HookDirection::LargeToSmall => edge.from > edge.to,
        }
    }
}

/// Hook candidates counted over a shard (or, after reduction, over all shards)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HookVotes {
    pub small_to_large: u64,
    pub large_to_small: u64,
    /// Self-loops seen; they never hook and should not exist at all
    pub self_loops: u64,
}

impl HookVotes {
    fn merge(self, other: Self) -> Self {
        Self {
            small_to_large: self.small_to_large + other.small_to_large,
            large_to_small: self.large_to_small + other.large_to_small,
            self_loops: self.self_loops + other.self_loops,
        }
    }

    fn to_words(self) -> [u64; 3] {
        [self.small_to_large, self.large_to_small, self.self_loops]
    }

    fn from_words(words: [u64; 3]) -> Self {
        Self {
            small_to_large: words[0],
            large_to_small: words[1],
            self_loops: words[2],
        }
    }
}

/// Count hook candidates in a shard
pub fn count_hooks(shard: &[Edge]) -> HookVotes {
    shard
        .par_iter()
        .map(|edge| {
            let mut votes = HookVotes::default();
            match edge.from.cmp(&edge.to) {
                std::cmp::Ordering::Less => votes.small_to_large = 1,
                std::cmp::Ordering::Greater => votes.large_to_small = 1,
                std::cmp::Ordering::Equal => votes.self_loops = 1,
            }
            votes
        })
        .reduce(HookVotes::default, HookVotes::merge)
}

/// Hook every edge of `shard` that points in `direction`; returns the
/// number of hooks written
pub fn apply_hooks(shard: &[Edge], direction: HookDirection, labels: &SharedLabels) -> u64 {
    shard
        .par_iter()
        .filter(|edge| direction.selects(edge))
        .map(|edge| {
            match direction {
                HookDirection::SmallToLarge => labels.raise(edge.from, edge.to),
                HookDirection::LargeToSmall => labels.lower(edge.from, edge.to),
            }
            1u64
        })
        .sum()
}

/// Result of one collective hooking round, identical on every rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HookRound {
    pub votes: HookVotes,
    pub direction: HookDirection,
}

/// Vote, hook and merge labels across all ranks
///
/// `labels` must hold the same array on every rank when this is entered; on
/// return every rank holds the same merged (not yet root-resolved) array.
/// An empty shard still takes part with zero votes.
pub fn hook_round<C: Communicator + ?Sized>(
    comm: &C,
    shard: &[Edge],
    labels: &mut LabelArray,
) -> Result<HookRound> {
    let local = count_hooks(shard);
    if local.self_loops > 0 {
        warn!(
            rank = comm.rank(),
            self_loops = local.self_loops,
            "self loops found in shard"
        );
    }

    let mut words = local.to_words();
    comm.all_reduce_u64(&mut words, ReduceOp::Sum)?;
    let votes = HookVotes::from_words(words);
    let direction = HookDirection::from_votes(&votes);

    let hooked = labels.hook_with(|shared| apply_hooks(shard, direction, shared));
    debug!(rank = comm.rank(), ?direction, hooked, "hooks applied");

    comm.all_reduce_u32(labels.as_mut_slice(), direction.reduce_op())?;

    Ok(HookRound { votes, direction })
}
