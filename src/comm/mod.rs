//! Collective communication between ranks
//!
//! The engine only talks to its peers through [`Communicator`]. Any substrate
//! that can scatter and gather variable-length edge shards, all-reduce
//! fixed-width integers and broadcast from rank 0 can run it; [`local`]
//! provides an in-process one backed by channels.
//!
//! Every operation is blocking and must be entered by all ranks in the same
//! order. Rank [`ROOT_RANK`] is the root of every rooted collective.

pub mod local;

use rayon::prelude::*;
use std::ops::Add;

use crate::core::error::{Error, Result};
use crate::graph::Edge;
use crate::partition::Partition;

pub use local::{run_local, LocalCluster, LocalComm};

pub const ROOT_RANK: usize = 0;

/// Element-wise reduction operator for all-reduce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    /// Fold `other` into `acc` element by element
    pub fn apply<T>(self, acc: &mut [T], other: &[T])
    where
        T: Copy + Ord + Add<Output = T> + Send + Sync,
    {
        assert_eq!(
            acc.len(),
            other.len(),
            "reduction over arrays of different length"
        );
        acc.par_iter_mut().zip(other.par_iter()).for_each(|(a, &b)| {
            *a = match self {
                ReduceOp::Sum => *a + b,
                ReduceOp::Min => (*a).min(b),
                ReduceOp::Max => (*a).max(b),
            };
        });
    }
}

/// The collectives the round protocol is written against
pub trait Communicator {
    fn rank(&self) -> usize;

    /// Number of ranks in the group
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == ROOT_RANK
    }

    /// Replace every rank's `values` with the root's
    fn broadcast_words(&self, values: &mut Vec<u32>) -> Result<()>;

    /// Root passes one word per rank, every rank gets its own
    fn scatter_word(&self, values: Option<&[u32]>) -> Result<u32>;

    /// Root receives one word per rank, in rank order
    fn gather_word(&self, value: u32) -> Result<Option<Vec<u32>>>;

    /// Root passes the full array and its partition, every rank gets its slice
    fn scatterv_edges(&self, edges: Option<(&[Edge], &Partition)>) -> Result<Vec<Edge>>;

    /// Root receives every rank's shard laid out as `layout` describes
    ///
    /// The root must already know each rank's count; a shard of any other
    /// size is an internal bug and aborts.
    fn gatherv_edges(
        &self,
        local: &[Edge],
        layout: Option<&Partition>,
    ) -> Result<Option<Vec<Edge>>>;

    fn all_reduce_u32(&self, values: &mut [u32], op: ReduceOp) -> Result<()>;

    fn all_reduce_u64(&self, values: &mut [u64], op: ReduceOp) -> Result<()>;

    /// Nobody leaves until everybody has arrived
    fn barrier(&self) -> Result<()>;
}

/// Gather every rank's shard to the root, counts first
///
/// Returns the concatenation in rank order at the root, `None` elsewhere.
pub fn collect_shards<C: Communicator + ?Sized>(
    comm: &C,
    local: &[Edge],
) -> Result<Option<Vec<Edge>>> {
    let count = u32::try_from(local.len()).map_err(|_| {
        Error::Protocol(format!(
            "shard of {} edges exceeds the wire count",
            local.len()
        ))
    })?;
    let counts = comm.gather_word(count)?;
    let layout = counts
        .map(|counts| Partition::from_counts(counts.into_iter().map(|c| c as usize).collect()));
    comm.gatherv_edges(local, layout.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_ops() {
        let mut acc = vec![1u32, 5, 3];
        ReduceOp::Max.apply(&mut acc, &[4, 2, 3]);
        assert_eq!(acc, vec![4, 5, 3]);

        ReduceOp::Min.apply(&mut acc, &[0, 9, 1]);
        assert_eq!(acc, vec![0, 5, 1]);

        let mut sums = vec![10u64, 20];
        ReduceOp::Sum.apply(&mut sums, &[1, 2]);
        assert_eq!(sums, vec![11, 22]);
    }

    #[test]
    #[should_panic(expected = "different length")]
    fn test_reduce_length_mismatch_panics() {
        let mut acc = vec![1u32];
        ReduceOp::Sum.apply(&mut acc, &[1, 2]);
    }

    #[test]
    fn test_collect_shards_keeps_rank_order() {
        let gathered = run_local(3, |comm| {
            let rank = comm.rank() as u32;
            let local: Vec<Edge> = (0..=rank).map(|i| Edge::new(rank, 10 + i)).collect();
            collect_shards(&comm, &local)
        })
        .unwrap();

        let root = gathered[0].as_ref().unwrap();
        assert_eq!(
            root,
            &vec![
                Edge::new(0, 10),
                Edge::new(1, 10),
                Edge::new(1, 11),
                Edge::new(2, 10),
                Edge::new(2, 11),
                Edge::new(2, 12),
            ]
        );
        assert!(gathered[1].is_none());
        assert!(gathered[2].is_none());
    }
}
