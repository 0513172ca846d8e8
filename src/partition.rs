//! Edge partitioner
//!
//! Splits a flat edge array into one contiguous slice per rank. The same
//! description drives scatters (root to ranks) and gathers (ranks back to
//! root), so the relative order of edges survives a round trip.

use std::ops::Range;

/// Per-rank counts and displacements into a flattened edge array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    counts: Vec<usize>,
    displacements: Vec<usize>,
}

impl Partition {
    /// Even split: `counts[i] = edge_count / workers + (i < edge_count % workers)`
    ///
    /// Any two ranks differ by at most one edge.
    pub fn even(edge_count: usize, workers: usize) -> Self {
        assert!(workers > 0, "partition needs at least one worker");

        let base = edge_count / workers;
        let extra = edge_count % workers;
        let counts = (0..workers)
            .map(|rank| base + usize::from(rank < extra))
            .collect();
        Self::from_counts(counts)
    }

    /// Partition with explicit per-rank counts, displacements are their
    /// exclusive prefix sum
    pub fn from_counts(counts: Vec<usize>) -> Self {
        let mut displacements = Vec::with_capacity(counts.len());
        let mut offset = 0usize;
        for &count in &counts {
            displacements.push(offset);
            offset += count;
        }
        Self {
            counts,
            displacements,
        }
    }

    pub fn workers(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn displacements(&self) -> &[usize] {
        &self.displacements
    }

    pub fn count(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Index range owned by `rank` in the flattened array
    pub fn range(&self, rank: usize) -> Range<usize> {
        let start = self.displacements[rank];
        start..start + self.counts[rank]
    }

    /// The slice of `items` owned by `rank`
    pub fn slice<'a, T>(&self, items: &'a [T], rank: usize) -> &'a [T] {
        &items[self.range(rank)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_workers_seven_edges() {
        let partition = Partition::even(7, 2);
        assert_eq!(partition.counts(), &[4, 3]);
        assert_eq!(partition.displacements(), &[0, 4]);
    }

    #[test]
    fn test_more_workers_than_edges() {
        let partition = Partition::even(2, 5);
        assert_eq!(partition.counts(), &[1, 1, 0, 0, 0]);
        assert_eq!(partition.displacements(), &[0, 1, 2, 2, 2]);
        assert_eq!(partition.range(4), 2..2);
    }

    #[test]
    fn test_empty_edge_list() {
        let partition = Partition::even(0, 3);
        assert_eq!(partition.counts(), &[0, 0, 0]);
        assert_eq!(partition.total(), 0);
    }

    #[test]
    fn test_from_counts_prefix_sums() {
        let partition = Partition::from_counts(vec![3, 0, 5, 1]);
        assert_eq!(partition.displacements(), &[0, 3, 3, 8]);
        assert_eq!(partition.total(), 9);
    }

    #[test]
    fn test_slices_cover_in_order() {
        let items: Vec<u32> = (0..10).collect();
        let partition = Partition::even(items.len(), 3);
        let rejoined: Vec<u32> = (0..3)
            .flat_map(|rank| partition.slice(&items, rank).iter().copied())
            .collect();
        assert_eq!(rejoined, items);
    }

    proptest! {
        #[test]
        fn prop_even_partition_is_exact_and_balanced(
            edge_count in 0usize..100_000,
            workers in 1usize..64,
        ) {
            let partition = Partition::even(edge_count, workers);
            prop_assert_eq!(partition.workers(), workers);
            prop_assert_eq!(partition.total(), edge_count);

            let max = *partition.counts().iter().max().unwrap();
            let min = *partition.counts().iter().min().unwrap();
            prop_assert!(max - min <= 1);

            for rank in 0..workers {
                let expected: usize = partition.counts()[..rank].iter().sum();
                prop_assert_eq!(partition.displacements()[rank], expected);
            }
        }
    }
}
