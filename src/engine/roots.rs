//! Pointer jumping
//!
//! Collapses hook chains until every vertex points straight at its root.
//! Passes are synchronous: each pass reads the current array and writes the
//! scratch array, so the result does not depend on thread scheduling.

use rayon::prelude::*;

use crate::graph::VertexId;

/// Replace `label[v]` by `label[label[v]]` until a pass changes nothing;
/// returns the number of passes, including the final quiet one
///
/// `scratch` must be as long as `labels`. Its contents are overwritten.
pub fn resolve_roots(labels: &mut [VertexId], scratch: &mut [VertexId]) -> usize {
    debug_assert_eq!(labels.len(), scratch.len());
    let mut passes = 0;

    loop {
        let current: &[VertexId] = labels;
        scratch
            .par_iter_mut()
            .zip(current.par_iter())
            .for_each(|(next, &parent)| *next = current[parent as usize]);
        passes += 1;

        let changed = scratch
            .par_iter()
            .zip(labels.par_iter())
            .any(|(next, previous)| next != previous);
        if !changed {
            return passes;
        }
        labels.copy_from_slice(scratch);
    }
}

/// `label[label[v]] == label[v]` for every v
pub fn is_idempotent(labels: &[VertexId]) -> bool {
    labels
        .par_iter()
        .all(|&parent| labels[parent as usize] == parent)
}

/// Vertices that are their own representative
pub fn count_roots(labels: &[VertexId]) -> usize {
    labels
        .par_iter()
        .enumerate()
        .filter(|&(v, &parent)| v as VertexId == parent)
        .count()
}
