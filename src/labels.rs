//! Label arrays of one rank
//!
//! During a hooking round several edges may target the same vertex, so the
//! hook workspace is a [`SharedLabels`] of `AtomicU32` slots. The hook
//! direction is fixed before the first write, which means no slot ever needs
//! a read-modify-write that depends on another slot; `fetch_max`/`fetch_min`
//! only pick a deterministic winner among concurrent hooks on the same vertex.
//!
//! [`LabelArray`] owns the plain labels, the atomic workspace and the
//! pointer-jumping scratch for a whole run. All three are sized once; rounds
//! only copy between them.
//!
//! Sharing across ranks never goes through these types: ranks exchange label
//! arrays by value through the collectives.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::prelude::*;

use crate::engine::roots;
use crate::graph::VertexId;

#[derive(Debug)]
pub struct SharedLabels {
    slots: Vec<AtomicU32>,
}

impl SharedLabels {
    pub fn from_slice(labels: &[VertexId]) -> Self {
        Self {
            slots: labels.iter().map(|&l| AtomicU32::new(l)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, v: VertexId) -> VertexId {
        self.slots[v as usize].load(Ordering::Relaxed)
    }

    pub fn set(&self, v: VertexId, label: VertexId) {
        self.slots[v as usize].store(label, Ordering::Relaxed);
    }

    /// Point `v` at `label` if it is larger than the current one
    pub fn raise(&self, v: VertexId, label: VertexId) {
        self.slots[v as usize].fetch_max(label, Ordering::Relaxed);
    }

    /// Point `v` at `label` if it is smaller than the current one
    pub fn lower(&self, v: VertexId, label: VertexId) {
        self.slots[v as usize].fetch_min(label, Ordering::Relaxed);
    }

    /// Overwrite every slot from `labels`; lengths must match
    pub fn load_from(&self, labels: &[VertexId]) {
        debug_assert_eq!(labels.len(), self.slots.len());
        self.slots
            .par_iter()
            .zip(labels.par_iter())
            .for_each(|(slot, &l)| slot.store(l, Ordering::Relaxed));
    }

    /// Copy every slot into `labels`; lengths must match
    pub fn store_into(&self, labels: &mut [VertexId]) {
        debug_assert_eq!(labels.len(), self.slots.len());
        labels
            .par_iter_mut()
            .zip(self.slots.par_iter())
            .for_each(|(l, slot)| *l = slot.load(Ordering::Relaxed));
    }

    pub fn into_vec(self) -> Vec<VertexId> {
        self.slots.into_iter().map(AtomicU32::into_inner).collect()
    }
}

/// Replicated label array of one rank, with its round buffers
#[derive(Debug)]
pub struct LabelArray {
    labels: Vec<VertexId>,
    workspace: SharedLabels,
    scratch: Vec<VertexId>,
}

impl LabelArray {
    /// Every vertex of `[0, vertex_count)` its own root
    pub fn identity(vertex_count: u32) -> Self {
        let labels: Vec<VertexId> = (0..vertex_count).collect();
        Self {
            workspace: SharedLabels::from_slice(&labels),
            scratch: vec![0; labels.len()],
            labels,
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[VertexId] {
        &self.labels
    }

    pub fn as_mut_slice(&mut self) -> &mut [VertexId] {
        &mut self.labels
    }

    /// Run `hook` against the atomic workspace loaded with the current
    /// labels, then take its writes back
    pub fn hook_with<R>(&mut self, hook: impl FnOnce(&SharedLabels) -> R) -> R {
        self.workspace.load_from(&self.labels);
        let result = hook(&self.workspace);
        self.workspace.store_into(&mut self.labels);
        result
    }

    /// Pointer-jump until every vertex points at its root; returns the
    /// number of passes
    pub fn resolve_roots(&mut self) -> usize {
        roots::resolve_roots(&mut self.labels, &mut self.scratch)
    }

    pub fn into_vec(self) -> Vec<VertexId> {
        self.labels
    }
}
