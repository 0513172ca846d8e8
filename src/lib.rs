//! # Butterfly-cc - Distributed connected components
//!
//! Connected components of large undirected graphs by iterative contraction.
//! The edge list is spread over a group of ranks that only talk through
//! collectives; every round merges vertices into super-vertices, relabels the
//! surviving edges and drops the ones that became internal, until no edge is
//! left.
//!
//! Three strategies share the round protocol:
//!
//! - **Deterministic**: majority-direction hooking followed by pointer jumping
//! - **Sampling**: a bounded random sample of edges per round, contracted by a
//!   sequential union-find at rank 0
//! - **Random mate**: a coin per vertex, tails roots hook onto heads neighbours
//!
//! Whatever the strategy, every vertex ends up labelled with a representative
//! of its component that labels itself.
//!
//! ## Usage
//!
//! ```rust
//! use butterfly_cc::{connected_components, CcConfig, Edge, Strategy};
//!
//! let edges = [Edge::new(0, 1), Edge::new(2, 3)];
//! let config = CcConfig { workers: 2, strategy: Strategy::Sampling, ..Default::default() };
//!
//! let components = connected_components(4, &edges, &config)?;
//! assert_eq!(components.component_count, 2);
//! assert!(components.same_component(2, 3));
//! # Ok::<(), butterfly_cc::Error>(())
//! ```
//!
//! Ranks run as threads of the current process through [`LocalCluster`]. Any
//! other transport can drive the same protocol by implementing
//! [`Communicator`] and calling [`run_rank`] on every rank.

pub mod baseline;
pub mod comm;
pub mod coordinator;
pub mod core;
pub mod dsu;
pub mod engine;
pub mod graph;
pub mod labels;
pub mod partition;

pub use comm::{Communicator, LocalCluster, LocalComm, ReduceOp};
pub use coordinator::{
    connected_components, run_graph, run_rank, Components, Phase, RoundDetail, RoundState,
    RoundStats,
};
pub use crate::core::{CcConfig, Error, Result, SamplingParams, Strategy};
pub use graph::{load_graph, read_graph, Edge, GraphInput, VertexId};
pub use labels::{LabelArray, SharedLabels};
pub use partition::Partition;
