//! Round controller
//!
//! Owns the iteration loop for one rank. Rank 0 holds the authoritative
//! [`RoundState`] and decides, at the top of every round, whether another one
//! runs; it broadcasts that decision together with the state so every rank
//! walks through exactly the same sequence of collectives.
//!
//! ```text
//!   header (N, E) ──► E == 0 or N == 0 ──► Converged (identity)
//!        │
//!        ▼
//!   ┌► control broadcast ── stop ──► Converged
//!   │        │ continue
//!   │        ▼
//!   │   strategy round + contraction
//!   └────────┘
//! ```

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::comm::{collect_shards, run_local, Communicator, ReduceOp};
use crate::core::config::{CcConfig, Strategy};
use crate::core::error::{Error, Result};
use crate::engine::sampling::SampleStats;
use crate::engine::{
    contract_edges, count_roots, hook_round, is_idempotent, to_representatives, HookDirection,
    HookRound, MateRound, RandomMate, SparseSampler,
};
use crate::graph::{Edge, GraphInput, VertexId};
use crate::labels::LabelArray;
use crate::partition::Partition;

const STOP: u32 = 0;
const CONTINUE: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Running,
    Converged,
}

/// What every rank knows about the run between two rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundState {
    /// Rounds completed so far
    pub iteration: u32,
    /// Super-vertices still in play
    pub vertex_count: u32,
    /// Inter-component edges still in play, over all ranks
    pub edge_count: u32,
    pub phase: Phase,
}

impl RoundState {
    fn start(vertex_count: u32, edge_count: u32) -> Self {
        Self {
            iteration: 0,
            vertex_count,
            edge_count,
            phase: Phase::Running,
        }
    }

    /// Another round can still merge something
    pub fn has_work(&self) -> bool {
        self.edge_count > 0 && self.vertex_count > 1
    }
}

/// Strategy-specific part of a round's report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum RoundDetail {
    Deterministic {
        direction: HookDirection,
        small_to_large: u64,
        large_to_small: u64,
        pointer_jumping_passes: usize,
    },
    Sampling(SampleStats),
    RandomMate {
        /// Roots that came up tails
        tails: u64,
        pointer_jumping_passes: usize,
    },
}

/// Hooks of one round before roots are resolved
enum Hooks {
    Majority(HookRound),
    Mate(MateRound),
}

impl Hooks {
    fn detail(self, pointer_jumping_passes: usize) -> RoundDetail {
        match self {
            Hooks::Majority(hook) => RoundDetail::Deterministic {
                direction: hook.direction,
                small_to_large: hook.votes.small_to_large,
                large_to_small: hook.votes.large_to_small,
                pointer_jumping_passes,
            },
            Hooks::Mate(mate) => RoundDetail::RandomMate {
                tails: mate.tails,
                pointer_jumping_passes,
            },
        }
    }
}

/// Report of one completed round, recorded at the root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundStats {
    pub iteration: u32,
    pub vertices_in: u32,
    pub edges_in: u32,
    pub vertices_out: u32,
    pub edges_out: u32,
    pub detail: RoundDetail,
}

/// Final labelling of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Components {
    pub strategy: Strategy,
    /// Representative for every original vertex; representatives label
    /// themselves
    pub labels: Vec<VertexId>,
    /// Distinct representatives in `labels`
    pub component_count: u32,
    /// Rounds run before convergence
    pub iterations: u32,
    pub rounds: Vec<RoundStats>,
}

impl Components {
    pub fn label(&self, v: VertexId) -> VertexId {
        self.labels[v as usize]
    }

    pub fn same_component(&self, a: VertexId, b: VertexId) -> bool {
        self.label(a) == self.label(b)
    }
}

struct RoundController<'a, C: Communicator + ?Sized> {
    comm: &'a C,
    config: &'a CcConfig,
    state: RoundState,
    rounds: Vec<RoundStats>,
}

impl<'a, C: Communicator + ?Sized> RoundController<'a, C> {
    fn new(comm: &'a C, config: &'a CcConfig, state: RoundState) -> Self {
        Self {
            comm,
            config,
            state,
            rounds: Vec::new(),
        }
    }

    /// Open a round: the root decides, everybody learns the decision and the
    /// current state
    fn open_round(&mut self) -> Result<bool> {
        let mut words = if self.comm.is_root() {
            let control = if self.state.has_work() { CONTINUE } else { STOP };
            vec![
                control,
                self.state.iteration,
                self.state.vertex_count,
                self.state.edge_count,
            ]
        } else {
            Vec::new()
        };
        self.comm.broadcast_words(&mut words)?;

        let control = match *words.as_slice() {
            [control, iteration, vertex_count, edge_count] => {
                self.state.iteration = iteration;
                self.state.vertex_count = vertex_count;
                self.state.edge_count = edge_count;
                control
            }
            _ => {
                return Err(Error::Protocol(format!(
                    "round header has {} words, expected 4",
                    words.len()
                )))
            }
        };

        if control == STOP {
            self.state.phase = Phase::Converged;
            return Ok(false);
        }
        Ok(true)
    }

    fn record(&mut self, before: RoundState, detail: RoundDetail) {
        let stats = RoundStats {
            iteration: self.state.iteration,
            vertices_in: before.vertex_count,
            edges_in: before.edge_count,
            vertices_out: self.state.vertex_count,
            edges_out: self.state.edge_count,
            detail,
        };
        info!(
            iteration = stats.iteration,
            vertices = stats.vertices_out,
            edges_in = stats.edges_in,
            edges_out = stats.edges_out,
            "round complete"
        );
        self.rounds.push(stats);
    }

    /// Hook, resolve, contract; surviving edges travel back to the root
    /// between rounds
    ///
    /// `mate` selects coin-toss hooks; without it the majority direction is
    /// hooked. The label array and its round buffers live for the whole run.
    fn run_hooking(
        &mut self,
        mut pending: Vec<Edge>,
        mut mate: Option<RandomMate>,
    ) -> Result<Vec<VertexId>> {
        let comm = self.comm;
        let mut labels = LabelArray::identity(self.state.vertex_count);

        while self.open_round()? {
            let before = self.state;

            let layout = comm
                .is_root()
                .then(|| Partition::even(pending.len(), comm.size()));
            let shard = comm.scatterv_edges(layout.as_ref().map(|p| (pending.as_slice(), p)))?;
            pending.clear();

            let hooks = match mate.as_mut() {
                Some(mate) => Hooks::Mate(mate.round(comm, &shard, &mut labels)?),
                None => Hooks::Majority(hook_round(comm, &shard, &mut labels)?),
            };
            let passes = labels.resolve_roots();
            debug_assert!(is_idempotent(labels.as_slice()));
            let survivors = contract_edges(&shard, labels.as_slice());
            debug!(
                rank = comm.rank(),
                shard = shard.len(),
                survivors = survivors.len(),
                passes,
                "shard contracted"
            );
            drop(shard);

            if let Some(gathered) = collect_shards(comm, &survivors)? {
                pending = gathered;
            }

            self.state.iteration = before.iteration + 1;
            if comm.is_root() {
                self.state.vertex_count = wire_count(count_roots(labels.as_slice()))?;
                self.state.edge_count = wire_count(pending.len())?;
                self.record(before, hooks.detail(passes));
            }
        }

        Ok(labels.into_vec())
    }

    /// Sample, contract, relabel; shards stay on their rank for the whole run
    fn run_sampling(&mut self, edges: Vec<Edge>) -> Result<Vec<VertexId>> {
        let comm = self.comm;
        let layout = comm
            .is_root()
            .then(|| Partition::even(edges.len(), comm.size()));
        let mut shard = comm.scatterv_edges(layout.as_ref().map(|p| (edges.as_slice(), p)))?;
        drop(edges);

        let rng = StdRng::seed_from_u64(self.config.rank_seed(comm.rank()));
        let mut sampler = SparseSampler::new(
            self.config.sampling.clone(),
            self.state.vertex_count,
            comm.size(),
            rng,
        );
        debug!(
            rank = comm.rank(),
            shard = shard.len(),
            sparsity_threshold = sampler.sparsity_threshold(),
            "sampler ready"
        );

        // Original vertex -> current dense super-vertex id, root only
        let mut components: Vec<VertexId> = if comm.is_root() {
            (0..self.state.vertex_count).collect()
        } else {
            Vec::new()
        };

        self.state.edge_count = global_edge_count(comm, &shard)?;
        while self.open_round()? {
            let before = self.state;
            let target = round_target(self.config.sampling.target_size, before.vertex_count);

            let round = sampler.round(comm, &shard, before.vertex_count, target)?;
            shard = contract_edges(&shard, &round.vertex_map);
            if comm.is_root() {
                let map = &round.vertex_map;
                components
                    .par_iter_mut()
                    .for_each(|c| *c = map[*c as usize]);
            }

            self.state.iteration = before.iteration + 1;
            self.state.vertex_count = round.vertex_count;
            self.state.edge_count = global_edge_count(comm, &shard)?;
            if let Some(stats) = round.stats {
                self.record(before, RoundDetail::Sampling(stats));
            }
        }

        if comm.is_root() {
            to_representatives(&mut components, self.state.vertex_count);
            debug_assert!(is_idempotent(&components));
        }
        Ok(components)
    }
}

/// Target for one sampling round; degenerate settings fall back to full
/// contraction so that every round merges at least one pair
fn round_target(configured: u32, vertex_count: u32) -> u32 {
    if configured == 0 || configured >= vertex_count {
        1
    } else {
        configured
    }
}

fn global_edge_count<C: Communicator + ?Sized>(comm: &C, shard: &[Edge]) -> Result<u32> {
    let mut total = [shard.len() as u64];
    comm.all_reduce_u64(&mut total, ReduceOp::Sum)?;
    u32::try_from(total[0]).map_err(|_| {
        Error::Protocol(format!("{} edges exceed the wire count", total[0]))
    })
}

fn wire_count(count: usize) -> Result<u32> {
    u32::try_from(count)
        .map_err(|_| Error::Protocol(format!("{count} exceeds the wire count")))
}

/// Run the whole protocol on one rank
///
/// Every rank of `comm` must call this with the same `config`. The root
/// supplies the graph and gets the result back; other ranks pass `None`
/// and get `None`.
pub fn run_rank<C: Communicator + ?Sized>(
    comm: &C,
    config: &CcConfig,
    input: Option<GraphInput>,
) -> Result<Option<Components>> {
    let span = info_span!("rank", rank = comm.rank());
    let _enter = span.enter();

    let (mut header, edges) = if comm.is_root() {
        let graph = input.ok_or_else(|| {
            Error::InvalidInput("the root rank must be given the graph".to_string())
        })?;
        let edge_count = wire_count(graph.edges.len())?;
        (vec![graph.vertex_count, edge_count], graph.edges)
    } else {
        (Vec::new(), Vec::new())
    };
    comm.broadcast_words(&mut header)?;

    let (vertex_count, edge_count) = match *header.as_slice() {
        [vertex_count, edge_count] => (vertex_count, edge_count),
        _ => {
            return Err(Error::Protocol(format!(
                "graph header has {} words, expected 2",
                header.len()
            )))
        }
    };
    if comm.is_root() {
        info!(
            vertices = vertex_count,
            edges = edge_count,
            workers = comm.size(),
            strategy = config.strategy.name(),
            "starting connected components"
        );
    }

    let state = RoundState::start(vertex_count, edge_count);
    let mut controller = RoundController::new(comm, config, state);
    let labels = if vertex_count == 0 || edge_count == 0 {
        controller.state.phase = Phase::Converged;
        (0..vertex_count).collect()
    } else {
        match config.strategy {
            Strategy::Deterministic => controller.run_hooking(edges, None)?,
            Strategy::RandomMate => {
                let rng = StdRng::seed_from_u64(config.rank_seed(comm.rank()));
                let mate = RandomMate::new(vertex_count, rng);
                controller.run_hooking(edges, Some(mate))?
            }
            Strategy::Sampling => controller.run_sampling(edges)?,
        }
    };
    debug_assert_eq!(controller.state.phase, Phase::Converged);
    comm.barrier()?;

    if !comm.is_root() {
        return Ok(None);
    }

    let state = controller.state;
    info!(
        iterations = state.iteration,
        components = state.vertex_count,
        "converged"
    );
    Ok(Some(Components {
        strategy: config.strategy,
        labels,
        component_count: state.vertex_count,
        iterations: state.iteration,
        rounds: controller.rounds,
    }))
}

/// Components of an already validated graph, computed by `config.workers`
/// in-process ranks
pub fn run_graph(graph: GraphInput, config: &CcConfig) -> Result<Components> {
    config.validate()?;
    let graph = Mutex::new(Some(graph));

    let results = run_local(config.workers, |comm| {
        let input = if comm.is_root() { graph.lock().take() } else { None };
        run_rank(&comm, config, input)
    })?;

    results
        .into_iter()
        .next()
        .flatten()
        .ok_or_else(|| Error::Protocol("root rank returned no components".to_string()))
}

/// Connected components of the graph on `[0, vertex_count)` spanned by `edges`
///
/// Edges are validated first: out-of-range ids are rejected and self-loops
/// dropped.
pub fn connected_components(
    vertex_count: u32,
    edges: &[Edge],
    config: &CcConfig,
) -> Result<Components> {
    let graph = GraphInput::from_edges(vertex_count, edges.iter().copied())?;
    run_graph(graph, config)
}
