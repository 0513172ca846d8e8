//! Per-round contraction engines
//!
//! - [`hooking`]: deterministic majority-direction hooks
//! - [`random_mate`]: coin-toss hooking of tails roots onto heads neighbours
//! - [`roots`]: pointer jumping that turns hooks into root labels
//! - [`sampling`]: quota-based sparse sampling with a union-find prefix
//! - [`contraction`]: edge relabelling shared by every strategy

pub mod contraction;
pub mod hooking;
pub mod random_mate;
pub mod roots;
pub mod sampling;

pub use contraction::contract_edges;
pub use hooking::{hook_round, HookDirection, HookRound, HookVotes};
pub use random_mate::{MateRound, RandomMate};
pub use roots::{count_roots, is_idempotent, resolve_roots};
pub use sampling::{
    compute_quotas, prefix_contract, sample_shard, to_representatives, SampleStats, SparseSampler,
};
