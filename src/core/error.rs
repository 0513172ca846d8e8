//! Error types for butterfly-cc
//!
//! Runtime failures only. Contract violations inside the engine (a self-loop
//! or out-of-range id reaching a round, a gathered buffer of the wrong size)
//! are assertions, because they can only come from a bug in the caller or in
//! the partitioning code.

use thiserror::Error;

/// Errors produced while loading a graph, configuring a run or driving the
/// collectives between ranks
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed graph text
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Well-formed input that violates the graph contract
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unusable run configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A peer went away while this rank was waiting on a collective
    #[error("rank {rank}: peer {peer} disconnected during {op}")]
    Transport {
        rank: usize,
        peer: usize,
        op: &'static str,
    },

    /// A peer answered a collective with the wrong kind of payload
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Config file decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for butterfly-cc operations
pub type Result<T> = std::result::Result<T, Error>;
