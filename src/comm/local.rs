//! In-process transport: one thread per rank, one channel per ordered pair
//!
//! Every (source, destination) pair owns its own FIFO channel, so two
//! collectives issued back to back by a fast rank can never be confused with
//! each other at the root. Rooted collectives go through rank 0; all-reduce is
//! gather, combine, broadcast.
//!
//! When a rank returns (or fails) its senders are dropped, and any peer still
//! waiting on it gets [`Error::Transport`] instead of blocking forever.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread;
use tracing::trace;

use super::{Communicator, ReduceOp, ROOT_RANK};
use crate::core::error::{Error, Result};
use crate::graph::{decode_edges, encode_edges, Edge};
use crate::partition::Partition;

/// What travels over a channel
#[derive(Debug)]
enum Payload {
    Words(Vec<u32>),
    Wide(Vec<u64>),
    /// Edge shards in their 8-byte wire encoding
    Edges(Vec<u8>),
    Barrier,
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Words(_) => "words",
            Payload::Wide(_) => "wide words",
            Payload::Edges(_) => "edges",
            Payload::Barrier => "barrier",
        }
    }
}

/// Fixed-width integers that can ride in a payload
trait WireWord: Copy + Send + Sync + Ord + std::ops::Add<Output = Self> {
    fn pack(values: Vec<Self>) -> Payload;
    fn unpack(payload: Payload) -> std::result::Result<Vec<Self>, Payload>;
}

impl WireWord for u32 {
    fn pack(values: Vec<Self>) -> Payload {
        Payload::Words(values)
    }

    fn unpack(payload: Payload) -> std::result::Result<Vec<Self>, Payload> {
        match payload {
            Payload::Words(values) => Ok(values),
            other => Err(other),
        }
    }
}

impl WireWord for u64 {
    fn pack(values: Vec<Self>) -> Payload {
        Payload::Wide(values)
    }

    fn unpack(payload: Payload) -> std::result::Result<Vec<Self>, Payload> {
        match payload {
            Payload::Wide(values) => Ok(values),
            other => Err(other),
        }
    }
}

/// A group of connected in-process endpoints, one per rank
pub struct LocalCluster {
    endpoints: Vec<LocalComm>,
}

impl LocalCluster {
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "a cluster needs at least one rank");

        // grid[src][dst]
        let grid: Vec<Vec<(Sender<Payload>, Receiver<Payload>)>> = (0..workers)
            .map(|_| (0..workers).map(|_| unbounded()).collect())
            .collect();

        let endpoints = (0..workers)
            .map(|rank| LocalComm {
                rank,
                size: workers,
                outbound: grid[rank].iter().map(|(tx, _)| tx.clone()).collect(),
                inbound: grid.iter().map(|row| row[rank].1.clone()).collect(),
            })
            .collect();

        Self { endpoints }
    }

    pub fn into_endpoints(self) -> Vec<LocalComm> {
        self.endpoints
    }

    /// Run `f` once per rank on its own thread and collect every result in
    /// rank order
    ///
    /// A panic on any rank is re-raised here. If several ranks fail, the error
    /// that is not a mere peer disconnect wins, since disconnects are only the
    /// echo of the real failure.
    pub fn run<T, F>(self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LocalComm) -> Result<T> + Sync,
    {
        let f = &f;
        let outcomes: Vec<Result<T>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.endpoints.len());
            for comm in self.endpoints {
                let name = format!("cc-rank-{}", comm.rank);
                let handle = thread::Builder::new()
                    .name(name)
                    .spawn_scoped(scope, move || f(comm))?;
                handles.push(handle);
            }

            Ok::<_, Error>(
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(outcome) => outcome,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
                    .collect(),
            )
        })?;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    let replace = match &first_error {
                        None => true,
                        Some(Error::Transport { .. }) => !matches!(err, Error::Transport { .. }),
                        Some(_) => false,
                    };
                    if replace {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

/// Shorthand for `LocalCluster::new(workers).run(f)`
pub fn run_local<T, F>(workers: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(LocalComm) -> Result<T> + Sync,
{
    LocalCluster::new(workers).run(f)
}

/// One rank's endpoint
pub struct LocalComm {
    rank: usize,
    size: usize,
    /// indexed by destination rank
    outbound: Vec<Sender<Payload>>,
    /// indexed by source rank
    inbound: Vec<Receiver<Payload>>,
}

impl LocalComm {
    fn send(&self, peer: usize, payload: Payload, op: &'static str) -> Result<()> {
        trace!(rank = self.rank, peer, op, kind = payload.kind(), "send");
        self.outbound[peer].send(payload).map_err(|_| Error::Transport {
            rank: self.rank,
            peer,
            op,
        })
    }

    fn recv(&self, peer: usize, op: &'static str) -> Result<Payload> {
        self.inbound[peer].recv().map_err(|_| Error::Transport {
            rank: self.rank,
            peer,
            op,
        })
    }

    fn recv_words<W: WireWord>(&self, peer: usize, op: &'static str) -> Result<Vec<W>> {
        W::unpack(self.recv(peer, op)?).map_err(|other| {
            Error::Protocol(format!(
                "rank {}: expected integers from {peer} during {op}, got {}",
                self.rank,
                other.kind()
            ))
        })
    }

    fn recv_edges(&self, peer: usize, op: &'static str) -> Result<Vec<Edge>> {
        match self.recv(peer, op)? {
            Payload::Edges(bytes) => decode_edges(&bytes).ok_or_else(|| {
                Error::Protocol(format!(
                    "rank {}: truncated edge record from {peer} during {op}",
                    self.rank
                ))
            }),
            other => Err(Error::Protocol(format!(
                "rank {}: expected edges from {peer} during {op}, got {}",
                self.rank,
                other.kind()
            ))),
        }
    }

    fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.size).filter(move |&peer| peer != self.rank)
    }

    fn all_reduce<W: WireWord>(
        &self,
        values: &mut [W],
        op: ReduceOp,
        name: &'static str,
    ) -> Result<()> {
        if self.is_root() {
            for peer in self.peers() {
                let other = self.recv_words::<W>(peer, name)?;
                op.apply(values, &other);
            }
            for peer in self.peers() {
                self.send(peer, W::pack(values.to_vec()), name)?;
            }
        } else {
            self.send(ROOT_RANK, W::pack(values.to_vec()), name)?;
            let reduced = self.recv_words::<W>(ROOT_RANK, name)?;
            assert_eq!(reduced.len(), values.len(), "all-reduce length mismatch");
            values.copy_from_slice(&reduced);
        }
        Ok(())
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_words(&self, values: &mut Vec<u32>) -> Result<()> {
        if self.is_root() {
            for peer in self.peers() {
                self.send(peer, Payload::Words(values.clone()), "broadcast")?;
            }
        } else {
            *values = self.recv_words::<u32>(ROOT_RANK, "broadcast")?;
        }
        Ok(())
    }

    fn scatter_word(&self, values: Option<&[u32]>) -> Result<u32> {
        if self.is_root() {
            let values = values.expect("root must supply scatter values");
            assert_eq!(values.len(), self.size, "one scatter value per rank");
            for peer in self.peers() {
                self.send(peer, Payload::Words(vec![values[peer]]), "scatter")?;
            }
            Ok(values[ROOT_RANK])
        } else {
            match self.recv_words::<u32>(ROOT_RANK, "scatter")?.as_slice() {
                [value] => Ok(*value),
                other => Err(Error::Protocol(format!(
                    "rank {}: scatter delivered {} words",
                    self.rank,
                    other.len()
                ))),
            }
        }
    }

    fn gather_word(&self, value: u32) -> Result<Option<Vec<u32>>> {
        if self.is_root() {
            let mut gathered = vec![0u32; self.size];
            gathered[ROOT_RANK] = value;
            for peer in self.peers() {
                match self.recv_words::<u32>(peer, "gather")?.as_slice() {
                    [word] => gathered[peer] = *word,
                    other => {
                        return Err(Error::Protocol(format!(
                            "rank {peer} gathered {} words",
                            other.len()
                        )))
                    }
                }
            }
            Ok(Some(gathered))
        } else {
            self.send(ROOT_RANK, Payload::Words(vec![value]), "gather")?;
            Ok(None)
        }
    }

    fn scatterv_edges(&self, edges: Option<(&[Edge], &Partition)>) -> Result<Vec<Edge>> {
        if self.is_root() {
            let (edges, partition) = edges.expect("root must supply edges to scatter");
            assert_eq!(partition.workers(), self.size, "partition does not match group size");
            assert_eq!(partition.total(), edges.len(), "partition does not cover the edge array");
            for peer in self.peers() {
                let shard = encode_edges(partition.slice(edges, peer));
                self.send(peer, Payload::Edges(shard), "scatterv")?;
            }
            Ok(partition.slice(edges, ROOT_RANK).to_vec())
        } else {
            self.recv_edges(ROOT_RANK, "scatterv")
        }
    }

    fn gatherv_edges(
        &self,
        local: &[Edge],
        layout: Option<&Partition>,
    ) -> Result<Option<Vec<Edge>>> {
        if self.is_root() {
            let layout = layout.expect("root must know the gather layout");
            assert_eq!(layout.workers(), self.size, "gather layout does not match group size");
            assert_eq!(
                local.len(),
                layout.count(ROOT_RANK),
                "gathered shard size mismatch at rank 0"
            );

            let mut gathered = Vec::with_capacity(layout.total());
            gathered.extend_from_slice(local);
            for peer in self.peers() {
                let shard = self.recv_edges(peer, "gatherv")?;
                assert_eq!(
                    shard.len(),
                    layout.count(peer),
                    "gathered shard size mismatch at rank {peer}"
                );
                debug_assert_eq!(gathered.len(), layout.displacements()[peer]);
                gathered.extend(shard);
            }
            Ok(Some(gathered))
        } else {
            self.send(ROOT_RANK, Payload::Edges(encode_edges(local)), "gatherv")?;
            Ok(None)
        }
    }

    fn all_reduce_u32(&self, values: &mut [u32], op: ReduceOp) -> Result<()> {
        self.all_reduce(values, op, "all-reduce")
    }

    fn all_reduce_u64(&self, values: &mut [u64], op: ReduceOp) -> Result<()> {
        self.all_reduce(values, op, "all-reduce")
    }

    fn barrier(&self) -> Result<()> {
        if self.is_root() {
            for peer in self.peers() {
                match self.recv(peer, "barrier")? {
                    Payload::Barrier => {}
                    other => {
                        return Err(Error::Protocol(format!(
                            "rank {peer} sent {} into a barrier",
                            other.kind()
                        )))
                    }
                }
            }
            for peer in self.peers() {
                self.send(peer, Payload::Barrier, "barrier")?;
            }
        } else {
            self.send(ROOT_RANK, Payload::Barrier, "barrier")?;
            match self.recv(ROOT_RANK, "barrier")? {
                Payload::Barrier => {}
                other => {
                    return Err(Error::Protocol(format!(
                        "root answered a barrier with {}",
                        other.kind()
                    )))
                }
            }
        }
        Ok(())
    }
}
