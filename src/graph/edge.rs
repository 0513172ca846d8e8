//! Edge value type and its wire codec

use serde::{Deserialize, Serialize};

/// Dense vertex id in `[0, N)`
pub type VertexId = u32;

/// Bytes per edge on the wire: `from` then `to`, both little-endian u32
pub const EDGE_WIRE_SIZE: usize = 8;

/// Undirected edge between two vertex ids
///
/// The layout is fixed at two 32-bit ids because shards travel between ranks
/// as raw 8-byte records.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
}

const _: () = assert!(std::mem::size_of::<Edge>() == EDGE_WIRE_SIZE);

impl Edge {
    pub const fn new(from: VertexId, to: VertexId) -> Self {
        Self { from, to }
    }

    /// Same edge with `from <= to`
    pub fn normalized(self) -> Self {
        if self.from <= self.to {
            self
        } else {
            Self::new(self.to, self.from)
        }
    }

    pub fn is_loop(&self) -> bool {
        self.from == self.to
    }

    pub fn to_le_bytes(self) -> [u8; EDGE_WIRE_SIZE] {
        let mut bytes = [0u8; EDGE_WIRE_SIZE];
        bytes[0..4].copy_from_slice(&self.from.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.to.to_le_bytes());
        bytes
    }

    pub fn from_le_bytes(bytes: [u8; EDGE_WIRE_SIZE]) -> Self {
        Self {
            from: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            to: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

impl From<(VertexId, VertexId)> for Edge {
    fn from((from, to): (VertexId, VertexId)) -> Self {
        Self::new(from, to)
    }
}

/// Encode a shard as consecutive wire records
pub fn encode_edges(edges: &[Edge]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(edges.len() * EDGE_WIRE_SIZE);
    for edge in edges {
        bytes.extend_from_slice(&edge.to_le_bytes());
    }
    bytes
}

/// Decode consecutive wire records; `None` if the buffer is not a whole
/// number of records
pub fn decode_edges(bytes: &[u8]) -> Option<Vec<Edge>> {
    if bytes.len() % EDGE_WIRE_SIZE != 0 {
        return None;
    }

    let edges = bytes
        .chunks_exact(EDGE_WIRE_SIZE)
        .map(|chunk| {
            let mut record = [0u8; EDGE_WIRE_SIZE];
            record.copy_from_slice(chunk);
            Edge::from_le_bytes(record)
        })
        .collect();
    Some(edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_orders_endpoints() {
        assert_eq!(Edge::new(5, 2).normalized(), Edge::new(2, 5));
        assert_eq!(Edge::new(2, 5).normalized(), Edge::new(2, 5));
        assert_eq!(Edge::new(3, 3).normalized(), Edge::new(3, 3));
    }

    #[test]
    fn test_wire_layout_is_little_endian_from_then_to() {
        let bytes = Edge::new(0x0102_0304, 7).to_le_bytes();
        assert_eq!(bytes, [4, 3, 2, 1, 7, 0, 0, 0]);
    }

    #[test]
    fn test_decode_rejects_partial_record() {
        let mut bytes = encode_edges(&[Edge::new(1, 2), Edge::new(3, 4)]);
        assert_eq!(bytes.len(), 16);
        bytes.pop();
        assert!(decode_edges(&bytes).is_none());
    }

    #[test]
    fn test_decode_keeps_order() {
        let edges = vec![Edge::new(9, 1), Edge::new(0, u32::MAX), Edge::new(4, 4)];
        assert_eq!(decode_edges(&encode_edges(&edges)), Some(edges));
    }
}
