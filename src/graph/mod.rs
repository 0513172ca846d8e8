//! Graph primitives: the edge record and the text loader

pub mod edge;
pub mod input;

pub use edge::{decode_edges, encode_edges, Edge, VertexId, EDGE_WIRE_SIZE};
pub use input::{load_graph, read_graph, GraphInput};
