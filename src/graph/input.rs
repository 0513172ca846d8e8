//! Text graph loader
//!
//! Format: a header line `<vertex_count> <edge_count>` followed by exactly
//! `edge_count` lines `<from> <to>` with 0-based ids. Blank lines and lines
//! starting with `#` or `%` are ignored anywhere in the file.
//!
//! Everything the engine refuses to see is handled here: ids out of range are
//! rejected, self-loops are dropped with a warning, and surviving edges are
//! normalized so that `from <= to`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

use super::edge::{Edge, VertexId};
use crate::core::error::{Error, Result};

/// A validated edge list ready for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphInput {
    pub vertex_count: u32,
    pub edges: Vec<Edge>,
    /// Self-loops present in the source and dropped by the loader
    pub self_loops_removed: u64,
}

impl GraphInput {
    /// Validate an in-memory edge list the same way the text loader does
    pub fn from_edges(vertex_count: u32, edges: impl IntoIterator<Item = Edge>) -> Result<Self> {
        let mut kept = Vec::new();
        let mut self_loops_removed = 0u64;

        for (position, edge) in edges.into_iter().enumerate() {
            check_endpoint(edge.from, vertex_count, position)?;
            check_endpoint(edge.to, vertex_count, position)?;
            if edge.is_loop() {
                self_loops_removed += 1;
                continue;
            }
            kept.push(edge.normalized());
        }

        if kept.len() > u32::MAX as usize {
            return Err(Error::InvalidInput(format!(
                "{} edges exceed the 32-bit edge count limit",
                kept.len()
            )));
        }

        if self_loops_removed > 0 {
            warn!(self_loops_removed, "self loops were removed");
        }

        Ok(Self {
            vertex_count,
            edges: kept,
            self_loops_removed,
        })
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

fn check_endpoint(id: VertexId, vertex_count: u32, position: usize) -> Result<()> {
    if id >= vertex_count {
        return Err(Error::InvalidInput(format!(
            "edge {position}: vertex {id} out of range for {vertex_count} vertices"
        )));
    }
    Ok(())
}

/// Load a graph file from disk
pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<GraphInput> {
    let path = path.as_ref();
    debug!(path = %path.display(), "loading graph");
    let file = File::open(path)?;
    read_graph(BufReader::new(file))
}

/// Parse a graph from any buffered reader
pub fn read_graph<R: BufRead>(reader: R) -> Result<GraphInput> {
    let lines = reader
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line));

    let mut header = None;
    let mut edges = Vec::new();
    let mut announced = 0u64;

    for (line_no, line) in lines {
        let line = line?;
        let Some((a, b)) = parse_pair(&line, line_no)? else {
            continue;
        };
        match header {
            None => {
                header = Some(a);
                announced = b as u64;
                edges.reserve(announced.min(1 << 24) as usize);
            }
            Some(_) => {
                if edges.len() as u64 == announced {
                    return Err(Error::InvalidInput(format!(
                        "line {line_no}: more edge lines than the {announced} \
                         announced in the header"
                    )));
                }
                edges.push(Edge::new(a, b));
            }
        }
    }

    let Some(vertex_count) = header else {
        return Err(Error::Parse {
            line: 1,
            message: "missing '<vertex_count> <edge_count>' header".to_string(),
        });
    };

    if (edges.len() as u64) < announced {
        return Err(Error::InvalidInput(format!(
            "header announces {announced} edges but only {} were found",
            edges.len()
        )));
    }

    GraphInput::from_edges(vertex_count, edges)
}

/// Two whitespace-separated u32 values, or `None` for a blank/comment line
fn parse_pair(line: &str, line_no: usize) -> Result<Option<(u32, u32)>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%') {
        return Ok(None);
    }

    let mut tokens = trimmed.split_whitespace();
    let (Some(a), Some(b), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(Error::Parse {
            line: line_no,
            message: format!("expected two integers, got '{trimmed}'"),
        });
    };

    let parse = |token: &str| {
        token.parse::<u32>().map_err(|e| Error::Parse {
            line: line_no,
            message: format!("'{token}': {e}"),
        })
    };

    Ok(Some((parse(a)?, parse(b)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_read_graph_normalizes_and_drops_loops() {
        let text = "4 4\n1 0\n2 2\n2 3\n3 1\n";
        let graph = read_graph(Cursor::new(text)).unwrap();

        assert_eq!(graph.vertex_count, 4);
        assert_eq!(graph.self_loops_removed, 1);
        assert_eq!(
            graph.edges,
            vec![Edge::new(0, 1), Edge::new(2, 3), Edge::new(1, 3)]
        );
    }

    #[test]
    fn test_read_graph_skips_comments_and_blank_lines() {
        let text = "# generated\n\n3 1\n% note\n0 2\n";
        let graph = read_graph(Cursor::new(text)).unwrap();
        assert_eq!(graph.edges, vec![Edge::new(0, 2)]);
    }

    #[test]
    fn test_read_graph_rejects_out_of_range() {
        let err = read_graph(Cursor::new("2 1\n0 2\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_read_graph_rejects_short_file() {
        let err = read_graph(Cursor::new("3 2\n0 1\n")).unwrap_err();
        assert!(err.to_string().contains("announces 2 edges"));
    }

    #[test]
    fn test_read_graph_rejects_extra_lines() {
        let err = read_graph(Cursor::new("3 1\n0 1\n1 2\n")).unwrap_err();
        assert!(err.to_string().contains("more edge lines"));
    }

    #[test]
    fn test_read_graph_reports_bad_token_line() {
        let err = read_graph(Cursor::new("3 1\n0 x\n")).unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_graph_requires_header() {
        let err = read_graph(Cursor::new("# only a comment\n")).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_empty_graph() {
        let graph = read_graph(Cursor::new("5 0\n")).unwrap();
        assert_eq!(graph.vertex_count, 5);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_load_graph_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "3 2").unwrap();
        writeln!(file, "0\t1").unwrap();
        writeln!(file, "2 1").unwrap();

        let graph = load_graph(file.path()).unwrap();
        assert_eq!(graph.edges, vec![Edge::new(0, 1), Edge::new(1, 2)]);
    }
}
