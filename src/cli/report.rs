//! Run summary and label output

use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use butterfly_cc::{RoundStats, Strategy, VertexId};

/// What a run reports on stdout
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub input: String,
    pub workers: usize,
    pub strategy: Strategy,
    pub vertices: u32,
    pub edges: usize,
    pub self_loops_removed: u64,
    pub iterations: u32,
    pub components: u32,
    pub load_seconds: f64,
    pub elapsed_seconds: f64,
    /// `None` unless `--verify` was given
    pub verified: Option<bool>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    summary: &'a Summary,
    rounds: &'a [RoundStats],
}

pub fn render_text(summary: &Summary) -> String {
    let mut out = String::new();
    out.push_str("------\n");
    out.push_str(&format!("File: {}\n", summary.input));
    out.push_str(&format!("Workers: {}\n", summary.workers));
    out.push_str(&format!("Strategy: {}\n", summary.strategy.name()));
    out.push_str(&format!("Vertices: {}\n", summary.vertices));
    out.push_str(&format!("Edges: {}\n", summary.edges));
    if summary.self_loops_removed > 0 {
        out.push_str(&format!("Self-loops removed: {}\n", summary.self_loops_removed));
    }
    out.push_str(&format!("Iterations: {}\n", summary.iterations));
    out.push_str(&format!("Components: {}\n", summary.components));
    out.push_str(&format!("Load time: {:.3}s\n", summary.load_seconds));
    out.push_str(&format!("Elapsed: {:.3}s\n", summary.elapsed_seconds));
    match summary.verified {
        Some(true) => out.push_str("Verified: ok\n"),
        Some(false) => out.push_str("Verified: MISMATCH\n"),
        None => {}
    }
    out.push_str("------\n");
    out
}

pub fn print_text(summary: &Summary) {
    print!("{}", render_text(summary));
}

pub fn render_json(summary: &Summary, rounds: &[RoundStats]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport { summary, rounds })
}

pub fn print_json(summary: &Summary, rounds: &[RoundStats]) -> serde_json::Result<()> {
    println!("{}", render_json(summary, rounds)?);
    Ok(())
}

/// One label per line, vertex order
pub fn write_labels(path: &Path, labels: &[VertexId]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for label in labels {
        writeln!(writer, "{label}")?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> Summary {
        Summary {
            input: "graph.txt".to_string(),
            workers: 2,
            strategy: Strategy::Deterministic,
            vertices: 4,
            edges: 3,
            self_loops_removed: 0,
            iterations: 1,
            components: 1,
            load_seconds: 0.001,
            elapsed_seconds: 0.002,
            verified: Some(true),
        }
    }

    #[test]
    fn test_render_text() {
        let text = render_text(&summary());
        assert!(text.contains("Strategy: deterministic\n"));
        assert!(text.contains("Components: 1\n"));
        assert!(text.contains("Verified: ok\n"));
        assert!(!text.contains("Self-loops"));
    }

    #[test]
    fn test_render_json_flattens_summary() {
        let json = render_json(&summary(), &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["components"], 1);
        assert_eq!(value["strategy"], "deterministic");
        assert_eq!(value["rounds"], serde_json::json!([]));
    }

    #[test]
    fn test_write_labels() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_labels(file.path(), &[3, 3, 1]).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, "3\n3\n1\n");
    }
}
