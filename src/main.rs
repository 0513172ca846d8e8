//! # Butterfly-cc CLI
//!
//! Command-line interface for the butterfly-cc library.
//! Loads a graph file, contracts it over a group of in-process ranks and
//! reports its connected components.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

use butterfly_cc::{baseline, load_graph, run_graph, CcConfig, Strategy};

mod cli;

/// Command-line interface for butterfly-cc
#[derive(Parser)]
#[command(name = "butterfly-cc")]
#[command(about = "Connected components by distributed graph contraction")]
#[command(long_about = "Computes the connected components of an undirected graph:
  butterfly-cc graph.txt                          # deterministic, one worker
  butterfly-cc graph.txt -w 4 -s sampling         # sparse sampling over 4 workers
  butterfly-cc graph.txt -w 2 -s random-mate      # coin-toss hooking over 2 workers
  butterfly-cc graph.txt --json --verify          # JSON report, checked against union-find

Input format:
  <vertex_count> <edge_count>
  <from> <to>                                     # edge_count lines, 0-based ids")]
#[command(version)]
struct Cli {
    /// Graph file to read
    input: PathBuf,

    /// Number of ranks taking part in the contraction
    #[arg(short, long)]
    workers: Option<usize>,

    /// Contraction strategy
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Base seed for the sampling and coin-toss generators
    #[arg(long)]
    seed: Option<u64>,

    /// Sample size exponent for the sampling strategy
    #[arg(long)]
    epsilon: Option<f64>,

    /// Oversampling slack for the sampling strategy
    #[arg(long)]
    delta: Option<f64>,

    /// Components left after each sampling round's prefix contraction
    #[arg(long)]
    target_size: Option<u32>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the summary and per-round stats as JSON
    #[arg(long)]
    json: bool,

    /// Write one component label per line to this file
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Check the result against a sequential union-find
    #[arg(long)]
    verify: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = cli::LogFormat::Text)]
    log_format: cli::LogFormat,
}

fn main() {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose, cli.log_format);

    if let Err(e) = run(cli) {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli)?;
    info!("🦋 Butterfly-cc v{} starting...", env!("CARGO_PKG_VERSION"));

    let started = Instant::now();
    let graph = load_graph(&cli.input)
        .with_context(|| format!("failed to load graph from {}", cli.input.display()))?;
    let load_time = started.elapsed();

    let vertex_count = graph.vertex_count;
    let edge_count = graph.edge_count();
    let self_loops_removed = graph.self_loops_removed;
    let reference_edges = cli.verify.then(|| graph.edges.clone());

    let started = Instant::now();
    let components = run_graph(graph, &config).context("connected components run failed")?;
    let elapsed = started.elapsed();

    let verified = reference_edges.map(|edges| {
        let expected = baseline::union_find_components(vertex_count, &edges);
        baseline::same_partition(&components.labels, &expected)
    });

    let summary = cli::Summary {
        input: cli.input.display().to_string(),
        workers: config.workers,
        strategy: config.strategy,
        vertices: vertex_count,
        edges: edge_count,
        self_loops_removed,
        iterations: components.iterations,
        components: components.component_count,
        load_seconds: load_time.as_secs_f64(),
        elapsed_seconds: elapsed.as_secs_f64(),
        verified,
    };

    if cli.json {
        cli::print_json(&summary, &components.rounds)?;
    } else {
        cli::print_text(&summary);
    }

    if let Some(path) = &cli.labels {
        cli::write_labels(path, &components.labels)
            .with_context(|| format!("failed to write labels to {}", path.display()))?;
        info!("📁 Labels written to {}", path.display());
    }

    if verified == Some(false) {
        bail!("components disagree with the sequential union-find baseline");
    }

    Ok(())
}

/// Config file (or defaults) with CLI overrides applied
fn build_config(cli: &Cli) -> Result<CcConfig> {
    let mut config = match &cli.config {
        Some(path) => CcConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => CcConfig::default(),
    };

    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(epsilon) = cli.epsilon {
        config.sampling.epsilon = epsilon;
    }
    if let Some(delta) = cli.delta {
        config.sampling.delta = delta;
    }
    if let Some(target_size) = cli.target_size {
        config.sampling.target_size = target_size;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_build_config_defaults() {
        let cli = Cli::try_parse_from(["butterfly-cc", "graph.txt"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config, CcConfig::default());
    }

    #[test]
    fn test_build_config_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"workers": 2, "seed": 9}}"#).unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from([
            "butterfly-cc",
            "graph.txt",
            "--config",
            path,
            "--workers",
            "4",
            "--strategy",
            "sampling",
            "--target-size",
            "3",
        ])
        .unwrap();
        let config = build_config(&cli).unwrap();

        assert_eq!(config.workers, 4);
        assert_eq!(config.seed, 9);
        assert_eq!(config.strategy, Strategy::Sampling);
        assert_eq!(config.sampling.target_size, 3);
    }

    #[test]
    fn test_random_mate_strategy_flag() {
        let cli = Cli::try_parse_from(["butterfly-cc", "graph.txt", "-s", "random-mate"]).unwrap();
        assert_eq!(build_config(&cli).unwrap().strategy, Strategy::RandomMate);
    }

    #[test]
    fn test_build_config_rejects_zero_workers() {
        let cli = Cli::try_parse_from(["butterfly-cc", "graph.txt", "-w", "0"]).unwrap();
        assert!(build_config(&cli).is_err());
    }
}
