use crate::config::{LayoutConfigPatch, load_config};
use crate::ir::{DiagramType, Graph};
use crate::layout::{LayoutEngine, LayoutResult};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dlayout",
    version,
    about = "Lay out a node/edge graph and print the positioned diagram as JSON"
)]
pub struct Args {
    /// Input graph JSON or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Diagram type, overriding the one in the input (flow, tree, timeline, cycle, matrix)
    #[arg(short = 't', long = "type")]
    pub diagram_type: Option<String>,

    /// Refinement iteration; higher values enable more optimisation passes
    #[arg(short = 'n', long = "iteration", default_value_t = 1)]
    pub iteration: u32,

    /// Low-latency mode: heuristic placement and one overlap pass
    #[arg(long)]
    pub simple: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pub pretty: bool,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let input = read_input(args.input.as_deref())?;
    let result = layout_input(&input, &args)?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    write_output(&json, args.output.as_deref())?;

    if !result.success {
        return Err(anyhow::anyhow!(
            "layout failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ));
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Parses the graph, applies config and flag overrides, and lays it out.
pub fn layout_input(input: &str, args: &Args) -> Result<LayoutResult> {
    let mut graph: Graph = serde_json::from_str(input).context("input is not a valid graph")?;
    if let Some(token) = args.diagram_type.as_deref() {
        graph.diagram_type = DiagramType::from_token(token);
    }

    let mut engine = LayoutEngine::new(load_config(args.config.as_deref())?);
    if args.simple {
        engine.update_config(LayoutConfigPatch::simple_mode(true))?;
    }
    Ok(engine.layout_graph(&graph, args.iteration))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(json: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}
