//! Map layer generator.
//!
//! Runs one generation pass and writes a grayscale PNG per mask plus a
//! `report.json` with the run's stage log and per-mask statistics.
//!
//! The masks come from the built-in generator unless the config (or
//! `--graph`) names a pipeline graph document, in which case every output
//! endpoint of the graph is exported under its endpoint name.

mod config;
mod export;
mod generator;

use anyhow::{Context, Result};
use clap::Parser;
use mask_engine::{Pipeline, PipelineGraph, VertexKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, info_span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::GenerationConfig;
use generator::Generated;

/// Symmetric map layer generator.
#[derive(Parser, Debug)]
#[command(name = "generate_map")]
#[command(about = "Generates symmetric map layers as PNG previews")]
struct Args {
	/// Path to configuration TOML file.
	#[arg(short, long)]
	config: PathBuf,

	/// Pipeline graph document, overriding the config's `graph`.
	#[arg(short, long)]
	graph: Option<PathBuf>,

	/// Output directory (default: the config's `output_dir`, relative to the config file).
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Log at debug level.
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> Result<()> {
	let args = Args::parse();

	let filter = if args.verbose { "debug" } else { "info" };
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
		.with(tracing_subscriber::fmt::layer().without_time())
		.init();

	let base_dir = args
		.config
		.parent()
		.unwrap_or(Path::new("."))
		.to_path_buf();

	let config = {
		let _span = info_span!("load_config", path = %args.config.display()).entered();
		GenerationConfig::load(&args.config)?
	};
	info!(
		seed = config.seed,
		map_size = config.map_size,
		terrain = ?config.symmetry.terrain(),
		"config loaded"
	);

	let pipeline = Pipeline::new(config.pipeline_config()).context("Failed to start pipeline")?;

	let graph_path = args
		.graph
		.clone()
		.or_else(|| config.graph.as_ref().map(|path| base_dir.join(path)));
	let generated = {
		let _span = info_span!("generate").entered();
		match &graph_path {
			Some(path) => run_graph(path, &pipeline, &config)?,
			None => generator::build(&pipeline, &config)?,
		}
	};

	{
		let _span = info_span!("await").entered();
		pipeline.await_all().context("Generation failed")?;
	}
	let stats = pipeline.stats();
	info!(appended = stats.appended, completed = stats.completed, "all stages finished");

	let output_dir = args
		.output
		.unwrap_or_else(|| base_dir.join(&config.output_dir));
	let _span = info_span!("export", dir = %output_dir.display()).entered();
	export::write_all(&output_dir, &pipeline, &config, &generated)?;

	info!(masks = generated.masks.len(), "done, output written to {}", output_dir.display());
	Ok(())
}

/// Evaluate a graph document and collect its output endpoints.
fn run_graph(path: &Path, pipeline: &Pipeline, config: &GenerationConfig) -> Result<Generated> {
	let json = std::fs::read_to_string(path)
		.with_context(|| format!("Failed to read graph: {}", path.display()))?;
	let mut graph = PipelineGraph::from_json(&json)
		.with_context(|| format!("Failed to load graph: {}", path.display()))?;
	if let Some(generator) = graph.generator() {
		info!(generator, "graph loaded");
	}

	graph
		.evaluate(pipeline, &config.context(), &BTreeMap::new())
		.with_context(|| format!("Failed to evaluate graph: {}", path.display()))?;

	let mut masks = Vec::new();
	for (name, &id) in graph.endpoints() {
		if graph.vertex(id)?.kind() != VertexKind::Output {
			continue;
		}
		let mask = graph
			.output(name)?
			.as_mask()
			.with_context(|| format!("Output `{name}` is not a mask"))?
			.clone();
		masks.push((name.clone(), mask));
	}
	if masks.is_empty() {
		anyhow::bail!("Graph {} has no output endpoints", path.display());
	}

	Ok(Generated {
		masks,
		spawns: Vec::new(),
	})
}
