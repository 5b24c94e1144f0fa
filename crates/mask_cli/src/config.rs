//! Generation run configuration.

use anyhow::{Context, Result};
use mask_engine::{GenerationContext, NeighborPolicy, PipelineConfig, SymmetrySettings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Root configuration of one `generate_map` run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
	/// Root seed of the run.
	pub seed: u64,
	/// Width and height of every generated mask.
	pub map_size: usize,
	/// Terrain, team and spawn symmetries.
	pub symmetry: SymmetrySettings,
	/// Worker threads, 0 picks the available parallelism.
	#[serde(default)]
	pub worker_threads: usize,
	/// Neighbor policy of the built-in generator's neighborhood operations.
	#[serde(default)]
	pub neighbor_policy: NeighborPolicy,
	/// Pipeline graph document to evaluate instead of the built-in generator.
	#[serde(default)]
	pub graph: Option<PathBuf>,
	/// Output directory, relative to the config file.
	#[serde(default = "default_output_dir")]
	pub output_dir: PathBuf,
	#[serde(default = "default_spawn_count")]
	pub spawn_count: usize,
	#[serde(default = "default_num_teams")]
	pub num_teams: usize,
	/// Extra variables visible to graph literal expressions.
	#[serde(default)]
	pub variables: BTreeMap<String, f64>,
}

fn default_output_dir() -> PathBuf {
	PathBuf::from("out")
}

fn default_spawn_count() -> usize {
	2
}

fn default_num_teams() -> usize {
	2
}

impl GenerationConfig {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> Result<Self> {
		let config: GenerationConfig =
			toml::from_str(content).with_context(|| "Failed to parse config TOML")?;

		if config.map_size == 0 {
			anyhow::bail!("map_size must be positive");
		}
		if config.spawn_count == 0 {
			anyhow::bail!("spawn_count must be positive");
		}

		Ok(config)
	}

	pub fn pipeline_config(&self) -> PipelineConfig {
		PipelineConfig::new(self.seed, self.symmetry).with_worker_threads(self.worker_threads)
	}

	/// Variables for graph literal expressions.
	pub fn context(&self) -> GenerationContext {
		GenerationContext {
			seed: self.seed,
			map_size: self.map_size,
			spawn_count: self.spawn_count,
			num_teams: self.num_teams,
			variables: self.variables.clone(),
		}
	}

	/// Variable lookup with a fallback, for the built-in generator's knobs.
	pub fn variable(&self, name: &str, default: f64) -> f64 {
		self.variables.get(name).copied().unwrap_or(default)
	}
}
