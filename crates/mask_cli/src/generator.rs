//! Built-in generator, used when the run names no graph document.
//!
//! Layers: land, mountains, height, passable ground, spawn area, resources
//! and distance to land. Knobs come from the config's `[variables]` table.

use anyhow::Result;
use mask_engine::{MaskSpec, MaskValue, Pipeline, SymmetrySource};
use tracing::debug;

use crate::config::GenerationConfig;

/// Masks produced by a run, in export order.
pub struct Generated {
	pub masks: Vec<(String, MaskValue)>,
	/// Spawn positions, when the run placed any.
	pub spawns: Vec<[i32; 2]>,
}

pub fn build(pipeline: &Pipeline, config: &GenerationConfig) -> Result<Generated> {
	let size = config.map_size;
	let policy = config.neighbor_policy;
	let blur = (size / 64).max(1);

	let land = pipeline.boolean_mask(size, "land")?;
	land.randomize(config.variable("land_density", 0.45))?
		.smooth_with(blur * 2, 0.5, policy)?
		.acid_with(config.variable("erosion", 0.2), 2.0, policy)?
		.smooth_with(blur, 0.5, policy)?
		.fill_edge(size / 32, false)?;

	let mountains = pipeline.boolean_mask(size, "mountains")?;
	mountains
		.randomize(config.variable("mountain_density", 0.04))?
		.inflate_with(3.0, policy)?
		.intersect(&land)?
		.deflate_with(1.0, policy)?;

	let height = pipeline.float_mask(size, "height")?;
	let mountain_height = pipeline.float_mask(size, "mountain_height")?;
	mountain_height
		.init_from_boolean(&mountains, 0.0, config.variable("mountain_height", 20.0) as f32)?
		.smooth_with(blur * 2, 0.5, policy)?;
	height
		.init_from_boolean(&land, 0.0, 10.0)?
		.add_perlin_noise(size as f64 / 64.0, 3.0)?
		.add(&mountain_height)?
		.smooth_with(blur, 0.5, policy)?
		.clamp(0.0, 64.0)?;

	let passable = pipeline.boolean_mask(size, "passable")?;
	passable.init_from(&land)?.subtract(&mountains)?;

	let spawn_area = pipeline.create::<bool>(
		MaskSpec::new(size, "spawn_area").symmetry(SymmetrySource::Spawn),
	)?;
	spawn_area
		.init_from(&passable)?
		.deflate_with((size / 32).max(1) as f64, policy)?;

	let resources = pipeline.boolean_mask(size, "resources")?;
	resources
		.randomize(config.variable("resource_density", 0.01))?
		.intersect(&passable)?
		.subtract(&spawn_area)?;

	let land_distance = land.distance_field()?;

	let spacing = size as f64 / (config.spawn_count as f64 + 1.0);
	let spawns: Vec<[i32; 2]> = spawn_area
		.spaced_coordinates(spacing)?
		.into_iter()
		.map(|p| [p.x, p.y])
		.collect();
	debug!(spawns = spawns.len(), spacing, "spawn positions placed");

	Ok(Generated {
		masks: vec![
			("land".to_string(), MaskValue::Boolean(land)),
			("mountains".to_string(), MaskValue::Boolean(mountains)),
			("height".to_string(), MaskValue::Float(height)),
			("passable".to_string(), MaskValue::Boolean(passable)),
			("spawn_area".to_string(), MaskValue::Boolean(spawn_area)),
			("resources".to_string(), MaskValue::Boolean(resources)),
			("land_distance".to_string(), MaskValue::Float(land_distance)),
		],
		spawns,
	})
}
