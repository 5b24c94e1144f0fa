//! PNG previews and the run report.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use mask_engine::{
	MaskError, MaskKind, MaskValue, Pipeline, PipelineStage, PipelineStats, RasterData,
	SymmetrySettings,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::GenerationConfig;
use crate::generator::Generated;

/// Contents of `report.json`.
#[derive(Debug, Serialize)]
pub struct Report {
	pub seed: u64,
	pub map_size: usize,
	pub symmetry: SymmetrySettings,
	pub stats: PipelineStats,
	pub masks: Vec<MaskSummary>,
	pub spawns: Vec<[i32; 2]>,
	pub stages: Vec<PipelineStage>,
}

#[derive(Debug, Serialize)]
pub struct MaskSummary {
	pub name: String,
	pub class: MaskKind,
	pub size: usize,
	pub min: f64,
	pub max: f64,
	pub mean: f64,
	/// Cells holding a non-zero value.
	pub set_cells: usize,
}

impl MaskSummary {
	fn new(name: &str, data: &RasterData) -> Self {
		let values = data.to_f64_vec();
		let (min, max) = bounds(&values);
		let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
		Self {
			name: name.to_string(),
			class: data.kind(),
			size: data.size(),
			min,
			max,
			mean,
			set_cells: (0..values.len()).filter(|&i| data.is_set(i)).count(),
		}
	}
}

fn bounds(values: &[f64]) -> (f64, f64) {
	if values.is_empty() {
		return (0.0, 0.0);
	}
	values
		.iter()
		.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Final raster of any mask class.
fn snapshot(mask: &MaskValue) -> Result<Arc<RasterData>, MaskError> {
	Ok(match mask {
		MaskValue::Boolean(m) => Arc::clone(m.final_raster()?.data()),
		MaskValue::Float(m) => Arc::clone(m.final_raster()?.data()),
		MaskValue::Integer(m) => Arc::clone(m.final_raster()?.data()),
	})
}

/// Grayscale preview stretched over the raster's value range.
pub fn preview(data: &RasterData) -> GrayImage {
	let size = data.size();
	let values = data.to_f64_vec();
	let (min, max) = bounds(&values);
	let span = max - min;
	GrayImage::from_fn(size as u32, size as u32, |x, y| {
		let v = values[y as usize * size + x as usize];
		let level = if span > 0.0 {
			((v - min) / span * 255.0).round() as u8
		} else if v > 0.0 {
			255
		} else {
			0
		};
		Luma([level])
	})
}

/// Write `<name>.png` for every mask and `report.json` into `dir`.
pub fn write_all(
	dir: &Path,
	pipeline: &Pipeline,
	config: &GenerationConfig,
	generated: &Generated,
) -> Result<Report> {
	std::fs::create_dir_all(dir)
		.with_context(|| format!("Failed to create output dir: {}", dir.display()))?;

	let mut masks = Vec::with_capacity(generated.masks.len());
	for (name, mask) in &generated.masks {
		let data = snapshot(mask).with_context(|| format!("Mask `{name}` did not complete"))?;
		let path = dir.join(format!("{name}.png"));
		preview(&data)
			.save(&path)
			.with_context(|| format!("Failed to write: {}", path.display()))?;
		info!(mask = %name, path = %path.display(), "preview written");
		masks.push(MaskSummary::new(name, &data));
	}

	let report = Report {
		seed: config.seed,
		map_size: config.map_size,
		symmetry: config.symmetry,
		stats: pipeline.stats(),
		masks,
		spawns: generated.spawns.clone(),
		stages: pipeline.stage_log(),
	};
	let path = dir.join("report.json");
	let json = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
	std::fs::write(&path, json).with_context(|| format!("Failed to write: {}", path.display()))?;
	Ok(report)
}
