//! The pyramid: ordered levels over one TileMatrixSet.

use crate::level::{Level, RenderMode};
use anyhow::{Result, ensure};
use std::sync::Arc;
use terratiles_core::{PixelLayout, TileCodec, TileMatrixSet};

/// An ordered map of levels (coarsest first) over one TileMatrixSet, with
/// one canonical pixel format.
///
/// Construction enforces the structural invariants: every level's matrix
/// belongs to the pyramid's TMS, and all levels share the pyramid's format
/// and nodata.
#[derive(Clone, Debug)]
pub struct Pyramid {
	pub id: String,
	pub tms: Arc<TileMatrixSet>,
	pub layout: PixelLayout,
	pub nodata: Vec<f64>,
	/// Canonical stored-tile compression.
	pub codec: TileCodec,
	levels: Vec<Arc<Level>>,
}

impl Pyramid {
	pub fn new(
		id: &str,
		tms: Arc<TileMatrixSet>,
		layout: PixelLayout,
		nodata: Vec<f64>,
		codec: TileCodec,
		mut levels: Vec<Level>,
	) -> Result<Pyramid> {
		ensure!(!levels.is_empty(), "pyramid '{id}' has no levels");
		ensure!(
			nodata.len() == layout.channels as usize,
			"pyramid '{id}' nodata vector has {} entries for {} channels",
			nodata.len(),
			layout.channels
		);

		for level in &levels {
			ensure!(
				tms.contains(level.id()),
				"level '{}' of pyramid '{id}' is not a matrix of TMS '{}'",
				level.id(),
				tms.id
			);
			ensure!(
				level.layout == layout && level.nodata == nodata,
				"level '{}' of pyramid '{id}' does not share the pyramid format",
				level.id()
			);
			ensure!(
				level.crs == tms.crs,
				"level '{}' of pyramid '{id}' is in {} but the TMS is in {}",
				level.id(),
				level.crs,
				tms.crs
			);
		}

		levels.sort_by(|a, b| b.resolution().total_cmp(&a.resolution()));
		Ok(Pyramid {
			id: id.to_string(),
			tms,
			layout,
			nodata,
			codec,
			levels: levels.into_iter().map(Arc::new).collect(),
		})
	}

	pub fn get_level(&self, id: &str) -> Option<Arc<Level>> {
		self.levels.iter().find(|l| l.id() == id).cloned()
	}

	/// Levels in descending resolution order (coarsest first).
	pub fn levels(&self) -> impl Iterator<Item = &Arc<Level>> {
		self.levels.iter()
	}

	/// Finest level (smallest resolution).
	pub fn finest(&self) -> &Arc<Level> {
		self.levels.last().expect("pyramids have at least one level")
	}

	pub fn coarsest(&self) -> &Arc<Level> {
		self.levels.first().expect("pyramids have at least one level")
	}

	pub fn has_on_demand_levels(&self) -> bool {
		self.levels.iter().any(|l| l.mode == RenderMode::OnDemand)
	}

	/// The best level for a target resolution (CRS units per pixel).
	///
	/// Walking coarsest to finest, the chosen level is the coarsest whose
	/// resolution does not exceed the request; when every level is coarser
	/// than requested, the finest wins. Levels in on-demand mode only
	/// participate when `include_on_demand` is set (the path that builds
	/// stored tiles on the fly).
	pub fn best_level(&self, resolution: f64, include_on_demand: bool) -> Option<Arc<Level>> {
		let candidates = self
			.levels
			.iter()
			.filter(|l| include_on_demand || l.mode != RenderMode::OnDemand);

		let mut finest: Option<&Arc<Level>> = None;
		for level in candidates {
			finest = Some(level);
			if level.resolution() <= resolution {
				return Some(level.clone());
			}
		}
		finest.cloned()
	}
}
