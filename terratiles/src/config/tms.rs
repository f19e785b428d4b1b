//! Tile matrix set descriptors.

use anyhow::Result;
use serde::Deserialize;
use terratiles_core::{TileMatrix, TileMatrixSet};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TileMatrixConfig {
	pub id: String,
	pub resolution: f64,
	pub x0: f64,
	pub y0: f64,
	pub tile_width: u32,
	pub tile_height: u32,
	pub matrix_width: u32,
	pub matrix_height: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TileMatrixSetConfig {
	pub id: String,
	pub crs: String,
	pub matrices: Vec<TileMatrixConfig>,
}

impl TileMatrixSetConfig {
	pub fn build(&self) -> Result<TileMatrixSet> {
		let matrices = self
			.matrices
			.iter()
			.map(|m| TileMatrix {
				id: m.id.clone(),
				resolution: m.resolution,
				x0: m.x0,
				y0: m.y0,
				tile_width: m.tile_width,
				tile_height: m.tile_height,
				matrix_width: m.matrix_width,
				matrix_height: m.matrix_height,
			})
			.collect();
		TileMatrixSet::new(&self.id, &self.crs, matrices)
	}
}
