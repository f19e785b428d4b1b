//! Tile grids: [`TileMatrix`], [`TileRange`] and [`TileMatrixSet`].
//!
//! A `TileMatrix` describes one resolution step of a pyramid: origin,
//! resolution, tile pixel size and matrix extent. Tile (0,0) is the top-left
//! tile; row indices grow downward. The world bbox of any tile is derived
//! from these fields alone.

use super::BBox;
use anyhow::{Result, ensure};
use std::sync::Arc;

/// Snap tolerance when mapping world coordinates onto tile boundaries, as a
/// fraction of a tile span. Keeps a bbox that ends exactly on a boundary
/// from pulling in the next tile.
const EDGE_EPSILON: f64 = 1e-9;

/// The grid parameters of a single resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMatrix {
	pub id: String,
	/// CRS units per pixel.
	pub resolution: f64,
	/// World x of the matrix's top-left corner.
	pub x0: f64,
	/// World y of the matrix's top-left corner.
	pub y0: f64,
	pub tile_width: u32,
	pub tile_height: u32,
	pub matrix_width: u32,
	pub matrix_height: u32,
}

impl TileMatrix {
	/// World width of one tile.
	pub fn tile_span_x(&self) -> f64 {
		self.resolution * f64::from(self.tile_width)
	}

	/// World height of one tile.
	pub fn tile_span_y(&self) -> f64 {
		self.resolution * f64::from(self.tile_height)
	}

	pub fn contains_tile(&self, col: u32, row: u32) -> bool {
		col < self.matrix_width && row < self.matrix_height
	}

	/// World bbox of tile (col, row), labelled with `crs`.
	pub fn tile_bbox(&self, col: u32, row: u32, crs: &str) -> BBox {
		let xmin = self.x0 + f64::from(col) * self.tile_span_x();
		let ymax = self.y0 - f64::from(row) * self.tile_span_y();
		BBox {
			xmin,
			ymin: ymax - self.tile_span_y(),
			xmax: xmin + self.tile_span_x(),
			ymax,
			crs: crs.to_string(),
		}
	}

	/// World bbox of the whole matrix.
	pub fn matrix_bbox(&self, crs: &str) -> BBox {
		BBox {
			xmin: self.x0,
			ymin: self.y0 - f64::from(self.matrix_height) * self.tile_span_y(),
			xmax: self.x0 + f64::from(self.matrix_width) * self.tile_span_x(),
			ymax: self.y0,
			crs: crs.to_string(),
		}
	}

	/// The tile indices whose union covers `bbox`, cropped to the matrix
	/// extent. `None` when the bbox misses the matrix entirely.
	pub fn tiles_covering(&self, bbox: &BBox) -> Option<TileRange> {
		let span_x = self.tile_span_x();
		let span_y = self.tile_span_y();

		let col_min = ((bbox.xmin - self.x0) / span_x + EDGE_EPSILON).floor();
		let col_max = ((bbox.xmax - self.x0) / span_x - EDGE_EPSILON).ceil() - 1.0;
		let row_min = ((self.y0 - bbox.ymax) / span_y + EDGE_EPSILON).floor();
		let row_max = ((self.y0 - bbox.ymin) / span_y - EDGE_EPSILON).ceil() - 1.0;

		if col_max < 0.0 || row_max < 0.0 {
			return None;
		}
		if col_min >= f64::from(self.matrix_width) || row_min >= f64::from(self.matrix_height) {
			return None;
		}

		Some(TileRange {
			col_min: col_min.max(0.0) as u32,
			col_max: (col_max as u32).min(self.matrix_width - 1),
			row_min: row_min.max(0.0) as u32,
			row_max: (row_max as u32).min(self.matrix_height - 1),
		})
	}

	/// `bbox` expanded outward to the tile boundaries of this matrix.
	pub fn expand_to_tiles(&self, bbox: &BBox) -> Option<BBox> {
		let range = self.tiles_covering(bbox)?;
		let top_left = self.tile_bbox(range.col_min, range.row_min, &bbox.crs);
		let bottom_right = self.tile_bbox(range.col_max, range.row_max, &bbox.crs);
		Some(BBox {
			xmin: top_left.xmin,
			ymin: bottom_right.ymin,
			xmax: bottom_right.xmax,
			ymax: top_left.ymax,
			crs: bbox.crs.clone(),
		})
	}
}

/// An inclusive rectangle of tile indices within one matrix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TileRange {
	pub col_min: u32,
	pub col_max: u32,
	pub row_min: u32,
	pub row_max: u32,
}

impl TileRange {
	pub fn width(&self) -> u32 {
		self.col_max - self.col_min + 1
	}

	pub fn height(&self) -> u32 {
		self.row_max - self.row_min + 1
	}

	pub fn count(&self) -> u64 {
		u64::from(self.width()) * u64::from(self.height())
	}

	pub fn contains(&self, col: u32, row: u32) -> bool {
		col >= self.col_min && col <= self.col_max && row >= self.row_min && row <= self.row_max
	}

	/// Iterate row-major, top-left to bottom-right.
	pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + use<> {
		let range = *self;
		(range.row_min..=range.row_max).flat_map(move |row| (range.col_min..=range.col_max).map(move |col| (col, row)))
	}
}

/// An ordered family of tile matrices sharing one CRS.
///
/// Matrices are kept in descending resolution order (coarsest first), which
/// is the pyramid order everything else iterates in. Built once at startup,
/// read-only afterwards.
#[derive(Clone, Debug)]
pub struct TileMatrixSet {
	pub id: String,
	pub crs: String,
	matrices: Vec<Arc<TileMatrix>>,
}

impl TileMatrixSet {
	pub fn new(id: &str, crs: &str, mut matrices: Vec<TileMatrix>) -> Result<TileMatrixSet> {
		ensure!(!matrices.is_empty(), "tile matrix set '{id}' has no matrices");
		for tm in &matrices {
			ensure!(
				tm.resolution > 0.0 && tm.tile_width > 0 && tm.tile_height > 0 && tm.matrix_width > 0 && tm.matrix_height > 0,
				"tile matrix '{}' in set '{id}' has degenerate geometry",
				tm.id
			);
		}
		matrices.sort_by(|a, b| b.resolution.total_cmp(&a.resolution));
		let mut ids: Vec<&str> = matrices.iter().map(|tm| tm.id.as_str()).collect();
		ids.sort_unstable();
		ids.dedup();
		ensure!(
			ids.len() == matrices.len(),
			"tile matrix set '{id}' contains duplicate matrix identifiers"
		);
		Ok(TileMatrixSet {
			id: id.to_string(),
			crs: crs.to_string(),
			matrices: matrices.into_iter().map(Arc::new).collect(),
		})
	}

	pub fn get(&self, id: &str) -> Option<Arc<TileMatrix>> {
		self.matrices.iter().find(|tm| tm.id == id).cloned()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.matrices.iter().any(|tm| tm.id == id)
	}

	/// Matrices in descending resolution order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<TileMatrix>> {
		self.matrices.iter()
	}

	pub fn len(&self) -> usize {
		self.matrices.len()
	}

	pub fn is_empty(&self) -> bool {
		self.matrices.is_empty()
	}
}
