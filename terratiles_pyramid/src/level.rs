//! One resolution step of a pyramid, bound to its storage layout.

use serde::Deserialize;
use std::sync::Arc;
use terratiles_core::io::SharedContext;
use terratiles_core::{BBox, PixelLayout, RasterDescriptor, TileCodec, TileMatrix, TileRange};

/// How tile objects are named under a level's root.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PathScheme {
	/// `<root>/<level>/<col>_<row>.<ext>`
	#[default]
	Flat,
	/// `<root>/<level>/<col>/<row>.<ext>`
	Nested,
}

/// How a level answers requests.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
	/// Tiles exist in storage and are served as stored.
	#[default]
	Stored,
	/// Tiles are synthesised per request from another level.
	OnDemand,
	/// Tiles are synthesised, served, and then persisted best-effort.
	OnTheFly,
}

/// A [`TileMatrix`] bound to a storage layout.
///
/// The level owns copies of the pyramid's format fields; the pyramid
/// constructor guarantees they agree across levels, so there is no back
/// reference and no cycle.
#[derive(Clone, Debug)]
pub struct Level {
	pub tile_matrix: Arc<TileMatrix>,
	pub context: SharedContext,
	/// Object-name prefix inside the context's container.
	pub root: String,
	pub scheme: PathScheme,
	pub codec: TileCodec,
	/// Extension of stored tile objects.
	pub extension: String,
	/// The window of tiles that actually exist, within the matrix extent.
	pub window: TileRange,
	pub mode: RenderMode,
	/// Tiles per slab side when tiles are packed into slab objects; `None`
	/// stores one object per tile.
	pub slab_tiles: Option<u32>,
	/// Pyramid format, copied in at construction.
	pub layout: PixelLayout,
	pub nodata: Vec<f64>,
	/// CRS of the owning TileMatrixSet.
	pub crs: String,
}

impl Level {
	pub fn id(&self) -> &str {
		&self.tile_matrix.id
	}

	pub fn resolution(&self) -> f64 {
		self.tile_matrix.resolution
	}

	fn prefix(&self) -> String {
		if self.root.is_empty() {
			String::new()
		} else {
			format!("{}/", self.root.trim_end_matches('/'))
		}
	}

	/// Storage object name of tile (col, row) in one-object-per-tile layout.
	pub fn object_name(&self, col: u32, row: u32) -> String {
		let prefix = self.prefix();
		match self.scheme {
			PathScheme::Flat => format!("{prefix}{}/{col}_{row}.{}", self.tile_matrix.id, self.extension),
			PathScheme::Nested => format!("{prefix}{}/{col}/{row}.{}", self.tile_matrix.id, self.extension),
		}
	}

	/// Storage object name of the slab holding tile (col, row), plus the
	/// tile's entry index within the slab's header table.
	pub fn slab_address(&self, col: u32, row: u32) -> (String, u32) {
		let n = self.slab_tiles.expect("slab_address is only called for slab levels");
		let prefix = self.prefix();
		let (slab_col, slab_row) = (col / n, row / n);
		let name = match self.scheme {
			PathScheme::Flat => format!("{prefix}{}/{slab_col}_{slab_row}.slab", self.tile_matrix.id),
			PathScheme::Nested => format!("{prefix}{}/{slab_col}/{slab_row}.slab", self.tile_matrix.id),
		};
		let entry = (row % n) * n + (col % n);
		(name, entry)
	}

	/// Descriptor of tile (col, row) in this level's grid and format.
	pub fn tile_descriptor(&self, col: u32, row: u32) -> RasterDescriptor {
		let bbox = self.tile_matrix.tile_bbox(col, row, &self.crs);
		RasterDescriptor::new(
			self.tile_matrix.tile_width as usize,
			self.tile_matrix.tile_height as usize,
			self.layout,
			bbox,
			self.nodata.clone(),
		)
		.expect("tile matrices have positive dimensions")
	}

	/// World bbox of the tiles that exist.
	pub fn window_bbox(&self) -> BBox {
		let top_left = self.tile_matrix.tile_bbox(self.window.col_min, self.window.row_min, &self.crs);
		let bottom_right = self.tile_matrix.tile_bbox(self.window.col_max, self.window.row_max, &self.crs);
		BBox {
			xmin: top_left.xmin,
			ymin: bottom_right.ymin,
			xmax: bottom_right.xmax,
			ymax: top_left.ymax,
			crs: self.crs.clone(),
		}
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use assert_fs::TempDir;
	use std::sync::Arc;
	use terratiles_core::io::FileContext;

	pub fn test_matrix(id: &str, resolution: f64) -> TileMatrix {
		TileMatrix {
			id: id.to_string(),
			resolution,
			x0: 0.0,
			y0: 1024.0 * resolution,
			tile_width: 256,
			tile_height: 256,
			matrix_width: 4,
			matrix_height: 4,
		}
	}

	pub fn test_level(dir: &TempDir, id: &str, resolution: f64) -> Level {
		Level {
			tile_matrix: Arc::new(test_matrix(id, resolution)),
			context: Arc::new(FileContext::new(dir.path())),
			root: String::new(),
			scheme: PathScheme::Flat,
			codec: TileCodec::Png,
			extension: "png".to_string(),
			window: TileRange {
				col_min: 0,
				col_max: 3,
				row_min: 0,
				row_max: 3,
			},
			mode: RenderMode::Stored,
			slab_tiles: None,
			layout: PixelLayout::gray_u8(),
			nodata: vec![255.0],
			crs: "EPSG:3857".to_string(),
		}
	}

	#[test]
	fn object_names() {
		let dir = TempDir::new().unwrap();
		let mut level = test_level(&dir, "12", 1.0);
		assert_eq!(level.object_name(34, 21), "12/34_21.png");

		level.scheme = PathScheme::Nested;
		level.root = "dem/".to_string();
		assert_eq!(level.object_name(34, 21), "dem/12/34/21.png");
	}

	#[test]
	fn slab_addressing() {
		let dir = TempDir::new().unwrap();
		let mut level = test_level(&dir, "12", 1.0);
		level.slab_tiles = Some(2);

		// Tile (3,2) lives in slab (1,1), local position (1,0) -> entry 1.
		assert_eq!(level.slab_address(3, 2), ("12/1_1.slab".to_string(), 1));
		assert_eq!(level.slab_address(0, 0), ("12/0_0.slab".to_string(), 0));
		assert_eq!(level.slab_address(1, 1), ("12/0_0.slab".to_string(), 3));
	}

	#[test]
	fn tile_descriptor_geometry() {
		let dir = TempDir::new().unwrap();
		let level = test_level(&dir, "12", 1.0);
		let descriptor = level.tile_descriptor(0, 3);
		assert_eq!(descriptor.width, 256);
		assert_eq!(descriptor.bbox.ymin, 0.0);
		assert_eq!(descriptor.bbox.ymax, 256.0);
		assert_eq!(descriptor.resolution_x(), 1.0);
	}

	#[test]
	fn window_bbox_covers_window() {
		let dir = TempDir::new().unwrap();
		let mut level = test_level(&dir, "12", 1.0);
		level.window = TileRange {
			col_min: 1,
			col_max: 2,
			row_min: 1,
			row_max: 2,
		};
		let bbox = level.window_bbox();
		assert_eq!((bbox.xmin, bbox.xmax), (256.0, 768.0));
		assert_eq!((bbox.ymin, bbox.ymax), (256.0, 768.0));
	}
}
