//! Top-level descriptor loader.
//!
//! ## YAML shape
//!
//! ```yaml
//! server:
//!   ip: 0.0.0.0
//!   port: 8080
//!
//! services:
//!   wms: { enabled: true, max_width: 4096, max_height: 4096 }
//!   wmts: { enabled: true }
//!   tms: { enabled: true }
//!
//! tile_matrix_sets:
//!   - id: webmerc
//!     crs: EPSG:3857
//!     matrices:
//!       - { id: "12", resolution: 1.0, x0: 0.0, y0: 1024.0,
//!           tile_width: 256, tile_height: 256, matrix_width: 4, matrix_height: 4 }
//!
//! styles:
//!   - id: normal
//!     title: Identity
//!
//! pyramids:
//!   - id: dem
//!     tile_matrix_set: webmerc
//!     channels: 1
//!     sample_format: u8
//!     photometric: gray
//!     nodata: [255]
//!     codec: png
//!     storage: { type: file, root: ./pyramids/dem }
//!     levels:
//!       - { id: "12", min_col: 0, max_col: 3, min_row: 0, max_row: 3 }
//!
//! layers:
//!   - id: dem
//!     title: Elevation
//!     pyramid: dem
//!     styles: [normal]
//! ```

use super::{LayerConfig, PyramidConfig, ServerConfig, ServicesConfig, StyleConfig, TileMatrixSetConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// The whole descriptor document. Every section except `layers` and
/// `pyramids` may be omitted.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(default)]
	pub server: ServerConfig,

	#[serde(default)]
	pub services: ServicesConfig,

	#[serde(default)]
	pub tile_matrix_sets: Vec<TileMatrixSetConfig>,

	#[serde(default)]
	pub styles: Vec<StyleConfig>,

	#[serde(default)]
	pub pyramids: Vec<PyramidConfig>,

	#[serde(default)]
	pub layers: Vec<LayerConfig>,
}

impl Config {
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		serde_yaml_ng::from_reader(reader).context("parsing descriptor (YAML)")
	}

	pub fn from_string(text: &str) -> Result<Self> {
		serde_yaml_ng::from_str(text).context("parsing descriptor (YAML)")
	}

	/// Loads a descriptor file and resolves relative storage roots against
	/// the file's directory.
	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("opening descriptor '{}'", path.display()))?;
		let mut config = Config::from_reader(BufReader::new(file))?;
		if let Some(base) = path.parent() {
			config.resolve_paths(base);
		}
		Ok(config)
	}

	/// Makes relative file-storage roots absolute against `base`.
	pub fn resolve_paths(&mut self, base: &Path) {
		for pyramid in &mut self.pyramids {
			pyramid.storage.resolve_root(base);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::StorageKind;
	use pretty_assertions::assert_eq;

	#[test]
	fn empty_document_is_a_valid_config() {
		assert_eq!(Config::from_string("").unwrap(), Config::default());
	}

	#[test]
	fn unknown_fields_are_rejected() {
		let err = Config::from_string("server:\n  pi: 3.14").unwrap_err();
		assert!(format!("{err:#}").contains("unknown field"), "{err:#}");
	}

	#[test]
	fn minimal_pyramid_parses() {
		let config = Config::from_string(
			r"
pyramids:
  - id: dem
    tile_matrix_set: webmerc
    channels: 1
    sample_format: f32
    photometric: gray
    nodata: [-99999]
    codec: deflate
    storage: { type: file, root: /data/dem }
    levels:
      - { id: '12', min_col: 0, max_col: 3, min_row: 0, max_row: 3 }
",
		)
		.unwrap();
		let pyramid = &config.pyramids[0];
		assert_eq!(pyramid.id, "dem");
		assert_eq!(pyramid.storage.kind, StorageKind::File);
		assert_eq!(pyramid.levels.len(), 1);
		assert_eq!(pyramid.nodata, vec![-99999.0]);
	}

	#[test]
	fn relative_file_roots_are_resolved() {
		let mut config = Config::from_string(
			r"
pyramids:
  - id: dem
    tile_matrix_set: webmerc
    channels: 1
    sample_format: u8
    photometric: gray
    nodata: [255]
    codec: png
    storage: { type: file, root: ./tiles }
    levels: []
",
		)
		.unwrap();
		config.resolve_paths(Path::new("/etc/terratiles"));
		assert_eq!(config.pyramids[0].storage.root, "/etc/terratiles/tiles");
	}
}
