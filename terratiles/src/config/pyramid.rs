//! Pyramid descriptors: format, storage binding and levels.

use serde::Deserialize;
use std::path::Path;
use terratiles_pyramid::{PathScheme, RenderMode};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
	File,
	Http,
	S3,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
	#[serde(rename = "type")]
	pub kind: StorageKind,
	/// Directory, URL prefix or bucket name, depending on `kind`.
	pub root: String,
	/// Custom S3 endpoint (MinIO, RGW); ignored by other kinds.
	#[serde(default)]
	pub endpoint: Option<String>,
}

impl StorageConfig {
	/// Makes a relative file root absolute against `base`.
	pub fn resolve_root(&mut self, base: &Path) {
		if self.kind == StorageKind::File {
			let root = Path::new(&self.root);
			if root.is_relative() {
				self.root = base.join(root).to_string_lossy().into_owned();
			}
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
	/// Matrix identifier within the pyramid's TMS.
	pub id: String,
	/// Stored-object extension; defaults from the pyramid codec.
	#[serde(default)]
	pub extension: Option<String>,
	#[serde(default)]
	pub path_scheme: PathScheme,
	#[serde(default)]
	pub mode: RenderMode,
	/// Object-name prefix inside the container.
	#[serde(default)]
	pub prefix: String,
	/// Pack tiles into slab objects of this many tiles per side instead of
	/// one object per tile.
	#[serde(default)]
	pub slab_tiles: Option<u32>,
	pub min_col: u32,
	pub max_col: u32,
	pub min_row: u32,
	pub max_row: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PyramidConfig {
	pub id: String,
	pub tile_matrix_set: String,
	pub channels: u8,
	pub sample_format: terratiles_core::SampleFormat,
	pub photometric: terratiles_core::Photometric,
	/// One value per channel.
	pub nodata: Vec<f64>,
	/// Stored tile compression.
	pub codec: String,
	pub storage: StorageConfig,
	pub levels: Vec<LevelConfig>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn level_defaults() {
		let level: LevelConfig =
			serde_yaml_ng::from_str("{ id: '12', min_col: 0, max_col: 3, min_row: 1, max_row: 2 }").unwrap();
		assert_eq!(level.mode, RenderMode::Stored);
		assert_eq!(level.path_scheme, PathScheme::Flat);
		assert!(level.extension.is_none());
		assert_eq!(level.prefix, "");
	}

	#[test]
	fn s3_storage() {
		let storage: StorageConfig =
			serde_yaml_ng::from_str("{ type: s3, root: tiles-prod, endpoint: 'http://minio:9000' }").unwrap();
		assert_eq!(storage.kind, StorageKind::S3);
		assert_eq!(storage.endpoint.as_deref(), Some("http://minio:9000"));
	}

	#[test]
	fn http_roots_are_not_resolved() {
		let mut storage: StorageConfig =
			serde_yaml_ng::from_str("{ type: http, root: 'https://tiles.example.org/dem' }").unwrap();
		storage.resolve_root(Path::new("/etc"));
		assert_eq!(storage.root, "https://tiles.example.org/dem");
	}
}
