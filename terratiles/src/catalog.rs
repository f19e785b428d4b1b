//! Catalogue construction and hot reload.
//!
//! At startup (and on each reload) the descriptor is turned into one
//! immutable [`Catalog`]: CRS registry, tile matrix sets, styles, pyramids
//! and layers, fully cross-checked. Workers read the current catalogue
//! through an [`arc_swap::ArcSwap`] snapshot; a reload builds the next
//! catalogue off to the side and swaps the pointer, so no reader ever
//! observes a half-populated state.

use crate::config::{Config, LayerConfig, PyramidConfig, ServicesConfig, StorageKind};
use anyhow::{Context, Result, anyhow, bail};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use terratiles_core::io::{ContextPool, FileContext, HttpContext, RetryPolicy, S3Context, SharedContext};
use terratiles_core::{BBox, CrsRegistry, PixelLayout, TileCodec, TileFormat, TileMatrixSet, TileRange};
use terratiles_pyramid::{Level, Pyramid, RenderMode};
use terratiles_raster::{Kernel, Style, reproject_bbox};

/// A published layer, fully resolved.
#[derive(Clone, Debug)]
pub struct Layer {
	pub id: String,
	pub title: String,
	pub abstract_text: String,
	pub keywords: Vec<String>,
	pub pyramid: Arc<Pyramid>,
	/// Allowed styles, first is the default.
	pub styles: Vec<Arc<Style>>,
	/// Per-layer WMS CRS restriction (uppercased); empty defers to the
	/// global list.
	pub wms_crs: Vec<String>,
	/// Extent of the data in the pyramid's CRS.
	pub native_bbox: BBox,
	/// Extent of the data in lon/lat.
	pub geo_bbox: BBox,
	pub wms: bool,
	pub wmts: bool,
	pub tms: bool,
	/// Kernel used when WMS resamples or reprojects this layer.
	pub kernel: Kernel,
	pub feature_info_url: Option<String>,
}

impl Layer {
	pub fn default_style(&self) -> &Arc<Style> {
		&self.styles[0]
	}

	pub fn find_style(&self, id: &str) -> Option<&Arc<Style>> {
		self.styles.iter().find(|s| s.id == id)
	}
}

/// Everything a request needs, immutable once built.
pub struct Catalog {
	pub crs: CrsRegistry,
	pub tms: HashMap<String, Arc<TileMatrixSet>>,
	pub styles: HashMap<String, Arc<Style>>,
	pub pyramids: HashMap<String, Arc<Pyramid>>,
	pub layers: HashMap<String, Arc<Layer>>,
	pub services: ServicesConfig,
	pub pool: Arc<ContextPool>,
	pub retry: RetryPolicy,
}

impl Catalog {
	/// Builds a catalogue from a parsed descriptor. Storage contexts are
	/// created (S3 sessions included) but not yet opened; call
	/// [`ContextPool::connect_all`] before serving.
	pub async fn build(config: &Config) -> Result<Catalog> {
		let mut crs = CrsRegistry::with_defaults();
		for row in &config.services.crs_equivalences {
			let codes: Vec<&str> = row.iter().map(String::as_str).collect();
			crs.add_equivalence(&codes);
		}

		let mut tms = HashMap::new();
		for tms_config in &config.tile_matrix_sets {
			if !crs.contains(&tms_config.crs) {
				bail!("TMS '{}' uses unregistered CRS '{}'", tms_config.id, tms_config.crs);
			}
			let built = tms_config.build()?;
			tms.insert(tms_config.id.clone(), Arc::new(built));
		}

		let mut styles: HashMap<String, Arc<Style>> = HashMap::new();
		styles.insert("normal".to_string(), Arc::new(Style::identity("normal")));
		for style_config in &config.styles {
			styles.insert(style_config.id.clone(), Arc::new(style_config.build()?));
		}

		let pool = Arc::new(ContextPool::new());
		let mut pyramids = HashMap::new();
		for pyramid_config in &config.pyramids {
			let pyramid = build_pyramid(pyramid_config, &tms, &pool)
				.await
				.with_context(|| format!("pyramid '{}'", pyramid_config.id))?;
			pyramids.insert(pyramid_config.id.clone(), Arc::new(pyramid));
		}

		let mut layers = HashMap::new();
		for layer_config in &config.layers {
			let layer = build_layer(layer_config, &pyramids, &styles, &crs)
				.with_context(|| format!("layer '{}'", layer_config.id))?;
			layers.insert(layer_config.id.clone(), Arc::new(layer));
		}

		let retry = RetryPolicy {
			attempts: config.services.storage_retry.attempts,
			backoff: std::time::Duration::from_millis(config.services.storage_retry.backoff_ms),
		};

		Ok(Catalog {
			crs,
			tms,
			styles,
			pyramids,
			layers,
			services: config.services.clone(),
			pool,
			retry,
		})
	}

	pub fn layer(&self, id: &str) -> Option<Arc<Layer>> {
		self.layers.get(id).cloned()
	}

	/// Whether `format` is on the global format list (an empty list serves
	/// everything).
	pub fn format_allowed(&self, format: TileFormat) -> bool {
		if self.services.formats.is_empty() {
			return true;
		}
		self
			.services
			.formats
			.iter()
			.any(|f| TileFormat::from_mime(f).map(|parsed| parsed == format).unwrap_or(false))
	}

	/// Whether `code` passes the global CRS allow list.
	pub fn crs_allowed_globally(&self, code: &str) -> bool {
		if self.services.crs.is_empty() {
			return self.crs.contains(code);
		}
		self.services.crs.iter().any(|c| c.eq_ignore_ascii_case(code))
	}

	/// Whether `code` is allowed for `layer` under the restriction-list
	/// rules: the layer list is canonical; equivalence expansion only admits
	/// equivalents of listed entries, and never anything the global list
	/// excludes.
	pub fn crs_allowed_for_layer(&self, layer: &Layer, code: &str) -> bool {
		if !self.crs_allowed_globally(code) {
			return false;
		}
		if layer.wms_crs.is_empty() {
			return true;
		}
		if layer.wms_crs.iter().any(|c| c.eq_ignore_ascii_case(code)) {
			return true;
		}
		self.services.expand_crs_equivalences && layer.wms_crs.iter().any(|c| self.crs.are_equivalent(c, code))
	}
}

async fn build_context(config: &crate::config::StorageConfig) -> SharedContext {
	match config.kind {
		StorageKind::File => Arc::new(FileContext::new(Path::new(&config.root))),
		StorageKind::Http => Arc::new(HttpContext::new(&config.root)),
		StorageKind::S3 => Arc::new(S3Context::from_env(&config.root, config.endpoint.as_deref()).await),
	}
}

fn default_extension(codec: TileCodec) -> &'static str {
	match codec {
		TileCodec::Png => "png",
		TileCodec::Jpeg => "jpg",
		TileCodec::Webp => "webp",
		TileCodec::Jpeg2000 => "jp2",
		TileCodec::Raw | TileCodec::PackBits | TileCodec::Lzw | TileCodec::Deflate => "bin",
	}
}

async fn build_pyramid(
	config: &PyramidConfig,
	tms: &HashMap<String, Arc<TileMatrixSet>>,
	pool: &ContextPool,
) -> Result<Pyramid> {
	let tms = tms
		.get(&config.tile_matrix_set)
		.ok_or_else(|| anyhow!("unknown tile matrix set '{}'", config.tile_matrix_set))?
		.clone();
	let layout = PixelLayout::new(config.channels, config.sample_format, config.photometric)?;
	let codec = TileCodec::parse(&config.codec)?;
	let context = pool.register(build_context(&config.storage).await);

	let mut levels = Vec::with_capacity(config.levels.len());
	for level_config in &config.levels {
		let matrix = tms
			.get(&level_config.id)
			.ok_or_else(|| anyhow!("level '{}' is not a matrix of TMS '{}'", level_config.id, tms.id))?;
		if level_config.max_col >= matrix.matrix_width || level_config.max_row >= matrix.matrix_height {
			bail!(
				"level '{}' window exceeds the {}x{} matrix extent",
				level_config.id,
				matrix.matrix_width,
				matrix.matrix_height
			);
		}
		if level_config.min_col > level_config.max_col || level_config.min_row > level_config.max_row {
			bail!("level '{}' window is empty", level_config.id);
		}
		if level_config.slab_tiles == Some(0) {
			bail!("level '{}' declares zero tiles per slab", level_config.id);
		}

		levels.push(Level {
			tile_matrix: matrix,
			context: context.clone(),
			root: level_config.prefix.clone(),
			scheme: level_config.path_scheme,
			codec,
			extension: level_config
				.extension
				.clone()
				.unwrap_or_else(|| default_extension(codec).to_string()),
			window: TileRange {
				col_min: level_config.min_col,
				col_max: level_config.max_col,
				row_min: level_config.min_row,
				row_max: level_config.max_row,
			},
			mode: level_config.mode,
			slab_tiles: level_config.slab_tiles,
			layout,
			nodata: config.nodata.clone(),
			crs: tms.crs.clone(),
		});
	}

	Pyramid::new(&config.id, tms, layout, config.nodata.clone(), codec, levels)
}

fn build_layer(
	config: &LayerConfig,
	pyramids: &HashMap<String, Arc<Pyramid>>,
	styles: &HashMap<String, Arc<Style>>,
	crs: &CrsRegistry,
) -> Result<Layer> {
	let pyramid = pyramids
		.get(&config.pyramid)
		.ok_or_else(|| anyhow!("unknown pyramid '{}'", config.pyramid))?
		.clone();

	let mut layer_styles = Vec::new();
	for style_id in &config.styles {
		let style = styles
			.get(style_id)
			.ok_or_else(|| anyhow!("unknown style '{style_id}'"))?;
		layer_styles.push(style.clone());
	}
	if layer_styles.is_empty() {
		layer_styles.push(styles.get("normal").expect("identity style is always present").clone());
	}

	// The data extent is the finest level's window.
	let native_bbox = pyramid.finest().window_bbox();
	let native_crs = crs.require(&pyramid.tms.crs)?;
	let lonlat = crs.require("CRS:84")?;
	let geo_bbox = if crs.are_equivalent(&native_crs.code, "CRS:84") {
		native_bbox.with_crs("CRS:84")
	} else {
		reproject_bbox(&native_bbox, &native_crs, &lonlat)
			.with_context(|| format!("computing the geographic extent of '{}'", config.id))?
	};

	// Partial-failure semantics differ for on-demand levels, so WMS is off
	// for any layer that has one.
	let mut wms = config.services.wms;
	if wms && pyramid.has_on_demand_levels() {
		log::warn!(
			"layer '{}' has on-demand levels, disabling WMS for this layer",
			config.id
		);
		wms = false;
	}

	Ok(Layer {
		id: config.id.clone(),
		title: if config.title.is_empty() { config.id.clone() } else { config.title.clone() },
		abstract_text: config.abstract_text.clone(),
		keywords: config.keywords.clone(),
		pyramid,
		styles: layer_styles,
		wms_crs: config.wms_crs.iter().map(|c| c.to_uppercase()).collect(),
		native_bbox,
		geo_bbox,
		wms,
		wmts: config.services.wmts,
		tms: config.services.tms,
		kernel: Kernel::parse(&config.resampling)?,
		feature_info_url: config.feature_info_url.clone(),
	})
}

/// The process-wide handle workers read the current catalogue through.
pub struct CatalogHolder {
	inner: ArcSwap<Catalog>,
}

impl CatalogHolder {
	pub fn new(catalog: Catalog) -> CatalogHolder {
		CatalogHolder {
			inner: ArcSwap::from_pointee(catalog),
		}
	}

	/// The current snapshot. Requests hold it for their whole lifetime, so a
	/// concurrent reload never pulls state out from under them.
	pub fn load(&self) -> Arc<Catalog> {
		self.inner.load_full()
	}

	/// Atomically installs a new catalogue. In-flight requests keep serving
	/// from the snapshot they loaded.
	pub fn swap(&self, next: Catalog) {
		self.inner.store(Arc::new(next));
		log::info!("catalogue swapped");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::Config;

	fn descriptor(dir: &str) -> String {
		format!(
			r"
tile_matrix_sets:
  - id: webmerc
    crs: EPSG:3857
    matrices:
      - {{ id: '12', resolution: 1.0, x0: 0.0, y0: 1024.0, tile_width: 256, tile_height: 256, matrix_width: 4, matrix_height: 4 }}
      - {{ id: '13', resolution: 0.5, x0: 0.0, y0: 1024.0, tile_width: 256, tile_height: 256, matrix_width: 8, matrix_height: 8 }}
styles:
  - id: heat
    transforms:
      - type: palette
        stops:
          - {{ value: 0, color: [0, 0, 0, 64] }}
          - {{ value: 255, color: [255, 255, 255, 64] }}
pyramids:
  - id: dem
    tile_matrix_set: webmerc
    channels: 1
    sample_format: u8
    photometric: gray
    nodata: [255]
    codec: png
    storage: {{ type: file, root: {dir} }}
    levels:
      - {{ id: '12', min_col: 0, max_col: 3, min_row: 0, max_row: 3 }}
      - {{ id: '13', min_col: 0, max_col: 7, min_row: 0, max_row: 7 }}
layers:
  - id: dem
    title: Elevation
    pyramid: dem
    styles: [normal, heat]
    wms_crs: [EPSG:3857, CRS:84]
"
		)
	}

	#[tokio::test]
	async fn builds_a_complete_catalog() {
		let dir = assert_fs::TempDir::new().unwrap();
		let config = Config::from_string(&descriptor(&dir.path().display().to_string())).unwrap();
		let catalog = Catalog::build(&config).await.unwrap();

		assert!(catalog.tms.contains_key("webmerc"));
		assert!(catalog.styles.contains_key("normal"));
		assert!(catalog.styles.contains_key("heat"));
		let layer = catalog.layer("dem").unwrap();
		assert_eq!(layer.default_style().id, "normal");
		assert!(layer.find_style("heat").is_some());
		assert!(layer.find_style("missing").is_none());
		assert_eq!(layer.pyramid.levels().count(), 2);
		assert_eq!(catalog.pool.len(), 1);
	}

	#[tokio::test]
	async fn crs_rules() {
		let dir = assert_fs::TempDir::new().unwrap();
		let config = Config::from_string(&descriptor(&dir.path().display().to_string())).unwrap();
		let catalog = Catalog::build(&config).await.unwrap();
		let layer = catalog.layer("dem").unwrap();

		assert!(catalog.crs_allowed_for_layer(&layer, "EPSG:3857"));
		assert!(catalog.crs_allowed_for_layer(&layer, "crs:84"));
		// Equivalent of a listed CRS, admitted through expansion.
		assert!(catalog.crs_allowed_for_layer(&layer, "EPSG:900913"));
		// Registered but not listed for the layer.
		assert!(!catalog.crs_allowed_for_layer(&layer, "EPSG:2154"));
		// Unknown everywhere.
		assert!(!catalog.crs_allowed_for_layer(&layer, "EPSG:99999"));
	}

	#[tokio::test]
	async fn on_demand_levels_disable_wms() {
		let dir = assert_fs::TempDir::new().unwrap();
		let text = descriptor(&dir.path().display().to_string())
			.replace("min_col: 0, max_col: 7", "min_col: 0, max_col: 7, mode: on_demand");
		let config = Config::from_string(&text).unwrap();
		let catalog = Catalog::build(&config).await.unwrap();
		let layer = catalog.layer("dem").unwrap();
		assert!(!layer.wms, "WMS must be disabled for layers with on-demand levels");
		assert!(layer.wmts);
	}

	#[tokio::test]
	async fn bad_references_fail_the_build() {
		let dir = assert_fs::TempDir::new().unwrap();
		let text = descriptor(&dir.path().display().to_string()).replace("pyramid: dem", "pyramid: nope");
		let config = Config::from_string(&text).unwrap();
		assert!(Catalog::build(&config).await.is_err());
	}

	#[tokio::test]
	async fn holder_swaps_atomically() {
		let dir = assert_fs::TempDir::new().unwrap();
		let config = Config::from_string(&descriptor(&dir.path().display().to_string())).unwrap();
		let holder = CatalogHolder::new(Catalog::build(&config).await.unwrap());

		let before = holder.load();
		holder.swap(Catalog::build(&config).await.unwrap());
		let after = holder.load();
		assert!(!Arc::ptr_eq(&before, &after));
		// The old snapshot still answers.
		assert!(before.layer("dem").is_some());
	}
}
