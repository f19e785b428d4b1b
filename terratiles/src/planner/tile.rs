//! The shared tile pipeline behind WMTS GetTile and TMS tile requests.

use crate::catalog::{Catalog, Layer};
use crate::planner::PlanOutput;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use terratiles_core::{
	Blob, Crs, RasterBuf, RasterReader, RasterSource, SampleFormat, ServiceError, TileCodec, TileFormat,
};
use terratiles_image::{EncodeOptions, GeoTags};
use terratiles_pyramid::{Level, RenderMode, fetch_tile, read_region};
use terratiles_raster::{ResampledImage, Style, StyleTransform};

/// Deferred persistence of a tile synthesised by an on-the-fly level.
pub struct WriteBackJob {
	pub pyramid_id: String,
	pub level: Arc<Level>,
	pub col: u32,
	pub row: u32,
	pub blob: Blob,
}

/// One validated tile request.
pub struct TileJob {
	pub layer: Arc<Layer>,
	pub level: Arc<Level>,
	pub col: u32,
	pub row: u32,
	pub style: Arc<Style>,
	pub format: TileFormat,
}

impl TileJob {
	/// Renders the tile, short-circuiting to a storage copy when the whole
	/// pipeline would be an identity.
	pub async fn render(&self, catalog: &Catalog) -> Result<PlanOutput> {
		let level = &self.level;

		// Passthrough: stored tile, no transform, format equals the stored
		// codec. The response bytes are the stored bytes, untouched.
		if self.style.is_identity()
			&& level.mode == RenderMode::Stored
			&& level.codec.passthrough_mime() == Some(self.format.mime())
		{
			match fetch_tile(level, self.col, self.row, catalog.retry).await {
				Ok(Some(blob)) => {
					log::debug!("passthrough for tile ({},{}) of level '{}'", self.col, self.row, level.id());
					return Ok(PlanOutput::new(blob, self.format.mime()));
				}
				Ok(None) => {
					log::debug!(
						"tile ({},{}) of level '{}' absent, rendering nodata",
						self.col,
						self.row,
						level.id()
					);
				}
				Err(terratiles_core::io::StorageError::Transport { message }) => {
					return Err(anyhow!(ServiceError::Transport { message }));
				}
				Err(err) => {
					return Err(anyhow!(err).context(format!("reading tile ({},{})", self.col, self.row)));
				}
			}
		}

		let mut source = self.tile_source(catalog).await?;
		let crs = catalog.crs.require(&level.crs)?;

		if level.mode == RenderMode::OnTheFly {
			// Materialise the synthesised pixels once: the response encode
			// and the persisted copy both read from the same buffer.
			let pixels = RasterBuf::from_source(source.as_mut())?;
			let blob = style_encode(Box::new(pixels.clone()), &self.style, self.format, &crs)?;
			let mut output = PlanOutput::new(blob, self.format.mime());
			output.write_back = self.stored_copy(&crs, pixels);
			return Ok(output);
		}

		let blob = style_encode(source, &self.style, self.format, &crs)?;
		Ok(PlanOutput::new(blob, self.format.mime()))
	}

	/// The tile's pixels on the level's native grid. Stored levels read
	/// their own tiles; on-demand and on-the-fly levels synthesise from the
	/// best other level of the pyramid.
	async fn tile_source(&self, catalog: &Catalog) -> Result<RasterReader> {
		let level = &self.level;
		let tile_bbox = level.tile_matrix.tile_bbox(self.col, self.row, &level.crs);

		if level.mode == RenderMode::Stored {
			return read_region(level, &tile_bbox, catalog.retry).await;
		}

		// An on-the-fly level is itself producing a stored tile, so on-demand
		// levels are eligible synthesis sources; an on-demand level must not
		// chain through another one.
		let source_level = self
			.layer
			.pyramid
			.best_level(level.resolution(), level.mode == RenderMode::OnTheFly)
			.ok_or_else(|| anyhow!("pyramid '{}' has no level to synthesise from", self.layer.pyramid.id))?;

		let kernel = self.style.preferred_kernel().unwrap_or(self.layer.kernel);
		// When this level is coarser than its source the kernel stretches by
		// that ratio, so the margin follows the coarser of the two grids.
		let margin = (kernel.support().ceil() + 1.0) * source_level.resolution().max(level.resolution());
		let fetch_bbox = terratiles_core::BBox {
			xmin: tile_bbox.xmin - margin,
			ymin: tile_bbox.ymin - margin,
			xmax: tile_bbox.xmax + margin,
			ymax: tile_bbox.ymax + margin,
			crs: tile_bbox.crs.clone(),
		};
		let region = read_region(&source_level, &fetch_bbox, catalog.retry).await?;
		let resampled = ResampledImage::new(
			region,
			tile_bbox,
			level.tile_matrix.tile_width as usize,
			level.tile_matrix.tile_height as usize,
			kernel,
		)?;
		Ok(Box::new(resampled))
	}

	/// Encodes the already-synthesised pixels in the pyramid's stored codec
	/// for persistence. Byte-stream codecs and slab-packed levels are not
	/// written back.
	fn stored_copy(&self, crs: &Crs, pixels: RasterBuf) -> Option<WriteBackJob> {
		if self.level.slab_tiles.is_some() {
			log::debug!(
				"level '{}' packs tiles into slabs, skipping on-the-fly persistence",
				self.level.id()
			);
			return None;
		}
		let stored_format = match self.level.codec {
			TileCodec::Png => TileFormat::Png,
			TileCodec::Jpeg => TileFormat::Jpeg,
			_ => {
				log::debug!(
					"level '{}' stores {} tiles, skipping on-the-fly persistence",
					self.level.id(),
					self.level.codec
				);
				return None;
			}
		};

		let identity = Style::identity("normal");
		let blob = style_encode(Box::new(pixels), &identity, stored_format, crs).ok()?;
		Some(WriteBackJob {
			pyramid_id: self.layer.pyramid.id.clone(),
			level: self.level.clone(),
			col: self.col,
			row: self.row,
			blob,
		})
	}
}

/// Applies `style` and encodes as `format`.
///
/// A single-palette style on an 8-bit single-channel raster and PNG output
/// takes the indexed path: raw values stay as palette indices and the
/// palette itself lands in the PLTE/tRNS chunks.
pub fn style_encode(
	source: RasterReader,
	style: &Style,
	format: TileFormat,
	crs: &Crs,
) -> Result<Blob> {
	let layout = source.descriptor().layout;

	let indexed_png = format == TileFormat::Png
		&& layout.channels == 1
		&& layout.sample == SampleFormat::U8
		&& style.transforms.len() == 1
		&& matches!(style.transforms[0], StyleTransform::Palette(_));

	let options_geo = GeoTags {
		epsg: crs.code.strip_prefix("EPSG:").and_then(|c| c.parse().ok()),
		geographic: crs.geographic,
	};

	if indexed_png {
		let table = style.palette().expect("checked above").table256();
		let mut plain = source;
		return terratiles_image::encode(plain.as_mut(), format, &EncodeOptions {
			palette: Some(&table),
			geo: Some(options_geo),
		});
	}

	let mut styled = style.apply(source)?;
	terratiles_image::encode(styled.as_mut(), format, &EncodeOptions {
		palette: None,
		geo: Some(options_geo),
	})
}
