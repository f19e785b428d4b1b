//! Encoding finished rasters into wire formats.
//!
//! The encoder is the last pipeline stage: it drains a [`RasterSource`] in
//! ascending line order and produces the bytes of the negotiated MIME type.
//! The stored-tile passthrough path never reaches this module — the planner
//! copies storage bytes straight to the response when the whole pipeline is
//! provably an identity.

mod ascii_grid;
mod bil;
mod gif;
mod jpeg;
mod png;
mod tiff;

use anyhow::Result;
use terratiles_core::{Blob, RasterSource, TileFormat};

/// A resolved 256-entry RGBA lookup table, used to emit paletted PNG for
/// single-channel sources styled with a palette.
pub type PaletteTable = [[u8; 4]; 256];

/// Georeferencing written into GeoTIFF output.
#[derive(Clone, Debug)]
pub struct GeoTags {
	/// EPSG code of the raster's CRS, when it has one.
	pub epsg: Option<u32>,
	/// True for geographic (degree) CRSs.
	pub geographic: bool,
}

/// Per-request encoding options.
#[derive(Default)]
pub struct EncodeOptions<'a> {
	/// Palette of the style that produced the raster, when it has one.
	pub palette: Option<&'a PaletteTable>,
	/// GeoTIFF tags; ignored by every format except `image/geotiff`.
	pub geo: Option<GeoTags>,
}

/// Serialises `source` as `format`.
pub fn encode(source: &mut dyn RasterSource, format: TileFormat, options: &EncodeOptions) -> Result<Blob> {
	match format {
		TileFormat::Png => png::encode(source, options.palette),
		TileFormat::Jpeg => jpeg::encode(source),
		TileFormat::Gif => gif::encode(source),
		TileFormat::Tiff => tiff::encode(source, None),
		TileFormat::GeoTiff => tiff::encode(source, Some(options.geo.clone().unwrap_or(GeoTags {
			epsg: None,
			geographic: false,
		}))),
		TileFormat::Bil32 => bil::encode(source),
		TileFormat::AsciiGrid => ascii_grid::encode(source),
	}
}
