//! Wire formats a response can be encoded into.

use anyhow::{Result, bail};
use std::fmt;

/// Output format of an encoded response, keyed by MIME type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TileFormat {
	Png,
	Jpeg,
	Gif,
	Tiff,
	/// TIFF with embedded georeferencing tags.
	GeoTiff,
	/// Band-interleaved-by-line, 32-bit float samples.
	Bil32,
	/// Arc/Info ASCII grid.
	AsciiGrid,
}

impl TileFormat {
	pub fn from_mime(mime: &str) -> Result<TileFormat> {
		Ok(match mime.trim().to_lowercase().replace(' ', "").as_str() {
			"image/png" => TileFormat::Png,
			"image/jpeg" | "image/jpg" => TileFormat::Jpeg,
			"image/gif" => TileFormat::Gif,
			"image/tiff" => TileFormat::Tiff,
			"image/geotiff" => TileFormat::GeoTiff,
			"image/x-bil;bits=32" => TileFormat::Bil32,
			"text/asc" | "text/plain" => TileFormat::AsciiGrid,
			_ => bail!("unsupported format '{mime}'"),
		})
	}

	pub fn mime(&self) -> &'static str {
		match self {
			TileFormat::Png => "image/png",
			TileFormat::Jpeg => "image/jpeg",
			TileFormat::Gif => "image/gif",
			TileFormat::Tiff => "image/tiff",
			TileFormat::GeoTiff => "image/geotiff",
			TileFormat::Bil32 => "image/x-bil;bits=32",
			TileFormat::AsciiGrid => "text/asc",
		}
	}

	/// File extension used by TMS tile paths.
	pub fn extension(&self) -> &'static str {
		match self {
			TileFormat::Png => "png",
			TileFormat::Jpeg => "jpg",
			TileFormat::Gif => "gif",
			TileFormat::Tiff | TileFormat::GeoTiff => "tif",
			TileFormat::Bil32 => "bil",
			TileFormat::AsciiGrid => "asc",
		}
	}

	pub fn from_extension(ext: &str) -> Result<TileFormat> {
		Ok(match ext.to_lowercase().as_str() {
			"png" => TileFormat::Png,
			"jpg" | "jpeg" => TileFormat::Jpeg,
			"gif" => TileFormat::Gif,
			"tif" | "tiff" => TileFormat::Tiff,
			"bil" => TileFormat::Bil32,
			"asc" => TileFormat::AsciiGrid,
			_ => bail!("unsupported tile extension '{ext}'"),
		})
	}
}

impl fmt::Display for TileFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.mime())
	}
}
