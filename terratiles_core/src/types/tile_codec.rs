//! Compression codecs a level may store its tiles in.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::fmt;

/// The compression of one stored tile, declared per level.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TileCodec {
	/// Interleaved samples with no compression.
	Raw,
	/// TIFF-style PackBits run-length encoding.
	PackBits,
	/// TIFF-style LZW with horizontal differencing disabled.
	Lzw,
	/// zlib deflate stream.
	Deflate,
	Jpeg,
	Png,
	Webp,
	Jpeg2000,
}

impl TileCodec {
	pub fn parse(value: &str) -> Result<TileCodec> {
		Ok(match value.to_lowercase().as_str() {
			"raw" | "none" => TileCodec::Raw,
			"packbits" => TileCodec::PackBits,
			"lzw" => TileCodec::Lzw,
			"deflate" | "zip" => TileCodec::Deflate,
			"jpeg" | "jpg" => TileCodec::Jpeg,
			"png" => TileCodec::Png,
			"webp" => TileCodec::Webp,
			"jpeg2000" | "jp2" => TileCodec::Jpeg2000,
			_ => bail!("unknown tile codec '{value}'"),
		})
	}

	/// The wire format of tiles stored in this codec, when clients may fetch
	/// them verbatim (the passthrough path). Byte-stream codecs have no
	/// client-facing format.
	pub fn passthrough_mime(&self) -> Option<&'static str> {
		match self {
			TileCodec::Jpeg => Some("image/jpeg"),
			TileCodec::Png => Some("image/png"),
			TileCodec::Webp => Some("image/webp"),
			_ => None,
		}
	}
}

impl fmt::Display for TileCodec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TileCodec::Raw => "raw",
			TileCodec::PackBits => "packbits",
			TileCodec::Lzw => "lzw",
			TileCodec::Deflate => "deflate",
			TileCodec::Jpeg => "jpeg",
			TileCodec::Png => "png",
			TileCodec::Webp => "webp",
			TileCodec::Jpeg2000 => "jpeg2000",
		};
		write!(f, "{name}")
	}
}
