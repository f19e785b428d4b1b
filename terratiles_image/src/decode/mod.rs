//! Decoding stored tiles into raw pixel rectangles.
//!
//! A stored tile arrives as a [`Blob`] in the codec its level declares; the
//! decoder produces top-down, channel-interleaved rows in the pyramid's
//! native sample format. Codecs that deliver anything else (planar, indexed,
//! bottom-up) are normalised here so that downstream code never sees codec
//! quirks.
//!
//! Failure vocabulary: a tile whose bytes cannot be decoded is
//! *malformed-tile* (the mosaic substitutes nodata); a tile that decodes to
//! the wrong geometry or sample layout is a *codec-mismatch* (fatal for the
//! request, the descriptor lied).

mod deflate;
mod jpeg2000;
mod lzw;
mod packbits;
mod picture;

pub use jpeg2000::StripDecoder;

use anyhow::{Result, bail};
use std::fmt;
use terratiles_core::{Blob, RasterBuf, RasterDescriptor, TileCodec};

/// The tile decoded cleanly but does not match the pyramid's declared
/// geometry or layout — a descriptor problem, fatal for the whole request.
/// Plain decode failures (corrupt bytes) stay untyped and the level reader
/// recovers them as nodata.
#[derive(Debug)]
pub struct CodecMismatch(pub String);

impl fmt::Display for CodecMismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "codec mismatch: {}", self.0)
	}
}

impl std::error::Error for CodecMismatch {}

/// Decodes one stored tile into a pixel buffer matching `descriptor`.
///
/// `descriptor` carries the expected geometry (the owning matrix's tile
/// size), pixel layout, georeferencing and nodata of the tile.
pub fn decode_tile(blob: &Blob, codec: TileCodec, descriptor: RasterDescriptor) -> Result<RasterBuf> {
	let expected_bytes = descriptor.line_bytes() * descriptor.height;

	let data = match codec {
		TileCodec::Raw => {
			if blob.len() as usize != expected_bytes {
				bail!(
					"raw tile holds {} bytes, geometry needs {expected_bytes}",
					blob.len()
				);
			}
			blob.as_slice().to_vec()
		}
		TileCodec::PackBits => packbits::decode(blob.as_slice(), expected_bytes)?,
		TileCodec::Lzw => lzw::decode(blob.as_slice(), expected_bytes)?,
		TileCodec::Deflate => deflate::decode(blob.as_slice(), expected_bytes)?,
		TileCodec::Jpeg | TileCodec::Png | TileCodec::Webp => picture::decode(blob.as_slice(), codec, &descriptor)?,
		TileCodec::Jpeg2000 => jpeg2000::decode(blob.as_slice(), &descriptor)?,
	};

	if data.len() != expected_bytes {
		return Err(anyhow::Error::new(CodecMismatch(format!(
			"{codec} tile decoded to {} bytes, geometry needs {expected_bytes}",
			data.len()
		))));
	}
	RasterBuf::from_vec(descriptor, data)
}
