//! JPEG 2000 tile decoding.
//!
//! The codestream is decoded through `jpeg2k` (OpenJPEG), which only offers
//! whole-image decoding, so the tile is fully materialised up front. Access
//! is still strip-oriented: the [`StripDecoder`] hands out lines strictly
//! forward, advancing an internal strip pointer when a requested line
//! crosses a strip boundary, and requesting a line lower than the last
//! returned one is an error, never a rewind. The strip machinery enforces
//! that ordering contract on callers; it does not bound memory.

use super::picture::interleave;
use anyhow::{Context, Result, bail, ensure};
use image::DynamicImage;
use terratiles_core::RasterDescriptor;

/// Lines per decoding strip.
pub const STRIP_LINES: usize = 64;

/// Forward-only line access over one decoded JPEG 2000 tile.
pub struct StripDecoder {
	data: Vec<u8>,
	line_bytes: usize,
	height: usize,
	strip: usize,
	last_row: Option<usize>,
}

impl StripDecoder {
	/// Opens and decodes the codestream, checking its geometry against
	/// `descriptor`.
	pub fn from_bytes(bytes: &[u8], descriptor: &RasterDescriptor) -> Result<StripDecoder> {
		let j2k = jpeg2k::Image::from_bytes(bytes).context("tile could not be decoded as JPEG 2000")?;

		ensure!(
			j2k.width() as usize == descriptor.width && j2k.height() as usize == descriptor.height,
			"JPEG 2000 tile is {}x{}, the matrix stores {}x{} tiles",
			j2k.width(),
			j2k.height(),
			descriptor.width,
			descriptor.height
		);

		let img: DynamicImage = (&j2k)
			.try_into()
			.context("JPEG 2000 components could not be assembled into an image")?;
		let data = interleave(img, &descriptor.layout)?;

		Ok(StripDecoder {
			data,
			line_bytes: descriptor.line_bytes(),
			height: descriptor.height,
			strip: 0,
			last_row: None,
		})
	}

	/// The strip currently decoded, for diagnostics.
	pub fn current_strip(&self) -> usize {
		self.strip
	}

	/// Copies line `row` into `out`. Rows must never decrease.
	pub fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		ensure!(row < self.height, "line {row} out of range, tile has {} lines", self.height);
		if let Some(last) = self.last_row {
			ensure!(
				row >= last,
				"JPEG 2000 access must be forward-only: line {row} requested after line {last}"
			);
		}

		let strip = row / STRIP_LINES;
		if strip != self.strip {
			// The strip pointer only ever advances; a retreat would mean the
			// monotonicity check above is broken.
			if strip < self.strip {
				bail!("strip pointer cannot move back from {} to {strip}", self.strip);
			}
			self.strip = strip;
		}

		self.last_row = Some(row);
		out.copy_from_slice(&self.data[row * self.line_bytes..(row + 1) * self.line_bytes]);
		Ok(())
	}
}

/// Decodes a whole JPEG 2000 tile by draining a [`StripDecoder`].
pub fn decode(bytes: &[u8], descriptor: &RasterDescriptor) -> Result<Vec<u8>> {
	let mut strips = StripDecoder::from_bytes(bytes, descriptor)?;
	let line_bytes = descriptor.line_bytes();
	let mut out = vec![0u8; line_bytes * descriptor.height];
	for row in 0..descriptor.height {
		strips.read_line(row, &mut out[row * line_bytes..(row + 1) * line_bytes])?;
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use terratiles_core::{BBox, PixelLayout};

	fn descriptor(size: usize) -> RasterDescriptor {
		RasterDescriptor::new(
			size,
			size,
			PixelLayout::gray_u8(),
			BBox::new(0.0, 0.0, size as f64, size as f64, "EPSG:3857").unwrap(),
			vec![0.0],
		)
		.unwrap()
	}

	fn strip_decoder_over(data: Vec<u8>, size: usize) -> StripDecoder {
		StripDecoder {
			line_bytes: size,
			height: size,
			data,
			strip: 0,
			last_row: None,
		}
	}

	#[test]
	fn forward_access_advances_strips() {
		let size = 3 * STRIP_LINES;
		let mut strips = strip_decoder_over(vec![0u8; size * size], size);
		let mut line = vec![0u8; size];

		strips.read_line(0, &mut line).unwrap();
		assert_eq!(strips.current_strip(), 0);
		strips.read_line(STRIP_LINES, &mut line).unwrap();
		assert_eq!(strips.current_strip(), 1);
		strips.read_line(3 * STRIP_LINES - 1, &mut line).unwrap();
		assert_eq!(strips.current_strip(), 2);
	}

	#[test]
	fn backward_access_is_refused() {
		let size = 2 * STRIP_LINES;
		let mut strips = strip_decoder_over(vec![0u8; size * size], size);
		let mut line = vec![0u8; size];

		strips.read_line(STRIP_LINES + 1, &mut line).unwrap();
		let err = strips.read_line(2, &mut line).unwrap_err();
		assert!(err.to_string().contains("forward-only"), "{err}");
	}

	#[test]
	fn out_of_range_line_is_refused() {
		let mut strips = strip_decoder_over(vec![0u8; 16], 4);
		let mut line = vec![0u8; 4];
		assert!(strips.read_line(4, &mut line).is_err());
	}

	#[test]
	fn garbage_codestream_is_malformed() {
		assert!(decode(&[0u8; 32], &descriptor(8)).is_err());
	}
}
