//! Arc/Info ASCII grid output for single-channel rasters.

use anyhow::{Result, bail};
use std::fmt::Write;
use terratiles_core::{Blob, RasterSource};

pub fn encode(source: &mut dyn RasterSource) -> Result<Blob> {
	let descriptor = source.descriptor().clone();
	if descriptor.layout.channels != 1 {
		bail!(
			"ASCII grid needs a single-channel raster, got {} channels",
			descriptor.layout.channels
		);
	}

	let channels = 1;
	let sample = descriptor.layout.sample;

	let mut text = String::new();
	writeln!(text, "NCOLS {}", descriptor.width)?;
	writeln!(text, "NROWS {}", descriptor.height)?;
	writeln!(text, "XLLCORNER {}", descriptor.bbox.xmin)?;
	writeln!(text, "YLLCORNER {}", descriptor.bbox.ymin)?;
	writeln!(text, "CELLSIZE {}", descriptor.resolution_x())?;
	writeln!(text, "NODATA_VALUE {}", descriptor.nodata[0])?;

	let mut line = vec![0u8; descriptor.line_bytes()];
	for row in 0..descriptor.height {
		source.read_line(row, &mut line)?;
		for x in 0..descriptor.width {
			if x > 0 {
				text.push(' ');
			}
			let value = sample.get(&line, x * channels);
			// Integers print without a trailing ".0" so 8-bit grids stay compact.
			if value.fract() == 0.0 {
				write!(text, "{}", value as i64)?;
			} else {
				write!(text, "{value}")?;
			}
		}
		text.push('\n');
	}
	Ok(Blob::from(text))
}

#[cfg(test)]
mod tests {
	use super::super::test_support::{gray_ramp, rgb_block};
	use super::*;

	#[test]
	fn header_and_rows() {
		let mut source = gray_ramp(4);
		let blob = encode(&mut source).unwrap();
		let text = blob.as_str().to_string();
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines[0], "NCOLS 4");
		assert_eq!(lines[1], "NROWS 4");
		assert_eq!(lines[4], "CELLSIZE 1");
		assert_eq!(lines[5], "NODATA_VALUE 255");
		assert_eq!(lines[6], "0 1 2 3");
		assert_eq!(lines.len(), 6 + 4);
	}

	#[test]
	fn multichannel_is_rejected() {
		let mut source = rgb_block(4);
		assert!(encode(&mut source).is_err());
	}
}
