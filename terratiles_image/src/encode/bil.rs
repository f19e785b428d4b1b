//! Raw BIL output: band-interleaved-by-line, 32-bit little-endian floats.

use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use terratiles_core::{Blob, RasterSource};

pub fn encode(source: &mut dyn RasterSource) -> Result<Blob> {
	let descriptor = source.descriptor().clone();
	let channels = descriptor.layout.channels as usize;
	let sample = descriptor.layout.sample;

	let mut line = vec![0u8; descriptor.line_bytes()];
	let mut out = Vec::with_capacity(descriptor.width * descriptor.height * channels * 4);
	for row in 0..descriptor.height {
		source.read_line(row, &mut line)?;
		for band in 0..channels {
			for x in 0..descriptor.width {
				out.write_f32::<LittleEndian>(sample.get(&line, x * channels + band) as f32)?;
			}
		}
	}
	Ok(Blob::from(out))
}
