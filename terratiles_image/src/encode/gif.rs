//! GIF output via the `image` crate.

use anyhow::{Context, Result, bail};
use image::codecs::gif::GifEncoder;
use image::{Frame, RgbaImage};
use terratiles_core::{Blob, RasterBuf, RasterSource, SampleFormat};

pub fn encode(source: &mut dyn RasterSource) -> Result<Blob> {
	let layout = source.descriptor().layout;
	if layout.sample != SampleFormat::U8 {
		bail!("GIF cannot carry {} samples", layout.sample);
	}

	let buf = RasterBuf::from_source(source)?;
	let descriptor = buf.descriptor().clone();

	// The GIF encoder quantises from RGBA; expand whatever layout we have.
	let mut rgba = RgbaImage::new(descriptor.width as u32, descriptor.height as u32);
	let channels = layout.channels as usize;
	for y in 0..descriptor.height {
		let line = buf.line(y);
		for x in 0..descriptor.width {
			let px = &line[x * channels..(x + 1) * channels];
			let pixel = match channels {
				1 => [px[0], px[0], px[0], 255],
				2 => [px[0], px[0], px[0], px[1]],
				3 => [px[0], px[1], px[2], 255],
				_ => [px[0], px[1], px[2], px[3]],
			};
			rgba.put_pixel(x as u32, y as u32, image::Rgba(pixel));
		}
	}

	let mut out = Vec::new();
	{
		let mut encoder = GifEncoder::new(&mut out);
		encoder
			.encode_frame(Frame::new(rgba))
			.context("GIF encoding failed")?;
	}
	Ok(Blob::from(out))
}
