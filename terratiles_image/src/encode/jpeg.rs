//! JPEG output. RGB only; anything else is a client error, not a conversion.

use anyhow::Result;
use image::{ExtendedColorType, ImageEncoder, codecs::jpeg::JpegEncoder};
use terratiles_core::{Blob, RasterBuf, RasterSource, SampleFormat, ServiceError};

const QUALITY: u8 = 90;

pub fn encode(source: &mut dyn RasterSource) -> Result<Blob> {
	let layout = source.descriptor().layout;
	if layout.channels != 3 || layout.sample != SampleFormat::U8 {
		return Err(anyhow::Error::new(ServiceError::UnsupportedFormat {
			format: format!("image/jpeg for a {layout} source"),
		}));
	}

	let buf = RasterBuf::from_source(source)?;
	let descriptor = buf.descriptor();
	let mut out = Vec::new();
	JpegEncoder::new_with_quality(&mut out, QUALITY).write_image(
		buf.data(),
		descriptor.width as u32,
		descriptor.height as u32,
		ExtendedColorType::Rgb8,
	)?;
	Ok(Blob::from(out))
}
