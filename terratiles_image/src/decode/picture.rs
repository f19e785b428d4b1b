//! PNG / JPEG / WebP tile decoding via the `image` crate.
//!
//! Indexed PNG (including its transparency chunk) is expanded by the codec;
//! whatever the file stores, the output is interleaved samples in the
//! pyramid's declared layout.

use anyhow::{Context, Result, bail};
use byteorder::{ByteOrder, LittleEndian};
use image::{DynamicImage, ImageFormat};
use terratiles_core::{PixelLayout, RasterDescriptor, SampleFormat, TileCodec};

pub fn decode(bytes: &[u8], codec: TileCodec, descriptor: &RasterDescriptor) -> Result<Vec<u8>> {
	let format = match codec {
		TileCodec::Jpeg => ImageFormat::Jpeg,
		TileCodec::Png => ImageFormat::Png,
		TileCodec::Webp => ImageFormat::WebP,
		_ => bail!("codec {codec} is not an image format"),
	};

	let img = image::load_from_memory_with_format(bytes, format)
		.with_context(|| format!("tile could not be decoded as {codec}"))?;

	if img.width() as usize != descriptor.width || img.height() as usize != descriptor.height {
		return Err(anyhow::Error::new(super::CodecMismatch(format!(
			"{codec} tile is {}x{}, the matrix stores {}x{} tiles",
			img.width(),
			img.height(),
			descriptor.width,
			descriptor.height
		))));
	}

	interleave(img, &descriptor.layout)
}

/// Converts a decoded image into interleaved samples in `layout`, little-
/// endian for multi-byte samples.
pub(crate) fn interleave(img: DynamicImage, layout: &PixelLayout) -> Result<Vec<u8>> {
	Ok(match (layout.channels, layout.sample) {
		(1, SampleFormat::U8) => img.into_luma8().into_raw(),
		(2, SampleFormat::U8) => img.into_luma_alpha8().into_raw(),
		(3, SampleFormat::U8) => img.into_rgb8().into_raw(),
		(4, SampleFormat::U8) => img.into_rgba8().into_raw(),
		(1, SampleFormat::U16) => u16s_to_le(&img.into_luma16().into_raw()),
		(3, SampleFormat::U16) => u16s_to_le(&img.into_rgb16().into_raw()),
		(4, SampleFormat::U16) => u16s_to_le(&img.into_rgba16().into_raw()),
		(channels, sample) => bail!("image codecs cannot produce a {channels}x{sample} layout"),
	})
}

fn u16s_to_le(samples: &[u16]) -> Vec<u8> {
	let mut out = vec![0u8; samples.len() * 2];
	LittleEndian::write_u16_into(samples, &mut out);
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::{GrayImage, RgbImage, Rgba, RgbaImage};
	use std::io::Cursor;
	use terratiles_core::BBox;

	fn descriptor(layout: PixelLayout, size: usize) -> RasterDescriptor {
		let channels = layout.channels as usize;
		RasterDescriptor::new(
			size,
			size,
			layout,
			BBox::new(0.0, 0.0, size as f64, size as f64, "EPSG:3857").unwrap(),
			vec![0.0; channels],
		)
		.unwrap()
	}

	fn png_bytes(img: &DynamicImage) -> Vec<u8> {
		let mut out = Cursor::new(Vec::new());
		img.write_to(&mut out, ImageFormat::Png).unwrap();
		out.into_inner()
	}

	#[test]
	fn gray_png() {
		let img = DynamicImage::ImageLuma8(GrayImage::from_fn(8, 8, |x, y| image::Luma([(x * 8 + y) as u8])));
		let out = decode(&png_bytes(&img), TileCodec::Png, &descriptor(PixelLayout::gray_u8(), 8)).unwrap();
		assert_eq!(out.len(), 64);
		assert_eq!(out[0], 0);
		assert_eq!(out[9], 9); // pixel (1,1): x*8+y = 9
	}

	#[test]
	fn rgb_png_expanded_to_rgba_layout() {
		let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30])));
		let out = decode(&png_bytes(&img), TileCodec::Png, &descriptor(PixelLayout::rgba_u8(), 4)).unwrap();
		assert_eq!(&out[0..4], &[10, 20, 30, 255]);
	}

	#[test]
	fn rgba_png_with_transparency() {
		let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 128])));
		let out = decode(&png_bytes(&img), TileCodec::Png, &descriptor(PixelLayout::rgba_u8(), 4)).unwrap();
		assert_eq!(&out[0..4], &[1, 2, 3, 128]);
	}

	#[test]
	fn size_mismatch_is_rejected() {
		let img = DynamicImage::ImageLuma8(GrayImage::new(8, 8));
		let err = decode(&png_bytes(&img), TileCodec::Png, &descriptor(PixelLayout::gray_u8(), 16)).unwrap_err();
		assert!(err.to_string().contains("16x16"), "{err}");
	}

	#[test]
	fn float_layout_is_rejected() {
		let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
		assert!(decode(&png_bytes(&img), TileCodec::Png, &descriptor(PixelLayout::gray_f32(), 4)).is_err());
	}
}
