//! PNG output, paletted when the style supplies a lookup table.

use super::PaletteTable;
use anyhow::{Context, Result, bail};
use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};
use terratiles_core::{Blob, RasterBuf, RasterSource, SampleFormat};

pub fn encode(source: &mut dyn RasterSource, palette: Option<&PaletteTable>) -> Result<Blob> {
	let buf = RasterBuf::from_source(source)?;
	let layout = buf.descriptor().layout;

	if layout.channels == 1 && layout.sample == SampleFormat::U8 {
		if let Some(table) = palette {
			return encode_paletted(&buf, table);
		}
	}

	let color = match (layout.channels, layout.sample) {
		(1, SampleFormat::U8) => ExtendedColorType::L8,
		(2, SampleFormat::U8) => ExtendedColorType::La8,
		(3, SampleFormat::U8) => ExtendedColorType::Rgb8,
		(4, SampleFormat::U8) => ExtendedColorType::Rgba8,
		(1, SampleFormat::U16) => ExtendedColorType::L16,
		(3, SampleFormat::U16) => ExtendedColorType::Rgb16,
		(4, SampleFormat::U16) => ExtendedColorType::Rgba16,
		(channels, sample) => bail!("PNG cannot carry a {channels}x{sample} raster"),
	};

	let descriptor = buf.descriptor();
	let mut out = Vec::new();
	PngEncoder::new(&mut out)
		.write_image(buf.data(), descriptor.width as u32, descriptor.height as u32, color)
		.context("PNG encoding failed")?;
	Ok(Blob::from(out))
}

/// Indexed PNG: the single input channel is the palette index; PLTE carries
/// the RGB stops and tRNS the alpha column.
fn encode_paletted(buf: &RasterBuf, table: &PaletteTable) -> Result<Blob> {
	let descriptor = buf.descriptor();
	let mut plte = Vec::with_capacity(256 * 3);
	let mut trns = Vec::with_capacity(256);
	for entry in table {
		plte.extend_from_slice(&entry[0..3]);
		trns.push(entry[3]);
	}

	let mut out = Vec::new();
	{
		let mut encoder = png::Encoder::new(&mut out, descriptor.width as u32, descriptor.height as u32);
		encoder.set_color(png::ColorType::Indexed);
		encoder.set_depth(png::BitDepth::Eight);
		encoder.set_palette(plte);
		encoder.set_trns(trns);
		let mut writer = encoder.write_header().context("paletted PNG header failed")?;
		writer
			.write_image_data(buf.data())
			.context("paletted PNG data failed")?;
	}
	Ok(Blob::from(out))
}

#[cfg(test)]
mod tests {
	use super::super::test_support::{gray_ramp, rgb_block};
	use super::*;

	#[test]
	fn rgb_roundtrip() {
		let mut source = rgb_block(8);
		let blob = encode(&mut source, None).unwrap();
		let img = image::load_from_memory(blob.as_slice()).unwrap();
		assert_eq!((img.width(), img.height()), (8, 8));
		assert_eq!(img.color(), image::ColorType::Rgb8);
	}

	#[test]
	fn gray_without_palette_stays_gray() {
		let mut source = gray_ramp(8);
		let blob = encode(&mut source, None).unwrap();
		let img = image::load_from_memory(blob.as_slice()).unwrap();
		assert_eq!(img.color(), image::ColorType::L8);
	}

	#[test]
	fn paletted_output_decodes_to_table_colors() {
		let mut table: PaletteTable = [[0, 0, 0, 255]; 256];
		for (i, entry) in table.iter_mut().enumerate() {
			*entry = [i as u8, 0, 255 - i as u8, 64];
		}

		let mut source = gray_ramp(8);
		let blob = encode(&mut source, Some(&table)).unwrap();

		// The indexed PNG must expand back through the table.
		let img = image::load_from_memory(blob.as_slice()).unwrap().into_rgba8();
		let index = 1u8; // gray_ramp pixel (1,0) has value 1
		assert_eq!(img.get_pixel(1, 0).0, [index, 0, 255 - index, 64]);
	}

	#[test]
	fn float_is_rejected() {
		use terratiles_core::{BBox, PixelLayout, RasterDescriptor};
		let descriptor = RasterDescriptor::new(
			4,
			4,
			PixelLayout::gray_f32(),
			BBox::new(0.0, 0.0, 4.0, 4.0, "EPSG:3857").unwrap(),
			vec![0.0],
		)
		.unwrap();
		let mut source = terratiles_core::RasterBuf::new_nodata(descriptor);
		assert!(encode(&mut source, None).is_err());
	}
}
