//! TIFF and GeoTIFF output.
//!
//! GeoTIFF adds three tags on top of the plain image: ModelPixelScale,
//! ModelTiepoint (anchoring the raster's top-left corner) and a minimal
//! GeoKeyDirectory naming the CRS by its EPSG code.

use super::GeoTags;
use anyhow::{Context, Result, bail};
use byteorder::{ByteOrder, LittleEndian};
use std::io::Cursor;
use terratiles_core::{Blob, RasterBuf, RasterDescriptor, RasterSource, SampleFormat};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;

const KEY_GT_MODEL_TYPE: u16 = 1024;
const KEY_GT_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

pub fn encode(source: &mut dyn RasterSource, geo: Option<GeoTags>) -> Result<Blob> {
	let buf = RasterBuf::from_source(source)?;
	let descriptor = buf.descriptor().clone();
	let layout = descriptor.layout;

	let mut cursor = Cursor::new(Vec::new());
	{
		let mut encoder = TiffEncoder::new(&mut cursor).context("TIFF container setup failed")?;
		let width = descriptor.width as u32;
		let height = descriptor.height as u32;

		match (layout.channels, layout.sample) {
			(1, SampleFormat::U8) => {
				let mut image = encoder.new_image::<colortype::Gray8>(width, height)?;
				write_geo_tags(&mut image, &descriptor, geo.as_ref())?;
				image.write_data(buf.data())?;
			}
			(3, SampleFormat::U8) => {
				let mut image = encoder.new_image::<colortype::RGB8>(width, height)?;
				write_geo_tags(&mut image, &descriptor, geo.as_ref())?;
				image.write_data(buf.data())?;
			}
			(4, SampleFormat::U8) => {
				let mut image = encoder.new_image::<colortype::RGBA8>(width, height)?;
				write_geo_tags(&mut image, &descriptor, geo.as_ref())?;
				image.write_data(buf.data())?;
			}
			(1, SampleFormat::U16) => {
				let mut samples = vec![0u16; descriptor.width * descriptor.height];
				LittleEndian::read_u16_into(buf.data(), &mut samples);
				let mut image = encoder.new_image::<colortype::Gray16>(width, height)?;
				write_geo_tags(&mut image, &descriptor, geo.as_ref())?;
				image.write_data(&samples)?;
			}
			(1, SampleFormat::F32) => {
				let mut samples = vec![0f32; descriptor.width * descriptor.height];
				LittleEndian::read_f32_into(buf.data(), &mut samples);
				let mut image = encoder.new_image::<colortype::Gray32Float>(width, height)?;
				write_geo_tags(&mut image, &descriptor, geo.as_ref())?;
				image.write_data(&samples)?;
			}
			(channels, sample) => bail!("TIFF output does not cover a {channels}x{sample} layout"),
		}
	}

	Ok(Blob::from(cursor.into_inner()))
}

fn write_geo_tags<W, C, K, D>(
	image: &mut tiff::encoder::ImageEncoder<'_, W, C, K, D>,
	descriptor: &RasterDescriptor,
	geo: Option<&GeoTags>,
) -> Result<()>
where
	W: std::io::Write + std::io::Seek,
	C: colortype::ColorType,
	K: tiff::encoder::TiffKind,
	D: tiff::encoder::compression::Compression,
{
	let Some(geo) = geo else {
		return Ok(());
	};

	let scale = [descriptor.resolution_x(), descriptor.resolution_y(), 0.0];
	image
		.encoder()
		.write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])?;

	// Raster (0,0,0) pins to the world top-left corner.
	let tiepoint = [0.0, 0.0, 0.0, descriptor.bbox.xmin, descriptor.bbox.ymax, 0.0];
	image
		.encoder()
		.write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])?;

	let model_type: u16 = if geo.geographic { 2 } else { 1 };
	let mut keys: Vec<u16> = vec![
		KEY_GT_MODEL_TYPE, 0, 1, model_type,
		KEY_GT_RASTER_TYPE, 0, 1, 1, // RasterPixelIsArea
	];
	if let Some(epsg) = geo.epsg {
		let key = if geo.geographic { KEY_GEOGRAPHIC_TYPE } else { KEY_PROJECTED_CS_TYPE };
		keys.extend_from_slice(&[key, 0, 1, epsg as u16]);
	}
	let key_count = (keys.len() / 4) as u16;
	let mut directory: Vec<u16> = vec![1, 1, 0, key_count];
	directory.extend_from_slice(&keys);
	image
		.encoder()
		.write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &directory[..])?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::super::test_support::gray_ramp;
	use super::*;
	use terratiles_core::{BBox, PixelLayout};

	#[test]
	fn plain_tiff_decodes_back() {
		let mut source = gray_ramp(8);
		let blob = encode(&mut source, None).unwrap();

		let mut decoder = tiff::decoder::Decoder::new(Cursor::new(blob.into_vec())).unwrap();
		assert_eq!(decoder.dimensions().unwrap(), (8, 8));
		let img = decoder.read_image().unwrap();
		if let tiff::decoder::DecodingResult::U8(data) = img {
			assert_eq!(data.len(), 64);
			assert_eq!(data[9], 9);
		} else {
			panic!("expected 8-bit decoding result");
		}
	}

	#[test]
	fn geotiff_carries_pixel_scale_and_tiepoint() {
		let mut source = gray_ramp(8);
		let blob = encode(
			&mut source,
			Some(GeoTags {
				epsg: Some(3857),
				geographic: false,
			}),
		)
		.unwrap();

		let mut decoder = tiff::decoder::Decoder::new(Cursor::new(blob.into_vec())).unwrap();
		let scale = decoder
			.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
			.unwrap();
		assert_eq!(scale, vec![1.0, 1.0, 0.0]);

		let tiepoint = decoder.get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT)).unwrap();
		// gray_ramp bbox is (0,0)-(8,8): top-left world corner is (0, 8).
		assert_eq!(tiepoint, vec![0.0, 0.0, 0.0, 0.0, 8.0, 0.0]);

		let keys = decoder
			.get_tag_u64_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
			.unwrap();
		assert!(keys.windows(4).any(|w| w == [3072, 0, 1, 3857]), "missing EPSG key: {keys:?}");
	}

	#[test]
	fn float_elevation_grid() {
		let descriptor = RasterDescriptor::new(
			4,
			4,
			PixelLayout::gray_f32(),
			BBox::new(0.0, 0.0, 4.0, 4.0, "EPSG:2154").unwrap(),
			vec![-99999.0],
		)
		.unwrap();
		let mut buf = terratiles_core::RasterBuf::new_nodata(descriptor);
		buf.set_sample(1, 1, 0, 421.5);
		let blob = encode(&mut buf, None).unwrap();

		let mut decoder = tiff::decoder::Decoder::new(Cursor::new(blob.into_vec())).unwrap();
		if let tiff::decoder::DecodingResult::F32(data) = decoder.read_image().unwrap() {
			assert_eq!(data[5], 421.5);
			assert_eq!(data[0], -99999.0);
		} else {
			panic!("expected f32 decoding result");
		}
	}
}
