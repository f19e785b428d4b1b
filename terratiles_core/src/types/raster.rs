//! The lazy raster model.
//!
//! Every stage of the image pipeline — decoded tiles, mosaics, reprojections,
//! resamplings, styled images, nodata fills — is a [`RasterSource`]: a
//! rectangle of declared geometry that can produce its pixel lines one at a
//! time into a caller-provided buffer. Composition is by wrapping; ownership
//! is tree-shaped.
//!
//! The single contract every implementation honours: callers request lines in
//! ascending row order and never revisit a row. Implementations are free to
//! keep only the sliding state that contract allows.

use super::{BBox, PixelLayout};
use anyhow::{Result, ensure};

/// Geometry, pixel layout and georeferencing shared by all raster variants.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterDescriptor {
	pub width: usize,
	pub height: usize,
	pub layout: PixelLayout,
	pub bbox: BBox,
	/// One nodata value per channel.
	pub nodata: Vec<f64>,
}

impl RasterDescriptor {
	pub fn new(width: usize, height: usize, layout: PixelLayout, bbox: BBox, nodata: Vec<f64>) -> Result<RasterDescriptor> {
		ensure!(width > 0 && height > 0, "raster must not be empty, got {width}x{height}");
		ensure!(
			nodata.len() == layout.channels as usize,
			"nodata vector has {} entries but the layout has {} channels",
			nodata.len(),
			layout.channels
		);
		Ok(RasterDescriptor {
			width,
			height,
			layout,
			bbox,
			nodata,
		})
	}

	/// Bytes in one interleaved pixel line.
	pub fn line_bytes(&self) -> usize {
		self.width * self.layout.bytes_per_pixel()
	}

	/// CRS units per pixel along x.
	pub fn resolution_x(&self) -> f64 {
		self.bbox.width() / self.width as f64
	}

	/// CRS units per pixel along y.
	pub fn resolution_y(&self) -> f64 {
		self.bbox.height() / self.height as f64
	}

	/// Fills `out` with repeated nodata pixels.
	pub fn write_nodata_line(&self, out: &mut [u8]) {
		let channels = self.layout.channels as usize;
		let sample = self.layout.sample;
		for x in 0..self.width {
			for (c, value) in self.nodata.iter().enumerate() {
				sample.put(out, x * channels + c, *value);
			}
		}
	}
}

/// A lazily evaluated raster: produce line `row` into `out`.
///
/// `out` must be exactly [`RasterDescriptor::line_bytes`] long. Rows must be
/// requested in strictly ascending order.
pub trait RasterSource: Send {
	fn descriptor(&self) -> &RasterDescriptor;

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()>;
}

/// Boxed raster source, the unit the pipeline passes around.
pub type RasterReader = Box<dyn RasterSource>;

/// A fully materialised raster, also usable as a source.
#[derive(Clone, Debug)]
pub struct RasterBuf {
	descriptor: RasterDescriptor,
	data: Vec<u8>,
}

impl RasterBuf {
	/// A buffer filled with the descriptor's nodata values.
	pub fn new_nodata(descriptor: RasterDescriptor) -> RasterBuf {
		let mut data = vec![0u8; descriptor.line_bytes() * descriptor.height];
		let line_bytes = descriptor.line_bytes();
		for row in 0..descriptor.height {
			descriptor.write_nodata_line(&mut data[row * line_bytes..(row + 1) * line_bytes]);
		}
		RasterBuf { descriptor, data }
	}

	pub fn from_vec(descriptor: RasterDescriptor, data: Vec<u8>) -> Result<RasterBuf> {
		ensure!(
			data.len() == descriptor.line_bytes() * descriptor.height,
			"pixel buffer holds {} bytes but the descriptor needs {}",
			data.len(),
			descriptor.line_bytes() * descriptor.height
		);
		Ok(RasterBuf { descriptor, data })
	}

	/// Drains `source` line by line into an owned buffer.
	pub fn from_source(source: &mut dyn RasterSource) -> Result<RasterBuf> {
		let descriptor = source.descriptor().clone();
		let line_bytes = descriptor.line_bytes();
		let mut data = vec![0u8; line_bytes * descriptor.height];
		for row in 0..descriptor.height {
			source.read_line(row, &mut data[row * line_bytes..(row + 1) * line_bytes])?;
		}
		Ok(RasterBuf { descriptor, data })
	}

	pub fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	pub fn line(&self, row: usize) -> &[u8] {
		let line_bytes = self.descriptor.line_bytes();
		&self.data[row * line_bytes..(row + 1) * line_bytes]
	}

	pub fn line_mut(&mut self, row: usize) -> &mut [u8] {
		let line_bytes = self.descriptor.line_bytes();
		&mut self.data[row * line_bytes..(row + 1) * line_bytes]
	}

	/// Sample value at (x, y, channel) as `f64`.
	pub fn sample(&self, x: usize, y: usize, channel: usize) -> f64 {
		let channels = self.descriptor.layout.channels as usize;
		self.descriptor.layout.sample.get(self.line(y), x * channels + channel)
	}

	pub fn set_sample(&mut self, x: usize, y: usize, channel: usize, value: f64) {
		let channels = self.descriptor.layout.channels as usize;
		let sample = self.descriptor.layout.sample;
		sample.put(self.line_mut(y), x * channels + channel, value);
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn into_data(self) -> Vec<u8> {
		self.data
	}
}

impl RasterSource for RasterBuf {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		ensure!(row < self.descriptor.height, "row {row} out of range");
		out.copy_from_slice(self.line(row));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{PixelLayout, SampleFormat};

	fn descriptor(width: usize, height: usize) -> RasterDescriptor {
		RasterDescriptor::new(
			width,
			height,
			PixelLayout::gray_u8(),
			BBox::new(0.0, 0.0, width as f64, height as f64, "EPSG:3857").unwrap(),
			vec![255.0],
		)
		.unwrap()
	}

	#[test]
	fn descriptor_validates_nodata_arity() {
		let bbox = BBox::new(0.0, 0.0, 1.0, 1.0, "EPSG:3857").unwrap();
		assert!(RasterDescriptor::new(4, 4, PixelLayout::rgb_u8(), bbox.clone(), vec![0.0]).is_err());
		assert!(RasterDescriptor::new(4, 4, PixelLayout::rgb_u8(), bbox, vec![0.0, 0.0, 0.0]).is_ok());
	}

	#[test]
	fn resolution() {
		let d = descriptor(256, 128);
		assert_eq!(d.resolution_x(), 1.0);
		assert_eq!(d.resolution_y(), 1.0);
	}

	#[test]
	fn nodata_buffer_is_prefilled() {
		let buf = RasterBuf::new_nodata(descriptor(4, 2));
		assert!(buf.data().iter().all(|&b| b == 255));
	}

	#[test]
	fn sample_roundtrip() {
		let mut buf = RasterBuf::new_nodata(descriptor(4, 4));
		buf.set_sample(2, 3, 0, 42.0);
		assert_eq!(buf.sample(2, 3, 0), 42.0);
		assert_eq!(buf.sample(1, 3, 0), 255.0);
	}

	#[test]
	fn from_source_copies_everything() {
		let mut buf = RasterBuf::new_nodata(descriptor(3, 3));
		buf.set_sample(0, 0, 0, 1.0);
		buf.set_sample(2, 2, 0, 9.0);
		let copy = RasterBuf::from_source(&mut buf).unwrap();
		assert_eq!(copy.sample(0, 0, 0), 1.0);
		assert_eq!(copy.sample(2, 2, 0), 9.0);
		assert_eq!(copy.sample(1, 1, 0), 255.0);
	}

	#[test]
	fn f32_buffers() {
		let bbox = BBox::new(0.0, 0.0, 2.0, 2.0, "EPSG:2154").unwrap();
		let d = RasterDescriptor::new(2, 2, PixelLayout::gray_f32(), bbox, vec![-99999.0]).unwrap();
		let mut buf = RasterBuf::new_nodata(d);
		assert_eq!(buf.sample(0, 0, 0), -99999.0);
		buf.set_sample(1, 1, 0, 1234.5);
		assert_eq!(buf.sample(1, 1, 0), 1234.5);
		assert_eq!(buf.descriptor().layout.sample, SampleFormat::F32);
	}
}
