//! Separable resampling of a lazy raster onto a new pixel grid.
//!
//! The kernel runs in x first, producing horizontally resampled lines that a
//! sliding window caches while the y pass consumes them. Output rows are
//! requested in ascending order, the window advances monotonically, and the
//! source sees each of its lines exactly once.
//!
//! Taps that fall outside the source contribute zero weight; the pixel is
//! renormalised by the in-range weight sum, and a pixel with no in-range taps
//! at all becomes nodata.

use anyhow::{Result, bail, ensure};
use std::collections::VecDeque;
use std::f64::consts::PI;
use terratiles_core::{BBox, RasterDescriptor, RasterReader, RasterSource};

/// Interpolation kernels, applied separably in x then y.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kernel {
	Nearest,
	Linear,
	Cubic,
	Lanczos2,
	Lanczos3,
	Lanczos4,
}

impl Kernel {
	pub fn parse(value: &str) -> Result<Kernel> {
		Ok(match value.to_lowercase().as_str() {
			"nearest" | "nn" => Kernel::Nearest,
			"linear" | "bilinear" => Kernel::Linear,
			"cubic" | "bicubic" => Kernel::Cubic,
			"lanczos" | "lanczos_2" | "lanczos2" => Kernel::Lanczos2,
			"lanczos_3" | "lanczos3" => Kernel::Lanczos3,
			"lanczos_4" | "lanczos4" => Kernel::Lanczos4,
			_ => bail!("unknown interpolation kernel '{value}'"),
		})
	}

	/// Half-width of the kernel in source pixels, at unit scale.
	pub fn support(&self) -> f64 {
		match self {
			Kernel::Nearest => 0.5,
			Kernel::Linear => 1.0,
			Kernel::Cubic => 2.0,
			Kernel::Lanczos2 => 2.0,
			Kernel::Lanczos3 => 3.0,
			Kernel::Lanczos4 => 4.0,
		}
	}

	pub(crate) fn weight(&self, x: f64) -> f64 {
		match self {
			// Half-open so a tie picks exactly one pixel.
			Kernel::Nearest => {
				if (-0.5..0.5).contains(&x) {
					1.0
				} else {
					0.0
				}
			}
			Kernel::Linear => {
				let x = x.abs();
				if x < 1.0 { 1.0 - x } else { 0.0 }
			}
			Kernel::Cubic => {
				// Catmull-Rom (a = -0.5).
				let x = x.abs();
				if x < 1.0 {
					(1.5 * x - 2.5) * x * x + 1.0
				} else if x < 2.0 {
					((-0.5 * x + 2.5) * x - 4.0) * x + 2.0
				} else {
					0.0
				}
			}
			Kernel::Lanczos2 => lanczos(x, 2.0),
			Kernel::Lanczos3 => lanczos(x, 3.0),
			Kernel::Lanczos4 => lanczos(x, 4.0),
		}
	}
}

fn sinc(x: f64) -> f64 {
	if x.abs() < 1e-12 {
		1.0
	} else {
		let px = PI * x;
		px.sin() / px
	}
}

fn lanczos(x: f64, a: f64) -> f64 {
	if x.abs() < a { sinc(x) * sinc(x / a) } else { 0.0 }
}

/// Kernel taps for one output coordinate: first source index plus weights,
/// already renormalised over the in-range subset.
struct Taps {
	start: i64,
	weights: Vec<f64>,
}

fn build_taps(kernel: Kernel, center: f64, scale: f64, src_size: usize) -> Option<Taps> {
	// Downsampling stretches every kernel except nearest, which always picks
	// the single closest pixel.
	let scale = if kernel == Kernel::Nearest { 1.0 } else { scale.max(1.0) };
	let support = kernel.support() * scale;

	let first = (center - support).ceil() as i64;
	let last = (center + support).floor() as i64;

	let mut weights = Vec::with_capacity((last - first + 1).max(0) as usize);
	let mut sum = 0.0;
	for i in first..=last {
		let w = if i < 0 || i >= src_size as i64 {
			0.0
		} else {
			kernel.weight((i as f64 - center) / scale)
		};
		weights.push(w);
		sum += w;
	}

	if sum.abs() < 1e-12 {
		return None;
	}
	for w in &mut weights {
		*w /= sum;
	}
	Some(Taps { start: first, weights })
}

/// A lazy raster presenting its source at a different size and extent.
pub struct ResampledImage {
	source: RasterReader,
	descriptor: RasterDescriptor,
	kernel: Kernel,
	x_taps: Vec<Option<Taps>>,
	scale_y: f64,
	src_line_bytes: Vec<u8>,
	/// Horizontally resampled source lines, keyed by ascending source row.
	window: VecDeque<(usize, Vec<f64>)>,
	next_src_row: usize,
}

impl ResampledImage {
	/// Fits `source` onto a `width` x `height` grid over `bbox`. The bbox
	/// must be in the source's CRS; layout and nodata are inherited.
	pub fn new(source: RasterReader, bbox: BBox, width: usize, height: usize, kernel: Kernel) -> Result<ResampledImage> {
		let src = source.descriptor().clone();
		ensure!(
			bbox.crs == src.bbox.crs,
			"resampling cannot change CRS ({} requested over a {} source)",
			bbox.crs,
			src.bbox.crs
		);
		let descriptor = RasterDescriptor::new(width, height, src.layout, bbox, src.nodata.clone())?;

		let scale_x = descriptor.resolution_x() / src.resolution_x();
		let scale_y = descriptor.resolution_y() / src.resolution_y();

		let mut x_taps = Vec::with_capacity(width);
		for x in 0..width {
			let world_x = descriptor.bbox.xmin + (x as f64 + 0.5) * descriptor.resolution_x();
			let center = (world_x - src.bbox.xmin) / src.resolution_x() - 0.5;
			x_taps.push(build_taps(kernel, center, scale_x, src.width));
		}

		let src_line_bytes = vec![0u8; src.line_bytes()];
		Ok(ResampledImage {
			source,
			descriptor,
			kernel,
			x_taps,
			scale_y,
			src_line_bytes,
			window: VecDeque::new(),
			next_src_row: 0,
		})
	}

	/// Horizontally resamples source row `row` into f64 samples at target
	/// width.
	fn resample_row(&mut self, row: usize) -> Result<Vec<f64>> {
		let src = self.source.descriptor().clone();
		let channels = src.layout.channels as usize;
		let sample = src.layout.sample;

		self.source.read_line(row, &mut self.src_line_bytes)?;

		let mut out = vec![0.0; self.descriptor.width * channels];
		for (x, taps) in self.x_taps.iter().enumerate() {
			match taps {
				None => {
					for c in 0..channels {
						out[x * channels + c] = self.descriptor.nodata[c];
					}
				}
				Some(taps) => {
					for c in 0..channels {
						let mut acc = 0.0;
						for (k, &w) in taps.weights.iter().enumerate() {
							if w != 0.0 {
								let i = (taps.start + k as i64) as usize;
								acc += w * sample.get(&self.src_line_bytes, i * channels + c);
							}
						}
						out[x * channels + c] = acc;
					}
				}
			}
		}
		Ok(out)
	}

	/// Ensures the window holds all source rows in `min..=max`, discarding
	/// rows older than `min`.
	fn advance_window(&mut self, min: usize, max: usize) -> Result<()> {
		// Fast-forward over rows nothing will ever tap again.
		if self.window.is_empty() && self.next_src_row < min {
			self.next_src_row = min;
		}
		while self.next_src_row <= max {
			let row = self.next_src_row;
			let line = self.resample_row(row)?;
			self.window.push_back((row, line));
			self.next_src_row += 1;
		}
		while matches!(self.window.front(), Some((row, _)) if *row < min) {
			self.window.pop_front();
		}
		Ok(())
	}

	fn window_line(&self, row: usize) -> Option<&[f64]> {
		let front = self.window.front()?.0;
		if row < front {
			return None;
		}
		self.window.get(row - front).map(|(_, line)| line.as_slice())
	}
}

impl RasterSource for ResampledImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		ensure!(row < self.descriptor.height, "row {row} out of range");
		let src = self.source.descriptor().clone();
		let channels = src.layout.channels as usize;
		let sample = self.descriptor.layout.sample;

		let world_y = self.descriptor.bbox.ymax - (row as f64 + 0.5) * self.descriptor.resolution_y();
		let center = (src.bbox.ymax - world_y) / src.resolution_y() - 0.5;
		let taps = build_taps(self.kernel, center, self.scale_y, src.height);

		let Some(taps) = taps else {
			self.descriptor.write_nodata_line(out);
			return Ok(());
		};

		let rows: Vec<usize> = (0..taps.weights.len())
			.filter(|&k| taps.weights[k] != 0.0)
			.map(|k| (taps.start + k as i64) as usize)
			.collect();
		let min = *rows.first().expect("renormalised taps have at least one row");
		let max = *rows.last().expect("renormalised taps have at least one row");
		self.advance_window(min, max)?;

		for x in 0..self.descriptor.width {
			if self.x_taps[x].is_none() {
				for (c, nodata) in self.descriptor.nodata.iter().enumerate() {
					sample.put(out, x * channels + c, *nodata);
				}
				continue;
			}
			for c in 0..channels {
				let mut acc = 0.0;
				for (k, &w) in taps.weights.iter().enumerate() {
					if w != 0.0 {
						let line = self
							.window_line((taps.start + k as i64) as usize)
							.expect("window holds all tap rows");
						acc += w * line[x * channels + c];
					}
				}
				sample.put(out, x * channels + c, acc);
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use terratiles_core::{PixelLayout, RasterBuf};

	fn gradient(size: usize) -> RasterReader {
		let descriptor = RasterDescriptor::new(
			size,
			size,
			PixelLayout::gray_u8(),
			BBox::new(0.0, 0.0, size as f64, size as f64, "EPSG:3857").unwrap(),
			vec![0.0],
		)
		.unwrap();
		let mut buf = RasterBuf::new_nodata(descriptor);
		for y in 0..size {
			for x in 0..size {
				buf.set_sample(x, y, 0, (x * 2) as f64);
			}
		}
		Box::new(buf)
	}

	#[test]
	fn kernel_parsing() {
		assert_eq!(Kernel::parse("nearest").unwrap(), Kernel::Nearest);
		assert_eq!(Kernel::parse("BILINEAR").unwrap(), Kernel::Linear);
		assert_eq!(Kernel::parse("lanczos_3").unwrap(), Kernel::Lanczos3);
		assert!(Kernel::parse("quintic").is_err());
	}

	#[test]
	fn kernel_weights_at_zero() {
		for kernel in [
			Kernel::Nearest,
			Kernel::Linear,
			Kernel::Cubic,
			Kernel::Lanczos2,
			Kernel::Lanczos3,
			Kernel::Lanczos4,
		] {
			assert_abs_diff_eq!(kernel.weight(0.0), 1.0, epsilon = 1e-12);
			assert_abs_diff_eq!(kernel.weight(kernel.support() + 0.1), 0.0, epsilon = 1e-12);
		}
	}

	#[test]
	fn identity_resample_preserves_pixels() {
		let bbox = BBox::new(0.0, 0.0, 8.0, 8.0, "EPSG:3857").unwrap();
		for kernel in [Kernel::Nearest, Kernel::Linear, Kernel::Lanczos3] {
			let mut resampled = ResampledImage::new(gradient(8), bbox.clone(), 8, 8, kernel).unwrap();
			let buf = RasterBuf::from_source(&mut resampled).unwrap();
			for x in 0..8 {
				assert_eq!(buf.sample(x, 4, 0), (x * 2) as f64, "kernel {kernel:?} at x={x}");
			}
		}
	}

	#[test]
	fn linear_upsample_interpolates() {
		let bbox = BBox::new(0.0, 0.0, 8.0, 8.0, "EPSG:3857").unwrap();
		let mut resampled = ResampledImage::new(gradient(8), bbox, 16, 16, Kernel::Linear).unwrap();
		let buf = RasterBuf::from_source(&mut resampled).unwrap();
		// Doubling a ramp of slope 2 gives half-grid values 6.5 and 7.5,
		// quantised up by the 8-bit store.
		assert_eq!(buf.sample(7, 8, 0), 7.0);
		assert_eq!(buf.sample(8, 8, 0), 8.0);
	}

	#[test]
	fn crop_without_scaling() {
		// Pull the inner 4x4 of the 8x8 gradient.
		let bbox = BBox::new(2.0, 2.0, 6.0, 6.0, "EPSG:3857").unwrap();
		let mut resampled = ResampledImage::new(gradient(8), bbox, 4, 4, Kernel::Nearest).unwrap();
		let buf = RasterBuf::from_source(&mut resampled).unwrap();
		for x in 0..4 {
			assert_eq!(buf.sample(x, 0, 0), ((x + 2) * 2) as f64);
		}
	}

	#[test]
	fn outside_source_is_nodata() {
		// Target extends left of the source by 4 pixels.
		let bbox = BBox::new(-4.0, 0.0, 4.0, 8.0, "EPSG:3857").unwrap();
		let mut resampled = ResampledImage::new(gradient(8), bbox, 8, 8, Kernel::Nearest).unwrap();
		let buf = RasterBuf::from_source(&mut resampled).unwrap();
		assert_eq!(buf.sample(0, 0, 0), 0.0); // nodata
		assert_eq!(buf.sample(3, 0, 0), 0.0); // nodata (still outside)
		assert_eq!(buf.sample(4, 0, 0), 0.0); // first source column has value 0
		assert_eq!(buf.sample(5, 0, 0), 2.0);
	}

	#[test]
	fn crs_change_is_refused() {
		let bbox = BBox::new(0.0, 0.0, 8.0, 8.0, "EPSG:4326").unwrap();
		assert!(ResampledImage::new(gradient(8), bbox, 8, 8, Kernel::Linear).is_err());
	}

	#[test]
	fn downsample_averages_box() {
		let bbox = BBox::new(0.0, 0.0, 8.0, 8.0, "EPSG:3857").unwrap();
		let mut resampled = ResampledImage::new(gradient(8), bbox, 4, 4, Kernel::Linear).unwrap();
		let buf = RasterBuf::from_source(&mut resampled).unwrap();
		// Halving a 0,2,4,.. ramp with a stretched linear kernel keeps the mean slope.
		let a = buf.sample(1, 2, 0);
		let b = buf.sample(2, 2, 0);
		assert_abs_diff_eq!(b - a, 4.0, epsilon = 0.5);
	}
}
