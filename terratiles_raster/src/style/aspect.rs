//! Gradient direction (aspect) from an elevation raster.

use super::focal::FocalWindow;
use super::slope::GradientKernel;
use anyhow::{Result, ensure};
use terratiles_core::{PixelLayout, RasterDescriptor, RasterReader, RasterSource};

/// Value written for pixels flatter than the minimum slope, or next to
/// nodata.
pub const ASPECT_NODATA: f64 = -1.0;

/// Aspect transform parameters.
#[derive(Clone, Copy, Debug)]
pub struct Aspect {
	pub kernel: GradientKernel,
	/// Pixels with a slope below this (degrees) are flattened to nodata, so
	/// sensor noise on level ground does not paint random directions.
	pub min_slope_deg: f64,
}

/// Lazy wrapper producing downslope direction, degrees clockwise from
/// north, in [0, 360).
pub struct AspectImage {
	window: FocalWindow,
	descriptor: RasterDescriptor,
	params: Aspect,
	input_nodata: f64,
	/// Slope threshold precomputed as tan(min_slope).
	min_rise: f64,
}

impl AspectImage {
	pub fn new(source: RasterReader, params: Aspect) -> Result<AspectImage> {
		ensure!(
			(0.0..90.0).contains(&params.min_slope_deg),
			"minimum slope must be in [0, 90), got {}",
			params.min_slope_deg
		);
		let input = source.descriptor().clone();
		let input_nodata = input.nodata[0];
		let descriptor = RasterDescriptor::new(
			input.width,
			input.height,
			PixelLayout::gray_f32(),
			input.bbox.clone(),
			vec![ASPECT_NODATA],
		)?;
		Ok(AspectImage {
			window: FocalWindow::new(source)?,
			descriptor,
			params,
			input_nodata,
			min_rise: params.min_slope_deg.to_radians().tan(),
		})
	}
}

impl RasterSource for AspectImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		self.window.advance_to(row)?;

		let res_x = self.descriptor.resolution_x();
		let res_y = self.descriptor.resolution_y();
		let sample = self.descriptor.layout.sample;

		for x in 0..self.descriptor.width {
			let n = self.window.neighbourhood(x);
			if n.contains(&self.input_nodata) {
				sample.put(out, x, ASPECT_NODATA);
				continue;
			}

			let (dzdx, dzdy) = self.params.kernel.gradients(&n, res_x, res_y);
			let rise = (dzdx * dzdx + dzdy * dzdy).sqrt();
			if rise < self.min_rise || rise == 0.0 {
				sample.put(out, x, ASPECT_NODATA);
				continue;
			}

			// Downslope direction as (east, north) components: dzdy already
			// points south, so it is the northward descent as-is.
			let mut degrees = (-dzdx).atan2(dzdy).to_degrees();
			if degrees < 0.0 {
				degrees += 360.0;
			}
			sample.put(out, x, degrees);
		}
		Ok(())
	}
}
