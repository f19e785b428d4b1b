//! Slope magnitude from an elevation raster.

use super::focal::FocalWindow;
use anyhow::{Result, bail, ensure};
use terratiles_core::{PixelLayout, RasterDescriptor, RasterReader, RasterSource};

/// 3x3 gradient estimators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GradientKernel {
	/// Horn 1981, all eight neighbours.
	Horn,
	/// Zevenbergen & Thorne 1987, four direct neighbours.
	ZevenbergenThorne,
}

impl GradientKernel {
	pub fn parse(value: &str) -> Result<GradientKernel> {
		Ok(match value.to_lowercase().as_str() {
			"horn" | "h" => GradientKernel::Horn,
			"zevenbergenthorne" | "zevenbergen" | "zt" => GradientKernel::ZevenbergenThorne,
			_ => bail!("unknown gradient algorithm '{value}'"),
		})
	}

	/// Gradients (east, south) from a row-major 3x3 neighbourhood.
	pub(crate) fn gradients(&self, n: &[f64; 9], res_x: f64, res_y: f64) -> (f64, f64) {
		match self {
			GradientKernel::Horn => {
				let dzdx = ((n[2] + 2.0 * n[5] + n[8]) - (n[0] + 2.0 * n[3] + n[6])) / (8.0 * res_x);
				let dzdy = ((n[6] + 2.0 * n[7] + n[8]) - (n[0] + 2.0 * n[1] + n[2])) / (8.0 * res_y);
				(dzdx, dzdy)
			}
			GradientKernel::ZevenbergenThorne => {
				let dzdx = (n[5] - n[3]) / (2.0 * res_x);
				let dzdy = (n[7] - n[1]) / (2.0 * res_y);
				(dzdx, dzdy)
			}
		}
	}
}

/// Output unit of a slope image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlopeUnit {
	Degrees,
	Percent,
}

impl SlopeUnit {
	pub fn parse(value: &str) -> Result<SlopeUnit> {
		Ok(match value.to_lowercase().as_str() {
			"degree" | "degrees" => SlopeUnit::Degrees,
			"percent" | "pourcent" => SlopeUnit::Percent,
			_ => bail!("unknown slope unit '{value}'"),
		})
	}
}

/// Slope transform parameters.
#[derive(Clone, Copy, Debug)]
pub struct Slope {
	pub kernel: GradientKernel,
	pub unit: SlopeUnit,
	/// Slopes are clamped here (same unit as `unit`).
	pub max_slope: f64,
	/// Value written where the slope is undefined.
	pub output_nodata: f64,
}

/// Lazy wrapper producing a float slope image from elevations.
pub struct SlopeImage {
	window: FocalWindow,
	descriptor: RasterDescriptor,
	params: Slope,
	input_nodata: f64,
}

impl SlopeImage {
	pub fn new(source: RasterReader, params: Slope) -> Result<SlopeImage> {
		ensure!(params.max_slope > 0.0, "maximum slope must be positive");
		let input = source.descriptor().clone();
		let input_nodata = input.nodata[0];
		let descriptor = RasterDescriptor::new(
			input.width,
			input.height,
			PixelLayout::gray_f32(),
			input.bbox.clone(),
			vec![params.output_nodata],
		)?;
		Ok(SlopeImage {
			window: FocalWindow::new(source)?,
			descriptor,
			params,
			input_nodata,
		})
	}
}

impl RasterSource for SlopeImage {
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
				sample.put(out, x, self.params.output_nodata);
				continue;
			}

			let (dzdx, dzdy) = self.params.kernel.gradients(&n, res_x, res_y);
			let rise = (dzdx * dzdx + dzdy * dzdy).sqrt();
			let slope = match self.params.unit {
				SlopeUnit::Degrees => rise.atan().to_degrees(),
				SlopeUnit::Percent => rise * 100.0,
			};
			sample.put(out, x, slope.min(self.params.max_slope));
		}
		Ok(())
	}
}
