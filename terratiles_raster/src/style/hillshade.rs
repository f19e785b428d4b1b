//! Lambertian hillshading of an elevation raster.

use super::focal::FocalWindow;
use crate::resample::Kernel;
use anyhow::{Result, ensure};
use terratiles_core::{PixelLayout, RasterDescriptor, RasterReader, RasterSource};

/// Hillshade parameters: sun position, vertical exaggeration and the kernel
/// preferred when the pipeline resamples before shading.
#[derive(Clone, Copy, Debug)]
pub struct Hillshade {
	/// Solar azimuth, degrees from north, clockwise.
	pub azimuth_deg: f64,
	/// Solar zenith, degrees from vertical.
	pub zenith_deg: f64,
	/// Vertical exaggeration applied to elevations.
	pub z_factor: f64,
	pub kernel: Kernel,
}

impl Default for Hillshade {
	fn default() -> Self {
		Hillshade {
			azimuth_deg: 315.0,
			zenith_deg: 45.0,
			z_factor: 1.0,
			kernel: Kernel::Linear,
		}
	}
}

/// Lazy wrapper producing an 8-bit illumination image from elevations.
pub struct HillshadeImage {
	window: FocalWindow,
	descriptor: RasterDescriptor,
	params: Hillshade,
	input_nodata: f64,
}

impl HillshadeImage {
	pub fn new(source: RasterReader, params: Hillshade) -> Result<HillshadeImage> {
		ensure!(params.z_factor > 0.0, "hillshade z-factor must be positive");
		let input = source.descriptor().clone();
		let input_nodata = input.nodata[0];
		let descriptor = RasterDescriptor::new(
			input.width,
			input.height,
			PixelLayout::gray_u8(),
			input.bbox.clone(),
			vec![0.0],
		)?;
		Ok(HillshadeImage {
			window: FocalWindow::new(source)?,
			descriptor,
			params,
			input_nodata,
		})
	}
}

impl RasterSource for HillshadeImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		self.window.advance_to(row)?;

		let res_x = self.descriptor.resolution_x();
		let res_y = self.descriptor.resolution_y();
		let zenith = self.params.zenith_deg.to_radians();
		let azimuth = self.params.azimuth_deg.to_radians();

		for (x, pixel) in out.iter_mut().enumerate().take(self.descriptor.width) {
			let n = self.window.neighbourhood(x);
			if n.contains(&self.input_nodata) {
				*pixel = 0;
				continue;
			}

			// Horn gradients, z-factor applied to the elevations.
			let z = self.params.z_factor;
			let dzdx = z * ((n[2] + 2.0 * n[5] + n[8]) - (n[0] + 2.0 * n[3] + n[6])) / (8.0 * res_x);
			let dzdy = z * ((n[6] + 2.0 * n[7] + n[8]) - (n[0] + 2.0 * n[1] + n[2])) / (8.0 * res_y);

			// Lambertian reflectance: surface normal dotted with the sun
			// vector. dzdy points south because rows grow downward.
			let norm = (1.0 + dzdx * dzdx + dzdy * dzdy).sqrt();
			let shade = (zenith.cos() + zenith.sin() * (dzdy * azimuth.cos() - dzdx * azimuth.sin())) / norm;
			*pixel = (shade.max(0.0) * 255.0).round().min(255.0) as u8;
		}
		Ok(())
	}
}
