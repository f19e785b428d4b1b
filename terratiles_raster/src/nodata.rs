//! A raster that is nothing but nodata.

use anyhow::{Result, ensure};
use terratiles_core::{RasterDescriptor, RasterSource};

/// Constant-valued raster producing the descriptor's nodata vector on every
/// line. Stands in for absent tiles and for requests entirely outside a
/// level's data window.
pub struct NodataImage {
	descriptor: RasterDescriptor,
}

impl NodataImage {
	pub fn new(descriptor: RasterDescriptor) -> NodataImage {
		NodataImage { descriptor }
	}
}

impl RasterSource for NodataImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		ensure!(row < self.descriptor.height, "row {row} out of range");
		self.descriptor.write_nodata_line(out);
		Ok(())
	}
}
