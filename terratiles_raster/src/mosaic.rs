//! Composing grid-aligned rasters into one larger raster.
//!
//! The mosaic handles the two shapes the level reader produces: a *tight*
//! mosaic whose inputs tile the output exactly, and an *extended* mosaic
//! whose inputs cover a subset and the rest is nodata. Inputs must share the
//! output's pixel layout and resolution; the mosaic never resamples.

use anyhow::{Result, ensure};
use terratiles_core::{RasterDescriptor, RasterReader, RasterSource};

/// Relative tolerance when checking that an input sits on the output grid.
const GRID_EPSILON: f64 = 1e-6;

struct PlacedInput {
	source: RasterReader,
	/// Output pixel column of the input's left edge (may be negative).
	offset_x: i64,
	/// Output pixel row of the input's top edge (may be negative).
	offset_y: i64,
	line: Vec<u8>,
}

/// A lazy mosaic of grid-aligned inputs over a caller-chosen extent.
pub struct MosaicImage {
	descriptor: RasterDescriptor,
	inputs: Vec<PlacedInput>,
}

impl MosaicImage {
	/// Builds a mosaic producing `descriptor`; each input is placed by its
	/// own bbox. Overlaps resolve to the first input in `inputs` order.
	pub fn new(descriptor: RasterDescriptor, inputs: Vec<RasterReader>) -> Result<MosaicImage> {
		let res_x = descriptor.resolution_x();
		let res_y = descriptor.resolution_y();

		let mut placed = Vec::with_capacity(inputs.len());
		for source in inputs {
			let input = source.descriptor();
			ensure!(
				input.layout == descriptor.layout,
				"mosaic input layout {} differs from output layout {}",
				input.layout,
				descriptor.layout
			);
			ensure!(
				(input.resolution_x() - res_x).abs() <= res_x * GRID_EPSILON
					&& (input.resolution_y() - res_y).abs() <= res_y * GRID_EPSILON,
				"mosaic input resolution {}x{} differs from output resolution {res_x}x{res_y}",
				input.resolution_x(),
				input.resolution_y()
			);

			let offset_x = (input.bbox.xmin - descriptor.bbox.xmin) / res_x;
			let offset_y = (descriptor.bbox.ymax - input.bbox.ymax) / res_y;
			ensure!(
				(offset_x - offset_x.round()).abs() <= GRID_EPSILON && (offset_y - offset_y.round()).abs() <= GRID_EPSILON,
				"mosaic input at {} is not aligned with the output grid",
				input.bbox
			);

			let line = vec![0u8; input.line_bytes()];
			placed.push(PlacedInput {
				source,
				offset_x: offset_x.round() as i64,
				offset_y: offset_y.round() as i64,
				line,
			});
		}

		Ok(MosaicImage {
			descriptor,
			inputs: placed,
		})
	}
}

impl RasterSource for MosaicImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		ensure!(row < self.descriptor.height, "row {row} out of range");
		self.descriptor.write_nodata_line(out);

		let bpp = self.descriptor.layout.bytes_per_pixel();
		let out_width = self.descriptor.width as i64;

		// Later copies overwrite earlier ones, so walking the inputs in
		// reverse makes the first input in scan order win overlaps.
		for input in self.inputs.iter_mut().rev() {
			let (src_width, src_height) = {
				let d = input.source.descriptor();
				(d.width as i64, d.height as i64)
			};
			let local_row = row as i64 - input.offset_y;
			if local_row < 0 || local_row >= src_height {
				continue;
			}
			let first_out = input.offset_x.max(0);
			let last_out = (input.offset_x + src_width).min(out_width);
			if first_out >= last_out {
				continue;
			}

			input.source.read_line(local_row as usize, &mut input.line)?;

			let src_start = (first_out - input.offset_x) as usize * bpp;
			let src_end = (last_out - input.offset_x) as usize * bpp;
			let dst_start = first_out as usize * bpp;
			let dst_end = last_out as usize * bpp;
			out[dst_start..dst_end].copy_from_slice(&input.line[src_start..src_end]);
		}
		Ok(())
	}
}
