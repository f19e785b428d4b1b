//! Three-line rolling window shared by the focal (3x3) style transforms.

use anyhow::{Result, ensure};
use terratiles_core::{RasterDescriptor, RasterReader};

/// Keeps the previous, current and next source lines of a single-channel
/// raster as `f64` samples. Rows are advanced monotonically; edges use
/// reflected boundary conditions (row -1 mirrors row 1, column -1 mirrors
/// column 1).
pub(crate) struct FocalWindow {
	source: RasterReader,
	rows: [Vec<f64>; 3],
	/// Row index currently held by `rows[1]`, or -1 before the first
	/// `advance_to`.
	current: i64,
	line: Vec<u8>,
}

impl FocalWindow {
	pub fn new(source: RasterReader) -> Result<FocalWindow> {
		let descriptor = source.descriptor();
		ensure!(
			descriptor.layout.channels == 1,
			"focal transforms need a single-channel input, got {} channels",
			descriptor.layout.channels
		);
		ensure!(descriptor.height >= 2, "focal transforms need at least two lines");
		let width = descriptor.width;
		let line = vec![0u8; descriptor.line_bytes()];
		Ok(FocalWindow {
			source,
			rows: [vec![0.0; width], vec![0.0; width], vec![0.0; width]],
			current: -1,
			line,
		})
	}

	pub fn descriptor(&self) -> &RasterDescriptor {
		self.source.descriptor()
	}

	fn load(&mut self, row: usize, slot: usize) -> Result<()> {
		let descriptor = self.source.descriptor().clone();
		self.source.read_line(row, &mut self.line)?;
		for (x, value) in self.rows[slot].iter_mut().enumerate() {
			*value = descriptor.layout.sample.get(&self.line, x);
		}
		Ok(())
	}

	/// Centres the window on `row`. Rows must not decrease between calls.
	pub fn advance_to(&mut self, row: usize) -> Result<()> {
		let height = self.source.descriptor().height;
		ensure!(row < height, "row {row} out of range");
		ensure!(
			row as i64 >= self.current,
			"focal window cannot move backwards from {} to {row}",
			self.current
		);

		if self.current < 0 {
			self.load(0, 1)?;
			self.load(1, 2)?;
			// Reflection across the top edge: row -1 mirrors row 1.
			self.rows[0] = self.rows[2].clone();
			self.current = 0;
		}

		while (self.current as usize) < row {
			let next = self.current as usize + 2;
			self.rows.swap(0, 1);
			self.rows.swap(1, 2);
			if next < height {
				self.load(next, 2)?;
			} else {
				// Reflection across the bottom edge.
				self.rows[2] = self.rows[0].clone();
			}
			self.current += 1;
		}
		Ok(())
	}

	/// Sample at column `x + dx` of the window row `1 + dy`, with column
	/// reflection at the edges.
	pub fn value(&self, x: usize, dx: i64, dy: i64) -> f64 {
		let width = self.rows[1].len() as i64;
		let mut xi = x as i64 + dx;
		if xi < 0 {
			xi = -xi;
		}
		if xi >= width {
			xi = 2 * (width - 1) - xi;
		}
		self.rows[(1 + dy) as usize][xi as usize]
	}

	/// The 3x3 neighbourhood around (x, row), row-major.
	pub fn neighbourhood(&self, x: usize) -> [f64; 9] {
		let mut out = [0.0; 9];
		for dy in -1..=1i64 {
			for dx in -1..=1i64 {
				out[((dy + 1) * 3 + dx + 1) as usize] = self.value(x, dx, dy);
			}
		}
		out
	}
}
