//! Value-to-colour palette mapping.

use anyhow::{Result, ensure};
use terratiles_core::{Photometric, PixelLayout, RasterDescriptor, RasterReader, RasterSource, SampleFormat};

/// One palette stop: an input value and its RGBA colour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaletteStop {
	pub key: f64,
	pub color: [u8; 4],
}

/// A sorted table of colour stops with independent continuous/discrete
/// flags for the RGB side and the alpha channel.
///
/// Keys below the first stop clamp to it, keys above the last clamp to the
/// last. Continuous channels interpolate linearly between the bracketing
/// stops; discrete channels take the lower stop.
#[derive(Clone, Debug)]
pub struct Palette {
	stops: Vec<PaletteStop>,
	pub continuous_rgb: bool,
	pub continuous_alpha: bool,
	/// Suppress the alpha output entirely (3 output channels instead of 4).
	pub no_alpha: bool,
}

impl Palette {
	pub fn new(mut stops: Vec<PaletteStop>, continuous_rgb: bool, continuous_alpha: bool, no_alpha: bool) -> Result<Palette> {
		ensure!(!stops.is_empty(), "a palette needs at least one stop");
		ensure!(
			stops.iter().all(|s| s.key.is_finite()),
			"palette stop keys must be finite"
		);
		stops.sort_by(|a, b| a.key.total_cmp(&b.key));
		Ok(Palette {
			stops,
			continuous_rgb,
			continuous_alpha,
			no_alpha,
		})
	}

	pub fn output_channels(&self) -> u8 {
		if self.no_alpha { 3 } else { 4 }
	}

	/// Maps `value` to RGBA.
	pub fn lookup(&self, value: f64) -> [u8; 4] {
		let first = &self.stops[0];
		if value <= first.key {
			return first.color;
		}
		let last = &self.stops[self.stops.len() - 1];
		if value >= last.key {
			return last.color;
		}

		// `value` is strictly inside (first.key, last.key): find the
		// bracketing pair.
		let upper_index = self.stops.partition_point(|s| s.key <= value);
		let lower = &self.stops[upper_index - 1];
		let upper = &self.stops[upper_index];
		let t = (value - lower.key) / (upper.key - lower.key);

		let mut out = [0u8; 4];
		for c in 0..3 {
			out[c] = if self.continuous_rgb {
				lerp_u8(lower.color[c], upper.color[c], t)
			} else {
				lower.color[c]
			};
		}
		out[3] = if self.continuous_alpha {
			lerp_u8(lower.color[3], upper.color[3], t)
		} else {
			lower.color[3]
		};
		out
	}

	/// The palette resolved over the 8-bit key range, for paletted PNG
	/// output.
	pub fn table256(&self) -> [[u8; 4]; 256] {
		let mut table = [[0u8; 4]; 256];
		for (i, entry) in table.iter_mut().enumerate() {
			*entry = self.lookup(i as f64);
		}
		table
	}
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
	(f64::from(a) + (f64::from(b) - f64::from(a)) * t).round().clamp(0.0, 255.0) as u8
}

/// Lazy wrapper applying a palette to a single-channel raster.
pub struct PaletteImage {
	source: RasterReader,
	descriptor: RasterDescriptor,
	palette: Palette,
	line: Vec<u8>,
}

impl PaletteImage {
	pub fn new(source: RasterReader, palette: Palette) -> Result<PaletteImage> {
		let input = source.descriptor().clone();
		ensure!(
			input.layout.channels == 1,
			"palette input must be single-channel, got {} channels",
			input.layout.channels
		);

		let layout = PixelLayout::new(palette.output_channels(), SampleFormat::U8, Photometric::Rgb)?;
		let nodata_color = palette.lookup(input.nodata[0]);
		let nodata = (0..layout.channels).map(|c| f64::from(nodata_color[c as usize])).collect();
		let descriptor = RasterDescriptor::new(input.width, input.height, layout, input.bbox.clone(), nodata)?;

		let line = vec![0u8; input.line_bytes()];
		Ok(PaletteImage {
			source,
			descriptor,
			palette,
			line,
		})
	}
}

impl RasterSource for PaletteImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		let input = self.source.descriptor().clone();
		self.source.read_line(row, &mut self.line)?;

		let channels = self.descriptor.layout.channels as usize;
		for x in 0..self.descriptor.width {
			let value = input.layout.sample.get(&self.line, x);
			let color = self.palette.lookup(value);
			out[x * channels..x * channels + channels].copy_from_slice(&color[0..channels]);
		}
		Ok(())
	}
}
