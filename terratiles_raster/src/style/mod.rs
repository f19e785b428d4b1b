//! Per-pixel style transforms: palette, hillshade, slope, aspect.
//!
//! A [`Style`] is an ordered list of transforms applied as lazy wrappers
//! between the geometric pipeline and the encoder. The output channel count
//! is a pure function of the list, fixed when the style is built, so the
//! encoder can validate before pulling the first line.

mod aspect;
mod focal;
mod hillshade;
mod palette;
mod slope;

pub use aspect::Aspect;
pub use hillshade::Hillshade;
pub use palette::{Palette, PaletteStop};
pub use slope::{GradientKernel, Slope, SlopeUnit};

use crate::resample::Kernel;
use anyhow::Result;
use terratiles_core::RasterReader;

/// One pixel transform.
#[derive(Clone, Debug)]
pub enum StyleTransform {
	Palette(Palette),
	Hillshade(Hillshade),
	Slope(Slope),
	Aspect(Aspect),
}

impl StyleTransform {
	fn output_channels(&self, _input: u8) -> u8 {
		match self {
			StyleTransform::Palette(palette) => palette.output_channels(),
			StyleTransform::Hillshade(_) | StyleTransform::Slope(_) | StyleTransform::Aspect(_) => 1,
		}
	}

	fn wrap(&self, source: RasterReader) -> Result<RasterReader> {
		Ok(match self {
			StyleTransform::Palette(palette) => Box::new(palette::PaletteImage::new(source, palette.clone())?),
			StyleTransform::Hillshade(hillshade) => Box::new(hillshade::HillshadeImage::new(source, *hillshade)?),
			StyleTransform::Slope(slope) => Box::new(slope::SlopeImage::new(source, *slope)?),
			StyleTransform::Aspect(aspect) => Box::new(aspect::AspectImage::new(source, *aspect)?),
		})
	}
}

/// A named, shareable sequence of pixel transforms.
#[derive(Clone, Debug)]
pub struct Style {
	pub id: String,
	pub title: String,
	pub abstract_text: String,
	pub legend_urls: Vec<String>,
	pub transforms: Vec<StyleTransform>,
}

impl Style {
	/// The identity style: no transforms, pixels pass through untouched.
	pub fn identity(id: &str) -> Style {
		Style {
			id: id.to_string(),
			title: id.to_string(),
			abstract_text: String::new(),
			legend_urls: Vec::new(),
			transforms: Vec::new(),
		}
	}

	pub fn is_identity(&self) -> bool {
		self.transforms.is_empty()
	}

	/// Channel count after applying the whole list to `input` channels.
	pub fn output_channels(&self, input: u8) -> u8 {
		self
			.transforms
			.iter()
			.fold(input, |channels, transform| transform.output_channels(channels))
	}

	/// Wraps `source` in the transform chain, first transform innermost.
	pub fn apply(&self, source: RasterReader) -> Result<RasterReader> {
		let mut current = source;
		for transform in &self.transforms {
			current = transform.wrap(current)?;
		}
		Ok(current)
	}

	/// The palette of the final palette transform, when the style has one.
	/// Drives paletted PNG output.
	pub fn palette(&self) -> Option<&Palette> {
		self.transforms.iter().rev().find_map(|t| match t {
			StyleTransform::Palette(palette) => Some(palette),
			_ => None,
		})
	}

	/// Kernel preference carried by a hillshade transform, used when the
	/// pipeline must resample before shading.
	pub fn preferred_kernel(&self) -> Option<Kernel> {
		self.transforms.iter().find_map(|t| match t {
			StyleTransform::Hillshade(hillshade) => Some(hillshade.kernel),
			_ => None,
		})
	}
}
