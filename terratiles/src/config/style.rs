//! Style descriptors and their conversion into pipeline transforms.

use anyhow::{Context, Result};
use serde::Deserialize;
use terratiles_raster::style::{Aspect, GradientKernel, Hillshade, Palette, PaletteStop, Slope, SlopeUnit};
use terratiles_raster::{Kernel, Style, StyleTransform};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PaletteStopConfig {
	pub value: f64,
	/// RGBA, 0..=255 each.
	pub color: [u8; 4],
}

/// One transform in a style's list, tagged by `type`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformConfig {
	Palette {
		stops: Vec<PaletteStopConfig>,
		#[serde(default = "default_true")]
		continuous_rgb: bool,
		#[serde(default = "default_true")]
		continuous_alpha: bool,
		#[serde(default)]
		no_alpha: bool,
	},
	Hillshade {
		#[serde(default = "default_azimuth")]
		azimuth: f64,
		#[serde(default = "default_zenith")]
		zenith: f64,
		#[serde(default = "default_z_factor")]
		z_factor: f64,
		#[serde(default = "default_kernel")]
		interpolation: String,
	},
	Slope {
		#[serde(default = "default_algorithm")]
		algorithm: String,
		#[serde(default = "default_unit")]
		unit: String,
		#[serde(default = "default_max_slope")]
		max_slope: f64,
		#[serde(default = "default_slope_nodata")]
		nodata: f64,
	},
	Aspect {
		#[serde(default = "default_algorithm")]
		algorithm: String,
		#[serde(default = "default_min_slope")]
		min_slope: f64,
	},
}

impl TransformConfig {
	fn build(&self) -> Result<StyleTransform> {
		Ok(match self {
			TransformConfig::Palette {
				stops,
				continuous_rgb,
				continuous_alpha,
				no_alpha,
			} => {
				let stops = stops
					.iter()
					.map(|s| PaletteStop {
						key: s.value,
						color: s.color,
					})
					.collect();
				StyleTransform::Palette(Palette::new(stops, *continuous_rgb, *continuous_alpha, *no_alpha)?)
			}
			TransformConfig::Hillshade {
				azimuth,
				zenith,
				z_factor,
				interpolation,
			} => StyleTransform::Hillshade(Hillshade {
				azimuth_deg: *azimuth,
				zenith_deg: *zenith,
				z_factor: *z_factor,
				kernel: Kernel::parse(interpolation)?,
			}),
			TransformConfig::Slope {
				algorithm,
				unit,
				max_slope,
				nodata,
			} => StyleTransform::Slope(Slope {
				kernel: GradientKernel::parse(algorithm)?,
				unit: SlopeUnit::parse(unit)?,
				max_slope: *max_slope,
				output_nodata: *nodata,
			}),
			TransformConfig::Aspect { algorithm, min_slope } => StyleTransform::Aspect(Aspect {
				kernel: GradientKernel::parse(algorithm)?,
				min_slope_deg: *min_slope,
			}),
		})
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StyleConfig {
	pub id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default, rename = "abstract")]
	pub abstract_text: String,
	#[serde(default)]
	pub legend_urls: Vec<String>,
	#[serde(default)]
	pub transforms: Vec<TransformConfig>,
}

impl StyleConfig {
	pub fn build(&self) -> Result<Style> {
		let transforms = self
			.transforms
			.iter()
			.map(|t| t.build())
			.collect::<Result<Vec<_>>>()
			.with_context(|| format!("style '{}'", self.id))?;
		Ok(Style {
			id: self.id.clone(),
			title: if self.title.is_empty() { self.id.clone() } else { self.title.clone() },
			abstract_text: self.abstract_text.clone(),
			legend_urls: self.legend_urls.clone(),
			transforms,
		})
	}
}

fn default_true() -> bool {
	true
}

fn default_azimuth() -> f64 {
	315.0
}

fn default_zenith() -> f64 {
	45.0
}

fn default_z_factor() -> f64 {
	1.0
}

fn default_kernel() -> String {
	"linear".to_string()
}

fn default_algorithm() -> String {
	"horn".to_string()
}

fn default_unit() -> String {
	"degrees".to_string()
}

fn default_max_slope() -> f64 {
	90.0
}

fn default_slope_nodata() -> f64 {
	-1.0
}

fn default_min_slope() -> f64 {
	1.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identity_style() {
		let config: StyleConfig = serde_yaml_ng::from_str("id: normal").unwrap();
		let style = config.build().unwrap();
		assert!(style.is_identity());
		assert_eq!(style.title, "normal");
	}

	#[test]
	fn palette_style() {
		let config: StyleConfig = serde_yaml_ng::from_str(
			r"
id: heat
title: Heat colours
transforms:
  - type: palette
    stops:
      - { value: 0, color: [0, 0, 0, 64] }
      - { value: 255, color: [255, 255, 255, 64] }
",
		)
		.unwrap();
		let style = config.build().unwrap();
		assert_eq!(style.output_channels(1), 4);
		assert!(style.palette().is_some());
	}

	#[test]
	fn dem_style_chain() {
		let config: StyleConfig = serde_yaml_ng::from_str(
			r"
id: shaded
transforms:
  - { type: hillshade, azimuth: 300, zenith: 30, z_factor: 2.0, interpolation: cubic }
",
		)
		.unwrap();
		let style = config.build().unwrap();
		assert_eq!(style.output_channels(1), 1);
		assert_eq!(style.preferred_kernel(), Some(Kernel::Cubic));
	}

	#[test]
	fn bad_algorithm_is_rejected() {
		let config: StyleConfig = serde_yaml_ng::from_str(
			"id: s\ntransforms:\n  - { type: slope, algorithm: sobel }",
		)
		.unwrap();
		assert!(config.build().is_err());
	}
}
