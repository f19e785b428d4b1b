//! Layer descriptors: the published surface over a pyramid.

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayerServices {
	#[serde(default = "default_true")]
	pub wms: bool,
	#[serde(default = "default_true")]
	pub wmts: bool,
	#[serde(default = "default_true")]
	pub tms: bool,
}

impl Default for LayerServices {
	fn default() -> Self {
		LayerServices {
			wms: true,
			wmts: true,
			tms: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayerConfig {
	pub id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default, rename = "abstract")]
	pub abstract_text: String,
	#[serde(default)]
	pub keywords: Vec<String>,
	/// The data pyramid this layer publishes.
	pub pyramid: String,
	/// Allowed styles; the first is the default. Empty means identity only.
	#[serde(default)]
	pub styles: Vec<String>,
	/// CRSs this layer will answer WMS requests in. Empty means the global
	/// list.
	#[serde(default)]
	pub wms_crs: Vec<String>,
	#[serde(default)]
	pub services: LayerServices,
	/// Kernel used when WMS must resample or reproject.
	#[serde(default = "default_resampling")]
	pub resampling: String,
	/// External WMS endpoint answering GetFeatureInfo for this layer.
	#[serde(default)]
	pub feature_info_url: Option<String>,
}

fn default_true() -> bool {
	true
}

fn default_resampling() -> String {
	"linear".to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn minimal_layer() {
		let layer: LayerConfig = serde_yaml_ng::from_str("id: dem\npyramid: dem").unwrap();
		assert!(layer.services.wms && layer.services.wmts && layer.services.tms);
		assert_eq!(layer.resampling, "linear");
		assert!(layer.styles.is_empty());
		assert!(layer.feature_info_url.is_none());
	}

	#[test]
	fn service_flags() {
		let layer: LayerConfig =
			serde_yaml_ng::from_str("id: ortho\npyramid: ortho\nservices: { wms: false }").unwrap();
		assert!(!layer.services.wms);
		assert!(layer.services.wmts);
	}
}
