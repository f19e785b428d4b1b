//! Service switches, global allow lists and storage policy.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WmsLimits {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_max_size")]
	pub max_width: usize,
	#[serde(default = "default_max_size")]
	pub max_height: usize,
}

impl Default for WmsLimits {
	fn default() -> Self {
		WmsLimits {
			enabled: true,
			max_width: default_max_size(),
			max_height: default_max_size(),
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceSwitch {
	#[serde(default = "default_true")]
	pub enabled: bool,
}

impl Default for ServiceSwitch {
	fn default() -> Self {
		ServiceSwitch { enabled: true }
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
	#[serde(default = "default_attempts")]
	pub attempts: u32,
	#[serde(default = "default_backoff")]
	pub backoff_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		RetryConfig {
			attempts: default_attempts(),
			backoff_ms: default_backoff(),
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServicesConfig {
	#[serde(default)]
	pub wms: WmsLimits,
	#[serde(default)]
	pub wmts: ServiceSwitch,
	#[serde(default)]
	pub tms: ServiceSwitch,

	/// Globally served formats (MIME types). Empty means every supported
	/// format.
	#[serde(default)]
	pub formats: Vec<String>,

	/// Globally allowed CRS codes. Empty means every registered CRS.
	#[serde(default)]
	pub crs: Vec<String>,

	/// Whether a layer's CRS restriction list also admits equivalents of its
	/// entries.
	#[serde(default = "default_true")]
	pub expand_crs_equivalences: bool,

	/// Extra equivalence rows on top of the built-in table.
	#[serde(default)]
	pub crs_equivalences: Vec<Vec<String>>,

	#[serde(default)]
	pub storage_retry: RetryConfig,

	/// Period of the task revalidating object-store contexts.
	#[serde(default = "default_reconnect")]
	pub reconnect_interval_seconds: u64,
}

impl Default for ServicesConfig {
	fn default() -> Self {
		ServicesConfig {
			wms: WmsLimits::default(),
			wmts: ServiceSwitch::default(),
			tms: ServiceSwitch::default(),
			formats: Vec::new(),
			crs: Vec::new(),
			expand_crs_equivalences: true,
			crs_equivalences: Vec::new(),
			storage_retry: RetryConfig::default(),
			reconnect_interval_seconds: default_reconnect(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_max_size() -> usize {
	4096
}

fn default_attempts() -> u32 {
	3
}

fn default_backoff() -> u64 {
	200
}

fn default_reconnect() -> u64 {
	300
}
