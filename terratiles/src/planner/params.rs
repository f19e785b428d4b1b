//! KVP parameter handling.
//!
//! OGC KVP keys are case-insensitive; values containing `<` or `>` are
//! refused outright so nothing a client sends can reach a generated XML
//! document. The refusal surfaces as the error class the parameter would
//! produce anyway (an injected LAYERS value reads as an unknown layer).

use std::collections::HashMap;
use terratiles_core::{ServiceError, error::sanitize};

/// Parsed request parameters, keys uppercased.
#[derive(Clone, Debug, Default)]
pub struct Params {
	map: HashMap<String, String>,
}

impl Params {
	pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Result<Params, ServiceError> {
		let mut map = HashMap::new();
		for (key, value) in pairs {
			let key = key.to_uppercase();
			if value.contains('<') || value.contains('>') {
				return Err(forbidden_value_error(&key, &value));
			}
			map.insert(key, value);
		}
		Ok(Params { map })
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.map.get(key).map(String::as_str)
	}

	/// The value of `key`, or the empty string.
	pub fn get_or_empty(&self, key: &str) -> &str {
		self.get(key).unwrap_or("")
	}

	pub fn require(&self, key: &str) -> Result<&str, ServiceError> {
		self.get(key).ok_or_else(|| ServiceError::MissingParameter { name: key.to_string() })
	}

	pub fn require_u32(&self, key: &str) -> Result<u32, ServiceError> {
		self.require(key)?.parse().map_err(|_| ServiceError::InvalidParameter {
			name: key.to_string(),
			reason: "not a non-negative integer".to_string(),
		})
	}

	pub fn require_size(&self, key: &str) -> Result<usize, ServiceError> {
		let value: usize = self.require(key)?.parse().map_err(|_| ServiceError::InvalidParameter {
			name: key.to_string(),
			reason: "not a positive integer".to_string(),
		})?;
		if value == 0 {
			return Err(ServiceError::InvalidParameter {
				name: key.to_string(),
				reason: "must be positive".to_string(),
			});
		}
		Ok(value)
	}

	/// Parses `key` as a comma-separated list of four floats.
	pub fn require_bbox(&self, key: &str) -> Result<[f64; 4], ServiceError> {
		let raw = self.require(key)?;
		let parts: Vec<f64> = raw.split(',').filter_map(|p| p.trim().parse().ok()).collect();
		if parts.len() != 4 || raw.split(',').count() != 4 {
			return Err(ServiceError::InvalidParameter {
				name: key.to_string(),
				reason: "expected four comma-separated numbers".to_string(),
			});
		}
		Ok([parts[0], parts[1], parts[2], parts[3]])
	}
}

/// The error class for a value carrying forbidden markup characters.
fn forbidden_value_error(key: &str, value: &str) -> ServiceError {
	match key {
		"LAYER" | "LAYERS" | "QUERY_LAYERS" => ServiceError::UnknownLayer { id: sanitize(value) },
		"STYLE" | "STYLES" => ServiceError::UnknownStyle { id: sanitize(value) },
		_ => ServiceError::InvalidParameter {
			name: key.to_string(),
			reason: "contains forbidden characters".to_string(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn params(pairs: &[(&str, &str)]) -> Result<Params, ServiceError> {
		Params::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
	}

	#[test]
	fn keys_are_case_insensitive() {
		let p = params(&[("service", "WMS"), ("Request", "GetMap")]).unwrap();
		assert_eq!(p.get("SERVICE"), Some("WMS"));
		assert_eq!(p.require("REQUEST").unwrap(), "GetMap");
	}

	#[test]
	fn missing_parameter() {
		let p = params(&[]).unwrap();
		let err = p.require("LAYERS").unwrap_err();
		assert_eq!(err.ogc_code(), "MissingParameterValue");
	}

	#[test]
	fn forbidden_markup_in_layers_reads_as_unknown_layer() {
		let err = params(&[("LAYERS", "dem<script>")]).unwrap_err();
		assert_eq!(err.ogc_code(), "LayerNotDefined");
		assert!(!err.to_string().contains('<'));
	}

	#[test]
	fn forbidden_markup_elsewhere_is_invalid_parameter() {
		let err = params(&[("FORMAT", "image/<png")]).unwrap_err();
		assert_eq!(err.ogc_code(), "InvalidParameterValue");
	}

	#[test]
	fn bbox_parsing() {
		let p = params(&[("BBOX", "0,0,256,256")]).unwrap();
		assert_eq!(p.require_bbox("BBOX").unwrap(), [0.0, 0.0, 256.0, 256.0]);

		let p = params(&[("BBOX", "0,0,256")]).unwrap();
		assert!(p.require_bbox("BBOX").is_err());

		let p = params(&[("BBOX", "a,b,c,d")]).unwrap();
		assert!(p.require_bbox("BBOX").is_err());
	}

	#[test]
	fn size_parsing() {
		let p = params(&[("WIDTH", "256"), ("HEIGHT", "0"), ("COL", "-3")]).unwrap();
		assert_eq!(p.require_size("WIDTH").unwrap(), 256);
		assert!(p.require_size("HEIGHT").is_err());
		assert!(p.require_u32("COL").is_err());
	}
}
