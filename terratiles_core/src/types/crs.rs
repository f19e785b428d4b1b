//! Coordinate reference systems and the process-wide CRS registry.
//!
//! A [`Crs`] is pure metadata: the authority code, a Proj.4 definition
//! string, axis-order and unit information, and the geographic envelope the
//! CRS is valid in. Actual coordinate transforms are built from the
//! definition strings by `terratiles_raster`.
//!
//! The [`CrsRegistry`] is loaded once at startup from the services
//! descriptor. Equivalence classes ("these codes name the same projection")
//! make reprojection between members a no-op relabel.

use super::BBox;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;

/// Metres per degree on the WGS84 ellipsoid at the equator, used to compare
/// resolutions across geographic and projected CRSs.
pub const METRES_PER_DEGREE: f64 = 111_319.49079327358;

/// One coordinate reference system.
#[derive(Clone, Debug)]
pub struct Crs {
	/// Authority code, e.g. `EPSG:3857` or `CRS:84`. Stored uppercase.
	pub code: String,
	/// Proj.4 definition string.
	pub proj4: String,
	/// True when the authority defines the first axis as latitude. WMS 1.3.0
	/// swaps BBOX axes for these; everything downstream sees x=lon.
	pub lat_lon_order: bool,
	/// True when coordinates are degrees.
	pub geographic: bool,
	/// CRS units per metre factor, 1.0 for projected metric CRSs.
	pub metres_per_unit: f64,
	/// Area of use in lon/lat degrees (`CRS:84`).
	pub validity: BBox,
}

impl Crs {
	/// The CRS validity envelope expressed as lon/lat degrees.
	pub fn validity_lonlat(&self) -> &BBox {
		&self.validity
	}
}

/// Registry of known CRSs plus their equivalence classes.
#[derive(Debug, Default)]
pub struct CrsRegistry {
	by_code: HashMap<String, Arc<Crs>>,
	equivalence_class: HashMap<String, u32>,
	next_class: u32,
}

impl CrsRegistry {
	pub fn new() -> CrsRegistry {
		CrsRegistry::default()
	}

	/// A registry preloaded with the CRSs every deployment needs.
	pub fn with_defaults() -> CrsRegistry {
		let world = BBox::new(-180.0, -90.0, 180.0, 90.0, "CRS:84").unwrap();
		let mercator_world = BBox::new(-180.0, -85.06, 180.0, 85.06, "CRS:84").unwrap();
		let france = BBox::new(-9.86, 41.15, 10.38, 51.56, "CRS:84").unwrap();

		let mut registry = CrsRegistry::new();
		registry.register(Crs {
			code: "CRS:84".to_string(),
			proj4: "+proj=longlat +datum=WGS84 +no_defs".to_string(),
			lat_lon_order: false,
			geographic: true,
			metres_per_unit: METRES_PER_DEGREE,
			validity: world.clone(),
		});
		registry.register(Crs {
			code: "EPSG:4326".to_string(),
			proj4: "+proj=longlat +datum=WGS84 +no_defs".to_string(),
			lat_lon_order: true,
			geographic: true,
			metres_per_unit: METRES_PER_DEGREE,
			validity: world,
		});
		registry.register(Crs {
			code: "EPSG:3857".to_string(),
			proj4: "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"
				.to_string(),
			lat_lon_order: false,
			geographic: false,
			metres_per_unit: 1.0,
			validity: mercator_world.clone(),
		});
		registry.register(Crs {
			code: "EPSG:900913".to_string(),
			proj4: "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"
				.to_string(),
			lat_lon_order: false,
			geographic: false,
			metres_per_unit: 1.0,
			validity: mercator_world,
		});
		registry.register(Crs {
			code: "EPSG:2154".to_string(),
			proj4: "+proj=lcc +lat_1=49 +lat_2=44 +lat_0=46.5 +lon_0=3 +x_0=700000 +y_0=6600000 +ellps=GRS80 +units=m +no_defs"
				.to_string(),
			lat_lon_order: false,
			geographic: false,
			metres_per_unit: 1.0,
			validity: france,
		});

		registry.add_equivalence(&["EPSG:4326", "CRS:84"]);
		registry.add_equivalence(&["EPSG:3857", "EPSG:900913"]);
		registry
	}

	pub fn register(&mut self, crs: Crs) {
		let code = crs.code.to_uppercase();
		self.by_code.insert(code, Arc::new(crs));
	}

	/// Marks all `codes` as naming the same projection. Codes already in a
	/// class pull the new ones into theirs.
	pub fn add_equivalence(&mut self, codes: &[&str]) {
		let existing = codes
			.iter()
			.find_map(|c| self.equivalence_class.get(&c.to_uppercase()).copied());
		let class = existing.unwrap_or_else(|| {
			self.next_class += 1;
			self.next_class
		});
		for code in codes {
			self.equivalence_class.insert(code.to_uppercase(), class);
		}
	}

	pub fn get(&self, code: &str) -> Option<Arc<Crs>> {
		self.by_code.get(&code.to_uppercase()).cloned()
	}

	pub fn require(&self, code: &str) -> Result<Arc<Crs>> {
		self.get(code).ok_or_else(|| anyhow!("unknown CRS '{code}'"))
	}

	pub fn contains(&self, code: &str) -> bool {
		self.by_code.contains_key(&code.to_uppercase())
	}

	/// True when reprojection between the two codes is a no-op.
	pub fn are_equivalent(&self, a: &str, b: &str) -> bool {
		let a = a.to_uppercase();
		let b = b.to_uppercase();
		if a == b {
			return true;
		}
		match (self.equivalence_class.get(&a), self.equivalence_class.get(&b)) {
			(Some(ca), Some(cb)) => ca == cb,
			_ => false,
		}
	}

	/// All registered codes equivalent to `code`, including itself.
	pub fn equivalents(&self, code: &str) -> Vec<String> {
		let code = code.to_uppercase();
		let Some(class) = self.equivalence_class.get(&code) else {
			return vec![code];
		};
		let mut out: Vec<String> = self
			.equivalence_class
			.iter()
			.filter(|(_, c)| *c == class)
			.map(|(k, _)| k.clone())
			.collect();
		out.sort();
		out
	}
}
