//! Axis-aligned bounding boxes with an owning CRS.

use anyhow::{Result, ensure};
use std::fmt;

/// An axis-aligned rectangle in the coordinates of one CRS.
///
/// Invariants `xmin < xmax` and `ymin < ymax` are checked at construction.
/// The CRS is carried as its authority code; all geometric operations require
/// both operands to be in the same CRS and it is the caller's job to
/// reproject first.
#[derive(Clone, Debug, PartialEq)]
pub struct BBox {
	pub xmin: f64,
	pub ymin: f64,
	pub xmax: f64,
	pub ymax: f64,
	pub crs: String,
}

impl BBox {
	pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, crs: &str) -> Result<BBox> {
		ensure!(
			xmin.is_finite() && ymin.is_finite() && xmax.is_finite() && ymax.is_finite(),
			"bounding box ({xmin}, {ymin}, {xmax}, {ymax}) contains non-finite coordinates"
		);
		ensure!(xmin < xmax, "bounding box must have xmin < xmax, got {xmin} >= {xmax}");
		ensure!(ymin < ymax, "bounding box must have ymin < ymax, got {ymin} >= {ymax}");
		Ok(BBox {
			xmin,
			ymin,
			xmax,
			ymax,
			crs: crs.to_string(),
		})
	}

	pub fn width(&self) -> f64 {
		self.xmax - self.xmin
	}

	pub fn height(&self) -> f64 {
		self.ymax - self.ymin
	}

	/// Same rectangle, relabelled with another CRS. Only valid between
	/// equivalent CRSs; real reprojection lives in `terratiles_raster`.
	pub fn with_crs(&self, crs: &str) -> BBox {
		BBox {
			crs: crs.to_string(),
			..self.clone()
		}
	}

	pub fn intersects(&self, other: &BBox) -> bool {
		self.xmin < other.xmax && other.xmin < self.xmax && self.ymin < other.ymax && other.ymin < self.ymax
	}

	/// Intersection of two boxes, `None` when they do not overlap.
	pub fn intersection(&self, other: &BBox) -> Option<BBox> {
		if !self.intersects(other) {
			return None;
		}
		Some(BBox {
			xmin: self.xmin.max(other.xmin),
			ymin: self.ymin.max(other.ymin),
			xmax: self.xmax.min(other.xmax),
			ymax: self.ymax.min(other.ymax),
			crs: self.crs.clone(),
		})
	}

	pub fn contains(&self, x: f64, y: f64) -> bool {
		x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
	}

	/// Clamps this box to `other`, keeping at least a degenerate sliver so the
	/// result stays a valid rectangle. Used to crop a request to a CRS
	/// validity envelope.
	pub fn cropped_to(&self, other: &BBox) -> Option<BBox> {
		self.intersection(other)
	}

	/// True when the two boxes differ by less than `epsilon` on every edge.
	pub fn approx_eq(&self, other: &BBox, epsilon: f64) -> bool {
		(self.xmin - other.xmin).abs() < epsilon
			&& (self.ymin - other.ymin).abs() < epsilon
			&& (self.xmax - other.xmax).abs() < epsilon
			&& (self.ymax - other.ymax).abs() < epsilon
	}
}

impl fmt::Display for BBox {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"[{}, {}, {}, {} @ {}]",
			self.xmin, self.ymin, self.xmax, self.ymax, self.crs
		)
	}
}

#[cfg(test)]
mod tests {
	use super::BBox;

	fn bbox(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> BBox {
		BBox::new(xmin, ymin, xmax, ymax, "EPSG:3857").unwrap()
	}

	#[test]
	fn construction_validates_edges() {
		assert!(BBox::new(0.0, 0.0, 1.0, 1.0, "EPSG:3857").is_ok());
		assert!(BBox::new(1.0, 0.0, 0.0, 1.0, "EPSG:3857").is_err());
		assert!(BBox::new(0.0, 1.0, 1.0, 0.0, "EPSG:3857").is_err());
		assert!(BBox::new(0.0, f64::NAN, 1.0, 1.0, "EPSG:3857").is_err());
	}

	#[test]
	fn intersection_overlapping() {
		let a = bbox(0.0, 0.0, 10.0, 10.0);
		let b = bbox(5.0, 5.0, 15.0, 15.0);
		let i = a.intersection(&b).unwrap();
		assert_eq!((i.xmin, i.ymin, i.xmax, i.ymax), (5.0, 5.0, 10.0, 10.0));
	}

	#[test]
	fn intersection_disjoint_is_none() {
		let a = bbox(0.0, 0.0, 1.0, 1.0);
		let b = bbox(2.0, 2.0, 3.0, 3.0);
		assert!(a.intersection(&b).is_none());
		assert!(!a.intersects(&b));
	}

	#[test]
	fn touching_edges_do_not_intersect() {
		let a = bbox(0.0, 0.0, 1.0, 1.0);
		let b = bbox(1.0, 0.0, 2.0, 1.0);
		assert!(!a.intersects(&b));
	}

	#[test]
	fn dimensions() {
		let b = bbox(-100.0, -100.0, 356.0, 356.0);
		assert_eq!(b.width(), 456.0);
		assert_eq!(b.height(), 456.0);
	}
}
