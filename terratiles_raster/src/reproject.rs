//! Point-based reprojection of a lazy raster onto a grid in another CRS.
//!
//! Every target pixel center maps through the inverse transform to a source
//! coordinate, where the source is sampled with the requested kernel. Pixels
//! that leave the validity envelope of either CRS become nodata. Equivalent
//! CRSs never reach this module — the planner relabels the bbox instead.
//!
//! The source is consumed strictly forward: rows are fetched sequentially
//! into a per-request cache, because projection curvature may revisit source
//! rows that a plain sliding window would already have dropped.

use crate::resample::Kernel;
use anyhow::{Context, Result, anyhow, bail, ensure};
use proj::Proj;
use terratiles_core::{BBox, Crs, RasterDescriptor, RasterReader, RasterSource};

/// Edge sample count when transforming a bbox between CRSs. Curved edges
/// (meridians under conic projections) bulge between corners; sampling keeps
/// the hull honest.
const DENSIFY_STEPS: usize = 20;

fn make_transform(from: &Crs, to: &Crs) -> Result<Proj> {
	Proj::new_known_crs(&from.proj4, &to.proj4, None)
		.with_context(|| format!("no transform from {} to {}", from.code, to.code))
}

/// Transforms `bbox` through `transform` by densified edge sampling,
/// labelling the result `to_code`. Points the projection rejects are
/// skipped; at least one must survive.
fn transform_bbox(bbox: &BBox, transform: &Proj, to_code: &str) -> Result<BBox> {
	let mut xmin = f64::INFINITY;
	let mut ymin = f64::INFINITY;
	let mut xmax = f64::NEG_INFINITY;
	let mut ymax = f64::NEG_INFINITY;

	let step_x = bbox.width() / DENSIFY_STEPS as f64;
	let step_y = bbox.height() / DENSIFY_STEPS as f64;
	for i in 0..=DENSIFY_STEPS {
		for j in 0..=DENSIFY_STEPS {
			let x = bbox.xmin + step_x * i as f64;
			let y = bbox.ymin + step_y * j as f64;
			if let Ok((tx, ty)) = transform.convert((x, y)) {
				if tx.is_finite() && ty.is_finite() {
					xmin = xmin.min(tx);
					ymin = ymin.min(ty);
					xmax = xmax.max(tx);
					ymax = ymax.max(ty);
				}
			}
		}
	}

	if !(xmin.is_finite() && ymax.is_finite() && xmin < xmax && ymin < ymax) {
		bail!("bbox {bbox} does not transform into {to_code}");
	}
	BBox::new(xmin, ymin, xmax, ymax, to_code)
}

/// The CRS's validity envelope expressed in its own coordinates.
pub fn validity_in_crs(crs: &Crs) -> Result<BBox> {
	if crs.geographic {
		return Ok(crs.validity.with_crs(&crs.code));
	}
	let lonlat = Crs {
		code: "CRS:84".to_string(),
		proj4: "+proj=longlat +datum=WGS84 +no_defs".to_string(),
		lat_lon_order: false,
		geographic: true,
		metres_per_unit: terratiles_core::METRES_PER_DEGREE,
		validity: crs.validity.clone(),
	};
	let transform = make_transform(&lonlat, crs)?;
	transform_bbox(&crs.validity, &transform, &crs.code)
}

/// Reprojects `bbox` from `from` to `to`, cropping to the validity envelopes
/// first so an oversized request cannot push the projection outside its area
/// of use.
pub fn reproject_bbox(bbox: &BBox, from: &Crs, to: &Crs) -> Result<BBox> {
	ensure!(
		bbox.crs.eq_ignore_ascii_case(&from.code),
		"bbox is in {} but the source CRS is {}",
		bbox.crs,
		from.code
	);

	let valid_from = validity_in_crs(from)?;
	let valid_to_in_from = {
		let valid_to = validity_in_crs(to)?;
		let back = make_transform(to, from)?;
		transform_bbox(&valid_to, &back, &from.code)?
	};

	let cropped = bbox
		.intersection(&valid_from)
		.and_then(|b| b.intersection(&valid_to_in_from))
		.ok_or_else(|| anyhow!("bbox {bbox} lies outside the area of use of {}", to.code))?;

	let forward = make_transform(from, to)?;
	transform_bbox(&cropped, &forward, &to.code)
}

/// A lazy raster presenting its source in another CRS on a caller-chosen
/// grid.
pub struct ReprojectedImage {
	source: RasterReader,
	descriptor: RasterDescriptor,
	kernel: Kernel,
	/// Target CRS -> source CRS, applied per pixel center.
	inverse: Proj,
	/// Validity of the target CRS in target coordinates.
	target_valid: BBox,
	/// Validity of the source CRS in source coordinates.
	source_valid: BBox,
	/// Kernel stretch when the target grid is coarser than the source.
	scale: f64,
	cache: Vec<Option<Vec<f64>>>,
	next_src_row: usize,
	line_bytes: Vec<u8>,
}

impl ReprojectedImage {
	pub fn new(
		source: RasterReader,
		target_bbox: BBox,
		width: usize,
		height: usize,
		source_crs: &Crs,
		target_crs: &Crs,
		kernel: Kernel,
	) -> Result<ReprojectedImage> {
		let src = source.descriptor().clone();
		ensure!(
			src.bbox.crs.eq_ignore_ascii_case(&source_crs.code),
			"source raster is in {} but the source CRS is {}",
			src.bbox.crs,
			source_crs.code
		);
		ensure!(
			target_bbox.crs.eq_ignore_ascii_case(&target_crs.code),
			"target bbox is in {} but the target CRS is {}",
			target_bbox.crs,
			target_crs.code
		);

		let descriptor = RasterDescriptor::new(width, height, src.layout, target_bbox, src.nodata.clone())?;

		let scale = (descriptor.resolution_x() * target_crs.metres_per_unit)
			/ (src.resolution_x() * source_crs.metres_per_unit);

		let cache = vec![None; src.height];
		let line_bytes = vec![0u8; src.line_bytes()];
		Ok(ReprojectedImage {
			source,
			descriptor,
			kernel,
			inverse: make_transform(target_crs, source_crs)?,
			target_valid: validity_in_crs(target_crs)?,
			source_valid: validity_in_crs(source_crs)?,
			scale,
			cache,
			next_src_row: 0,
			line_bytes,
		})
	}

	/// Returns source row `row` as f64 samples, reading forward through the
	/// source as needed. Rows are cached for the lifetime of the request.
	fn source_row(&mut self, row: usize) -> Result<&[f64]> {
		if self.cache[row].is_none() {
			let src = self.source.descriptor().clone();
			let channels = src.layout.channels as usize;
			while self.next_src_row <= row {
				let r = self.next_src_row;
				self.source.read_line(r, &mut self.line_bytes)?;
				let mut values = vec![0.0; src.width * channels];
				for (i, value) in values.iter_mut().enumerate() {
					*value = src.layout.sample.get(&self.line_bytes, i);
				}
				self.cache[r] = Some(values);
				self.next_src_row += 1;
			}
		}
		Ok(self.cache[row].as_ref().expect("row was just cached").as_slice())
	}

	/// Samples the source at fractional pixel coordinates with the kernel,
	/// renormalising over in-range taps. `false` when no tap lands inside.
	fn sample_at(&mut self, sx: f64, sy: f64, values: &mut [f64]) -> Result<bool> {
		let src = self.source.descriptor().clone();
		let channels = src.layout.channels as usize;
		let kernel = self.kernel;
		let scale = if kernel == Kernel::Nearest { 1.0 } else { self.scale.max(1.0) };
		let support = kernel.support() * scale;

		let first_y = (sy - support).ceil().max(0.0) as i64;
		let last_y = (sy + support).floor().min(src.height as f64 - 1.0) as i64;
		let first_x = (sx - support).ceil().max(0.0) as i64;
		let last_x = (sx + support).floor().min(src.width as f64 - 1.0) as i64;
		if first_y > last_y || first_x > last_x {
			return Ok(false);
		}

		let x_weights: Vec<f64> = (first_x..=last_x)
			.map(|tx| kernel.weight((tx as f64 - sx) / scale))
			.collect();

		// The cache fetches forward; taps above the highest row pulled so far
		// must be fetched in ascending order, which source_row guarantees.
		values.iter_mut().for_each(|v| *v = 0.0);
		let mut weight_sum = 0.0;
		for ty in first_y..=last_y {
			let wy = kernel.weight((ty as f64 - sy) / scale);
			if wy == 0.0 {
				continue;
			}
			let row = self.source_row(ty as usize)?;
			for (i, &wx) in x_weights.iter().enumerate() {
				if wx == 0.0 {
					continue;
				}
				let tx = (first_x + i as i64) as usize;
				let w = wy * wx;
				weight_sum += w;
				for c in 0..channels {
					values[c] += w * row[tx * channels + c];
				}
			}
		}

		if weight_sum.abs() < 1e-12 {
			return Ok(false);
		}
		for v in values.iter_mut() {
			*v /= weight_sum;
		}
		Ok(true)
	}
}

impl RasterSource for ReprojectedImage {
	fn descriptor(&self) -> &RasterDescriptor {
		&self.descriptor
	}

	fn read_line(&mut self, row: usize, out: &mut [u8]) -> Result<()> {
		ensure!(row < self.descriptor.height, "row {row} out of range");
		let src = self.source.descriptor().clone();
		let channels = src.layout.channels as usize;
		let sample = self.descriptor.layout.sample;

		let world_y = self.descriptor.bbox.ymax - (row as f64 + 0.5) * self.descriptor.resolution_y();
		let mut values = vec![0.0; channels];

		for x in 0..self.descriptor.width {
			let world_x = self.descriptor.bbox.xmin + (x as f64 + 0.5) * self.descriptor.resolution_x();

			let mut filled = false;
			if self.target_valid.contains(world_x, world_y) {
				if let Ok((sx_world, sy_world)) = self.inverse.convert((world_x, world_y)) {
					if self.source_valid.contains(sx_world, sy_world) {
						let sx = (sx_world - src.bbox.xmin) / src.resolution_x() - 0.5;
						let sy = (src.bbox.ymax - sy_world) / src.resolution_y() - 0.5;
						filled = self.sample_at(sx, sy, &mut values)?;
					}
				}
			}

			if filled {
				for c in 0..channels {
					sample.put(out, x * channels + c, values[c]);
				}
			} else {
				for (c, nodata) in self.descriptor.nodata.iter().enumerate() {
					sample.put(out, x * channels + c, *nodata);
				}
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use terratiles_core::{CrsRegistry, PixelLayout, RasterBuf};

	fn registry() -> CrsRegistry {
		CrsRegistry::with_defaults()
	}

	#[test]
	fn bbox_roundtrip_mercator() {
		let registry = registry();
		let mercator = registry.get("EPSG:3857").unwrap();
		let lonlat = registry.get("CRS:84").unwrap();

		let bbox = BBox::new(0.0, 0.0, 111319.49, 111325.14, "EPSG:3857").unwrap();
		let geo = reproject_bbox(&bbox, &mercator, &lonlat).unwrap();
		// One degree of longitude at the equator.
		assert_abs_diff_eq!(geo.xmin, 0.0, epsilon = 1e-6);
		assert_abs_diff_eq!(geo.xmax, 1.0, epsilon = 1e-3);

		let back = reproject_bbox(&geo, &lonlat, &mercator).unwrap();
		assert!(back.approx_eq(&bbox, 1.0), "roundtrip drifted: {back}");
	}

	#[test]
	fn validity_of_projected_crs_is_in_projected_units() {
		let registry = registry();
		let mercator = registry.get("EPSG:3857").unwrap();
		let valid = validity_in_crs(&mercator).unwrap();
		assert_eq!(valid.crs, "EPSG:3857");
		// Mercator's world is about +-20037km wide.
		assert!(valid.xmin < -2.0e7 && valid.xmax > 2.0e7);
	}

	#[test]
	fn out_of_area_bbox_is_rejected() {
		let registry = registry();
		let lonlat = registry.get("CRS:84").unwrap();
		let lambert = registry.get("EPSG:2154").unwrap();
		// Australia is well outside Lambert-93's area of use.
		let bbox = BBox::new(130.0, -30.0, 140.0, -20.0, "CRS:84").unwrap();
		assert!(reproject_bbox(&bbox, &lonlat, &lambert).is_err());
	}

	fn equator_source(size: usize) -> RasterReader {
		// A gradient over a square of Web-Mercator metres on the equator.
		let descriptor = RasterDescriptor::new(
			size,
			size,
			PixelLayout::gray_u8(),
			BBox::new(0.0, 0.0, size as f64 * 100.0, size as f64 * 100.0, "EPSG:3857").unwrap(),
			vec![255.0],
		)
		.unwrap();
		let mut buf = RasterBuf::new_nodata(descriptor);
		for y in 0..size {
			for x in 0..size {
				buf.set_sample(x, y, 0, (x % 200) as f64);
			}
		}
		Box::new(buf)
	}

	#[test]
	fn reprojected_gradient_keeps_columns() {
		let registry = registry();
		let mercator = registry.get("EPSG:3857").unwrap();
		let lonlat = registry.get("CRS:84").unwrap();

		let source = equator_source(64);
		let src_bbox = source.descriptor().bbox.clone();
		let geo_bbox = reproject_bbox(&src_bbox, &mercator, &lonlat).unwrap();

		let mut image = ReprojectedImage::new(source, geo_bbox, 64, 64, &mercator, &lonlat, Kernel::Nearest).unwrap();
		let buf = RasterBuf::from_source(&mut image).unwrap();

		// On the equator the x mapping is linear, so the gradient survives
		// within a pixel of drift.
		for x in [5usize, 20, 40, 60] {
			let got = buf.sample(x, 32, 0);
			assert!(
				(got - x as f64).abs() <= 1.0,
				"column {x} mapped to value {got}"
			);
		}
	}

	#[test]
	fn pixels_outside_source_validity_are_nodata() {
		let registry = registry();
		let mercator = registry.get("EPSG:3857").unwrap();
		let lonlat = registry.get("CRS:84").unwrap();

		let source = equator_source(16);
		// Target stretches to latitude 89, far beyond Mercator's validity.
		let target = BBox::new(0.0, 85.5, 0.02, 89.0, "CRS:84").unwrap();
		let mut image = ReprojectedImage::new(source, target, 8, 8, &mercator, &lonlat, Kernel::Linear).unwrap();
		let buf = RasterBuf::from_source(&mut image).unwrap();
		assert_eq!(buf.sample(4, 0, 0), 255.0, "above 85.06N must be nodata");
	}
}
