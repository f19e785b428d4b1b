//! WMS GetMap planning.

use crate::catalog::Catalog;
use crate::planner::tile::style_encode;
use crate::planner::{Params, PlanOutput};
use anyhow::{Result, anyhow};
use terratiles_core::{BBox, RasterReader, RasterSource, ServiceError, TileFormat};
use terratiles_pyramid::read_region;
use terratiles_raster::{ReprojectedImage, ResampledImage, reproject_bbox};

/// WMS version negotiation: no version asks for the newest; anything above
/// what we speak falls to 1.3.0; anything else falls to 1.1.1.
pub fn negotiate_wms_version(requested: Option<&str>) -> &'static str {
	let Some(requested) = requested else {
		return "1.3.0";
	};
	if requested == "1.3.0" {
		return "1.3.0";
	}
	let mut parts = requested.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
	let version = (
		parts.next().unwrap_or(0),
		parts.next().unwrap_or(0),
		parts.next().unwrap_or(0),
	);
	if version > (1, 3, 0) { "1.3.0" } else { "1.1.1" }
}

/// Plans and renders a GetMap request.
pub async fn get_map(catalog: &Catalog, params: &Params) -> Result<PlanOutput> {
	let version = negotiate_wms_version(params.get("VERSION"));

	// Layer and service gate.
	if !catalog.services.wms.enabled {
		return Err(anyhow!(ServiceError::UnsupportedOperation {
			operation: "WMS GetMap".to_string(),
		}));
	}
	let layer_param = params.require("LAYERS")?;
	if layer_param.contains(',') {
		return Err(anyhow!(ServiceError::InvalidParameter {
			name: "LAYERS".to_string(),
			reason: "exactly one layer per request".to_string(),
		}));
	}
	let layer = catalog
		.layer(layer_param)
		.filter(|l| l.wms)
		.ok_or_else(|| ServiceError::UnknownLayer {
			id: layer_param.to_string(),
		})?;

	// Style.
	let style_param = params.get_or_empty("STYLES");
	let style = if style_param.is_empty() {
		layer.default_style().clone()
	} else {
		layer
			.find_style(style_param)
			.ok_or_else(|| ServiceError::UnknownStyle {
				id: style_param.to_string(),
			})?
			.clone()
	};

	// CRS: key is version-dependent.
	let crs_key = if version == "1.3.0" { "CRS" } else { "SRS" };
	let crs_code = params.require(crs_key)?;
	if !catalog.crs_allowed_for_layer(&layer, crs_code) {
		return Err(anyhow!(ServiceError::UnknownCrs {
			crs: crs_code.to_string(),
		}));
	}
	let request_crs = catalog.crs.get(crs_code).ok_or_else(|| ServiceError::UnknownCrs {
		crs: crs_code.to_string(),
	})?;

	// Format.
	let format_param = params.require("FORMAT")?;
	let format = TileFormat::from_mime(format_param).map_err(|_| ServiceError::UnsupportedFormat {
		format: format_param.to_string(),
	})?;
	if !catalog.format_allowed(format) {
		return Err(anyhow!(ServiceError::UnsupportedFormat {
			format: format_param.to_string(),
		}));
	}

	// Geometry.
	let width = params.require_size("WIDTH")?;
	let height = params.require_size("HEIGHT")?;
	let limits = &catalog.services.wms;
	if width > limits.max_width || height > limits.max_height {
		return Err(anyhow!(ServiceError::InvalidParameter {
			name: "WIDTH".to_string(),
			reason: format!("image size exceeds {}x{}", limits.max_width, limits.max_height),
		}));
	}

	let raw = params.require_bbox("BBOX")?;
	// WMS 1.3.0 writes BBOX in the CRS's authority axis order; lat/lon CRSs
	// arrive as (lat, lon) pairs and are normalised here so everything
	// downstream sees x=lon.
	let [xmin, ymin, xmax, ymax] = if version == "1.3.0" && request_crs.lat_lon_order {
		[raw[1], raw[0], raw[3], raw[2]]
	} else {
		raw
	};
	let bbox = BBox::new(xmin, ymin, xmax, ymax, &request_crs.code).map_err(|err| ServiceError::InvalidParameter {
		name: "BBOX".to_string(),
		reason: err.to_string(),
	})?;

	// Level selection from the target resolution, compared in metres.
	let pyramid = &layer.pyramid;
	let source_crs = catalog.crs.require(&pyramid.tms.crs)?;
	let res_x_m = bbox.width() / width as f64 * request_crs.metres_per_unit;
	let res_y_m = bbox.height() / height as f64 * request_crs.metres_per_unit;
	let requested_res = res_x_m.min(res_y_m) / source_crs.metres_per_unit;
	let level = pyramid
		.best_level(requested_res, false)
		.ok_or_else(|| anyhow!("pyramid '{}' has no selectable level", pyramid.id))?;

	let equivalent = catalog.crs.are_equivalent(&request_crs.code, &source_crs.code);
	let kernel = style.preferred_kernel().unwrap_or(layer.kernel);

	// Source region in the pyramid CRS, padded for the kernel footprint.
	let source_bbox = if equivalent {
		bbox.with_crs(&source_crs.code)
	} else {
		reproject_bbox(&bbox, &request_crs, &source_crs).map_err(|err| ServiceError::InvalidParameter {
			name: "BBOX".to_string(),
			reason: err.to_string(),
		})?
	};
	let margin = (kernel.support().ceil() + 1.0) * level.resolution().max(requested_res);
	let padded = BBox {
		xmin: source_bbox.xmin - margin,
		ymin: source_bbox.ymin - margin,
		xmax: source_bbox.xmax + margin,
		ymax: source_bbox.ymax + margin,
		crs: source_bbox.crs.clone(),
	};

	let region = read_region(&level, &padded, catalog.retry).await?;

	// Geometry stage: a relabel + resample between equivalent CRSs, a full
	// point-wise reprojection otherwise. Reproject before resample before
	// style, and skip stages that would be identities.
	let fitted: RasterReader = if equivalent {
		let target = bbox.with_crs(&source_crs.code);
		let descriptor = region.descriptor();
		if descriptor.width == width && descriptor.height == height && descriptor.bbox.approx_eq(&target, 1e-9) {
			region
		} else {
			Box::new(ResampledImage::new(region, target, width, height, kernel)?)
		}
	} else {
		Box::new(ReprojectedImage::new(
			region,
			bbox,
			width,
			height,
			&source_crs,
			&request_crs,
			kernel,
		)?)
	};

	let blob = style_encode(fitted, &style, format, &request_crs)?;
	Ok(PlanOutput::new(blob, format.mime()))
}

#[cfg(test)]
mod tests {
	use super::negotiate_wms_version;
	use rstest::rstest;

	#[rstest]
	#[case(None, "1.3.0")]
	#[case(Some("1.3.0"), "1.3.0")]
	#[case(Some("2.0.0"), "1.3.0")]
	#[case(Some("1.4.0"), "1.3.0")]
	#[case(Some("1.1.1"), "1.1.1")]
	#[case(Some("1.0.0"), "1.1.1")]
	#[case(Some("1.2.7"), "1.1.1")]
	#[case(Some("cheese"), "1.1.1")]
	fn version_negotiation(#[case] requested: Option<&str>, #[case] expected: &str) {
		assert_eq!(negotiate_wms_version(requested), expected);
	}
}
