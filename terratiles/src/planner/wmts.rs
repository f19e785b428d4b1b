//! WMTS GetTile planning.

use crate::catalog::Catalog;
use crate::planner::tile::TileJob;
use crate::planner::{Params, PlanOutput};
use anyhow::{Result, anyhow};
use terratiles_core::{ServiceError, TileFormat};

/// Plans and renders a GetTile request.
pub async fn get_tile(catalog: &Catalog, params: &Params) -> Result<PlanOutput> {
	if !catalog.services.wmts.enabled {
		return Err(anyhow!(ServiceError::UnsupportedOperation {
			operation: "WMTS GetTile".to_string(),
		}));
	}

	let layer_param = params.require("LAYER")?;
	let layer = catalog
		.layer(layer_param)
		.filter(|l| l.wmts)
		.ok_or_else(|| ServiceError::UnknownLayer {
			id: layer_param.to_string(),
		})?;

	let style_param = params.get_or_empty("STYLE");
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

	let format_param = params.require("FORMAT")?;
	let format = TileFormat::from_mime(format_param).map_err(|_| ServiceError::UnsupportedFormat {
		format: format_param.to_string(),
	})?;
	if !catalog.format_allowed(format) {
		return Err(anyhow!(ServiceError::UnsupportedFormat {
			format: format_param.to_string(),
		}));
	}

	let tms_param = params.require("TILEMATRIXSET")?;
	if tms_param != layer.pyramid.tms.id {
		return Err(anyhow!(ServiceError::InvalidParameter {
			name: "TILEMATRIXSET".to_string(),
			reason: format!("layer is published in tile matrix set '{}'", layer.pyramid.tms.id),
		}));
	}

	let matrix_param = params.require("TILEMATRIX")?;
	let level = layer
		.pyramid
		.get_level(matrix_param)
		.ok_or_else(|| ServiceError::InvalidParameter {
			name: "TILEMATRIX".to_string(),
			reason: "no such tile matrix in this pyramid".to_string(),
		})?;

	// Indices are validated against the level's data window before anything
	// touches storage.
	let col = params.require_u32("TILECOL")?;
	let row = params.require_u32("TILEROW")?;
	if !level.tile_matrix.contains_tile(col, row) || !level.window.contains(col, row) {
		return Err(anyhow!(ServiceError::InvalidParameter {
			name: "TILECOL".to_string(),
			reason: format!(
				"tile ({col},{row}) is outside the level window [{}..{}]x[{}..{}]",
				level.window.col_min, level.window.col_max, level.window.row_min, level.window.row_max
			),
		}));
	}

	let job = TileJob {
		layer,
		level,
		col,
		row,
		style,
		format,
	};
	job.render(catalog).await
}
