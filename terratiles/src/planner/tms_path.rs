//! TMS path-addressed requests.
//!
//! `<root>/1.0.0[/<layer>[/<z>[/<x>/<y>.<ext>]]]` — the depth picks the
//! response: a service summary, per-layer metadata, matrix metadata, or the
//! tile itself. TMS counts rows from the bottom of the matrix; the planner
//! flips to the top-origin row index everything else uses.

use crate::capabilities;
use crate::catalog::Catalog;
use crate::planner::tile::TileJob;
use crate::planner::PlanOutput;
use anyhow::{Result, anyhow};
use terratiles_core::{Blob, ServiceError, TileFormat};

/// A parsed TMS path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TmsRequest {
	Root,
	Layer(String),
	Matrix { layer: String, matrix: String },
	Tile {
		layer: String,
		matrix: String,
		col: u32,
		/// Bottom-origin row index, as in the URL.
		y: u32,
		extension: String,
	},
}

impl TmsRequest {
	/// Parses the path segments after `1.0.0`.
	pub fn parse(segments: &[&str]) -> Result<TmsRequest, ServiceError> {
		let invalid = |reason: &str| ServiceError::InvalidParameter {
			name: "path".to_string(),
			reason: reason.to_string(),
		};

		match segments {
			[] => Ok(TmsRequest::Root),
			[layer] => Ok(TmsRequest::Layer((*layer).to_string())),
			[layer, matrix] => Ok(TmsRequest::Matrix {
				layer: (*layer).to_string(),
				matrix: (*matrix).to_string(),
			}),
			[layer, matrix, x, y_ext] => {
				let col = x.parse().map_err(|_| invalid("tile column is not an integer"))?;
				let (y, extension) = y_ext
					.rsplit_once('.')
					.ok_or_else(|| invalid("tile name must carry an extension"))?;
				let y = y.parse().map_err(|_| invalid("tile row is not an integer"))?;
				Ok(TmsRequest::Tile {
					layer: (*layer).to_string(),
					matrix: (*matrix).to_string(),
					col,
					y,
					extension: extension.to_string(),
				})
			}
			_ => Err(invalid("too many path segments")),
		}
	}
}

/// Serves a parsed TMS request.
pub async fn handle_tms(catalog: &Catalog, request: TmsRequest) -> Result<PlanOutput> {
	if !catalog.services.tms.enabled {
		return Err(anyhow!(ServiceError::UnsupportedOperation {
			operation: "TMS".to_string(),
		}));
	}

	let lookup_layer = |id: &str| {
		catalog
			.layer(id)
			.filter(|l| l.tms)
			.ok_or_else(|| ServiceError::UnknownLayer { id: id.to_string() })
	};

	match request {
		TmsRequest::Root => Ok(PlanOutput::new(Blob::from(capabilities::tms_root(catalog)), "text/xml")),
		TmsRequest::Layer(id) => {
			let layer = lookup_layer(&id)?;
			Ok(PlanOutput::new(Blob::from(capabilities::tms_layer(&layer)), "text/xml"))
		}
		TmsRequest::Matrix { layer, matrix } => {
			let layer = lookup_layer(&layer)?;
			let level = layer
				.pyramid
				.get_level(&matrix)
				.ok_or_else(|| ServiceError::InvalidParameter {
					name: "path".to_string(),
					reason: "no such tile matrix in this pyramid".to_string(),
				})?;
			Ok(PlanOutput::new(
				Blob::from(capabilities::tms_matrix(&layer, &level)),
				"text/xml",
			))
		}
		TmsRequest::Tile {
			layer,
			matrix,
			col,
			y,
			extension,
		} => {
			let layer = lookup_layer(&layer)?;
			let level = layer
				.pyramid
				.get_level(&matrix)
				.ok_or_else(|| ServiceError::InvalidParameter {
					name: "path".to_string(),
					reason: "no such tile matrix in this pyramid".to_string(),
				})?;

			// The extension must agree with the pyramid's stored format.
			let format = TileFormat::from_extension(&extension).map_err(|_| ServiceError::UnsupportedFormat {
				format: extension.clone(),
			})?;
			if level.codec.passthrough_mime() != Some(format.mime()) {
				return Err(anyhow!(ServiceError::UnsupportedFormat {
					format: format!("{extension} (tiles are stored as {})", level.codec),
				}));
			}

			// TMS rows grow upward from the bottom edge.
			let matrix_height = level.tile_matrix.matrix_height;
			if y >= matrix_height {
				return Err(anyhow!(ServiceError::InvalidParameter {
					name: "path".to_string(),
					reason: format!("tile row {y} is outside the {matrix_height}-row matrix"),
				}));
			}
			let row = matrix_height - 1 - y;
			if !level.window.contains(col, row) {
				return Err(anyhow!(ServiceError::InvalidParameter {
					name: "path".to_string(),
					reason: "tile is outside the level window".to_string(),
				}));
			}

			let style = layer.default_style().clone();
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
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn path_depths() {
		assert_eq!(TmsRequest::parse(&[]).unwrap(), TmsRequest::Root);
		assert_eq!(
			TmsRequest::parse(&["dem"]).unwrap(),
			TmsRequest::Layer("dem".to_string())
		);
		assert_eq!(
			TmsRequest::parse(&["dem", "12"]).unwrap(),
			TmsRequest::Matrix {
				layer: "dem".to_string(),
				matrix: "12".to_string()
			}
		);
		assert_eq!(
			TmsRequest::parse(&["dem", "12", "3", "2.png"]).unwrap(),
			TmsRequest::Tile {
				layer: "dem".to_string(),
				matrix: "12".to_string(),
				col: 3,
				y: 2,
				extension: "png".to_string()
			}
		);
	}

	#[test]
	fn malformed_tile_paths() {
		assert!(TmsRequest::parse(&["dem", "12", "x", "2.png"]).is_err());
		assert!(TmsRequest::parse(&["dem", "12", "3", "2"]).is_err());
		assert!(TmsRequest::parse(&["dem", "12", "3", "2.png", "extra"]).is_err());
	}
}
