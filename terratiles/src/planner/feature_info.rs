//! GetFeatureInfo forwarding.
//!
//! terratiles does not interrogate pixels itself; a layer may carry an
//! external WMS endpoint and the planner relays the query there after
//! validating it, returning the upstream body verbatim.

use crate::catalog::Catalog;
use crate::planner::{Params, PlanOutput};
use anyhow::{Result, anyhow};
use terratiles_core::{Blob, ServiceError};

pub async fn get_feature_info(catalog: &Catalog, params: &Params, raw_query: &str) -> Result<PlanOutput> {
	let layer_param = params.require("QUERY_LAYERS")?;
	let layer = catalog.layer(layer_param).ok_or_else(|| ServiceError::UnknownLayer {
		id: layer_param.to_string(),
	})?;

	let Some(upstream) = layer.feature_info_url.as_deref() else {
		return Err(anyhow!(ServiceError::InvalidParameter {
			name: "QUERY_LAYERS".to_string(),
			reason: "layer is not queryable".to_string(),
		}));
	};

	let url = format!("{upstream}?{raw_query}");
	log::debug!("forwarding GetFeatureInfo to {upstream}");
	let response = reqwest::get(&url).await.map_err(|err| ServiceError::Transport {
		message: format!("feature-info upstream unreachable: {err}"),
	})?;

	if !response.status().is_success() {
		return Err(anyhow!(ServiceError::Transport {
			message: format!("feature-info upstream answered {}", response.status()),
		}));
	}

	let mime = response
		.headers()
		.get(reqwest::header::CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.unwrap_or("text/plain")
		.to_string();
	let bytes = response.bytes().await.map_err(|err| ServiceError::Transport {
		message: format!("feature-info upstream body: {err}"),
	})?;

	Ok(PlanOutput::new(Blob::from(bytes.to_vec()), &mime))
}
