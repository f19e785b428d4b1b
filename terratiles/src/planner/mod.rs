//! Request planning: validation, pipeline assembly, encoding.
//!
//! A request moves through the phases parsed → validated → planned →
//! streaming; failures at any phase surface as a [`ServiceError`] that the
//! HTTP layer renders as an OGC ServiceException with the matching status.

pub mod params;

mod feature_info;
mod tile;
mod tms_path;
mod wms;
mod wmts;

pub use feature_info::get_feature_info;
pub use params::Params;
pub use tile::{TileJob, WriteBackJob};
pub use tms_path::{TmsRequest, handle_tms};
pub use wms::{get_map, negotiate_wms_version};
pub use wmts::get_tile;

use terratiles_core::{Blob, ServiceError};

/// A finished response body.
pub struct PlanOutput {
	pub bytes: Blob,
	pub mime: String,
	/// Deferred on-the-fly persistence; runs after the response is written.
	pub write_back: Option<WriteBackJob>,
}

impl PlanOutput {
	pub fn new(bytes: Blob, mime: &str) -> PlanOutput {
		PlanOutput {
			bytes,
			mime: mime.to_string(),
			write_back: None,
		}
	}
}

/// Collapses an anyhow chain to the taxonomy: a `ServiceError` anywhere in
/// the chain wins, anything else is an internal error.
pub fn to_service_error(err: anyhow::Error) -> ServiceError {
	match err.downcast::<ServiceError>() {
		Ok(service) => service,
		Err(other) => {
			log::error!("request failed internally: {other:#}");
			ServiceError::internal(&other)
		}
	}
}

/// The exception document every protocol answers errors with.
pub fn service_exception_body(err: &ServiceError) -> String {
	format!(
		"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ServiceExceptionReport>\n  <ServiceException code=\"{}\">{err}</ServiceException>\n</ServiceExceptionReport>\n",
		err.ogc_code()
	)
}
