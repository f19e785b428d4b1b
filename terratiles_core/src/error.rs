//! The request error taxonomy.
//!
//! Every failure a client can cause or observe is one of these kinds,
//! regardless of which protocol carried the request. The planner converts a
//! `ServiceError` into an OGC ServiceException body with the matching HTTP
//! status; pipeline code raises them through `anyhow` and the boundary
//! downcasts.

use std::error::Error;
use std::fmt;

/// A request-level failure with a defined OGC exception code and HTTP
/// status.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceError {
	/// A required KVP key is absent.
	MissingParameter { name: String },
	/// A value cannot be parsed, is out of range, or references an unknown
	/// entity.
	InvalidParameter { name: String, reason: String },
	/// LAYER / QUERY_LAYERS references an identifier not in the catalogue.
	UnknownLayer { id: String },
	/// STYLE is not in the layer's style list.
	UnknownStyle { id: String },
	/// FORMAT is not served globally or is incompatible with the pyramid.
	UnsupportedFormat { format: String },
	/// CRS is unknown or not allowed for the layer.
	UnknownCrs { crs: String },
	/// The requested operation is not served on this endpoint.
	UnsupportedOperation { operation: String },
	/// A storage read failed after all retries.
	Transport { message: String },
	/// Invariant violation, decoder crash, or encoder failure before the
	/// first byte.
	Internal { message: String },
}

impl ServiceError {
	pub fn ogc_code(&self) -> &'static str {
		match self {
			ServiceError::MissingParameter { .. } => "MissingParameterValue",
			ServiceError::InvalidParameter { .. } => "InvalidParameterValue",
			ServiceError::UnknownLayer { .. } => "LayerNotDefined",
			ServiceError::UnknownStyle { .. } => "StyleNotDefined",
			ServiceError::UnsupportedFormat { .. } => "InvalidFormat",
			ServiceError::UnknownCrs { .. } => "InvalidCRS",
			ServiceError::UnsupportedOperation { .. } => "OperationNotSupported",
			ServiceError::Transport { .. } | ServiceError::Internal { .. } => "NoApplicableCode",
		}
	}

	pub fn http_status(&self) -> u16 {
		match self {
			ServiceError::Transport { .. } => 503,
			ServiceError::Internal { .. } => 500,
			_ => 400,
		}
	}

	/// Internal error from any anyhow chain.
	pub fn internal(err: &anyhow::Error) -> ServiceError {
		ServiceError::Internal {
			message: format!("{err:#}"),
		}
	}
}

/// Strips characters that would let a client-supplied value inject markup
/// into a generated document.
pub fn sanitize(value: &str) -> String {
	value.replace(['<', '>', '&', '"'], "")
}

impl fmt::Display for ServiceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ServiceError::MissingParameter { name } => write!(f, "required parameter {} is missing", sanitize(name)),
			ServiceError::InvalidParameter { name, reason } => {
				write!(f, "parameter {} is invalid: {}", sanitize(name), sanitize(reason))
			}
			ServiceError::UnknownLayer { id } => write!(f, "layer {} is not served", sanitize(id)),
			ServiceError::UnknownStyle { id } => write!(f, "style {} is not available for this layer", sanitize(id)),
			ServiceError::UnsupportedFormat { format } => write!(f, "format {} is not served", sanitize(format)),
			ServiceError::UnknownCrs { crs } => write!(f, "CRS {} is not served", sanitize(crs)),
			ServiceError::UnsupportedOperation { operation } => {
				write!(f, "operation {} is not supported", sanitize(operation))
			}
			ServiceError::Transport { message } => write!(f, "backend storage unavailable: {}", sanitize(message)),
			ServiceError::Internal { message } => write!(f, "internal error: {}", sanitize(message)),
		}
	}
}

impl Error for ServiceError {}
