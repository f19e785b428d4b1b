//! Storage context backed by an HTTP(S) prefix.

use super::{StorageContext, StorageError};
use crate::{Blob, ByteRange};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// Reads objects with GET (and range GETs) relative to a base URL.
#[derive(Debug)]
pub struct HttpContext {
	client: Client,
	base: String,
}

impl HttpContext {
	pub fn new(base: &str) -> HttpContext {
		HttpContext {
			client: Client::new(),
			base: base.trim_end_matches('/').to_string(),
		}
	}

	fn object_url(&self, object: &str) -> String {
		format!("{}/{}", self.base, object.trim_start_matches('/'))
	}

	fn map_status(status: StatusCode, object: &str) -> StorageError {
		match status {
			StatusCode::NOT_FOUND => StorageError::NotFound {
				object: object.to_string(),
			},
			StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized {
				message: format!("HTTP {status} for '{object}'"),
			},
			StatusCode::RANGE_NOT_SATISFIABLE => StorageError::Malformed {
				message: format!("range not satisfiable for '{object}'"),
			},
			_ => StorageError::Transport {
				message: format!("HTTP {status} for '{object}'"),
			},
		}
	}
}

#[async_trait]
impl StorageContext for HttpContext {
	fn kind(&self) -> &'static str {
		"http"
	}

	fn container(&self) -> &str {
		&self.base
	}

	async fn open(&self) -> Result<(), StorageError> {
		// A HEAD on the prefix confirms DNS/TLS/socket health. Many servers
		// answer 403/404 on the bare prefix, which is still reachable.
		match self.client.head(&self.base).send().await {
			Ok(_) => Ok(()),
			Err(err) => Err(StorageError::Transport {
				message: format!("cannot reach '{}': {err}", self.base),
			}),
		}
	}

	async fn read_range(&self, object: &str, range: Option<ByteRange>) -> Result<Blob, StorageError> {
		let url = self.object_url(object);
		let mut request = self.client.get(&url);
		if let Some(range) = range {
			request = request.header(reqwest::header::RANGE, range.to_http_header());
		}

		let response = request.send().await.map_err(|err| StorageError::Transport {
			message: format!("GET {url}: {err}"),
		})?;

		let status = response.status();
		if !status.is_success() {
			return Err(Self::map_status(status, object));
		}

		let bytes = response.bytes().await.map_err(|err| StorageError::Transport {
			message: format!("reading body of {url}: {err}"),
		})?;

		if let Some(range) = range {
			if bytes.len() as u64 != range.length {
				return Err(StorageError::Malformed {
					message: format!(
						"range GET of '{object}' returned {} bytes, expected {}",
						bytes.len(),
						range.length
					),
				});
			}
		}

		Ok(Blob::from(bytes.to_vec()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn url_join_normalises_slashes() {
		let context = HttpContext::new("https://tiles.example.org/pyramids/");
		assert_eq!(
			context.object_url("/dem/12/0034_0021.png"),
			"https://tiles.example.org/pyramids/dem/12/0034_0021.png"
		);
	}

	#[test]
	fn status_mapping() {
		assert!(HttpContext::map_status(StatusCode::NOT_FOUND, "x").is_not_found());
		assert!(matches!(
			HttpContext::map_status(StatusCode::FORBIDDEN, "x"),
			StorageError::Unauthorized { .. }
		));
		assert!(HttpContext::map_status(StatusCode::BAD_GATEWAY, "x").is_retryable());
		assert!(matches!(
			HttpContext::map_status(StatusCode::RANGE_NOT_SATISFIABLE, "x"),
			StorageError::Malformed { .. }
		));
	}
}
