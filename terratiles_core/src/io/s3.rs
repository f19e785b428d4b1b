//! Storage context backed by an S3 (or S3-compatible) bucket.

use super::{StorageContext, StorageError};
use crate::{Blob, ByteRange};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;

/// Reads objects from one bucket with authenticated range GETs.
///
/// Credentials and region come from the ambient AWS configuration
/// (environment, profile, instance metadata); a custom endpoint serves
/// S3-compatible stores.
#[derive(Debug)]
pub struct S3Context {
	client: Client,
	bucket: String,
}

impl S3Context {
	pub fn new(client: Client, bucket: &str) -> S3Context {
		S3Context {
			client,
			bucket: bucket.to_string(),
		}
	}

	/// Builds a context from the ambient AWS configuration, optionally
	/// overriding the endpoint (MinIO, Ceph RGW and friends).
	pub async fn from_env(bucket: &str, endpoint: Option<&str>) -> S3Context {
		let base = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
		let mut builder = aws_sdk_s3::config::Builder::from(&base).force_path_style(true);
		if let Some(endpoint) = endpoint {
			builder = builder.endpoint_url(endpoint);
		}
		S3Context {
			client: Client::from_conf(builder.build()),
			bucket: bucket.to_string(),
		}
	}

	fn map_get_error(err: SdkError<GetObjectError>, object: &str) -> StorageError {
		match &err {
			SdkError::ServiceError(service) => {
				if matches!(service.err(), GetObjectError::NoSuchKey(_)) {
					return StorageError::NotFound {
						object: object.to_string(),
					};
				}
				let status = service.raw().status().as_u16();
				match status {
					401 | 403 => StorageError::Unauthorized {
						message: format!("S3 returned {status} for '{object}'"),
					},
					404 => StorageError::NotFound {
						object: object.to_string(),
					},
					_ => StorageError::Transport {
						message: format!("S3 returned {status} for '{object}'"),
					},
				}
			}
			_ => StorageError::Transport {
				message: format!("S3 request for '{object}' failed: {err}"),
			},
		}
	}
}

#[async_trait]
impl StorageContext for S3Context {
	fn kind(&self) -> &'static str {
		"s3"
	}

	fn container(&self) -> &str {
		&self.bucket
	}

	async fn open(&self) -> Result<(), StorageError> {
		self
			.client
			.head_bucket()
			.bucket(&self.bucket)
			.send()
			.await
			.map_err(|err| StorageError::Transport {
				message: format!("bucket '{}' unreachable: {err}", self.bucket),
			})?;
		Ok(())
	}

	async fn write_object(&self, object: &str, blob: &Blob) -> Result<(), StorageError> {
		self
			.client
			.put_object()
			.bucket(&self.bucket)
			.key(object)
			.body(aws_sdk_s3::primitives::ByteStream::from(blob.as_slice().to_vec()))
			.send()
			.await
			.map_err(|err| StorageError::Transport {
				message: format!("PUT of '{object}' failed: {err}"),
			})?;
		Ok(())
	}

	async fn read_range(&self, object: &str, range: Option<ByteRange>) -> Result<Blob, StorageError> {
		let mut request = self.client.get_object().bucket(&self.bucket).key(object);
		if let Some(range) = range {
			request = request.range(range.to_http_header());
		}

		let response = request.send().await.map_err(|err| Self::map_get_error(err, object))?;

		let bytes = response
			.body
			.collect()
			.await
			.map_err(|err| StorageError::Transport {
				message: format!("streaming body of '{object}': {err}"),
			})?
			.into_bytes();

		Ok(Blob::from(bytes.to_vec()))
	}
}
