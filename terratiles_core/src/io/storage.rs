//! The storage context trait and its failure taxonomy.

use crate::{Blob, ByteRange};
use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// What went wrong during a storage operation.
///
/// The distinction matters downstream: `NotFound` becomes a nodata tile in a
/// mosaic, `Transport` is retried and then surfaced as HTTP 503,
/// `Unauthorized` and `Malformed` are fatal for the request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageError {
	/// The object does not exist. Not retryable; mosaics treat it as nodata.
	NotFound { object: String },
	/// A transient transport failure. Retryable.
	Transport { message: String },
	/// The backend rejected our credentials. Fatal for the request.
	Unauthorized { message: String },
	/// The backend answered with something we cannot interpret. Fatal.
	Malformed { message: String },
}

impl StorageError {
	pub fn is_retryable(&self) -> bool {
		matches!(self, StorageError::Transport { .. })
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, StorageError::NotFound { .. })
	}
}

impl fmt::Display for StorageError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StorageError::NotFound { object } => write!(f, "object '{object}' not found"),
			StorageError::Transport { message } => write!(f, "transport failure: {message}"),
			StorageError::Unauthorized { message } => write!(f, "authorization failure: {message}"),
			StorageError::Malformed { message } => write!(f, "malformed storage response: {message}"),
		}
	}
}

impl Error for StorageError {}

/// Reads bytes from one backing container.
///
/// Implementations are shared across workers; `read_range` may be called
/// concurrently from any number of tasks.
#[async_trait]
pub trait StorageContext: fmt::Debug + Send + Sync {
	/// Short backend identifier for logs and pool keys ("file", "http", "s3").
	fn kind(&self) -> &'static str;

	/// The container this context reads from (directory, URL prefix, bucket).
	fn container(&self) -> &str;

	/// Establishes the session or confirms the container is reachable.
	async fn open(&self) -> Result<(), StorageError>;

	/// Reads `range` of `object`, or the whole object when `range` is `None`.
	async fn read_range(&self, object: &str, range: Option<ByteRange>) -> Result<Blob, StorageError>;

	/// Writes `object`. Only the on-the-fly tile persistence path uses this;
	/// contexts that cannot write keep the default refusal.
	async fn write_object(&self, object: &str, _blob: &Blob) -> Result<(), StorageError> {
		Err(StorageError::Unauthorized {
			message: format!("context is read-only, cannot write '{object}'"),
		})
	}

	/// Releases any session state. Contexts with no session keep the default
	/// no-op.
	async fn close(&self) {}
}

pub type SharedContext = Arc<dyn StorageContext>;

/// Process-wide retry policy for transient storage failures: fixed backoff,
/// bounded attempts.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	/// Total attempts, including the first.
	pub attempts: u32,
	pub backoff: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		RetryPolicy {
			attempts: 3,
			backoff: Duration::from_millis(200),
		}
	}
}

/// Reads with the configured retry policy. Only transport errors are
/// retried; everything else surfaces immediately.
pub async fn read_with_retry(
	context: &dyn StorageContext,
	object: &str,
	range: Option<ByteRange>,
	policy: RetryPolicy,
) -> Result<Blob, StorageError> {
	let mut attempt = 0;
	loop {
		attempt += 1;
		match context.read_range(object, range).await {
			Ok(blob) => return Ok(blob),
			Err(err) if err.is_retryable() && attempt < policy.attempts.max(1) => {
				log::warn!(
					"read of '{object}' from {}:{} failed (attempt {attempt}/{}): {err}",
					context.kind(),
					context.container(),
					policy.attempts
				);
				tokio::time::sleep(policy.backoff).await;
			}
			Err(err) => return Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct FlakyContext {
		fail_times: u32,
		calls: AtomicU32,
	}

	#[async_trait]
	impl StorageContext for FlakyContext {
		fn kind(&self) -> &'static str {
			"flaky"
		}

		fn container(&self) -> &str {
			"test"
		}

		async fn open(&self) -> Result<(), StorageError> {
			Ok(())
		}

		async fn read_range(&self, object: &str, _range: Option<ByteRange>) -> Result<Blob, StorageError> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);
			if call < self.fail_times {
				Err(StorageError::Transport {
					message: "connection reset".to_string(),
				})
			} else {
				Ok(Blob::from(object))
			}
		}
	}

	#[tokio::test]
	async fn retries_transport_errors() {
		let context = FlakyContext {
			fail_times: 2,
			calls: AtomicU32::new(0),
		};
		let policy = RetryPolicy {
			attempts: 3,
			backoff: Duration::from_millis(1),
		};
		let blob = read_with_retry(&context, "tile.png", None, policy).await.unwrap();
		assert_eq!(blob.as_str(), "tile.png");
		assert_eq!(context.calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn gives_up_after_attempts() {
		let context = FlakyContext {
			fail_times: 10,
			calls: AtomicU32::new(0),
		};
		let policy = RetryPolicy {
			attempts: 2,
			backoff: Duration::from_millis(1),
		};
		let err = read_with_retry(&context, "tile.png", None, policy).await.unwrap_err();
		assert!(err.is_retryable());
		assert_eq!(context.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn not_found_is_not_retried() {
		#[derive(Debug)]
		struct MissingContext(AtomicU32);

		#[async_trait]
		impl StorageContext for MissingContext {
			fn kind(&self) -> &'static str {
				"missing"
			}
			fn container(&self) -> &str {
				"test"
			}
			async fn open(&self) -> Result<(), StorageError> {
				Ok(())
			}
			async fn read_range(&self, object: &str, _range: Option<ByteRange>) -> Result<Blob, StorageError> {
				self.0.fetch_add(1, Ordering::SeqCst);
				Err(StorageError::NotFound {
					object: object.to_string(),
				})
			}
		}

		let context = MissingContext(AtomicU32::new(0));
		let err = read_with_retry(&context, "gone", None, RetryPolicy::default())
			.await
			.unwrap_err();
		assert!(err.is_not_found());
		assert_eq!(context.0.load(Ordering::SeqCst), 1);
	}
}
