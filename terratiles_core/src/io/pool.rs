//! Process-wide pool of storage contexts.

use super::{SharedContext, StorageError};
use dashmap::DashMap;

/// Shares storage contexts across the whole process, keyed by
/// (kind, container).
///
/// Contexts are registered while the catalogue is built and handed out by
/// reference afterwards; lookups are lock-free. A periodic task calls
/// [`ContextPool::revalidate`] to reopen object-store sessions that went
/// stale.
#[derive(Debug, Default)]
pub struct ContextPool {
	contexts: DashMap<String, SharedContext>,
}

impl ContextPool {
	pub fn new() -> ContextPool {
		ContextPool::default()
	}

	fn key(kind: &str, container: &str) -> String {
		format!("{kind}://{container}")
	}

	/// Registers `context`, returning the pooled instance. When an equal
	/// (kind, container) pair is already pooled, the existing context wins
	/// and the new one is dropped.
	pub fn register(&self, context: SharedContext) -> SharedContext {
		let key = Self::key(context.kind(), context.container());
		self.contexts.entry(key).or_insert(context).value().clone()
	}

	pub fn get(&self, kind: &str, container: &str) -> Option<SharedContext> {
		self.contexts.get(&Self::key(kind, container)).map(|e| e.value().clone())
	}

	pub fn len(&self) -> usize {
		self.contexts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.contexts.is_empty()
	}

	/// Opens every pooled context, failing on the first unreachable one.
	/// Called once after the catalogue is built.
	pub async fn connect_all(&self) -> Result<(), StorageError> {
		for entry in self.contexts.iter() {
			entry.value().open().await?;
			log::debug!("storage context {} is reachable", entry.key());
		}
		Ok(())
	}

	/// Re-opens every pooled context, logging failures instead of failing.
	/// Called periodically by the reconnection task.
	pub async fn revalidate(&self) {
		for entry in self.contexts.iter() {
			if let Err(err) = entry.value().open().await {
				log::warn!("storage context {} failed revalidation: {err}", entry.key());
			}
		}
	}
}
