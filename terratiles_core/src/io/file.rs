//! Storage context backed by a local directory.

use super::{StorageContext, StorageError};
use crate::{Blob, ByteRange};
use async_trait::async_trait;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

/// Reads objects as files under a root directory.
///
/// Object names are slash-separated relative paths. Names that try to escape
/// the root (`..`, absolute paths) are rejected as malformed.
#[derive(Debug)]
pub struct FileContext {
	root: PathBuf,
}

impl FileContext {
	pub fn new(root: &Path) -> FileContext {
		FileContext { root: root.to_path_buf() }
	}

	fn object_path(&self, object: &str) -> Result<PathBuf, StorageError> {
		let relative = Path::new(object);
		let escapes = relative
			.components()
			.any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
		if escapes || object.is_empty() {
			return Err(StorageError::Malformed {
				message: format!("object name '{object}' is not a clean relative path"),
			});
		}
		Ok(self.root.join(relative))
	}

	fn map_io_error(err: &std::io::Error, object: &str) -> StorageError {
		match err.kind() {
			ErrorKind::NotFound => StorageError::NotFound {
				object: object.to_string(),
			},
			ErrorKind::PermissionDenied => StorageError::Unauthorized {
				message: format!("permission denied reading '{object}'"),
			},
			_ => StorageError::Transport {
				message: format!("reading '{object}': {err}"),
			},
		}
	}
}

#[async_trait]
impl StorageContext for FileContext {
	fn kind(&self) -> &'static str {
		"file"
	}

	fn container(&self) -> &str {
		self.root.to_str().unwrap_or("<non-utf8 path>")
	}

	async fn open(&self) -> Result<(), StorageError> {
		if self.root.is_dir() {
			Ok(())
		} else {
			Err(StorageError::Transport {
				message: format!("root directory {:?} does not exist", self.root),
			})
		}
	}

	async fn write_object(&self, object: &str, blob: &Blob) -> Result<(), StorageError> {
		let path = self.object_path(object)?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|e| Self::map_io_error(&e, object))?;
		}
		std::fs::write(&path, blob.as_slice()).map_err(|e| Self::map_io_error(&e, object))
	}

	async fn read_range(&self, object: &str, range: Option<ByteRange>) -> Result<Blob, StorageError> {
		let path = self.object_path(object)?;
		let mut file = File::open(&path).map_err(|e| Self::map_io_error(&e, object))?;

		let buffer = match range {
			None => {
				let mut buffer = Vec::new();
				file.read_to_end(&mut buffer).map_err(|e| Self::map_io_error(&e, object))?;
				buffer
			}
			Some(range) => {
				let mut buffer = vec![0u8; range.length as usize];
				file
					.seek(SeekFrom::Start(range.offset))
					.map_err(|e| Self::map_io_error(&e, object))?;
				file.read_exact(&mut buffer).map_err(|e| match e.kind() {
					ErrorKind::UnexpectedEof => StorageError::Malformed {
						message: format!("object '{object}' is shorter than {range:?}"),
					},
					_ => Self::map_io_error(&e, object),
				})?;
				buffer
			}
		};
		Ok(Blob::from(buffer))
	}
}
