//! [`Blob`] is the byte buffer handed around between storage contexts,
//! decoders and encoders.
//!
//! ```rust
//! use terratiles_core::Blob;
//!
//! let blob = Blob::from(vec![1u8, 2, 3]);
//! assert_eq!(blob.len(), 3);
//! assert_eq!(blob.as_slice(), &[1, 2, 3]);
//! ```

use std::fmt;

/// An owned, immutable chunk of bytes.
///
/// Storage contexts return `Blob`s, decoders consume them and encoders
/// produce them. The wrapper exists so that function signatures say "tile
/// bytes" instead of `Vec<u8>`.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
	/// An empty blob.
	pub fn empty() -> Blob {
		Blob(Vec::new())
	}

	pub fn len(&self) -> u64 {
		self.0.len() as u64
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.0
	}

	/// Interprets the bytes as UTF-8, replacing invalid sequences.
	pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
		String::from_utf8_lossy(&self.0)
	}

	pub fn into_vec(self) -> Vec<u8> {
		self.0
	}
}

impl From<Vec<u8>> for Blob {
	fn from(value: Vec<u8>) -> Self {
		Blob(value)
	}
}

impl From<&[u8]> for Blob {
	fn from(value: &[u8]) -> Self {
		Blob(value.to_vec())
	}
}

impl From<&str> for Blob {
	fn from(value: &str) -> Self {
		Blob(value.as_bytes().to_vec())
	}
}

impl From<String> for Blob {
	fn from(value: String) -> Self {
		Blob(value.into_bytes())
	}
}

impl fmt::Debug for Blob {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Blob({} bytes)", self.0.len())
	}
}
