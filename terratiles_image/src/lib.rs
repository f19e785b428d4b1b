//! Tile codecs for terratiles.
//!
//! [`decode`] turns the stored bytes of one tile into a raw pixel rectangle
//! matching the owning pyramid's geometry. [`encode`] serialises a finished
//! raster into the wire bytes of a requested MIME type.
//!
//! Codec libraries report failures in their own vocabularies; both modules
//! capture those at the boundary and convert them into the error taxonomy the
//! planner understands.

pub mod decode;
pub mod encode;

pub use decode::{CodecMismatch, decode_tile};
pub use encode::{EncodeOptions, GeoTags, PaletteTable, encode};
