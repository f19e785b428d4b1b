//! Core types and storage access for the terratiles server.
//!
//! This crate holds everything the other crates agree on:
//! - byte plumbing ([`Blob`], [`ByteRange`]),
//! - the geospatial data model ([`Crs`], [`BBox`], [`TileMatrix`],
//!   [`TileMatrixSet`]),
//! - the raster data model ([`PixelLayout`], [`RasterDescriptor`],
//!   [`RasterBuf`] and the lazy [`RasterSource`] trait),
//! - the request error taxonomy ([`ServiceError`]),
//! - storage contexts ([`io`]) that read tile bytes from files, HTTP
//!   endpoints or S3 buckets.

pub mod error;
pub mod io;
mod types;

pub use error::ServiceError;
pub use types::*;
