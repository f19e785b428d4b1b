//! The terratiles server: descriptor-driven WMS, WMTS and TMS surfaces over
//! raster tile pyramids.
//!
//! The crate splits along the request path:
//! - [`config`] deserialises the YAML descriptors,
//! - [`catalog`] turns them into the immutable catalogues a request reads
//!   (swapped atomically on reload),
//! - [`planner`] validates parameters and drives the decode → mosaic →
//!   reproject → resample → style → encode pipeline,
//! - [`server`] owns the HTTP lifecycle.

pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod planner;
pub mod server;

pub use catalog::{Catalog, Layer};
pub use config::Config;
pub use server::TileServer;
