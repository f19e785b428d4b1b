//! The lazy raster pipeline: mosaicking, reprojection, resampling and
//! style transforms.
//!
//! Every stage wraps a [`terratiles_core::RasterSource`] and is itself one,
//! so a request plan is a tree of wrappers evaluated line by line when the
//! encoder drains the root. Stages here never touch storage; tile bytes
//! arrive already decoded.

pub mod mosaic;
pub mod nodata;
pub mod reproject;
pub mod resample;
pub mod style;

pub use mosaic::MosaicImage;
pub use nodata::NodataImage;
pub use reproject::{ReprojectedImage, reproject_bbox, validity_in_crs};
pub use resample::{Kernel, ResampledImage};
pub use style::{Style, StyleTransform};
