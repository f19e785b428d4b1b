mod bbox;
mod blob;
mod byte_range;
mod crs;
mod pixel;
mod raster;
mod tile_codec;
mod tile_format;
mod tile_matrix;

pub use bbox::BBox;
pub use blob::Blob;
pub use byte_range::ByteRange;
pub use crs::{Crs, CrsRegistry, METRES_PER_DEGREE};
pub use pixel::{Photometric, PixelLayout, SampleFormat};
pub use raster::{RasterBuf, RasterDescriptor, RasterReader, RasterSource};
pub use tile_codec::TileCodec;
pub use tile_format::TileFormat;
pub use tile_matrix::{TileMatrix, TileMatrixSet, TileRange};
