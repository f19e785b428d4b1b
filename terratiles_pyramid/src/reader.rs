//! The level reader: a world-space region in, a lazy mosaic out.

use crate::level::Level;
use anyhow::{Result, anyhow};
use byteorder::{ByteOrder, LittleEndian};
use futures::future::join_all;
use terratiles_core::io::{RetryPolicy, StorageError, read_with_retry};
use terratiles_core::{BBox, Blob, ByteRange, RasterDescriptor, RasterReader, ServiceError};
use terratiles_image::CodecMismatch;
use terratiles_raster::{MosaicImage, NodataImage};

/// Snap tolerance when aligning a request to the level's pixel grid.
const GRID_EPSILON: f64 = 1e-9;

/// Fetches the stored bytes of tile (col, row), resolving slab indirection
/// when the level packs tiles into slab objects. `Ok(None)` means the tile
/// (or its whole slab) does not exist.
///
/// A slab object starts with a header table of one `(offset, length)` pair
/// of little-endian `u32`s per tile, row-major over the slab; a zero length
/// marks an absent tile. Payload bytes follow the table.
pub async fn fetch_tile(level: &Level, col: u32, row: u32, retry: RetryPolicy) -> Result<Option<Blob>, StorageError> {
	if level.slab_tiles.is_none() {
		return match read_with_retry(level.context.as_ref(), &level.object_name(col, row), None, retry).await {
			Ok(blob) => Ok(Some(blob)),
			Err(err) if err.is_not_found() => Ok(None),
			Err(err) => Err(err),
		};
	}

	let (object, entry) = level.slab_address(col, row);
	let header_range = ByteRange::new(u64::from(entry) * 8, 8);
	let header = match read_with_retry(level.context.as_ref(), &object, Some(header_range), retry).await {
		Ok(blob) => blob,
		Err(err) if err.is_not_found() => return Ok(None),
		Err(err) => return Err(err),
	};

	let bytes = header.as_slice();
	if bytes.len() != 8 {
		return Err(StorageError::Malformed {
			message: format!("slab '{object}' header entry {entry} is truncated"),
		});
	}
	let offset = u64::from(LittleEndian::read_u32(&bytes[0..4]));
	let length = u64::from(LittleEndian::read_u32(&bytes[4..8]));
	if length == 0 {
		return Ok(None);
	}

	read_with_retry(
		level.context.as_ref(),
		&object,
		Some(ByteRange::new(offset, length)),
		retry,
	)
	.await
	.map(Some)
}

/// Reads the tiles of `level` covering `bbox` and mosaics them into one lazy
/// image on the level's native grid, trimmed to pixel-boundary alignment
/// with the request.
///
/// Tiles inside the bbox but outside the level's data window come back as
/// nodata, as do tiles whose stored bytes are corrupt. Storage transport
/// failures (after retries) and tiles that contradict the pyramid's declared
/// geometry abort the request.
pub async fn read_region(level: &Level, bbox: &BBox, retry: RetryPolicy) -> Result<RasterReader> {
	let tm = &level.tile_matrix;
	let res = tm.resolution;

	// Pixel-align the output grid to the level grid.
	let xmin = tm.x0 + ((bbox.xmin - tm.x0) / res + GRID_EPSILON).floor() * res;
	let xmax = tm.x0 + ((bbox.xmax - tm.x0) / res - GRID_EPSILON).ceil() * res;
	let ymax = tm.y0 - ((tm.y0 - bbox.ymax) / res + GRID_EPSILON).floor() * res;
	let ymin = tm.y0 - ((tm.y0 - bbox.ymin) / res - GRID_EPSILON).ceil() * res;
	let width = ((xmax - xmin) / res).round() as usize;
	let height = ((ymax - ymin) / res).round() as usize;

	let aligned = BBox::new(xmin, ymin, xmax, ymax, &level.crs)?;
	let descriptor = RasterDescriptor::new(width, height, level.layout, aligned.clone(), level.nodata.clone())?;

	let Some(covering) = tm.tiles_covering(&aligned) else {
		log::debug!("region {bbox} misses level '{}' entirely, answering nodata", level.id());
		return Ok(Box::new(NodataImage::new(descriptor)));
	};

	let fetches = covering.iter().map(|(col, row)| async move {
		if !level.window.contains(col, row) {
			return Ok(None);
		}
		match fetch_tile(level, col, row, retry).await {
			Ok(Some(blob)) => Ok(Some((col, row, blob))),
			Ok(None) => {
				log::debug!("tile ({col},{row}) of level '{}' is absent, using nodata", level.id());
				Ok(None)
			}
			Err(StorageError::Transport { message }) => Err(anyhow!(ServiceError::Transport { message })),
			Err(err) => Err(anyhow!(err).context(format!("reading tile ({col},{row}) of level '{}'", level.id()))),
		}
	});

	let mut inputs: Vec<RasterReader> = Vec::new();
	for fetched in join_all(fetches).await {
		match fetched? {
			None => {}
			Some((col, row, blob)) => {
				let tile_descriptor = level.tile_descriptor(col, row);
				match terratiles_image::decode_tile(&blob, level.codec, tile_descriptor) {
					Ok(tile) => inputs.push(Box::new(tile)),
					Err(err) if err.downcast_ref::<CodecMismatch>().is_some() => {
						return Err(err.context(format!("tile ({col},{row}) of level '{}'", level.id())));
					}
					Err(err) => {
						// A corrupt tile is recovered locally: the mosaic
						// fills its footprint with nodata.
						log::warn!(
							"tile ({col},{row}) of level '{}' is corrupt, substituting nodata: {err:#}",
							level.id()
						);
					}
				}
			}
		}
	}

	Ok(Box::new(MosaicImage::new(descriptor, inputs)?))
}
