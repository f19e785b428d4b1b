//! zlib-deflate expansion via `flate2`.

use anyhow::{Context, Result, bail};
use flate2::read::ZlibDecoder;
use std::io::Read;

pub fn decode(bytes: &[u8], expected: usize) -> Result<Vec<u8>> {
	let mut out = Vec::with_capacity(expected);
	ZlibDecoder::new(bytes)
		.read_to_end(&mut out)
		.context("deflate stream could not be decoded")?;
	if out.len() < expected {
		bail!("deflate stream expanded to {} of {expected} bytes", out.len());
	}
	out.truncate(expected);
	Ok(out)
}
