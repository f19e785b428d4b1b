//! TIFF-variant LZW expansion via `weezl`.

use anyhow::{Context, Result, bail};
use weezl::{BitOrder, decode::Decoder};

pub fn decode(bytes: &[u8], expected: usize) -> Result<Vec<u8>> {
	// TIFF LZW: MSB-first bit order with the early-change size switch.
	let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
	let out = decoder
		.decode(bytes)
		.context("LZW stream could not be decoded")?;
	if out.len() < expected {
		bail!("LZW stream expanded to {} of {expected} bytes", out.len());
	}
	let mut out = out;
	out.truncate(expected);
	Ok(out)
}
