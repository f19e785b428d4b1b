//! Sample formats and channel layouts of stored rasters.

use anyhow::{Result, bail};
use byteorder::{ByteOrder, LittleEndian};
use serde::Deserialize;
use std::fmt;

/// The storage type of one sample. Multi-byte samples are little-endian
/// everywhere in this codebase.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
	/// 8-bit unsigned integer.
	U8,
	/// 16-bit unsigned integer.
	U16,
	/// 32-bit IEEE float.
	F32,
}

impl SampleFormat {
	pub fn bytes_per_sample(&self) -> usize {
		match self {
			SampleFormat::U8 => 1,
			SampleFormat::U16 => 2,
			SampleFormat::F32 => 4,
		}
	}

	pub fn bits(&self) -> u8 {
		(self.bytes_per_sample() * 8) as u8
	}

	pub fn is_float(&self) -> bool {
		matches!(self, SampleFormat::F32)
	}

	/// Reads sample `index` of an interleaved line as `f64`.
	///
	/// All pipeline arithmetic happens in `f64`; this is the only place that
	/// knows the wire layout of a sample.
	#[inline]
	pub fn get(&self, line: &[u8], index: usize) -> f64 {
		match self {
			SampleFormat::U8 => f64::from(line[index]),
			SampleFormat::U16 => f64::from(LittleEndian::read_u16(&line[index * 2..index * 2 + 2])),
			SampleFormat::F32 => f64::from(LittleEndian::read_f32(&line[index * 4..index * 4 + 4])),
		}
	}

	/// Writes `value` as sample `index` of an interleaved line, clamping
	/// integer formats to their range.
	#[inline]
	pub fn put(&self, line: &mut [u8], index: usize, value: f64) {
		match self {
			SampleFormat::U8 => line[index] = value.round().clamp(0.0, 255.0) as u8,
			SampleFormat::U16 => {
				LittleEndian::write_u16(&mut line[index * 2..index * 2 + 2], value.round().clamp(0.0, 65535.0) as u16);
			}
			SampleFormat::F32 => LittleEndian::write_f32(&mut line[index * 4..index * 4 + 4], value as f32),
		}
	}
}

impl fmt::Display for SampleFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SampleFormat::U8 => write!(f, "uint8"),
			SampleFormat::U16 => write!(f, "uint16"),
			SampleFormat::F32 => write!(f, "float32"),
		}
	}
}

/// Photometric interpretation of a pyramid's pixels.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Photometric {
	Gray,
	Rgb,
	Palette,
}

/// Channel count plus sample format; every raster in the pipeline carries
/// one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PixelLayout {
	pub channels: u8,
	pub sample: SampleFormat,
	pub photometric: Photometric,
}

impl PixelLayout {
	pub fn new(channels: u8, sample: SampleFormat, photometric: Photometric) -> Result<PixelLayout> {
		if channels == 0 || channels > 4 {
			bail!("unsupported channel count {channels}, must be 1..=4");
		}
		Ok(PixelLayout {
			channels,
			sample,
			photometric,
		})
	}

	pub fn gray_u8() -> PixelLayout {
		PixelLayout {
			channels: 1,
			sample: SampleFormat::U8,
			photometric: Photometric::Gray,
		}
	}

	pub fn rgb_u8() -> PixelLayout {
		PixelLayout {
			channels: 3,
			sample: SampleFormat::U8,
			photometric: Photometric::Rgb,
		}
	}

	pub fn rgba_u8() -> PixelLayout {
		PixelLayout {
			channels: 4,
			sample: SampleFormat::U8,
			photometric: Photometric::Rgb,
		}
	}

	pub fn gray_f32() -> PixelLayout {
		PixelLayout {
			channels: 1,
			sample: SampleFormat::F32,
			photometric: Photometric::Gray,
		}
	}

	pub fn bytes_per_pixel(&self) -> usize {
		self.channels as usize * self.sample.bytes_per_sample()
	}
}

impl fmt::Display for PixelLayout {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}x{}", self.channels, self.sample)
	}
}
