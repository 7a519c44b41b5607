//! Per-frame payload compression.
//!
//! Every frame carries a one-byte codec tag so the reader can decode frames
//! regardless of what its own side is configured to send.

use std::io::{Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::transport::MAX_FRAME_LEN;

/// Payload codec identified by the frame tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
	Identity,
	Gzip,
	Deflate,
}

impl Codec {
	/// Resolves a configured algorithm name.
	pub fn from_name(name: &str) -> Result<Self> {
		match name.trim().to_ascii_lowercase().as_str() {
			"identity" | "none" => Ok(Codec::Identity),
			"gzip" => Ok(Codec::Gzip),
			"deflate" => Ok(Codec::Deflate),
			_ => Err(Error::UnsupportedCompression(name.to_string())),
		}
	}

	pub fn tag(self) -> u8 {
		match self {
			Codec::Identity => 0,
			Codec::Gzip => 1,
			Codec::Deflate => 2,
		}
	}

	pub fn from_tag(tag: u8) -> Result<Self> {
		match tag {
			0 => Ok(Codec::Identity),
			1 => Ok(Codec::Gzip),
			2 => Ok(Codec::Deflate),
			other => Err(Error::TransportError(format!("Unknown frame codec tag {other}"))),
		}
	}
}

/// Outbound compression settings for one transport.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
	codec: Codec,
	level: flate2::Compression,
}

impl Default for FrameCodec {
	fn default() -> Self {
		Self::identity()
	}
}

impl FrameCodec {
	pub fn identity() -> Self {
		Self {
			codec: Codec::Identity,
			level: flate2::Compression::default(),
		}
	}

	/// Levels outside `0..=9` are clamped.
	pub fn new(codec: Codec, level: i32) -> Self {
		Self {
			codec,
			level: flate2::Compression::new(level.clamp(0, 9) as u32),
		}
	}

	/// Builds the outbound codec a session config asks for.
	pub fn from_config(config: &SessionConfig) -> Result<Self> {
		match &config.compression {
			Some(name) => Ok(Self::new(Codec::from_name(name)?, config.compression_level)),
			None => Ok(Self::identity()),
		}
	}

	pub fn codec(&self) -> Codec {
		self.codec
	}

	/// Encodes `bytes`, returning the codec tag and the frame payload.
	pub fn encode(&self, bytes: Vec<u8>) -> Result<(u8, Vec<u8>)> {
		let payload = match self.codec {
			Codec::Identity => bytes,
			Codec::Gzip => {
				let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
				encoder.write_all(&bytes)?;
				encoder.finish()?
			}
			Codec::Deflate => {
				let mut encoder = DeflateEncoder::new(Vec::with_capacity(bytes.len() / 2), self.level);
				encoder.write_all(&bytes)?;
				encoder.finish()?
			}
		};
		Ok((self.codec.tag(), payload))
	}
}

/// Decodes a frame payload according to its tag.
///
/// Decompressed output is capped at [`MAX_FRAME_LEN`] like raw frames.
pub fn decode(tag: u8, payload: Vec<u8>) -> Result<Vec<u8>> {
	decode_bounded(tag, payload, MAX_FRAME_LEN)
}

fn decode_bounded(tag: u8, payload: Vec<u8>, limit: usize) -> Result<Vec<u8>> {
	let codec = Codec::from_tag(tag)?;
	let decoder: Box<dyn Read + '_> = match codec {
		Codec::Identity => return Ok(payload),
		Codec::Gzip => Box::new(GzDecoder::new(payload.as_slice())),
		Codec::Deflate => Box::new(DeflateDecoder::new(payload.as_slice())),
	};

	let mut out = Vec::new();
	decoder
		.take(limit as u64 + 1)
		.read_to_end(&mut out)
		.map_err(|e| Error::TransportError(format!("Corrupt {codec:?} frame: {e}")))?;
	if out.len() > limit {
		return Err(Error::TransportError(format!("Decompressed {codec:?} frame exceeds {limit} bytes")));
	}
	Ok(out)
}
