//! The `ValueReader` trait: sequential decoding of protocol-buffer primitives
//! (varints, keys, length-delimited payloads) from a bounded byte window.
//!
//! Implementors only provide access to the underlying reader and its length;
//! everything else is built on top. Length prefixes are always checked against
//! the bytes that are actually left, so a corrupt prefix fails instead of
//! triggering a huge allocation.
//!
//! ```rust
//! use xonacatl_core::io::{ValueReader, ValueReaderSlice};
//!
//! let mut reader = ValueReaderSlice::new(&[0x0a, 0x02, b'o', b'k']);
//! assert_eq!(reader.read_pbf_key().unwrap(), (1, 2));
//! assert_eq!(reader.read_pbf_string().unwrap(), "ok");
//! assert!(!reader.has_remaining());
//! ```

use crate::Blob;
use anyhow::{Context, Result, bail, ensure};
use std::io::{Read, Seek};

/// Types implementing both `Seek` and `Read`.
pub trait SeekRead: Seek + Read {}

/// Protocol-buffer wire type of a varint.
pub const WIRE_TYPE_VARINT: u8 = 0;
/// Protocol-buffer wire type of a little-endian 64-bit value.
pub const WIRE_TYPE_FIXED64: u8 = 1;
/// Protocol-buffer wire type of a length-prefixed payload.
pub const WIRE_TYPE_LEN: u8 = 2;
/// Protocol-buffer wire type of a little-endian 32-bit value.
pub const WIRE_TYPE_FIXED32: u8 = 5;

pub trait ValueReader<'a> {
	fn get_reader(&mut self) -> &mut dyn SeekRead;

	/// Total length of the readable window.
	fn len(&self) -> u64;

	fn position(&mut self) -> u64;

	fn set_position(&mut self, position: u64) -> Result<()>;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn remaining(&mut self) -> u64 {
		self.len().saturating_sub(self.position())
	}

	fn has_remaining(&mut self) -> bool {
		self.remaining() > 0
	}

	fn read_u8(&mut self) -> Result<u8> {
		let mut buf = [0u8; 1];
		self.get_reader().read_exact(&mut buf)?;
		Ok(buf[0])
	}

	/// Reads a base-128 varint of at most ten bytes.
	fn read_varint(&mut self) -> Result<u64> {
		let mut value = 0;
		let mut shift = 0;
		loop {
			let byte = self.read_u8().context("unexpected end of data inside a varint")?;
			value |= (u64::from(byte) & 0x7F) << shift;
			if byte & 0x80 == 0 {
				break;
			}
			shift += 7;
			if shift >= 70 {
				bail!("Varint too long");
			}
		}
		Ok(value)
	}

	/// Reads exactly `length` bytes. Fails without allocating if fewer are left.
	fn read_blob(&mut self, length: u64) -> Result<Blob> {
		let remaining = self.remaining();
		ensure!(
			length <= remaining,
			"length {length} exceeds the {remaining} remaining bytes"
		);
		let mut blob = Blob::new_sized(usize::try_from(length)?);
		self.get_reader().read_exact(blob.as_mut_slice())?;
		Ok(blob)
	}

	fn read_string(&mut self, length: u64) -> Result<String> {
		let blob = self.read_blob(length)?;
		String::from_utf8(blob.into_vec()).context("string is not valid UTF-8")
	}

	/// Reads a key and splits it into `(field_number, wire_type)`.
	fn read_pbf_key(&mut self) -> Result<(u32, u8)> {
		let value = self.read_varint().context("Failed to read varint for PBF key")?;
		let field_number = u32::try_from(value >> 3).context("PBF field number out of range")?;
		#[allow(clippy::cast_possible_truncation)]
		Ok((field_number, (value & 0x07) as u8))
	}

	/// Returns a reader limited to the next `length` bytes and moves past them.
	fn get_sub_reader<'b>(&'b mut self, length: u64) -> Result<Box<dyn ValueReader<'b> + 'b>>;

	/// Returns a sub-reader for a length-prefixed embedded message.
	fn get_pbf_sub_reader<'b>(&'b mut self) -> Result<Box<dyn ValueReader<'b> + 'b>> {
		let length = self
			.read_varint()
			.context("Failed to read varint for sub-reader length")?;
		self.get_sub_reader(length).context("Failed to get sub-reader")
	}

	fn read_pbf_string(&mut self) -> Result<String> {
		let length = self.read_varint().context("Failed to read varint for string length")?;
		self.read_string(length).context("Failed to read PBF string")
	}

	fn read_pbf_blob(&mut self) -> Result<Blob> {
		let length = self.read_varint().context("Failed to read varint for blob length")?;
		self.read_blob(length).context("Failed to read PBF blob")
	}

	/// Steps over the value of a field whose key has just been read.
	///
	/// Group wire types (3 and 4) are deprecated and rejected, as are the
	/// undefined types 6 and 7.
	fn skip_pbf_field(&mut self, wire_type: u8) -> Result<()> {
		let length = match wire_type {
			WIRE_TYPE_VARINT => {
				self.read_varint()?;
				return Ok(());
			}
			WIRE_TYPE_FIXED64 => 8,
			WIRE_TYPE_LEN => self.read_varint().context("Failed to read varint for field length")?,
			WIRE_TYPE_FIXED32 => 4,
			_ => bail!("unsupported wire type {wire_type}"),
		};
		let remaining = self.remaining();
		ensure!(
			length <= remaining,
			"field length {length} exceeds the {remaining} remaining bytes"
		);
		let target = self.position() + length;
		self.set_position(target)
	}
}
