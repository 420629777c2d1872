//! The `ValueWriter` trait: encoding of protocol-buffer primitives into any
//! `std::io::Write`.
//!
//! ```rust
//! use xonacatl_core::io::{ValueWriter, ValueWriterBlob};
//!
//! let mut writer = ValueWriterBlob::new();
//! writer.write_pbf_key(1, 2).unwrap();
//! writer.write_pbf_string("ok").unwrap();
//! assert_eq!(writer.into_blob().as_slice(), &[0x0a, 0x02, b'o', b'k']);
//! ```

use crate::Blob;
use anyhow::{Context, Result};
use std::io::Write;

pub trait ValueWriter {
	fn get_writer(&mut self) -> &mut dyn Write;

	fn position(&mut self) -> Result<u64>;

	fn is_empty(&mut self) -> Result<bool> {
		Ok(self.position()? == 0)
	}

	fn write_varint(&mut self, mut value: u64) -> Result<()> {
		while value >= 0x80 {
			#[allow(clippy::cast_possible_truncation)]
			self.get_writer().write_all(&[((value & 0x7F) as u8) | 0x80])?;
			value >>= 7;
		}
		#[allow(clippy::cast_possible_truncation)]
		self.get_writer().write_all(&[value as u8])?;
		Ok(())
	}

	fn write_u8(&mut self, value: u8) -> Result<()> {
		Ok(self.get_writer().write_all(&[value])?)
	}

	fn write_slice(&mut self, buf: &[u8]) -> Result<()> {
		Ok(self.get_writer().write_all(buf)?)
	}

	fn write_blob(&mut self, blob: &Blob) -> Result<()> {
		self.write_slice(blob.as_slice())
	}

	fn write_pbf_key(&mut self, field_number: u32, wire_type: u8) -> Result<()> {
		self
			.write_varint((u64::from(field_number) << 3) | u64::from(wire_type))
			.context("Failed to write PBF key")
	}

	/// Writes a length-delimited payload: varint length, then the bytes.
	fn write_pbf_blob(&mut self, blob: &Blob) -> Result<()> {
		self
			.write_varint(blob.len())
			.context("Failed to write varint for blob length")?;
		self.write_blob(blob).context("Failed to write PBF blob")
	}

	fn write_pbf_string(&mut self, text: &str) -> Result<()> {
		self
			.write_varint(text.len() as u64)
			.context("Failed to write varint for string length")?;
		self.write_slice(text.as_bytes()).context("Failed to write PBF string")
	}
}

#[cfg(test)]
mod tests {
	use super::super::ValueWriterBlob;
	use super::*;

	#[test]
	fn test_write_varint() -> Result<()> {
		let mut writer = ValueWriterBlob::new();
		writer.write_varint(300)?;
		writer.write_varint(0)?;
		writer.write_varint(u64::MAX)?;
		let bytes = writer.into_blob().into_vec();
		assert_eq!(&bytes[0..3], &[0xAC, 0x02, 0x00]);
		assert_eq!(bytes.len(), 3 + 10);
		assert_eq!(bytes[12], 0x01);
		Ok(())
	}

	#[test]
	fn test_write_pbf_key() -> Result<()> {
		let mut writer = ValueWriterBlob::new();
		writer.write_pbf_key(3, 2)?;
		writer.write_pbf_key(15, 0)?;
		writer.write_pbf_key(16, 0)?;
		assert_eq!(writer.into_blob().into_vec(), vec![0x1A, 0x78, 0x80, 0x01]);
		Ok(())
	}

	#[test]
	fn test_write_pbf_blob() -> Result<()> {
		let mut writer = ValueWriterBlob::new();
		assert!(writer.is_empty()?);
		writer.write_pbf_blob(&Blob::from(vec![7, 8]))?;
		writer.write_pbf_blob(&Blob::new_empty())?;
		assert!(!writer.is_empty()?);
		assert_eq!(writer.into_blob().into_vec(), vec![2, 7, 8, 0]);
		Ok(())
	}
}
