//! `ValueReaderSlice`: a [`ValueReader`] over a borrowed byte slice.
//!
//! Sub-readers borrow from the same slice, so walking nested messages never copies.

use super::{SeekRead, ValueReader};
use anyhow::{Result, anyhow, bail};
use std::io::Cursor;

pub struct ValueReaderSlice<'a> {
	cursor: Cursor<&'a [u8]>,
	len: u64,
}

impl<'a> ValueReaderSlice<'a> {
	#[must_use]
	pub fn new(slice: &'a [u8]) -> ValueReaderSlice<'a> {
		ValueReaderSlice {
			len: slice.len() as u64,
			cursor: Cursor::new(slice),
		}
	}
}

impl SeekRead for Cursor<&[u8]> {}

impl<'a> ValueReader<'a> for ValueReaderSlice<'a> {
	fn get_reader(&mut self) -> &mut dyn SeekRead {
		&mut self.cursor
	}

	fn len(&self) -> u64 {
		self.len
	}

	fn position(&mut self) -> u64 {
		self.cursor.position()
	}

	/// Moves the cursor; `len()` itself is allowed and means "at the end".
	fn set_position(&mut self, position: u64) -> Result<()> {
		if position > self.len {
			bail!("set position outside length")
		}
		self.cursor.set_position(position);
		Ok(())
	}

	fn get_sub_reader<'b>(&'b mut self, length: u64) -> Result<Box<dyn ValueReader<'b> + 'b>> {
		let start = self.cursor.position();
		let end = start
			.checked_add(length)
			.ok_or_else(|| anyhow!("sub-reader length overflows"))?;
		if end > self.len {
			bail!("Requested sub-reader length exceeds remaining data");
		}

		self.cursor.set_position(end);
		let slice = self
			.cursor
			.get_ref()
			.get(usize::try_from(start)?..usize::try_from(end)?)
			.ok_or_else(|| anyhow!("out of bounds"))?;
		Ok(Box::new(ValueReaderSlice::new(slice)))
	}
}
