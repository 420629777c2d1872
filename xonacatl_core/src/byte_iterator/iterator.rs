//! A buffered, peekable byte reader over any `std::io::Read` source.
//!
//! `ByteIterator` keeps exactly one byte of lookahead (`peek`) and pulls the
//! source in fixed 4 KiB chunks, so arbitrarily large inputs are scanned with
//! constant memory. Two extras matter to the layer filters:
//!
//! * **Capture**: between [`ByteIterator::start_capture`] and
//!   [`ByteIterator::finish_capture`] every consumed byte is recorded, which is
//!   how a JSON value is copied byte-for-byte without decoding it.
//! * **Read errors**: a failing source ends the stream like EOF would, but the
//!   `io::Error` is kept and can be taken with [`ByteIterator::take_read_error`]
//!   so callers can tell a broken source apart from malformed content.
//!
//! With debug mode enabled a small ring buffer of recent bytes is included in
//! error messages.

use anyhow::{Error, Result, anyhow};
use std::io::{self, Read};

const DEBUG_RING_BUFFER_SIZE: usize = 16;
const BUFFER_SIZE: usize = 4096;

pub struct ByteIterator<'a> {
	buffer: [u8; BUFFER_SIZE],
	buffer_len: usize,
	buffer_pos: usize,
	source: Box<dyn Read + 'a>,
	peeked_byte: Option<u8>,
	position: usize,
	read_error: Option<io::Error>,
	capture: Option<Vec<u8>>,
	is_debug_enabled: bool,
	debug_buffer: [u8; DEBUG_RING_BUFFER_SIZE],
}

impl<'a> ByteIterator<'a> {
	/// Creates a new `ByteIterator` and loads the first byte of `reader`.
	pub fn from_reader(reader: impl Read + 'a, debug: bool) -> Self {
		let mut instance = ByteIterator {
			buffer: [0; BUFFER_SIZE],
			buffer_len: 0,
			buffer_pos: 0,
			source: Box::new(reader),
			peeked_byte: None,
			position: 0,
			read_error: None,
			capture: None,
			is_debug_enabled: debug,
			debug_buffer: [0; DEBUG_RING_BUFFER_SIZE],
		};
		instance.fill_buffer();
		instance.advance();
		instance
	}

	fn fill_buffer(&mut self) {
		self.buffer_pos = 0;
		self.buffer_len = 0;
		if self.read_error.is_some() {
			return;
		}
		loop {
			match self.source.read(&mut self.buffer) {
				Ok(len) => {
					self.buffer_len = len;
					return;
				}
				Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
				Err(err) => {
					log::trace!("byte source failed: {err}");
					self.read_error = Some(err);
					return;
				}
			}
		}
	}

	#[inline]
	fn next_byte(&mut self) -> Option<u8> {
		if self.buffer_pos >= self.buffer_len {
			self.fill_buffer();
			if self.buffer_len == 0 {
				return None;
			}
		}
		let byte = self.buffer[self.buffer_pos];
		self.buffer_pos += 1;
		Some(byte)
	}

	/// Builds an error that names the current byte position and, in debug mode,
	/// shows the most recently read bytes.
	#[must_use]
	pub fn format_error(&self, msg: &str) -> Error {
		let position = self.position.saturating_sub(1);
		if self.is_debug_enabled {
			let (start_index, length) = if self.position < DEBUG_RING_BUFFER_SIZE {
				(0, position)
			} else {
				(self.position % DEBUG_RING_BUFFER_SIZE, DEBUG_RING_BUFFER_SIZE - 1)
			};

			let debug_snapshot: Vec<u8> = self
				.debug_buffer
				.iter()
				.cycle()
				.skip(start_index)
				.take(length)
				.copied()
				.collect();

			let mut debug_output = String::from_utf8_lossy(&debug_snapshot).into_owned();
			if self.peeked_byte.is_none() {
				debug_output.push_str("<EOF>");
			}
			anyhow!("{msg} at position {position}: {debug_output}")
		} else {
			anyhow!("{msg} at position {position}")
		}
	}

	#[inline]
	#[must_use]
	pub fn position(&self) -> usize {
		self.position
	}

	#[inline]
	#[must_use]
	pub fn peek(&self) -> Option<u8> {
		self.peeked_byte
	}

	/// Consumes the peeked byte and loads the next one.
	#[inline]
	pub fn advance(&mut self) {
		if let (Some(capture), Some(byte)) = (self.capture.as_mut(), self.peeked_byte) {
			capture.push(byte);
		}
		self.peeked_byte = self.next_byte();
		if self.is_debug_enabled
			&& let Some(byte) = self.peeked_byte
		{
			let index = self.position % DEBUG_RING_BUFFER_SIZE;
			self.debug_buffer[index] = byte;
		}
		self.position += 1;
	}

	#[inline]
	pub fn consume(&mut self) -> Option<u8> {
		let current_byte = self.peeked_byte;
		self.advance();
		current_byte
	}

	/// Consumes and returns the next byte, failing at the end of the stream.
	#[inline]
	pub fn expect_next_byte(&mut self) -> Result<u8> {
		if let Some(current_byte) = self.peeked_byte {
			self.advance();
			Ok(current_byte)
		} else {
			Err(self.format_error("unexpected end"))
		}
	}

	/// Returns the peeked byte without consuming it, failing at the end of the stream.
	#[inline]
	pub fn expect_peeked_byte(&self) -> Result<u8> {
		self.peeked_byte.ok_or_else(|| self.format_error("unexpected end"))
	}

	pub fn skip_whitespace(&mut self) {
		while let Some(byte) = self.peek() {
			if !byte.is_ascii_whitespace() {
				break;
			}
			self.advance();
		}
	}

	/// Starts recording consumed bytes. A capture already in progress is discarded.
	pub fn start_capture(&mut self) {
		self.capture = Some(Vec::with_capacity(256));
	}

	/// Stops recording and returns every byte consumed since [`Self::start_capture`].
	pub fn finish_capture(&mut self) -> Vec<u8> {
		self.capture.take().unwrap_or_default()
	}

	/// Takes the I/O error that ended the stream, if the source failed.
	pub fn take_read_error(&mut self) -> Option<io::Error> {
		self.read_error.take()
	}

	/// Consumes all remaining bytes into a UTF-8 `String`.
	pub fn into_string(mut self) -> Result<String> {
		let mut result = Vec::new();
		while let Some(byte) = self.consume() {
			result.push(byte);
		}
		String::from_utf8(result).map_err(anyhow::Error::from)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	struct FailingReader {
		data: Vec<u8>,
		served: bool,
	}

	impl Read for FailingReader {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			if self.served {
				return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"));
			}
			self.served = true;
			buf[..self.data.len()].copy_from_slice(&self.data);
			Ok(self.data.len())
		}
	}

	#[test]
	fn test_peek_and_consume() {
		let mut b = ByteIterator::from_reader(Cursor::new(vec![b'1', b'2', b'3']), false);

		assert_eq!(b.peek(), Some(b'1'));
		assert_eq!(b.consume(), Some(b'1'));
		assert_eq!(b.peek(), Some(b'2'));
		assert_eq!(b.consume(), Some(b'2'));
		assert_eq!(b.consume(), Some(b'3'));
		assert_eq!(b.peek(), None);
		assert_eq!(b.consume(), None);
	}

	#[test]
	fn test_expect_next_byte() {
		let mut b = ByteIterator::from_reader(Cursor::new(vec![b'A', b'B']), false);

		assert_eq!(b.expect_next_byte().unwrap(), b'A');
		assert_eq!(b.expect_peeked_byte().unwrap(), b'B');
		assert_eq!(b.expect_next_byte().unwrap(), b'B');
		assert!(b.expect_next_byte().is_err());
		assert!(b.expect_peeked_byte().is_err());
	}

	#[test]
	fn test_skip_whitespace() {
		let mut b = ByteIterator::from_reader(Cursor::new(" \t\r\nAB"), false);
		b.skip_whitespace();
		assert_eq!(b.consume(), Some(b'A'));
		assert_eq!(b.into_string().unwrap(), "B");
	}

	#[test]
	fn test_reads_across_buffer_boundary() {
		let data = vec![b'x'; BUFFER_SIZE * 2 + 3];
		let b = ByteIterator::from_reader(Cursor::new(data.clone()), false);
		assert_eq!(b.into_string().unwrap().len(), data.len());
	}

	#[test]
	fn test_capture() {
		let mut b = ByteIterator::from_reader(Cursor::new("ab[1, 2]cd"), false);
		b.advance();
		b.advance();
		b.start_capture();
		for _ in 0..6 {
			b.advance();
		}
		assert_eq!(b.finish_capture(), b"[1, 2]");
		assert_eq!(b.peek(), Some(b'c'));
		b.advance();
		assert_eq!(b.finish_capture(), b"");
	}

	#[test]
	fn test_read_error_is_kept() {
		let reader = FailingReader {
			data: b"{\"a\"".to_vec(),
			served: false,
		};
		let mut b = ByteIterator::from_reader(reader, false);
		for _ in 0..4 {
			b.expect_next_byte().unwrap();
		}
		assert!(b.expect_next_byte().is_err());
		let err = b.take_read_error().unwrap();
		assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
		assert!(b.take_read_error().is_none());
	}

	#[test]
	fn test_debug_error_formatting() {
		let mut b = ByteIterator::from_reader(Cursor::new("Rust"), true);
		b.consume();
		b.consume();
		b.consume();
		let error = b.format_error("Testing error");
		assert_eq!(error.to_string(), "Testing error at position 3: Rus");
	}

	#[test]
	fn test_debug_error_at_eof() {
		let mut b = ByteIterator::from_reader(Cursor::new("ab"), true);
		b.consume();
		b.consume();
		let error = b.format_error("oops");
		assert!(error.to_string().ends_with("<EOF>"));
	}
}
