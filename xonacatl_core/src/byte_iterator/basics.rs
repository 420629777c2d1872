//! JSON scanning helpers built on top of [`ByteIterator`](super::iterator::ByteIterator).
//!
//! - `parse_tag` matches a fixed ASCII literal
//! - `parse_quoted_json_string` decodes a string literal, including `\uXXXX` surrogate pairs
//! - `parse_object_entries` walks the members of an object and hands each value to a closure
//! - `skip_json_value` and `read_raw_json_value` step over a complete value without decoding it
//!
//! The skipping functions validate structure (nesting, string escapes, number
//! grammar, literals) but never build values, so a member of any size is passed
//! over with constant memory apart from the nesting stack. Every function leaves
//! the iterator on the first byte after what it parsed.

use super::iterator::ByteIterator;
use anyhow::{Context, Result, bail};

/// Match a fixed ASCII tag at the current iterator position.
///
/// ```
/// # use std::io::Cursor;
/// # use xonacatl_core::byte_iterator::{ByteIterator, parse_tag};
/// let mut it = ByteIterator::from_reader(Cursor::new("null"), true);
/// parse_tag(&mut it, "null").unwrap();
/// ```
pub fn parse_tag(iter: &mut ByteIterator, tag: &str) -> Result<()> {
	for c in tag.bytes() {
		if iter.expect_next_byte()? != c {
			bail!(iter.format_error(&format!("unexpected character while parsing tag '{tag}'")));
		}
	}
	Ok(())
}

fn parse_hex4(iter: &mut ByteIterator) -> Result<u16> {
	let mut value: u16 = 0;
	for _ in 0..4 {
		let byte = iter.expect_next_byte()?;
		let digit = char::from(byte)
			.to_digit(16)
			.ok_or_else(|| iter.format_error("invalid hex digit in unicode escape"))?;
		value = (value << 4) | u16::try_from(digit)?;
	}
	Ok(value)
}

/// Parse a JSON quoted string literal and return it as `String`.
///
/// Supports the standard escapes and `\uXXXX`, combining UTF-16 surrogate
/// pairs. A surrogate without its partner decodes to U+FFFD. Unescaped
/// control characters and unknown escapes are rejected.
///
/// ```
/// # use std::io::Cursor;
/// # use xonacatl_core::byte_iterator::{ByteIterator, parse_quoted_json_string};
/// let mut it = ByteIterator::from_reader(Cursor::new("\"he\\nllo\""), true);
/// assert_eq!(parse_quoted_json_string(&mut it).unwrap(), "he\nllo");
/// ```
pub fn parse_quoted_json_string(iter: &mut ByteIterator) -> Result<String> {
	iter.skip_whitespace();
	if iter.expect_next_byte()? != b'"' {
		bail!(iter.format_error("expected '\"' while parsing a string"));
	}

	let mut bytes = Vec::with_capacity(32);
	// consecutive \uXXXX escapes, decoded together so surrogate pairs combine
	let mut units: Vec<u16> = Vec::new();

	loop {
		let byte = iter.expect_next_byte()?;
		let escape = if byte == b'\\' {
			Some(iter.expect_next_byte()?)
		} else {
			None
		};
		if escape == Some(b'u') {
			units.push(parse_hex4(iter)?);
			continue;
		}
		flush_utf16(&mut units, &mut bytes);

		match (byte, escape) {
			(b'"', None) => break,
			(_, Some(b'"')) => bytes.push(b'"'),
			(_, Some(b'\\')) => bytes.push(b'\\'),
			(_, Some(b'/')) => bytes.push(b'/'),
			(_, Some(b'b')) => bytes.push(b'\x08'),
			(_, Some(b'f')) => bytes.push(b'\x0C'),
			(_, Some(b'n')) => bytes.push(b'\n'),
			(_, Some(b'r')) => bytes.push(b'\r'),
			(_, Some(b't')) => bytes.push(b'\t'),
			(_, Some(_)) => bail!(iter.format_error("invalid escape sequence")),
			(c, None) if c < 0x20 => bail!(iter.format_error("unescaped control character in string")),
			(c, None) => bytes.push(c),
		}
	}
	String::from_utf8(bytes).context("string is not valid UTF-8")
}

fn flush_utf16(units: &mut Vec<u16>, bytes: &mut Vec<u8>) {
	let mut buf = [0u8; 4];
	for c in char::decode_utf16(units.drain(..)) {
		let c = c.unwrap_or(char::REPLACEMENT_CHARACTER);
		bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
	}
}

/// Iterate over JSON object members, invoking `parse_value` for each key.
///
/// The closure gets the decoded key and the iterator positioned at the first
/// byte of the value; it must consume the whole value. After each value either
/// `,` continues or `}` ends the object.
///
/// ```
/// # use std::io::Cursor;
/// # use xonacatl_core::byte_iterator::{ByteIterator, parse_object_entries, parse_quoted_json_string};
/// let mut it = ByteIterator::from_reader(Cursor::new("{\"k\":\"v\"}"), true);
/// let mut got = None;
/// parse_object_entries(&mut it, |k, it| { got = Some((k, parse_quoted_json_string(it)?)); Ok(()) }).unwrap();
/// assert_eq!(got, Some(("k".into(), "v".into())));
/// ```
pub fn parse_object_entries<R>(
	iter: &mut ByteIterator,
	mut parse_value: impl FnMut(String, &mut ByteIterator) -> Result<R>,
) -> Result<()> {
	iter.skip_whitespace();
	if iter.expect_next_byte()? != b'{' {
		bail!(iter.format_error("expected '{' while parsing an object"));
	}

	loop {
		iter.skip_whitespace();
		match iter.expect_peeked_byte()? {
			b'}' => {
				iter.advance();
				break;
			}
			b'"' => {
				let key = parse_quoted_json_string(iter).context("while parsing an object key")?;

				iter.skip_whitespace();
				if iter.expect_next_byte()? != b':' {
					bail!(iter.format_error("expected ':'"));
				}

				iter.skip_whitespace();
				parse_value(key, iter)?;

				iter.skip_whitespace();
				match iter.expect_next_byte()? {
					b',' => {
						iter.skip_whitespace();
						if iter.peek() != Some(b'"') {
							bail!(iter.format_error("expected '\"' after ','"));
						}
					}
					b'}' => break,
					_ => bail!(iter.format_error("expected ',' or '}'")),
				}
			}
			_ => bail!(iter.format_error("parsing object, expected '\"' or '}'")),
		}
	}
	Ok(())
}

fn skip_json_string(iter: &mut ByteIterator) -> Result<()> {
	if iter.expect_next_byte()? != b'"' {
		bail!(iter.format_error("expected '\"' while parsing a string"));
	}
	loop {
		match iter.expect_next_byte()? {
			b'"' => return Ok(()),
			b'\\' => match iter.expect_next_byte()? {
				b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => {}
				b'u' => {
					parse_hex4(iter)?;
				}
				_ => bail!(iter.format_error("invalid escape sequence")),
			},
			c if c < 0x20 => bail!(iter.format_error("unescaped control character in string")),
			_ => {}
		}
	}
}

fn skip_digits(iter: &mut ByteIterator) -> usize {
	let mut count = 0;
	while let Some(b'0'..=b'9') = iter.peek() {
		iter.advance();
		count += 1;
	}
	count
}

fn skip_json_number(iter: &mut ByteIterator) -> Result<()> {
	if iter.peek() == Some(b'-') {
		iter.advance();
	}

	match iter.expect_peeked_byte()? {
		b'0' => iter.advance(),
		b'1'..=b'9' => {
			skip_digits(iter);
		}
		_ => bail!(iter.format_error("expected digits in number")),
	}

	if iter.peek() == Some(b'.') {
		iter.advance();
		if skip_digits(iter) == 0 {
			bail!(iter.format_error("expected digits after decimal point"));
		}
	}

	if let Some(b'e' | b'E') = iter.peek() {
		iter.advance();
		if let Some(b'+' | b'-') = iter.peek() {
			iter.advance();
		}
		if skip_digits(iter) == 0 {
			bail!(iter.format_error("expected digits after exponent"));
		}
	}
	Ok(())
}

fn skip_member_key(iter: &mut ByteIterator) -> Result<()> {
	iter.skip_whitespace();
	skip_json_string(iter).context("while parsing an object key")?;
	iter.skip_whitespace();
	if iter.expect_next_byte()? != b':' {
		bail!(iter.format_error("expected ':'"));
	}
	Ok(())
}

/// Step over one complete JSON value (object, array, string, number or literal).
///
/// Leading whitespace is skipped, trailing whitespace is not. Nesting is
/// tracked on a heap stack, so deeply nested input cannot exhaust the call stack.
pub fn skip_json_value(iter: &mut ByteIterator) -> Result<()> {
	// closing bytes of the containers we are inside of
	let mut open: Vec<u8> = Vec::new();

	loop {
		iter.skip_whitespace();
		match iter.expect_peeked_byte()? {
			b'{' => {
				iter.advance();
				iter.skip_whitespace();
				if iter.peek() == Some(b'}') {
					iter.advance();
				} else {
					open.push(b'}');
					skip_member_key(iter)?;
					continue;
				}
			}
			b'[' => {
				iter.advance();
				iter.skip_whitespace();
				if iter.peek() == Some(b']') {
					iter.advance();
				} else {
					open.push(b']');
					continue;
				}
			}
			b'"' => skip_json_string(iter)?,
			b'-' | b'0'..=b'9' => skip_json_number(iter)?,
			b't' => parse_tag(iter, "true")?,
			b'f' => parse_tag(iter, "false")?,
			b'n' => parse_tag(iter, "null")?,
			_ => bail!(iter.format_error("unexpected character while parsing a value")),
		}

		// a value is complete, close every container that ends here
		loop {
			let Some(&closer) = open.last() else {
				return Ok(());
			};
			iter.skip_whitespace();
			match iter.expect_next_byte()? {
				b',' => {
					if closer == b'}' {
						skip_member_key(iter)?;
					}
					break;
				}
				c if c == closer => {
					open.pop();
				}
				_ => bail!(iter.format_error(&format!("expected ',' or '{}'", char::from(closer)))),
			}
		}
	}
}

/// Read one complete JSON value and return its exact source bytes.
///
/// The value is validated like [`skip_json_value`] but nothing inside it is
/// decoded or normalized, so `1.50` stays `1.50`.
///
/// ```
/// # use std::io::Cursor;
/// # use xonacatl_core::byte_iterator::{ByteIterator, read_raw_json_value};
/// let mut it = ByteIterator::from_reader(Cursor::new("  [1.50, {\"a\" : null}] ,"), false);
/// assert_eq!(read_raw_json_value(&mut it).unwrap(), b"[1.50, {\"a\" : null}]");
/// ```
pub fn read_raw_json_value(iter: &mut ByteIterator) -> Result<Vec<u8>> {
	iter.skip_whitespace();
	iter.start_capture();
	let result = skip_json_value(iter);
	let raw = iter.finish_capture();
	result.map(|()| raw)
}
