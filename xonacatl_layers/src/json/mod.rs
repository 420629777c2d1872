//! Streaming filter for JSON tiles.
//!
//! A JSON tile is one object that maps layer names to arbitrary JSON values.
//! The filter walks the members in a single pass through a 4 KiB buffer and
//! copies the values of wanted layers byte for byte: numbers are never parsed,
//! so coordinates keep exactly the precision the origin wrote.
//!
//! Output shape by number of requested layers `n`:
//!
//! | `n` | output                                                           |
//! |-----|------------------------------------------------------------------|
//! | 0   | `{}` without reading the input                                   |
//! | 1   | the bare value of the wanted member, or `{}` if it is missing    |
//! | >1  | `{"key":value,...}` with the wanted members in document order     |

mod writer;

use crate::{FilterError, LayerCopier, LayerSet};
use std::io::{Read, Write};
use writer::LayersWriter;
use xonacatl_core::byte_iterator::{ByteIterator, parse_object_entries, read_raw_json_value, skip_json_value};

/// Copies the wanted layers of the JSON tile in `source` to `sink`.
///
/// Output is written while the input is parsed, so on error `sink` may hold a
/// partial document.
pub fn filter_json(source: &mut dyn Read, wanted: &LayerSet, sink: &mut dyn Write) -> Result<(), FilterError> {
	let requested = wanted.wanted_count();
	if requested == 0 {
		log::trace!("no layers requested, skipping input");
		sink.write_all(b"{}").map_err(FilterError::SinkWriteFailed)?;
		return sink.flush().map_err(FilterError::SinkWriteFailed);
	}

	let mut iter = ByteIterator::from_reader(source, false);
	iter.skip_whitespace();
	if iter.peek() != Some(b'{') {
		let err = iter.format_error("expected a JSON object");
		return Err(classify(&mut iter, err));
	}

	let mut writer = LayersWriter::new(sink, requested);
	writer.begin()?;

	let result = parse_object_entries(&mut iter, |key, iter| {
		if wanted.is_wanted(&key) {
			log::trace!("copying layer '{key}'");
			let raw = read_raw_json_value(iter)?;
			writer.write_member(&key, &raw)
		} else {
			log::trace!("dropping layer '{key}'");
			skip_json_value(iter)
		}
	});

	if let Some(failure) = writer.take_failure() {
		return Err(failure);
	}
	if let Err(err) = result {
		return Err(classify(&mut iter, err));
	}
	writer.finish()
}

fn classify(iter: &mut ByteIterator, err: anyhow::Error) -> FilterError {
	match iter.take_read_error() {
		Some(read_error) => FilterError::SourceReadFailed(read_error),
		None => FilterError::MalformedInput(err),
	}
}

/// [`LayerCopier`] for JSON tiles.
#[derive(Clone, Debug)]
pub struct JsonFilter {
	layers: LayerSet,
}

impl JsonFilter {
	#[must_use]
	pub fn new(layers: LayerSet) -> JsonFilter {
		JsonFilter { layers }
	}
}

impl LayerCopier for JsonFilter {
	fn copy_layers(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<(), FilterError> {
		filter_json(source, &self.layers, sink)
	}
}

impl Default for JsonFilter {
	fn default() -> Self {
		JsonFilter::new(LayerSet::new())
	}
}
