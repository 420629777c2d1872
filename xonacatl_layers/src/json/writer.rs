use crate::FilterError;
use anyhow::{Result, anyhow};
use std::io::Write;

/// Writes the selected members of a JSON tile.
///
/// The output shape only depends on how many layers were requested: a single
/// requested layer is written as its bare value, several layers are wrapped in
/// an object keyed by layer name.
pub(super) struct LayersWriter<'w> {
	sink: &'w mut dyn Write,
	requested: usize,
	written: usize,
	failure: Option<FilterError>,
}

impl<'w> LayersWriter<'w> {
	pub fn new(sink: &'w mut dyn Write, requested: usize) -> LayersWriter<'w> {
		LayersWriter {
			sink,
			requested,
			written: 0,
			failure: None,
		}
	}

	pub fn begin(&mut self) -> Result<(), FilterError> {
		if self.requested > 1 {
			self.sink.write_all(b"{").map_err(FilterError::SinkWriteFailed)?;
		}
		Ok(())
	}

	/// Writes one member. A failure is kept for [`Self::take_failure`] and
	/// reported to the parser as a plain error so that it stops.
	pub fn write_member(&mut self, key: &str, raw_value: &[u8]) -> Result<()> {
		if let Err(err) = self.try_write_member(key, raw_value) {
			self.failure = Some(err);
			return Err(anyhow!("output aborted"));
		}
		self.written += 1;
		Ok(())
	}

	fn try_write_member(&mut self, key: &str, raw_value: &[u8]) -> Result<(), FilterError> {
		if self.requested > 1 {
			let mut prefix = Vec::with_capacity(key.len() + 4);
			if self.written > 0 {
				prefix.push(b',');
			}
			serde_json::to_writer(&mut prefix, key).map_err(|err| FilterError::EncodeError(err.into()))?;
			prefix.push(b':');
			self.sink.write_all(&prefix).map_err(FilterError::SinkWriteFailed)?;
		}
		self.sink.write_all(raw_value).map_err(FilterError::SinkWriteFailed)
	}

	pub fn take_failure(&mut self) -> Option<FilterError> {
		self.failure.take()
	}

	pub fn finish(self) -> Result<(), FilterError> {
		let closing: &[u8] = match (self.requested, self.written) {
			(1, 0) => b"{}",
			(1, _) => b"",
			_ => b"}",
		};
		self.sink.write_all(closing).map_err(FilterError::SinkWriteFailed)?;
		self.sink.flush().map_err(FilterError::SinkWriteFailed)
	}
}
