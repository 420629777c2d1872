use std::io;
use thiserror::Error;

/// Why a layer filter gave up.
///
/// Filters stop at the first error and never retry. Anything already written
/// to the sink stays there; callers that need all-or-nothing output write into
/// a buffer first.
#[derive(Debug, Error)]
pub enum FilterError {
	#[error("malformed input: {0:#}")]
	MalformedInput(anyhow::Error),

	#[error("layer '{layer}' has unsupported version {version}")]
	UnsupportedSchemaVersion { version: u64, layer: String },

	#[error("failed to decode tile: {0:#}")]
	DecodeError(anyhow::Error),

	#[error("failed to encode tile: {0:#}")]
	EncodeError(anyhow::Error),

	#[error("failed to write output")]
	SinkWriteFailed(#[source] io::Error),

	#[error("failed to read input")]
	SourceReadFailed(#[source] io::Error),
}

impl FilterError {
	/// True if the tile body itself was at fault, as opposed to the I/O around it.
	pub fn is_invalid_tile(&self) -> bool {
		matches!(
			self,
			FilterError::MalformedInput(_) | FilterError::UnsupportedSchemaVersion { .. } | FilterError::DecodeError(_)
		)
	}
}
