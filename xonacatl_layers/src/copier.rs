//! Selection of the filter that matches a tile format.

use crate::{FilterError, LayerSet, json::JsonFilter, topojson::TopoJsonFilter, vector_tile::VectorTileFilter};
use std::{
	fmt,
	io::{ErrorKind, Read, Write},
};

/// Copies a tile body from `source` to `sink`, keeping only some layers.
pub trait LayerCopier: Send + Sync {
	fn copy_layers(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<(), FilterError>;
}

/// The tile formats a request can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileFormat {
	Json,
	TopoJson,
	Mvt,
	Unknown,
}

impl TileFormat {
	/// Maps a file extension like `mvt` to a format. Matching is exact.
	pub fn parse(value: &str) -> TileFormat {
		match value {
			"json" => TileFormat::Json,
			"topojson" => TileFormat::TopoJson,
			"mvt" | "mvtb" => TileFormat::Mvt,
			_ => TileFormat::Unknown,
		}
	}
}

impl fmt::Display for TileFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			TileFormat::Json => "json",
			TileFormat::TopoJson => "topojson",
			TileFormat::Mvt => "mvt",
			TileFormat::Unknown => "unknown",
		})
	}
}

/// Copies the body unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl LayerCopier for Passthrough {
	fn copy_layers(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<(), FilterError> {
		let mut buffer = [0u8; 8192];
		loop {
			let length = match source.read(&mut buffer) {
				Ok(0) => break,
				Ok(length) => length,
				Err(err) if err.kind() == ErrorKind::Interrupted => continue,
				Err(err) => return Err(FilterError::SourceReadFailed(err)),
			};
			sink
				.write_all(&buffer[..length])
				.map_err(FilterError::SinkWriteFailed)?;
		}
		sink.flush().map_err(FilterError::SinkWriteFailed)
	}
}

/// The copier chosen for one request.
#[derive(Clone, Debug)]
pub enum TileCopier {
	Passthrough(Passthrough),
	Json(JsonFilter),
	TopoJson(TopoJsonFilter),
	Mvt(VectorTileFilter),
}

impl TileCopier {
	/// Picks the copier for `format`.
	///
	/// Requests for `all` layers and formats without a filter are copied
	/// unchanged, so an unknown format is never run through the wrong parser.
	pub fn for_request(format: &str, layers: LayerSet) -> TileCopier {
		if layers.is_all() {
			return TileCopier::Passthrough(Passthrough);
		}
		match TileFormat::parse(format) {
			TileFormat::Json => TileCopier::Json(JsonFilter::new(layers)),
			TileFormat::TopoJson => TileCopier::TopoJson(TopoJsonFilter::new(layers)),
			TileFormat::Mvt => TileCopier::Mvt(VectorTileFilter::new(layers)),
			TileFormat::Unknown => TileCopier::Passthrough(Passthrough),
		}
	}

	/// True if the body is copied without looking at it.
	pub fn is_passthrough(&self) -> bool {
		matches!(self, TileCopier::Passthrough(_))
	}

	fn as_copier(&self) -> &dyn LayerCopier {
		match self {
			TileCopier::Passthrough(copier) => copier,
			TileCopier::Json(copier) => copier,
			TileCopier::TopoJson(copier) => copier,
			TileCopier::Mvt(copier) => copier,
		}
	}
}

impl LayerCopier for TileCopier {
	fn copy_layers(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<(), FilterError> {
		self.as_copier().copy_layers(source, sink)
	}
}

/// Reads `source` to the end.
pub(crate) fn read_source(source: &mut dyn Read) -> Result<Vec<u8>, FilterError> {
	let mut data = Vec::new();
	source.read_to_end(&mut data).map_err(FilterError::SourceReadFailed)?;
	Ok(data)
}
