//! Layer filter for Mapbox vector tiles (protocol buffers).
//!
//! The tile is decoded into its list of layers, layers that were not requested
//! are removed and the tile is encoded again. Retained layers are re-emitted
//! byte for byte. A layer with a version newer than [`MAX_SUPPORTED_VERSION`]
//! fails the whole tile, even if that layer was not requested.

mod layer;
mod tile;

pub use layer::*;
pub use tile::*;

use crate::{FilterError, LayerCopier, LayerSet, copier::read_source};
use std::io::{Read, Write};
use xonacatl_core::Blob;

/// Highest layer version this filter understands.
pub const MAX_SUPPORTED_VERSION: u64 = 2;

/// Returns the tile in `data` reduced to the wanted layers.
///
/// Empty input is a tile without layers and results in empty output.
pub fn filter_vector_tile(data: &Blob, wanted: &LayerSet) -> Result<Blob, FilterError> {
	let mut tile = VectorTile::from_blob(data).map_err(FilterError::DecodeError)?;

	if let Some(layer) = tile.layers.iter().find(|layer| layer.version > MAX_SUPPORTED_VERSION) {
		return Err(FilterError::UnsupportedSchemaVersion {
			version: layer.version,
			layer: layer.display_name().to_string(),
		});
	}

	tile.layers.retain(|layer| {
		let keep = layer.name.as_deref().is_some_and(|name| wanted.is_wanted(name));
		log::trace!("{} layer '{}'", if keep { "keeping" } else { "dropping" }, layer.display_name());
		keep
	});

	tile.to_blob().map_err(FilterError::EncodeError)
}

/// [`LayerCopier`] for vector tiles. Needs the whole body in memory.
#[derive(Clone, Debug)]
pub struct VectorTileFilter {
	layers: LayerSet,
}

impl VectorTileFilter {
	#[must_use]
	pub fn new(layers: LayerSet) -> VectorTileFilter {
		VectorTileFilter { layers }
	}
}

impl LayerCopier for VectorTileFilter {
	fn copy_layers(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<(), FilterError> {
		let data = Blob::from(read_source(source)?);
		let filtered = filter_vector_tile(&data, &self.layers)?;
		sink.write_all(filtered.as_slice()).map_err(FilterError::SinkWriteFailed)?;
		sink.flush().map_err(FilterError::SinkWriteFailed)
	}
}
