use super::layer::VectorTileLayer;
use anyhow::{Context, Result};
use xonacatl_core::{
	Blob,
	io::{ValueReader, ValueReaderSlice, ValueWriter, ValueWriterBlob, WIRE_TYPE_LEN},
};

const LAYERS_FIELD: u32 = 3;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VectorTile {
	pub layers: Vec<VectorTileLayer>,
	/// Encoded top-level fields other than layers, in their original order.
	pub extra: Vec<u8>,
}

impl VectorTile {
	pub fn from_blob(blob: &Blob) -> Result<VectorTile> {
		let data = blob.as_slice();
		let mut reader = ValueReaderSlice::new(data);

		let mut tile = VectorTile::default();
		while reader.has_remaining() {
			let start = reader.position();
			match reader.read_pbf_key().context("Failed to read PBF key")? {
				(LAYERS_FIELD, WIRE_TYPE_LEN) => {
					let raw = reader.read_pbf_blob().context("Failed to read layer")?;
					tile
						.layers
						.push(VectorTileLayer::from_blob(raw).context("Failed to read VectorTileLayer")?);
				}
				(field, wire_type) => {
					reader
						.skip_pbf_field(wire_type)
						.with_context(|| format!("Failed to skip field {field} of tile"))?;
					let end = reader.position();
					tile.extra.extend_from_slice(&data[start as usize..end as usize]);
				}
			}
		}

		Ok(tile)
	}

	pub fn to_blob(&self) -> Result<Blob> {
		let mut writer = ValueWriterBlob::new();

		for layer in &self.layers {
			writer
				.write_pbf_key(LAYERS_FIELD, WIRE_TYPE_LEN)
				.context("Failed to write PBF key")?;
			writer.write_pbf_blob(&layer.raw).context("Failed to write layer")?;
		}
		writer.write_slice(&self.extra).context("Failed to write extra fields")?;

		Ok(writer.into_blob())
	}

	pub fn find_layer(&self, name: &str) -> Option<&VectorTileLayer> {
		self.layers.iter().find(|layer| layer.name.as_deref() == Some(name))
	}
}
