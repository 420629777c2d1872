//! A single layer of a vector tile, as far as layer filtering cares.
//!
//! Of the layer message only two fields are decoded:
//!  * field 1: `name` (string)
//!  * field 15: `version` (varint, default 1)
//!
//! Features, keys, values, extent and any unknown fields are never
//! interpreted. The complete encoded message is kept in `raw` and written back
//! unchanged, so a retained layer is byte-identical in the output.

use anyhow::{Context, Result};
use xonacatl_core::{
	Blob,
	io::{ValueReader, ValueReaderSlice, WIRE_TYPE_LEN, WIRE_TYPE_VARINT},
};

/// Version assumed for layers that do not declare one.
pub const DEFAULT_LAYER_VERSION: u64 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct VectorTileLayer {
	pub name: Option<String>,
	pub version: u64,
	pub raw: Blob,
}

impl VectorTileLayer {
	/// Decodes name and version from an encoded layer message and keeps the message.
	pub fn from_blob(raw: Blob) -> Result<VectorTileLayer> {
		let mut name = None;
		let mut version = DEFAULT_LAYER_VERSION;

		let mut reader = ValueReaderSlice::new(raw.as_slice());
		while reader.has_remaining() {
			match reader.read_pbf_key().context("Failed to read PBF key")? {
				(1, WIRE_TYPE_LEN) => {
					name = Some(reader.read_pbf_string().context("Failed to read layer name")?);
				}
				(15, WIRE_TYPE_VARINT) => {
					version = reader.read_varint().context("Failed to read layer version")?;
				}
				(field, wire_type) => reader
					.skip_pbf_field(wire_type)
					.with_context(|| format!("Failed to skip field {field} of layer"))?,
			}
		}

		Ok(VectorTileLayer { name, version, raw })
	}

	/// Name used in log and error messages for layers without a name.
	pub fn display_name(&self) -> &str {
		self.name.as_deref().unwrap_or("<unnamed>")
	}
}
