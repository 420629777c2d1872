//! Layer filter for TopoJSON tiles.
//!
//! Each layer is one entry of the topology's `objects`. Entries of unwanted
//! layers are removed; everything else is kept as raw JSON text. `arcs` is
//! shared by all objects and referenced by index, so it is copied unchanged
//! even if some arcs are no longer used.
//!
//! The output is compact JSON followed by a newline, with `objects` sorted by
//! layer name. Top-level members other than `type`, `transform`, `objects` and
//! `arcs` are not carried over.
//!
//! Envelope member names match without regard to ASCII case, and a member that
//! appears more than once takes its last value. The same holds for repeated
//! names inside `objects`.

use crate::{FilterError, LayerCopier, LayerSet, copier::read_source};
use anyhow::Context;
use serde::{
	Deserialize, Deserializer, Serialize,
	de::{self, IgnoredAny, MapAccess, Visitor},
};
use serde_json::value::RawValue;
use std::{
	collections::BTreeMap,
	fmt,
	io::{Read, Write},
};

#[derive(Debug, Serialize)]
pub struct Topology {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transform: Option<Box<RawValue>>,
	pub objects: BTreeMap<String, Box<RawValue>>,
	pub arcs: Box<RawValue>,
}

impl<'de> Deserialize<'de> for Topology {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Topology, D::Error> {
		deserializer.deserialize_map(TopologyVisitor)
	}
}

struct TopologyVisitor;

impl<'de> Visitor<'de> for TopologyVisitor {
	type Value = Topology;

	fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
		formatter.write_str("a TopoJSON topology object")
	}

	fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Topology, A::Error> {
		let mut kind = None;
		let mut transform = None;
		let mut objects = None;
		let mut arcs = None;

		while let Some(key) = map.next_key::<String>()? {
			match key.to_ascii_lowercase().as_str() {
				"type" => kind = Some(map.next_value::<String>()?),
				"transform" => transform = map.next_value::<Option<Box<RawValue>>>()?,
				"objects" => objects = Some(map.next_value::<BTreeMap<String, Box<RawValue>>>()?),
				"arcs" => arcs = Some(map.next_value::<Box<RawValue>>()?),
				_ => {
					map.next_value::<IgnoredAny>()?;
				}
			}
		}

		Ok(Topology {
			kind: kind.ok_or_else(|| de::Error::missing_field("type"))?,
			transform,
			objects: objects.ok_or_else(|| de::Error::missing_field("objects"))?,
			arcs: arcs.ok_or_else(|| de::Error::missing_field("arcs"))?,
		})
	}
}

impl Topology {
	/// Decodes the first JSON value in `data`; anything after it is ignored.
	pub fn from_slice(data: &[u8]) -> anyhow::Result<Topology> {
		let mut deserializer = serde_json::Deserializer::from_slice(data);
		Topology::deserialize(&mut deserializer).context("input is not a TopoJSON topology")
	}

	pub fn retain_layers(&mut self, wanted: &LayerSet) {
		self.objects.retain(|name, _| {
			let keep = wanted.is_wanted(name);
			log::trace!("{} layer '{name}'", if keep { "keeping" } else { "dropping" });
			keep
		});
	}
}

/// Copies the TopoJSON tile in `source` to `sink`, keeping only wanted objects.
pub fn filter_topojson(source: &mut dyn Read, wanted: &LayerSet, sink: &mut dyn Write) -> Result<(), FilterError> {
	let data = read_source(source)?;
	let mut topology = Topology::from_slice(&data).map_err(FilterError::MalformedInput)?;

	topology.retain_layers(wanted);

	let mut output = serde_json::to_vec(&topology)
		.context("failed to serialize topology")
		.map_err(FilterError::EncodeError)?;
	output.push(b'\n');

	sink.write_all(&output).map_err(FilterError::SinkWriteFailed)?;
	sink.flush().map_err(FilterError::SinkWriteFailed)
}

/// [`LayerCopier`] for TopoJSON tiles. Needs the whole body in memory.
#[derive(Clone, Debug)]
pub struct TopoJsonFilter {
	layers: LayerSet,
}

impl TopoJsonFilter {
	#[must_use]
	pub fn new(layers: LayerSet) -> TopoJsonFilter {
		TopoJsonFilter { layers }
	}
}

impl LayerCopier for TopoJsonFilter {
	fn copy_layers(&self, source: &mut dyn Read, sink: &mut dyn Write) -> Result<(), FilterError> {
		filter_topojson(source, &self.layers, sink)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	const MINIMAL: &str = r#"{"type":"Topology","objects":{},"arcs":[]}"#;
	const FOO: &str = r#"{"type":"Topology","objects":{"foo":{"foo":false}},"arcs":[]}"#;
	const FOOBAR: &str = r#"{"type":"Topology","objects":{"bar":{"bar":false},"foo":{"foo":false}},"arcs":[]}"#;

	fn filter(input: &str, layers: &[&str]) -> Result<String, FilterError> {
		let wanted: LayerSet = layers.iter().copied().collect();
		let mut output = Vec::new();
		filter_topojson(&mut input.as_bytes(), &wanted, &mut output)?;
		Ok(String::from_utf8(output).unwrap())
	}

	#[rstest]
	#[case(MINIMAL, &[], MINIMAL)]
	#[case(FOOBAR, &[], MINIMAL)]
	#[case(FOOBAR, &["foo"], FOO)]
	#[case(FOOBAR, &["foo", "bar"], FOOBAR)]
	#[case(FOOBAR, &["foo", "baz"], FOO)]
	fn test_filter(#[case] input: &str, #[case] layers: &[&str], #[case] expected: &str) {
		assert_eq!(filter(input, layers).unwrap().trim(), expected);
	}

	#[test]
	fn test_output_ends_with_newline() {
		assert_eq!(filter(MINIMAL, &["foo"]).unwrap(), format!("{MINIMAL}\n"));
	}

	#[test]
	fn test_objects_are_sorted() {
		let input = r#"{"type":"Topology","objects":{"zeta":1,"alpha":2},"arcs":[]}"#;
		assert_eq!(
			filter(input, &["zeta", "alpha"]).unwrap().trim(),
			r#"{"type":"Topology","objects":{"alpha":2,"zeta":1},"arcs":[]}"#
		);
	}

	#[test]
	fn test_raw_values_are_untouched() {
		let input = r#"{
			"type": "Topology",
			"transform": {"scale": [0.0010, 1E-3], "translate": [0, 0]},
			"objects": {"water": {"type": "GeometryCollection", "geometries": [{"arcs": [[0]]}]}, "roads": {}},
			"arcs": [[[0.10, 2.000], [1, -1]], [[5, 5]]],
			"bbox": [0, 0, 1, 1]
		}"#;
		let output = filter(input, &["water"]).unwrap();
		assert_eq!(
			output.trim(),
			r#"{"type":"Topology","transform":{"scale": [0.0010, 1E-3], "translate": [0, 0]},"objects":{"water":{"type": "GeometryCollection", "geometries": [{"arcs": [[0]]}]}},"arcs":[[[0.10, 2.000], [1, -1]], [[5, 5]]]}"#
		);

		// filtering the output again changes nothing
		assert_eq!(filter(&output, &["water"]).unwrap(), output);
	}

	#[rstest]
	#[case(r#"{"type":"Topology","objects":{},"arcs":[],"arcs":[1]}"#, r#"{"type":"Topology","objects":{},"arcs":[1]}"#)]
	#[case(r#"{"type":"x","objects":{"a":1},"arcs":[],"objects":{"b":2}}"#, r#"{"type":"x","objects":{"b":2},"arcs":[]}"#)]
	#[case(r#"{"type":"Topology","objects":{"b":1,"b":2},"arcs":[]}"#, r#"{"type":"Topology","objects":{"b":2},"arcs":[]}"#)]
	#[case(r#"{"Type":"Topology","OBJECTS":{"b":1},"Arcs":[]}"#, r#"{"type":"Topology","objects":{"b":1},"arcs":[]}"#)]
	#[case(r#"{"type":"Topology","transform":{"a":1},"transform":null,"objects":{},"arcs":[]}"#, MINIMAL)]
	fn test_repeated_and_cased_members(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(filter(input, &["b"]).unwrap().trim(), expected);
	}

	#[test]
	fn test_null_transform_is_dropped() {
		let input = r#"{"type":"Topology","transform":null,"objects":{},"arcs":[]}"#;
		assert_eq!(filter(input, &["a"]).unwrap().trim(), MINIMAL);
	}

	#[rstest]
	#[case("")]
	#[case("[]")]
	#[case(r#"{"type":"Topology","objects":{}}"#)]
	#[case(r#"{"type":"Topology","arcs":[]}"#)]
	#[case(r#"{"objects":{},"arcs":[]}"#)]
	#[case(r#"{"type":"Topology","objects":[],"arcs":[]}"#)]
	#[case(r#"{"type":"Topology","objects":{"a":},"arcs":[]}"#)]
	fn test_malformed(#[case] input: &str) {
		let err = filter(input, &["a"]).unwrap_err();
		assert!(matches!(err, FilterError::MalformedInput(_)), "{input}: {err:?}");
	}
}
