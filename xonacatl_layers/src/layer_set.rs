use std::{collections::BTreeMap, fmt};

/// The layer name that turns filtering off.
pub const ALL_LAYERS: &str = "all";

/// The layer names a client asked for.
///
/// Names that were never inserted count as unwanted. The number of wanted
/// names decides the output shape of the JSON filter, so a set built from
/// `"water,water"` behaves like one built from `"water"`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerSet {
	layers: BTreeMap<String, bool>,
}

impl LayerSet {
	#[must_use]
	pub fn new() -> LayerSet {
		LayerSet::default()
	}

	/// Parses a comma separated request parameter. Every piece is wanted,
	/// including empty pieces.
	///
	/// ```
	/// use xonacatl_layers::LayerSet;
	///
	/// let layers = LayerSet::from_param("water,roads");
	/// assert!(layers.is_wanted("roads"));
	/// assert_eq!(layers.wanted_count(), 2);
	/// ```
	#[must_use]
	pub fn from_param(text: &str) -> LayerSet {
		text.split(',').collect()
	}

	pub fn insert(&mut self, name: impl Into<String>, wanted: bool) {
		self.layers.insert(name.into(), wanted);
	}

	#[must_use]
	pub fn is_wanted(&self, name: &str) -> bool {
		self.layers.get(name).copied().unwrap_or(false)
	}

	#[must_use]
	pub fn wanted_count(&self) -> usize {
		self.layers.values().filter(|wanted| **wanted).count()
	}

	/// True if `all` is wanted, which means no filtering at all.
	#[must_use]
	pub fn is_all(&self) -> bool {
		self.is_wanted(ALL_LAYERS)
	}

	/// The wanted names in lexicographic order.
	pub fn wanted_names(&self) -> impl Iterator<Item = &str> {
		self
			.layers
			.iter()
			.filter(|(_, wanted)| **wanted)
			.map(|(name, _)| name.as_str())
	}
}

impl<'a> FromIterator<&'a str> for LayerSet {
	fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
		iter.into_iter().map(|name| (name.to_string(), true)).collect()
	}
}

impl FromIterator<(String, bool)> for LayerSet {
	fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
		LayerSet {
			layers: iter.into_iter().collect(),
		}
	}
}

impl fmt::Display for LayerSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let names: Vec<&str> = self.wanted_names().collect();
		write!(f, "{}", names.join(","))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("water", 1)]
	#[case("water,roads", 2)]
	#[case("water,water", 1)]
	#[case("", 1)]
	#[case("water,", 2)]
	fn test_from_param(#[case] param: &str, #[case] count: usize) {
		assert_eq!(LayerSet::from_param(param).wanted_count(), count);
	}

	#[test]
	fn test_is_wanted() {
		let mut layers = LayerSet::from_param("water,roads");
		assert!(layers.is_wanted("water"));
		assert!(!layers.is_wanted("buildings"));
		layers.insert("water", false);
		assert!(!layers.is_wanted("water"));
		assert_eq!(layers.wanted_count(), 1);
		assert_eq!(layers.to_string(), "roads");
	}

	#[test]
	fn test_is_all() {
		assert!(LayerSet::from_param("all").is_all());
		assert!(LayerSet::from_param("water,all").is_all());
		assert!(!LayerSet::from_param("water").is_all());
		assert!(!LayerSet::new().is_all());
	}

	#[test]
	fn test_from_pairs() {
		let layers: LayerSet = vec![("a".to_string(), true), ("b".to_string(), false)]
			.into_iter()
			.collect();
		assert_eq!(layers.wanted_names().collect::<Vec<_>>(), vec!["a"]);
		assert_eq!(LayerSet::new().wanted_count(), 0);
	}
}
