//! Everything about the request sent to the origin: its URL and its headers.

use super::route_pattern::PathTemplate;
use anyhow::{Context, Result, anyhow, ensure};
use axum::http::{HeaderMap, HeaderName, HeaderValue, header::ACCEPT_ENCODING};
use regex::Regex;
use reqwest::Url;
use std::{collections::HashMap, fmt};
use xonacatl_layers::ALL_LAYERS;

/// Encodings asked from the origin. Filters work on plain bytes, gzip is decoded first.
pub const ORIGIN_ACCEPT_ENCODING: &str = "gzip;q=1.0,identity;q=0.5";

/// Request headers that belong to one connection and are never forwarded.
const HOP_BY_HOP: [&str; 8] = [
	"accept-encoding",
	"connection",
	"content-length",
	"host",
	"keep-alive",
	"te",
	"transfer-encoding",
	"upgrade",
];

/// An origin URL like `https://tiles.example.com/all/{z}/{x}/{y}.{fmt}`.
///
/// Variables are only allowed in the path. The origin always serves every
/// layer, so a `layers` variable is filled with `all`.
#[derive(Clone, Debug)]
pub struct OriginTemplate {
	template: String,
	base: String,
	path: PathTemplate,
}

impl OriginTemplate {
	pub fn parse(template: &str) -> Result<OriginTemplate> {
		let authority_start = template
			.find("://")
			.map(|index| index + 3)
			.ok_or_else(|| anyhow!("origin '{template}' has no scheme"))?;
		let path_start = template[authority_start..]
			.find(['/', '?', '#'])
			.map_or(template.len(), |index| authority_start + index);

		let base = &template[..path_start];
		let url = Url::parse(base).with_context(|| format!("invalid origin '{template}'"))?;
		ensure!(
			matches!(url.scheme(), "http" | "https"),
			"origin '{template}' must use http or https"
		);

		let mut path = &template[path_start..];
		if let Some(index) = path.find(['?', '#']) {
			log::warn!("origin '{template}': query and fragment are replaced by the request's query");
			path = &path[..index];
		}
		let path = PathTemplate::parse(if path.is_empty() { "/" } else { path })
			.with_context(|| format!("invalid origin '{template}'"))?;

		Ok(OriginTemplate {
			template: template.to_string(),
			base: base.to_string(),
			path,
		})
	}

	pub fn uses_variable(&self, name: &str) -> bool {
		self.path.names().any(|other| other == name)
	}

	/// Builds the origin URL for the variables of a matched request.
	pub fn url_for(&self, variables: &HashMap<String, String>, query: Option<&str>) -> Result<String> {
		let mut variables = variables.clone();
		if let Some(layers) = variables.get_mut("layers") {
			ALL_LAYERS.clone_into(layers);
		}

		let mut url = self.base.clone();
		url.push_str(&self.path.expand(&variables)?);
		if let Some(query) = query.filter(|query| !query.is_empty()) {
			url.push('?');
			url.push_str(query);
		}
		Ok(url)
	}
}

impl fmt::Display for OriginTemplate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.template)
	}
}

/// Decides which headers of a client request reach the origin.
#[derive(Clone, Debug, Default)]
pub struct HeaderPolicy {
	custom: HeaderMap,
	noforward: Vec<Regex>,
}

impl HeaderPolicy {
	pub fn new<'a>(
		custom: impl IntoIterator<Item = (&'a String, &'a String)>,
		noforward: impl IntoIterator<Item = &'a String>,
	) -> Result<HeaderPolicy> {
		let mut policy = HeaderPolicy::default();
		for (name, value) in custom {
			let name = HeaderName::from_bytes(name.as_bytes()).with_context(|| format!("invalid header name '{name}'"))?;
			let value = HeaderValue::from_str(value).with_context(|| format!("invalid value for header '{name}'"))?;
			policy.custom.insert(name, value);
		}
		for expression in noforward {
			policy.noforward.push(
				Regex::new(expression).with_context(|| format!("invalid noforward expression '{expression}'"))?,
			);
		}
		Ok(policy)
	}

	/// Whether a request header may be passed on to the origin.
	///
	/// `noforward` expressions see the lowercase name and the canonical form
	/// (`X-Mz-Foo`); either matching blocks the header.
	pub fn should_forward(&self, name: &HeaderName) -> bool {
		let lower = name.as_str();
		if HOP_BY_HOP.contains(&lower) {
			return false;
		}
		let canonical = canonical_header_name(lower);
		!self
			.noforward
			.iter()
			.any(|regex| regex.is_match(lower) || regex.is_match(&canonical))
	}

	/// The headers of the origin request for a client request with `headers`.
	pub fn origin_headers(&self, headers: &HeaderMap) -> HeaderMap {
		let mut result = HeaderMap::new();
		for (name, value) in headers {
			if self.should_forward(name) {
				result.append(name.clone(), value.clone());
			} else {
				log::trace!("not forwarding header '{name}'");
			}
		}
		result.insert(ACCEPT_ENCODING, HeaderValue::from_static(ORIGIN_ACCEPT_ENCODING));
		for (name, value) in &self.custom {
			result.insert(name.clone(), value.clone());
		}
		result
	}
}

/// `x-mz-foo` becomes `X-Mz-Foo`.
fn canonical_header_name(name: &str) -> String {
	let mut upper = true;
	name
		.chars()
		.map(|c| {
			let mapped = if upper { c.to_ascii_uppercase() } else { c };
			upper = c == '-';
			mapped
		})
		.collect()
}
