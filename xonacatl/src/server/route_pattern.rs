//! Path templates with named variables, like `/{layers}/{z:[0-9]+}/{x}/{y}.{fmt}`.
//!
//! A variable is written as `{name}` or `{name:regex}`. Without a regex it
//! matches `[^/]+`. Braces inside the regex must be balanced.

use anyhow::{Context, Result, bail, ensure};
use regex::Regex;
use std::{collections::HashMap, fmt};

const DEFAULT_VARIABLE_PATTERN: &str = "[^/]+";

#[derive(Clone, Debug, PartialEq)]
enum Part {
	Literal(String),
	Variable { name: String, pattern: String },
}

fn parse_parts(template: &str) -> Result<Vec<Part>> {
	let mut parts = Vec::new();
	let mut literal = String::new();
	let mut chars = template.chars();

	while let Some(c) = chars.next() {
		match c {
			'{' => {
				if !literal.is_empty() {
					parts.push(Part::Literal(std::mem::take(&mut literal)));
				}

				let mut inner = String::new();
				let mut depth = 1;
				loop {
					let Some(c) = chars.next() else {
						bail!("unbalanced braces in '{template}'");
					};
					match c {
						'{' => depth += 1,
						'}' => {
							depth -= 1;
							if depth == 0 {
								break;
							}
						}
						_ => {}
					}
					inner.push(c);
				}

				let (name, pattern) = match inner.split_once(':') {
					Some((name, pattern)) => (name.trim(), pattern.trim()),
					None => (inner.trim(), DEFAULT_VARIABLE_PATTERN),
				};
				ensure!(
					!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
					"invalid variable name '{name}' in '{template}'"
				);
				ensure!(!pattern.is_empty(), "variable '{name}' in '{template}' has an empty pattern");
				ensure!(
					!parts
						.iter()
						.any(|part| matches!(part, Part::Variable { name: other, .. } if other == name)),
					"variable '{name}' appears twice in '{template}'"
				);

				parts.push(Part::Variable {
					name: name.to_string(),
					pattern: pattern.to_string(),
				});
			}
			'}' => bail!("unbalanced braces in '{template}'"),
			c => literal.push(c),
		}
	}

	if !literal.is_empty() {
		parts.push(Part::Literal(literal));
	}
	Ok(parts)
}

/// A request path pattern, matched against the whole path.
#[derive(Clone, Debug)]
pub struct RoutePattern {
	template: String,
	regex: Regex,
	names: Vec<String>,
}

impl RoutePattern {
	pub fn parse(template: &str) -> Result<RoutePattern> {
		ensure!(template.starts_with('/'), "pattern '{template}' must start with '/'");

		let mut expression = String::from("^");
		let mut names = Vec::new();
		for part in parse_parts(template)? {
			match part {
				Part::Literal(text) => expression.push_str(&regex::escape(&text)),
				Part::Variable { name, pattern } => {
					expression.push_str(&format!("(?P<{name}>{pattern})"));
					names.push(name);
				}
			}
		}
		expression.push('$');

		let regex = Regex::new(&expression).with_context(|| format!("invalid pattern '{template}'"))?;

		Ok(RoutePattern {
			template: template.to_string(),
			regex,
			names,
		})
	}

	/// Returns the variables of `path`, or `None` if the pattern does not match.
	pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
		let captures = self.regex.captures(path)?;
		Some(
			self
				.names
				.iter()
				.filter_map(|name| Some((name.clone(), captures.name(name)?.as_str().to_string())))
				.collect(),
		)
	}

	pub fn names(&self) -> &[String] {
		&self.names
	}
}

impl fmt::Display for RoutePattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.template)
	}
}

#[derive(Clone, Debug)]
enum TemplatePart {
	Literal(String),
	Variable { name: String, validator: Regex },
}

/// A path with variables that is filled in rather than matched.
#[derive(Clone, Debug)]
pub struct PathTemplate {
	parts: Vec<TemplatePart>,
}

impl PathTemplate {
	pub fn parse(template: &str) -> Result<PathTemplate> {
		let parts = parse_parts(template)?
			.into_iter()
			.map(|part| {
				Ok(match part {
					Part::Literal(text) => TemplatePart::Literal(text),
					Part::Variable { name, pattern } => {
						let validator = Regex::new(&format!("^(?:{pattern})$"))
							.with_context(|| format!("invalid pattern for variable '{name}' in '{template}'"))?;
						TemplatePart::Variable { name, validator }
					}
				})
			})
			.collect::<Result<Vec<_>>>()?;
		Ok(PathTemplate { parts })
	}

	/// Fills in all variables. Each value must match its variable's pattern.
	pub fn expand(&self, variables: &HashMap<String, String>) -> Result<String> {
		let mut path = String::new();
		for part in &self.parts {
			match part {
				TemplatePart::Literal(text) => path.push_str(text),
				TemplatePart::Variable { name, validator } => {
					let Some(value) = variables.get(name) else {
						bail!("missing value for variable '{name}'");
					};
					ensure!(
						validator.is_match(value),
						"value '{value}' does not match the pattern of variable '{name}'"
					);
					path.push_str(value);
				}
			}
		}
		Ok(path)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.parts.iter().filter_map(|part| match part {
			TemplatePart::Variable { name, .. } => Some(name.as_str()),
			TemplatePart::Literal(_) => None,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn match_default_pattern() {
		let pattern = RoutePattern::parse("/{layers}/{z}/{x}/{y}.{fmt}").unwrap();
		assert_eq!(pattern.names(), ["layers", "z", "x", "y", "fmt"]);
		assert_eq!(
			pattern.captures("/water,roads/1/2/3.json"),
			Some(vars(&[
				("layers", "water,roads"),
				("z", "1"),
				("x", "2"),
				("y", "3"),
				("fmt", "json")
			]))
		);
		assert_eq!(pattern.to_string(), "/{layers}/{z}/{x}/{y}.{fmt}");
	}

	#[rstest]
	#[case("/water/1/2/3")]
	#[case("/water/1/2/3.json/more")]
	#[case("/a/b/water/1/2/3.json")]
	#[case("water/1/2/3.json")]
	fn no_match(#[case] path: &str) {
		let pattern = RoutePattern::parse("/{layers}/{z}/{x}/{y}.{fmt}").unwrap();
		assert_eq!(pattern.captures(path), None);
	}

	#[test]
	fn match_custom_pattern() {
		let pattern = RoutePattern::parse("/tiles/{z:[0-9]{1,2}}/{rest:.*}").unwrap();
		assert_eq!(
			pattern.captures("/tiles/14/a/b.mvt"),
			Some(vars(&[("z", "14"), ("rest", "a/b.mvt")]))
		);
		assert_eq!(pattern.captures("/tiles/123/a"), None);
	}

	#[test]
	fn literals_are_escaped() {
		let pattern = RoutePattern::parse("/a.b+/{x}").unwrap();
		assert!(pattern.captures("/a.b+/1").is_some());
		assert!(pattern.captures("/axbb/1").is_none());
	}

	#[rstest]
	#[case("/{layers", "unbalanced braces")]
	#[case("/layers}", "unbalanced braces")]
	#[case("/{}", "invalid variable name")]
	#[case("/{a-b}", "invalid variable name")]
	#[case("/{a:}", "empty pattern")]
	#[case("/{a}/{a}", "appears twice")]
	#[case("/{a:(}", "invalid pattern")]
	#[case("no-slash", "must start with '/'")]
	fn invalid_patterns(#[case] template: &str, #[case] message: &str) {
		let err = RoutePattern::parse(template).unwrap_err();
		assert!(format!("{err:#}").contains(message), "{err:#}");
	}

	#[test]
	fn expand_template() {
		let template = PathTemplate::parse("/all/{z}/{x}/{y}.{fmt}").unwrap();
		assert_eq!(template.names().collect::<Vec<_>>(), ["z", "x", "y", "fmt"]);
		let path = template
			.expand(&vars(&[("z", "1"), ("x", "2"), ("y", "3"), ("fmt", "mvt"), ("extra", "x")]))
			.unwrap();
		assert_eq!(path, "/all/1/2/3.mvt");
	}

	#[test]
	fn expand_errors() {
		let template = PathTemplate::parse("/{z:[0-9]+}/{fmt}").unwrap();
		let err = template.expand(&vars(&[("z", "1")])).unwrap_err();
		assert_eq!(err.to_string(), "missing value for variable 'fmt'");

		let err = template.expand(&vars(&[("z", "a"), ("fmt", "json")])).unwrap_err();
		assert_eq!(err.to_string(), "value 'a' does not match the pattern of variable 'z'");

		let err = template.expand(&vars(&[("z", "1"), ("fmt", "a/b")])).unwrap_err();
		assert!(err.to_string().contains("variable 'fmt'"));
	}
}
