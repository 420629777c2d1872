use anyhow::{Context, Result, bail, ensure};
use regex::Regex;
use serde::Deserialize;
use std::{
	collections::BTreeMap,
	fs::File,
	io::{BufReader, Read},
	path::Path,
};

/// Address used when neither the config nor the command line names one.
pub const DEFAULT_LISTEN: &str = ":8080";

/// Largest origin body, in bytes, read when the config does not set one.
pub const DEFAULT_MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Default, Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// Address to listen on, e.g. `127.0.0.1:8080`. A leading `:` binds all interfaces.
	#[serde(default)]
	pub listen: Option<String>,

	/// Path answering health checks with an empty 200 response.
	#[serde(default)]
	pub healthcheck: Option<String>,

	/// Path serving the request counters as JSON.
	#[serde(default)]
	pub stats: Option<String>,

	/// Extra headers added to every origin request.
	#[serde(default)]
	pub headers: BTreeMap<String, String>,

	/// Regular expressions; request headers with a matching name are not forwarded.
	#[serde(default)]
	pub noforward: Vec<String>,

	/// Request route pattern mapped to the origin URL template.
	#[serde(default)]
	pub patterns: BTreeMap<String, String>,

	/// Origin responses with a larger body, in bytes, are answered with 502.
	#[serde(default)]
	pub max_body_size: Option<u64>,
}

impl Config {
	pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("failed to open config file {path:?}"))?;
		Config::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse config file {path:?}"))
	}

	pub fn override_optional_listen(&mut self, listen: &Option<String>) {
		if listen.is_some() {
			self.listen = listen.clone();
		}
	}

	pub fn override_optional_healthcheck(&mut self, healthcheck: &Option<String>) {
		if healthcheck.is_some() {
			self.healthcheck = healthcheck.clone();
		}
	}

	pub fn override_optional_stats(&mut self, stats: &Option<String>) {
		if stats.is_some() {
			self.stats = stats.clone();
		}
	}

	pub fn override_optional_max_body_size(&mut self, max_body_size: &Option<u64>) {
		if max_body_size.is_some() {
			self.max_body_size = *max_body_size;
		}
	}

	/// Adds a pattern given as `PATTERN=ORIGIN`. A pattern already present is replaced.
	pub fn add_pattern(&mut self, definition: &str) -> Result<()> {
		let Some((pattern, origin)) = definition.split_once('=') else {
			bail!("pattern '{definition}' must have the form PATTERN=ORIGIN");
		};
		ensure!(!pattern.trim().is_empty(), "pattern '{definition}' has an empty route");
		self.patterns.insert(pattern.trim().to_string(), origin.trim().to_string());
		Ok(())
	}

	/// Adds a header given as `NAME=VALUE` or `NAME: VALUE`.
	pub fn add_header(&mut self, definition: &str) -> Result<()> {
		let Some((name, value)) = definition.split_once(['=', ':']) else {
			bail!("header '{definition}' must have the form NAME=VALUE");
		};
		ensure!(!name.trim().is_empty(), "header '{definition}' has an empty name");
		self.headers.insert(name.trim().to_string(), value.trim().to_string());
		Ok(())
	}

	/// Checks everything that can be checked without starting a server.
	///
	/// Route patterns and origin templates are checked when the server is built.
	pub fn validate(&self) -> Result<()> {
		ensure!(!self.patterns.is_empty(), "at least one pattern must be configured");

		for expression in &self.noforward {
			Regex::new(expression).with_context(|| format!("invalid noforward expression '{expression}'"))?;
		}

		for (name, path) in [("healthcheck", &self.healthcheck), ("stats", &self.stats)] {
			if let Some(path) = path {
				ensure!(path.starts_with('/'), "{name} path '{path}' must start with '/'");
			}
		}

		if let (Some(healthcheck), Some(stats)) = (&self.healthcheck, &self.stats) {
			ensure!(healthcheck != stats, "healthcheck and stats share the path '{stats}'");
		}

		ensure!(self.max_body_size != Some(0), "max_body_size must be greater than 0");

		Ok(())
	}

	/// The origin body limit in bytes.
	pub fn body_limit(&self) -> u64 {
		self.max_body_size.unwrap_or(DEFAULT_MAX_BODY_SIZE)
	}

	/// The socket address to bind, with `:port` expanded to all interfaces.
	pub fn listen_addr(&self) -> String {
		let listen = self.listen.as_deref().unwrap_or(DEFAULT_LISTEN);
		if listen.starts_with(':') {
			format!("0.0.0.0{listen}")
		} else {
			listen.to_string()
		}
	}
}
