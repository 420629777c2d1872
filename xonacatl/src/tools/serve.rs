use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::time::{Duration, sleep};
use xonacatl::{config::Config, server::ProxyServer};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true, verbatim_doc_comment)]
pub struct Subcommand {
	/// Path to a configuration file (YAML format) with listen address, headers and patterns.
	/// Command line arguments will override configuration file settings.
	#[arg(short = 'c', long, value_name = "FILE", display_order = 0)]
	pub config: Option<PathBuf>,

	/// Address to listen on. Default: ":8080" (all interfaces)
	#[arg(short = 'l', long, display_order = 0)]
	pub listen: Option<String>,

	/// Proxy requests matching PATTERN to ORIGIN, e.g.:
	///    "/{layers}/{z}/{x}/{y}.{fmt}=https://tiles.example.com/all/{z}/{x}/{y}.{fmt}"
	/// Variables are written as {name} or {name:regex}. "layers" and "fmt" select the filter.
	#[arg(short = 'p', long = "pattern", value_name = "PATTERN=ORIGIN", verbatim_doc_comment, display_order = 1)]
	pub patterns: Vec<String>,

	/// Add a header to every origin request, e.g. "X-Api-Key=secret".
	#[arg(long = "header", value_name = "NAME=VALUE", display_order = 2)]
	pub headers: Vec<String>,

	/// Do not forward request headers whose name matches this regular expression.
	#[arg(long, value_name = "REGEX", display_order = 2)]
	pub noforward: Vec<String>,

	/// Answer health checks at this path.
	#[arg(long, value_name = "PATH", display_order = 3)]
	pub healthcheck: Option<String>,

	/// Serve request counters as JSON at this path.
	#[arg(long, value_name = "PATH", display_order = 3)]
	pub stats: Option<String>,

	/// Answer with 502 when an origin body is larger than this many bytes. Default: 64 MiB
	#[arg(long, value_name = "BYTES", display_order = 3)]
	pub max_body_size: Option<u64>,

	/// Shutdown server automatically after x milliseconds.
	#[arg(long, display_order = 4)]
	pub auto_shutdown: Option<u64>,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let mut config = if let Some(config_path) = &arguments.config {
		Config::from_path(config_path)?
	} else {
		Config::default()
	};

	config.override_optional_listen(&arguments.listen);
	config.override_optional_healthcheck(&arguments.healthcheck);
	config.override_optional_stats(&arguments.stats);
	config.override_optional_max_body_size(&arguments.max_body_size);
	for pattern in &arguments.patterns {
		config.add_pattern(pattern)?;
	}
	for header in &arguments.headers {
		config.add_header(header)?;
	}
	config.noforward.extend(arguments.noforward.iter().cloned());

	let mut server = ProxyServer::from_config(&config).context("invalid configuration")?;

	server
		.route_mapping()
		.iter()
		.for_each(|(pattern, origin)| eprintln!("   {pattern:30}  ->  {origin}"));

	server.start().await?;

	if let Some(milliseconds) = arguments.auto_shutdown {
		sleep(Duration::from_millis(milliseconds)).await;
	} else {
		tokio::signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;
	}

	server.stop().await;

	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::tests::run_command;
	use anyhow::Result;

	#[test]
	fn test_patterns() -> Result<()> {
		run_command(vec![
			"xonacatl",
			"serve",
			"-l",
			"127.0.0.1:0",
			"--healthcheck",
			"/health",
			"--header",
			"X-Api-Key=secret",
			"--noforward",
			"(?i)^x-mz-",
			"--max-body-size",
			"1048576",
			"--auto-shutdown",
			"200",
			"-p",
			"/{layers}/{z}/{x}/{y}.{fmt}=http://127.0.0.1:1/all/{z}/{x}/{y}.{fmt}",
		])?;
		Ok(())
	}

	#[test]
	fn test_config_file() -> Result<()> {
		run_command(vec![
			"xonacatl",
			"serve",
			"-c",
			"../testdata/config.yml",
			"-l",
			"127.0.0.1:0",
			"--auto-shutdown",
			"200",
		])?;
		Ok(())
	}

	#[test]
	fn test_without_pattern() {
		let err = run_command(vec!["xonacatl", "serve", "-l", "127.0.0.1:0"]).unwrap_err();
		assert!(format!("{err:#}").contains("at least one pattern"), "{err:#}");
	}
}
