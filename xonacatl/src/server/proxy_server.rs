use super::{
	counters::Counters,
	handlers::{ProxyRoute, ProxyState, serve_health, serve_proxy, serve_stats},
	origin::{HeaderPolicy, OriginTemplate},
	route_pattern::RoutePattern,
};
use crate::config::Config;
use anyhow::{Context, Result, ensure};
use axum::{Router, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::oneshot::Sender;

pub struct ProxyServer {
	listen: String,
	healthcheck: Option<String>,
	stats: Option<String>,
	state: Arc<ProxyState>,
	exit_signal: Option<Sender<()>>,
	local_addr: Option<SocketAddr>,
}

impl ProxyServer {
	/// Builds a server from a validated config. Nothing is bound yet.
	pub fn from_config(config: &Config) -> Result<ProxyServer> {
		config.validate()?;

		let mut routes = Vec::new();
		for (pattern, origin) in &config.patterns {
			log::info!("add pattern: '{pattern}' -> '{origin}'");
			let route = ProxyRoute {
				pattern: RoutePattern::parse(pattern)?,
				origin: OriginTemplate::parse(origin)?,
			};
			for name in route.pattern.names() {
				if name != "layers" && name != "fmt" && !route.origin.uses_variable(name) {
					log::debug!("variable '{name}' of pattern '{pattern}' is not used by its origin");
				}
			}
			routes.push(route);
		}

		let headers = HeaderPolicy::new(&config.headers, &config.noforward)?;
		let client = reqwest::Client::builder()
			.build()
			.context("failed to create HTTP client")?;

		Ok(ProxyServer {
			listen: config.listen_addr(),
			healthcheck: config.healthcheck.clone(),
			stats: config.stats.clone(),
			state: Arc::new(ProxyState {
				routes,
				headers,
				client,
				counters: Counters::default(),
				max_body_size: config.body_limit(),
			}),
			exit_signal: None,
			local_addr: None,
		})
	}

	pub async fn start(&mut self) -> Result<SocketAddr> {
		if self.exit_signal.is_some() {
			self.stop().await;
		}

		log::info!("starting server");

		let router = self.build_router()?;

		let listener = tokio::net::TcpListener::bind(&self.listen)
			.await
			.with_context(|| format!("failed to listen on {}", self.listen))?;
		let addr = listener.local_addr()?;
		eprintln!("server starts listening on {addr}");

		let (tx, rx) = tokio::sync::oneshot::channel::<()>();

		tokio::spawn(async move {
			let result = axum::serve(listener, router.into_make_service())
				.with_graceful_shutdown(async {
					rx.await.ok();
				})
				.await;
			if let Err(err) = result {
				log::error!("server failed: {err}");
			}
		});

		self.exit_signal = Some(tx);
		self.local_addr = Some(addr);

		Ok(addr)
	}

	pub async fn stop(&mut self) {
		let Some(exit_signal) = self.exit_signal.take() else {
			return;
		};

		log::info!("stopping server");

		exit_signal.send(()).ok();
		self.local_addr = None;
	}

	/// The bound address while the server is running.
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.local_addr
	}

	/// Pattern and origin of every route, in matching order.
	pub fn route_mapping(&self) -> Vec<(String, String)> {
		self
			.state
			.routes
			.iter()
			.map(|route| (route.pattern.to_string(), route.origin.to_string()))
			.collect()
	}

	fn build_router(&self) -> Result<Router> {
		let mut router = Router::new();

		for (path, is_stats) in [(&self.healthcheck, false), (&self.stats, true)] {
			let Some(path) = path else { continue };
			ensure!(
				!path.contains(['{', '}', '*']) && !path.contains("/:"),
				"path '{path}' must not contain route parameters"
			);
			router = if is_stats {
				router.route(path, get(serve_stats))
			} else {
				router.route(path, get(serve_health))
			};
		}

		Ok(router.fallback(get(serve_proxy)).with_state(self.state.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	fn config(yaml: &str) -> Config {
		Config::from_string(yaml).unwrap()
	}

	#[test]
	fn from_config_errors() {
		let err = ProxyServer::from_config(&config("")).err().unwrap();
		assert!(err.to_string().contains("at least one pattern"));

		let err = ProxyServer::from_config(&config("patterns: {'/{a': 'http://b'}")).err().unwrap();
		assert!(format!("{err:#}").contains("unbalanced braces"));

		let err = ProxyServer::from_config(&config("patterns: {'/{a}': 'b/{a}'}")).err().unwrap();
		assert!(format!("{err:#}").contains("has no scheme"));

		let err = ProxyServer::from_config(&config("patterns: {'/a': 'http://b'}\nheaders: {'bad name': x}"))
			.err()
			.unwrap();
		assert!(format!("{err:#}").contains("invalid header name"));
	}

	#[test]
	fn route_mapping() {
		let server = ProxyServer::from_config(&config(
			"patterns:\n  '/b/{layers}.{fmt}': 'http://b/all.{fmt}'\n  '/a/{layers}.{fmt}': 'http://a/all.{fmt}'",
		))
		.unwrap();
		assert_eq!(
			server.route_mapping(),
			[
				("/a/{layers}.{fmt}".to_string(), "http://a/all.{fmt}".to_string()),
				("/b/{layers}.{fmt}".to_string(), "http://b/all.{fmt}".to_string())
			]
		);
	}

	#[tokio::test]
	async fn start_and_stop() -> Result<()> {
		let mut server = ProxyServer::from_config(&config(
			"listen: '127.0.0.1:0'\nhealthcheck: /health\npatterns: {'/{layers}.{fmt}': 'http://127.0.0.1:1/all.{fmt}'}",
		))?;
		assert_eq!(server.local_addr(), None);

		let addr = server.start().await?;
		assert_eq!(server.local_addr(), Some(addr));

		let response = reqwest::get(format!("http://{addr}/health")).await?;
		assert_eq!(response.status(), 200);
		assert_eq!(response.text().await?, "");

		let response = reqwest::get(format!("http://{addr}/nothing/here")).await?;
		assert_eq!(response.status(), 404);

		server.stop().await;
		assert_eq!(server.local_addr(), None);
		server.stop().await;
		Ok(())
	}

	#[tokio::test]
	async fn invalid_healthcheck_path() {
		let mut server = ProxyServer::from_config(&config(
			"listen: '127.0.0.1:0'\nhealthcheck: '/{x}'\npatterns: {'/a': 'http://b'}",
		))
		.unwrap();
		assert!(server.start().await.is_err());
	}
}
