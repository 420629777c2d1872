//! HTTP handlers and small response helpers for the proxy.
//!
//! - `serve_proxy` handles every request that is not a health check or stats request.
//! - `serve_health` answers health checks with an empty 200.
//! - `serve_stats` serves the request counters as JSON.

use super::{
	counters::Counters,
	encoding::{accepts_gzip, copy_body, is_gzip_encoded},
	origin::{HeaderPolicy, OriginTemplate},
	route_pattern::RoutePattern,
};
use axum::{
	body::{Body, Bytes},
	extract::State,
	http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
	response::{IntoResponse, Response},
};
use anyhow::{Context, ensure};
use std::{collections::HashMap, sync::Arc, time::Instant};
use xonacatl_layers::{FilterError, LayerSet, TileCopier};

/// Response headers of the origin that are not copied to the client.
const SKIPPED_RESPONSE_HEADERS: [&str; 5] = [
	"connection",
	"content-length",
	"keep-alive",
	"transfer-encoding",
	"upgrade",
];

/// One configured pattern and the origin it is proxied to.
#[derive(Clone, Debug)]
pub struct ProxyRoute {
	pub pattern: RoutePattern,
	pub origin: OriginTemplate,
}

/// State shared by all proxy requests.
pub struct ProxyState {
	pub routes: Vec<ProxyRoute>,
	pub headers: HeaderPolicy,
	pub client: reqwest::Client,
	pub counters: Counters,
	/// Largest origin body in bytes.
	pub max_body_size: u64,
}

impl ProxyState {
	/// The first route matching `path`, with its variables.
	fn find_route(&self, path: &str) -> Option<(&ProxyRoute, HashMap<String, String>)> {
		self
			.routes
			.iter()
			.find_map(|route| Some((route, route.pattern.captures(path)?)))
	}
}

pub async fn serve_proxy(State(state): State<Arc<ProxyState>>, uri: Uri, headers: HeaderMap) -> Response<Body> {
	let started = Instant::now();
	state.counters.request();

	let path = uri.path();
	let Some((route, variables)) = state.find_route(path) else {
		log::debug!("no pattern matches {path}");
		return error_404();
	};
	log::debug!("handle request {path} with pattern {}", route.pattern);

	let url = match route.origin.url_for(&variables, uri.query()) {
		Ok(url) => url,
		Err(err) => {
			state.counters.parse_request_error();
			log::warn!("send 500 for {path}. Error:\n{}", format_error_chain(&err));
			return error_500();
		}
	};

	let layers = LayerSet::from_param(variables.get("layers").map_or("", String::as_str));
	let format = variables.get("fmt").map_or("", String::as_str);

	let upstream_started = Instant::now();
	let response = state
		.client
		.get(&url)
		.headers(state.headers.origin_headers(&headers))
		.send()
		.await;
	let response = match response {
		Ok(response) => response,
		Err(err) => return origin_failed(&state, &url, &anyhow::Error::from(err)),
	};

	let status = response.status();
	let origin_headers = response.headers().clone();
	let body = match read_body(response, state.max_body_size).await {
		Ok(body) => body,
		Err(err) => return origin_failed(&state, &url, &err),
	};
	let upstream_time = upstream_started.elapsed();

	if status != StatusCode::OK {
		log::debug!("copy {status} response of {url}");
		state.counters.proxied(upstream_time, started.elapsed());
		return copy_response(status, &origin_headers, body, false);
	}

	let copier = TileCopier::for_request(format, layers);
	let gunzip = is_gzip_encoded(&origin_headers);
	let gzip = accepts_gzip(&headers);

	if copier.is_passthrough() && !gunzip && !gzip {
		log::debug!("pass {url} through unchanged");
		state.counters.proxied(upstream_time, started.elapsed());
		return copy_response(StatusCode::OK, &origin_headers, body, false);
	}
	log::debug!("filter {url} with {copier:?}, gunzip={gunzip}, gzip={gzip}");

	let result = tokio::task::spawn_blocking(move || copy_body(&copier, &body, gunzip, gzip)).await;
	let response = match result {
		Ok(Ok(output)) => copy_response(StatusCode::OK, &origin_headers, Bytes::from(output), gzip),
		Ok(Err(err)) => {
			state.counters.copy_error();
			let status = filter_error_status(&err);
			log::warn!(
				"send {status} for {path}. Error:\n{}",
				format_error_chain(&anyhow::Error::from(err))
			);
			error_with(status, status.canonical_reason().unwrap_or(""))
		}
		Err(err) => {
			state.counters.copy_error();
			log::error!("filter task for {path} failed: {err}");
			error_500()
		}
	};

	state.counters.proxied(upstream_time, started.elapsed());
	response
}

pub async fn serve_health() -> StatusCode {
	StatusCode::OK
}

pub async fn serve_stats(State(state): State<Arc<ProxyState>>) -> Response<Body> {
	match serde_json::to_vec(&state.counters.snapshot()) {
		Ok(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
		Err(err) => {
			log::error!("failed to serialize counters: {err}");
			error_500()
		}
	}
}

/// Reads the origin body, giving up once it is larger than `limit` bytes.
async fn read_body(mut response: reqwest::Response, limit: u64) -> anyhow::Result<Bytes> {
	if let Some(length) = response.content_length() {
		ensure!(length <= limit, "origin body of {length} bytes exceeds the limit of {limit} bytes");
	}

	let mut body = Vec::new();
	while let Some(chunk) = response.chunk().await.context("failed to read origin body")? {
		ensure!(
			(body.len() + chunk.len()) as u64 <= limit,
			"origin body exceeds the limit of {limit} bytes"
		);
		body.extend_from_slice(&chunk);
	}
	Ok(Bytes::from(body))
}

fn origin_failed(state: &ProxyState, url: &str, err: &anyhow::Error) -> Response<Body> {
	state.counters.proxy_error();
	log::warn!("send 502 for origin request {url}. Error:\n{}", format_error_chain(err));
	error_with(StatusCode::BAD_GATEWAY, "Bad Gateway")
}

/// Invalid tiles are the origin's fault, everything else is ours.
fn filter_error_status(err: &FilterError) -> StatusCode {
	if err.is_invalid_tile() {
		StatusCode::BAD_GATEWAY
	} else {
		StatusCode::INTERNAL_SERVER_ERROR
	}
}

/// Builds the client response from the origin's headers and a new body.
///
/// A body that was re-encoded gets its own `Content-Encoding`; otherwise the
/// origin's `Content-Encoding` is kept only if the body was copied unchanged.
fn copy_response(status: StatusCode, origin_headers: &HeaderMap, body: Bytes, gzip: bool) -> Response<Body> {
	let filtered = status == StatusCode::OK;

	let mut response = Response::new(Body::from(body));
	*response.status_mut() = status;

	let headers = response.headers_mut();
	for (name, value) in origin_headers {
		if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) || (filtered && name == header::CONTENT_ENCODING) {
			continue;
		}
		headers.append(name.clone(), value.clone());
	}
	if gzip {
		headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
	}
	if filtered {
		headers.append(header::VARY, HeaderValue::from_static("accept-encoding"));
	}
	response
}

fn format_error_chain(err: &anyhow::Error) -> String {
	let mut result = err.to_string();

	for (i, cause) in err.chain().skip(1).enumerate() {
		if i == 0 {
			result.push_str("\n  Caused by:");
		}
		result.push_str(&format!("\n    {cause}"));
	}

	result
}

fn error_with(status: StatusCode, message: &str) -> Response<Body> {
	(
		status,
		[(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
		message.to_string(),
	)
		.into_response()
}

pub fn error_404() -> Response<Body> {
	error_with(StatusCode::NOT_FOUND, "Not Found")
}

pub fn error_500() -> Response<Body> {
	error_with(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::to_bytes;
	use pretty_assertions::assert_eq;
	use std::io;

	async fn body_string(response: Response<Body>) -> String {
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		String::from_utf8(bytes.to_vec()).unwrap()
	}

	fn route(pattern: &str, origin: &str) -> ProxyRoute {
		ProxyRoute {
			pattern: RoutePattern::parse(pattern).unwrap(),
			origin: OriginTemplate::parse(origin).unwrap(),
		}
	}

	#[test]
	fn find_route_uses_first_match() {
		let state = ProxyState {
			routes: vec![
				route("/v1/{layers}/{z:[0-9]+}.{fmt}", "http://a/{z}.{fmt}"),
				route("/v1/{layers}/{z}.{fmt}", "http://b/{z}.{fmt}"),
			],
			headers: HeaderPolicy::default(),
			client: reqwest::Client::new(),
			counters: Counters::default(),
			max_body_size: 1024,
		};

		let (found, variables) = state.find_route("/v1/water/3.json").unwrap();
		assert_eq!(found.origin.to_string(), "http://a/{z}.{fmt}");
		assert_eq!(variables["layers"], "water");

		let (found, _) = state.find_route("/v1/water/x.json").unwrap();
		assert_eq!(found.origin.to_string(), "http://b/{z}.{fmt}");

		assert!(state.find_route("/v2/water/3.json").is_none());
	}

	fn origin_response(body: &'static [u8]) -> reqwest::Response {
		reqwest::Response::from(axum::http::Response::new(reqwest::Body::from(body)))
	}

	#[tokio::test]
	async fn read_body_limit() {
		let body = read_body(origin_response(b"0123456789"), 10).await.unwrap();
		assert_eq!(body, Bytes::from_static(b"0123456789"));

		let err = read_body(origin_response(b"0123456789"), 9).await.unwrap_err();
		assert!(err.to_string().contains("exceeds the limit of 9 bytes"), "{err}");
	}

	#[test]
	fn filter_error_statuses() {
		assert_eq!(
			filter_error_status(&FilterError::UnsupportedSchemaVersion {
				version: 3,
				layer: "water".to_string()
			}),
			StatusCode::BAD_GATEWAY
		);
		assert_eq!(
			filter_error_status(&FilterError::MalformedInput(anyhow::anyhow!("bad"))),
			StatusCode::BAD_GATEWAY
		);
		assert_eq!(
			filter_error_status(&FilterError::SinkWriteFailed(io::Error::other("full"))),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[tokio::test]
	async fn copy_response_headers() {
		let mut origin = HeaderMap::new();
		origin.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
		origin.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1234"));
		origin.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
		origin.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));

		let response = copy_response(StatusCode::OK, &origin, Bytes::from_static(b"[1]"), false);
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
		assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
		assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
		assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
		assert_eq!(body_string(response).await, "[1]");

		let response = copy_response(StatusCode::OK, &origin, Bytes::new(), true);
		assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

		// non-200 responses keep the origin's encoding
		let response = copy_response(StatusCode::NOT_FOUND, &origin, Bytes::from_static(b"gone"), false);
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
		assert!(response.headers().get(header::VARY).is_none());
	}

	#[tokio::test]
	async fn error_responses() {
		let response = error_404();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
		assert_eq!(body_string(response).await, "Not Found");

		assert_eq!(error_500().status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[test]
	fn format_error_chain_single_error() {
		let err = anyhow::anyhow!("Simple error");
		assert_eq!(format_error_chain(&err), "Simple error");
	}

	#[test]
	fn format_error_chain_with_context() {
		let err = io::Error::new(io::ErrorKind::NotFound, "connection refused");
		let err = anyhow::Error::from(err)
			.context("failed to send origin request")
			.context("proxy failed");
		assert_eq!(
			format_error_chain(&err),
			"proxy failed\n  Caused by:\n    failed to send origin request\n    connection refused"
		);
	}
}
