//! Content encodings on both sides of the proxy.
//!
//! Origin bodies with `Content-Encoding: gzip` are decoded before filtering.
//! The filtered body is gzip compressed again if the client accepts gzip,
//! otherwise it is sent as identity. Other encodings are not understood.

use axum::http::{HeaderMap, header};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use std::io::Read;
use xonacatl_layers::{FilterError, LayerCopier};

/// Whether the client's `Accept-Encoding` allows a gzip response.
///
/// Tokens are parsed as `name[;q=value]`; `q=0` disables a token and a
/// wildcard `*` with `q>0` counts as gzip.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
	let Some(value) = headers.get(header::ACCEPT_ENCODING) else {
		return false;
	};
	let value = value.to_str().unwrap_or("");

	let mut gzip = None;
	let mut wildcard = None;
	for raw in value.split(',') {
		let token = raw.trim();
		if token.is_empty() {
			continue;
		}
		let mut name = token;
		let mut q = 1.0f32;

		if let Some((n, params)) = token.split_once(';') {
			name = n.trim();
			for p in params.split(';') {
				if let Some(rest) = p.trim().strip_prefix("q=")
					&& let Ok(v) = rest.trim().parse::<f32>()
				{
					q = v;
				}
			}
		}

		if name.eq_ignore_ascii_case("gzip") || name.eq_ignore_ascii_case("x-gzip") {
			gzip = Some(q > 0.0);
		} else if name == "*" {
			wildcard = Some(q > 0.0);
		}
	}

	gzip.or(wildcard).unwrap_or(false)
}

/// Whether a response body is gzip encoded.
pub fn is_gzip_encoded(headers: &HeaderMap) -> bool {
	headers
		.get(header::CONTENT_ENCODING)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.trim().eq_ignore_ascii_case("gzip"))
}

/// Runs `copier` over `body` and returns the complete output.
///
/// Blocking; the proxy calls it from `spawn_blocking`. A broken gzip input
/// surfaces as [`FilterError::SourceReadFailed`].
pub fn copy_body(copier: &dyn LayerCopier, body: &[u8], gunzip: bool, gzip: bool) -> Result<Vec<u8>, FilterError> {
	let mut source: Box<dyn Read + '_> = if gunzip {
		Box::new(GzDecoder::new(body))
	} else {
		Box::new(body)
	};

	if gzip {
		let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
		copier.copy_layers(&mut source, &mut encoder)?;
		encoder.finish().map_err(FilterError::SinkWriteFailed)
	} else {
		let mut output = Vec::new();
		copier.copy_layers(&mut source, &mut output)?;
		Ok(output)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
	use flate2::read::GzDecoder;
	use rstest::rstest;
	use std::io::Write;
	use xonacatl_layers::{LayerSet, TileCopier};

	fn mk_headers(name: header::HeaderName, s: &str) -> HeaderMap {
		let mut m = HeaderMap::new();
		if s != "NONE" {
			m.insert(name, s.parse().unwrap());
		}
		m
	}

	fn gzip(data: &[u8]) -> Vec<u8> {
		let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
		encoder.write_all(data).unwrap();
		encoder.finish().unwrap()
	}

	fn gunzip(data: &[u8]) -> Vec<u8> {
		let mut output = Vec::new();
		GzDecoder::new(data).read_to_end(&mut output).unwrap();
		output
	}

	#[rstest]
	#[case("NONE", false)]
	#[case("", false)]
	#[case("gzip", true)]
	#[case("GZIP", true)]
	#[case("x-gzip", true)]
	#[case("deflate, gzip;q=0.5", true)]
	#[case("gzip;q=0", false)]
	#[case("gzip;q=0.0, identity", false)]
	#[case("br", false)]
	#[case("*", true)]
	#[case("*;q=0", false)]
	#[case("gzip;q=0, *", false)]
	#[case("identity;q=0.5, *;q=0.1", true)]
	#[case("gzip;q=abc", true)]
	fn accept_encoding(#[case] value: &str, #[case] expected: bool) {
		assert_eq!(accepts_gzip(&mk_headers(ACCEPT_ENCODING, value)), expected, "{value}");
	}

	#[rstest]
	#[case("NONE", false)]
	#[case("gzip", true)]
	#[case(" Gzip ", true)]
	#[case("identity", false)]
	#[case("br", false)]
	#[case("gzip, br", false)]
	fn content_encoding(#[case] value: &str, #[case] expected: bool) {
		assert_eq!(is_gzip_encoded(&mk_headers(CONTENT_ENCODING, value)), expected, "{value}");
	}

	#[rstest]
	#[case(false, false)]
	#[case(true, false)]
	#[case(false, true)]
	#[case(true, true)]
	fn copy_json(#[case] gunzip_input: bool, #[case] gzip_output: bool) {
		let tile = br#"{"water":[1],"roads":[2]}"#;
		let input = if gunzip_input { gzip(tile) } else { tile.to_vec() };
		let copier = TileCopier::for_request("json", LayerSet::from_param("roads"));

		let output = copy_body(&copier, &input, gunzip_input, gzip_output).unwrap();
		let output = if gzip_output { gunzip(&output) } else { output };
		assert_eq!(output, b"[2]");
	}

	#[test]
	fn broken_gzip() {
		let copier = TileCopier::for_request("json", LayerSet::from_param("roads"));
		let result = copy_body(&copier, b"not gzip", true, false);
		assert!(matches!(result, Err(FilterError::SourceReadFailed(_))), "{result:?}");
	}
}
