use serde::Serialize;
use std::{
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};

/// Request counters, shared by all handlers.
#[derive(Debug, Default)]
pub struct Counters {
	num_requests: AtomicU64,
	proxied_requests: AtomicU64,
	parse_request_errors: AtomicU64,
	proxy_errors: AtomicU64,
	copy_errors: AtomicU64,
	upstream_millis: AtomicU64,
	total_millis: AtomicU64,
}

/// Counter values as served on the stats path. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountersSnapshot {
	pub num_requests: u64,
	pub proxied_requests: u64,
	pub parse_request_errors: u64,
	pub proxy_errors: u64,
	pub copy_errors: u64,
	pub avg_upstream_time: f64,
	pub avg_total_time: f64,
}

fn millis(duration: Duration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Counters {
	pub fn request(&self) {
		self.num_requests.fetch_add(1, Ordering::Relaxed);
	}

	pub fn parse_request_error(&self) {
		self.parse_request_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn proxy_error(&self) {
		self.proxy_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn copy_error(&self) {
		self.copy_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Records a request the origin answered.
	pub fn proxied(&self, upstream: Duration, total: Duration) {
		self.proxied_requests.fetch_add(1, Ordering::Relaxed);
		self.upstream_millis.fetch_add(millis(upstream), Ordering::Relaxed);
		self.total_millis.fetch_add(millis(total), Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> CountersSnapshot {
		let proxied_requests = self.proxied_requests.load(Ordering::Relaxed);
		let average = |sum: &AtomicU64| {
			if proxied_requests == 0 {
				0.0
			} else {
				sum.load(Ordering::Relaxed) as f64 / proxied_requests as f64
			}
		};

		CountersSnapshot {
			num_requests: self.num_requests.load(Ordering::Relaxed),
			proxied_requests,
			parse_request_errors: self.parse_request_errors.load(Ordering::Relaxed),
			proxy_errors: self.proxy_errors.load(Ordering::Relaxed),
			copy_errors: self.copy_errors.load(Ordering::Relaxed),
			avg_upstream_time: average(&self.upstream_millis),
			avg_total_time: average(&self.total_millis),
		}
	}
}
