mod counters;
mod encoding;
mod handlers;
mod origin;
mod proxy_server;
mod route_pattern;

pub use counters::{Counters, CountersSnapshot};
pub use encoding::{accepts_gzip, copy_body, is_gzip_encoded};
pub use origin::{HeaderPolicy, ORIGIN_ACCEPT_ENCODING, OriginTemplate};
pub use proxy_server::ProxyServer;
pub use route_pattern::{PathTemplate, RoutePattern};
