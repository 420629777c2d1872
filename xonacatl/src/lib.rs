//! A reverse proxy for map tiles that removes the layers a client did not ask for.
//!
//! Requests are matched against configured path patterns. The tile is fetched
//! from the origin with all layers and filtered with [`xonacatl_layers`]
//! before it is sent to the client.

pub mod config;
pub mod server;
