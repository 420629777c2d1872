//! Format-aware layer filtering for map tiles.
//!
//! Every filter implements [`LayerCopier`]: it reads a tile body from a source,
//! keeps only the layers named in a [`LayerSet`] and writes the result to a sink.
//! [`TileCopier::for_request`] selects the filter for a declared tile format.

mod copier;
mod error;
pub mod json;
mod layer_set;
pub mod topojson;
pub mod vector_tile;

pub use copier::*;
pub use error::FilterError;
pub use layer_set::{ALL_LAYERS, LayerSet};
