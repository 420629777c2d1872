//! Low-level byte handling for xonacatl: the [`Blob`] buffer, a streaming JSON
//! [`byte_iterator`] and the protobuf value reader/writer in [`io`].

pub mod byte_iterator;

pub mod io;

mod types;
pub use types::*;
