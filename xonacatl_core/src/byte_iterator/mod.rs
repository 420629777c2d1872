//! Byte-level scanning of JSON streams: a buffered peekable reader plus helpers
//! that parse keys and step over values without decoding them.

mod basics;
mod iterator;

pub use basics::*;
pub use iterator::*;
