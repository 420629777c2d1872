//! Protocol-buffer value readers and writers.
//!
//! [`ValueReader`] / [`ValueWriter`] hold the encoding logic; the slice and
//! blob types are their in-memory backends.

mod value_reader;
mod value_reader_slice;
mod value_writer;
mod value_writer_blob;

pub use value_reader::*;
pub use value_reader_slice::*;
pub use value_writer::*;
pub use value_writer_blob::*;
