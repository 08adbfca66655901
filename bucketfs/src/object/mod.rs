//! Per-object handles returned by the filesystem layer
//!
//! Submodules:
//! - `reader`: range-cached reader with explicit fetch/seek state
//! - `writer`: buffered writer that commits the object on close
//! - `file`: whole-object, in-memory read handle
pub mod file;
pub mod reader;
pub mod writer;

pub use file::ObjectFile;
pub use reader::{OVERFETCH_FACTOR, RangeReader};
pub use writer::ObjectWriter;
