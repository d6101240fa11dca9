//! # Formats
//!
//! Binary snapshot format for built mappings. File and database I/O live in
//! the `storage` module and the app layer.

mod snapshot;

pub use snapshot::*;
