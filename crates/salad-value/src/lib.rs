//! Generic value model for documents produced by JSON/YAML parsing.
//!
//! Every loader in `salad-loader` consumes [`Value`] trees read-only and
//! projects them into new typed output.

/// The untyped map/sequence/scalar tree.
pub mod value;

/// Insertion-ordered key-value container.
pub mod map;

/// Paths locating a node inside a document, used by failure labels.
pub mod path;

mod error;
mod json;
mod yaml;

pub use error::Error;
pub use map::Map;
pub use path::{Path, PathSegment};
pub use value::{Value, ValueKind};

/// Result type for value ingest.
pub type Result<T> = std::result::Result<T, Error>;
