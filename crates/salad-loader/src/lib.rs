//! Loader engine: decodes generic [`Value`] trees into typed, validated
//! object graphs driven by a registry of schema loaders.
//!
//! # Architecture
//!
//! - [`Loader`]: the decode contract every schema shape implements
//! - [`LoadContext`]: base identifier, namespaces and path for one call
//! - [`LoadSession`]: memo table shared by a whole top-level load
//! - [`Registry`]: one loader per schema type, forward references bound lazily
//! - [`RootLoader`]: entry point producing a [`Document`] or a [`LoadError`]
//!
//! # Failures
//!
//! Data-shape mismatches never panic and never short-circuit siblings. Every
//! independent mismatch ends up as a leaf of the returned [`LoadError`] tree,
//! labeled with its [`Path`](salad_value::Path).

pub mod context;
pub mod document;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod options;
pub mod registry;
pub mod resolve;
pub mod save;
pub mod typed;
pub mod vocab;

#[cfg(test)]
mod testing;

pub use context::{DocumentGraph, LoadContext, LoadSession, NodeId};
pub use document::{Document, RootLoader};
pub use error::{LoadError, LoadErrorKind, SchemaError};
pub use fetch::{ChainFetcher, FetchError, Fetcher, FsFetcher, StaticFetcher};
pub use loader::{Link, Loaded, Loader, LoaderRef, Record};
pub use options::{ConfigError, IntegerPolicy, LoadOptions, UnknownFieldPolicy};
pub use registry::{Registry, RegistryBuilder};
pub use save::{SaveContext, SaveOptions};
pub use typed::{ConvertError, FromLoaded};
pub use vocab::Vocabulary;

pub use salad_value::{Map, Path, PathSegment, Value, ValueKind};

#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
