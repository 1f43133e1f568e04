//! Load options.
//!
//! Options can be built in code or decoded from a generic value (a parsed
//! JSON/YAML configuration file) with this engine's own loaders:
//!
//! ```yaml
//! unknown-fields: collect
//! integer-policy: strict
//! link-documents: false
//! max-depth: 64
//! ```

use std::sync::{Arc, OnceLock};

use salad_value::Value;
use thiserror::Error;

use crate::document::RootLoader;
use crate::error::{LoadError, SchemaError};
use crate::fetch::StaticFetcher;
use crate::loader::{FieldDef, PrimitiveLoader, Record, RecordSchema};
use crate::registry::{Registry, RegistryBuilder};
use crate::typed::ConvertError;
use crate::vocab::Vocabulary;

/// What a record does with keys it does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UnknownFieldPolicy {
    /// Report each one as a failure
    #[default]
    Reject,
    Ignore,
    /// Keep them in [`Record::extensions`]
    Collect,
}

/// How integer fields treat floating point input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum IntegerPolicy {
    /// Whole floats are accepted, fractional ones rejected
    #[default]
    AcceptWhole,
    /// Any float is rejected
    Strict,
    /// Fractional floats are floored
    Floor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub unknown_fields: UnknownFieldPolicy,
    pub integer_policy: IntegerPolicy,
    /// When false, linking fields resolve identifiers but never fetch.
    pub link_documents: bool,
    /// Nesting limit, reported as a failure instead of overflowing the stack.
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::default(),
            integer_policy: IntegerPolicy::default(),
            link_documents: true,
            max_depth: 256,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid options: {0}")]
    Load(#[from] LoadError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error("options schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
}

const OPTIONS_TYPE: &str = "LoadOptions";

/// Process-wide registry describing the options document.
static OPTIONS_REGISTRY: OnceLock<Result<Registry, SchemaError>> = OnceLock::new();

fn options_registry() -> Result<&'static Registry, SchemaError> {
    OPTIONS_REGISTRY
        .get_or_init(build_options_registry)
        .as_ref()
        .map_err(Clone::clone)
}

fn build_options_registry() -> Result<Registry, SchemaError> {
    let mut builder = RegistryBuilder::new(Vocabulary::new());
    builder.enumeration("UnknownFieldPolicy", ["reject", "ignore", "collect"]);
    builder.enumeration("IntegerPolicy", ["accept-whole", "strict", "floor"]);
    let unknown_fields = builder.type_ref("UnknownFieldPolicy");
    let integer_policy = builder.type_ref("IntegerPolicy");
    builder.record(
        RecordSchema::new(OPTIONS_TYPE)
            .unknown_fields(UnknownFieldPolicy::Reject)
            .field(FieldDef::optional("unknown-fields", unknown_fields))
            .field(FieldDef::optional("integer-policy", integer_policy))
            .field(FieldDef::optional(
                "link-documents",
                Arc::new(PrimitiveLoader::boolean()),
            ))
            .field(FieldDef::optional(
                "max-depth",
                Arc::new(PrimitiveLoader::integer()),
            )),
    );
    builder.root_type(OPTIONS_TYPE);
    builder.build()
}

impl LoadOptions {
    /// Decode options from a configuration value. Missing keys keep their
    /// defaults.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let registry = options_registry()?;
        let fetcher = StaticFetcher::default();
        let document = RootLoader::new(registry, &fetcher)?
            .with_options(LoadOptions {
                unknown_fields: UnknownFieldPolicy::Reject,
                integer_policy: IntegerPolicy::Strict,
                link_documents: false,
                ..LoadOptions::default()
            })
            .load_value(value, "")?;
        let record: Arc<Record> = document.root_as()?;
        Self::from_record(&record)
    }

    fn from_record(record: &Record) -> Result<Self, ConfigError> {
        let mut options = LoadOptions::default();
        if let Some(symbol) = record.field::<Option<String>>("unknown-fields")? {
            options.unknown_fields = match symbol.as_str() {
                "reject" => UnknownFieldPolicy::Reject,
                "ignore" => UnknownFieldPolicy::Ignore,
                _ => UnknownFieldPolicy::Collect,
            };
        }
        if let Some(symbol) = record.field::<Option<String>>("integer-policy")? {
            options.integer_policy = match symbol.as_str() {
                "accept-whole" => IntegerPolicy::AcceptWhole,
                "strict" => IntegerPolicy::Strict,
                _ => IntegerPolicy::Floor,
            };
        }
        if let Some(link) = record.field::<Option<bool>>("link-documents")? {
            options.link_documents = link;
        }
        if let Some(depth) = record.field::<Option<i64>>("max-depth")? {
            options.max_depth =
                usize::try_from(depth).map_err(|_| ConfigError::InvalidValue {
                    field: "max-depth".to_string(),
                    reason: format!("{depth} is negative"),
                })?;
        }
        Ok(options)
    }
}
