//! The loader abstraction and the values it produces.
//!
//! Every schema type is decoded by a [`Loader`]. Loaders compose: a record
//! loader holds one loader per field, an array loader holds its item loader,
//! a union holds its alternatives. The registry builds this graph once and
//! shares it between documents.

use std::sync::Arc;

use salad_value::{Map, Value};

use crate::context::{LoadContext, NodeId};
use crate::error::{LoadError, LoadErrorKind};
use crate::save::SaveContext;
use crate::typed::{ConvertError, FromLoaded};

mod any;
mod array;
mod idmap;
mod primitive;
mod record;
mod secondary;
mod symbol;
mod typedsl;
mod union;
mod uri;

pub use any::AnyLoader;
pub use array::ArrayLoader;
pub use idmap::IdMapLoader;
pub use primitive::{PrimitiveKind, PrimitiveLoader};
pub use record::{FieldDef, RecordLoader, RecordSchema};
pub use secondary::SecondaryDslLoader;
pub use symbol::EnumLoader;
pub use typedsl::{TypeDslLoader, TypeExpr};
pub use union::UnionLoader;
pub use uri::UriLoader;

pub type LoaderRef = Arc<dyn Loader>;

/// Decodes a generic value into a [`Loaded`] value.
pub trait Loader: Send + Sync {
    /// Type name used in failure messages.
    fn name(&self) -> String;

    /// Cheap structural predicate used by unions before a full decode.
    ///
    /// Must not touch the memo table or the fetcher. Returning `Ok` does not
    /// promise that [`Loader::load`] succeeds.
    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        let _ = (value, ctx);
        Ok(())
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError>;

    /// Key holding the identity of the records this loader produces.
    fn id_field(&self) -> Option<String> {
        None
    }

    /// Serialize a value this loader produced back into a generic value.
    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        ctx.save(loaded)
    }
}

/// A decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Canonical enum symbol
    Symbol(String),
    /// Resolved identifier
    Uri(String),
    List(Vec<Loaded>),
    Record(Arc<Record>),
    /// Value accepted unchanged
    Any(Value),
    /// Node of the document graph produced by a document-linking field
    Link(Link),
}

impl Loaded {
    pub fn type_name(&self) -> &'static str {
        match self {
            Loaded::Null => "null",
            Loaded::Bool(_) => "boolean",
            Loaded::Integer(_) => "integer",
            Loaded::Float(_) => "float",
            Loaded::String(_) => "string",
            Loaded::Symbol(_) => "symbol",
            Loaded::Uri(_) => "uri",
            Loaded::List(_) => "list",
            Loaded::Record(_) => "record",
            Loaded::Any(_) => "any",
            Loaded::Link(_) => "link",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Loaded::Null)
    }

    /// Text of string-like values (strings, symbols, identifiers).
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Loaded::String(s) | Loaded::Symbol(s) | Loaded::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Arc<Record>> {
        if let Loaded::Record(record) = self {
            Some(record)
        } else {
            None
        }
    }

    pub fn as_list(&self) -> Option<&[Loaded]> {
        if let Loaded::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    pub fn as_link(&self) -> Option<&Link> {
        if let Loaded::Link(link) = self {
            Some(link)
        } else {
            None
        }
    }
}

/// Reference to a node of the document graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub uri: String,
    pub node: NodeId,
}

/// A decoded record instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub class: String,
    /// Resolved identity, also the base for everything nested inside.
    pub id: Option<String>,
    /// Declared fields in declaration order; absent optionals are `Null`.
    pub fields: Map<String, Loaded>,
    /// Namespaced extension fields and collected unknown fields.
    pub extensions: Map<String, Value>,
}

impl Record {
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Loaded> {
        self.fields.get(name)
    }

    /// Project a field into a Rust type.
    pub fn field<T: FromLoaded>(&self, name: &str) -> Result<T, ConvertError> {
        let loaded = self
            .fields
            .get(name)
            .ok_or_else(|| ConvertError::MissingField(name.to_string()))?;
        T::from_loaded(loaded).map_err(|source| ConvertError::Field {
            field: name.to_string(),
            source: Box::new(source),
        })
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }
}
