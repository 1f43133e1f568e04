//! Serializing loaded values back into generic values.
//!
//! Records are written through the loader registered for their class, so
//! identifier fields are shortened with the same scoping rules they were
//! resolved with, and extension fields get their namespace prefix back.

use std::rc::Rc;

use indexmap::IndexMap;
use salad_value::{Map, Value};

use crate::loader::{Loaded, Record};
use crate::registry::Registry;
use crate::resolve::{UriScope, relativize};
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write identifiers relative to the enclosing base where possible.
    pub relative_uris: bool,
    /// Base of the written document, instead of the loaded one.
    pub base: Option<String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            relative_uris: true,
            base: None,
        }
    }
}

/// Per-call serialization state, mirroring [`LoadContext`](crate::LoadContext).
#[derive(Clone)]
pub struct SaveContext<'a> {
    registry: &'a Registry,
    base: Rc<str>,
    namespaces: Rc<IndexMap<String, String>>,
    relative_uris: bool,
}

impl<'a> SaveContext<'a> {
    pub fn new(
        registry: &'a Registry,
        base: impl Into<Rc<str>>,
        namespaces: IndexMap<String, String>,
        relative_uris: bool,
    ) -> Self {
        Self {
            registry,
            base: base.into(),
            namespaces: Rc::new(namespaces),
            relative_uris,
        }
    }

    pub fn vocabulary(&self) -> &'a Vocabulary {
        self.registry.vocabulary()
    }

    pub fn with_base(&self, base: impl Into<Rc<str>>) -> Self {
        Self {
            base: base.into(),
            ..self.clone()
        }
    }

    /// `uri` as written under the current base.
    pub fn relativize(&self, uri: &str, scope: UriScope) -> String {
        if self.relative_uris {
            relativize(uri, &self.base, scope)
        } else {
            uri.to_string()
        }
    }

    /// `prefix:rest` form of a full identifier under a known namespace.
    pub fn prefixed(&self, iri: &str) -> String {
        self.namespaces
            .iter()
            .find_map(|(prefix, namespace)| {
                iri.strip_prefix(namespace.as_str())
                    .map(|rest| format!("{prefix}:{rest}"))
            })
            .unwrap_or_else(|| iri.to_string())
    }

    /// Write a value without knowing the loader that produced it.
    ///
    /// Records are dispatched to the loader registered for their class.
    pub fn save(&self, loaded: &Loaded) -> Value {
        match loaded {
            Loaded::Null => Value::Null,
            Loaded::Bool(b) => Value::Bool(*b),
            Loaded::Integer(i) => Value::Integer(*i),
            Loaded::Float(f) => Value::Float(*f),
            Loaded::String(s) | Loaded::Symbol(s) => Value::String(s.clone()),
            Loaded::Uri(uri) => Value::String(self.relativize(uri, UriScope::Reference)),
            Loaded::Link(link) => {
                Value::String(self.relativize(&link.uri, UriScope::Reference))
            }
            Loaded::List(items) => {
                Value::Sequence(items.iter().map(|item| self.save(item)).collect())
            }
            Loaded::Any(value) => value.clone(),
            Loaded::Record(record) => match self.registry.get(record.class()) {
                Some(loader) => loader.save(loaded, self),
                None => self.save_fields(record),
            },
        }
    }

    /// Fields and extensions of a record of an unregistered class.
    fn save_fields(&self, record: &Record) -> Value {
        let mut map = Map::default();
        for (name, value) in record.fields.iter() {
            if !value.is_null() {
                map.insert(name.clone(), self.save(value));
            }
        }
        self.save_extensions(record, &mut map);
        Value::Mapping(map)
    }

    pub(crate) fn save_extensions(&self, record: &Record, map: &mut Map<String, Value>) {
        for (name, value) in record.extensions.iter() {
            map.insert(self.prefixed(name), value.clone());
        }
    }
}
