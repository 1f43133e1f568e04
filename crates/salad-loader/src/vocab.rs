//! Vocabulary and namespace table.
//!
//! Maps short names (field names, enum symbols, type names) to fully
//! qualified identifiers and back. Built once alongside the registry and
//! read-only while documents are decoded.

use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    /// short name -> full identifier
    terms: IndexMap<String, String>,
    /// full identifier -> short name
    reverse: IndexMap<String, String>,
    /// prefix -> namespace identifier
    namespaces: IndexMap<String, String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(mut self, short: impl Into<String>, full: impl Into<String>) -> Self {
        self.insert_term(short, full);
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), iri.into());
        self
    }

    pub fn insert_term(&mut self, short: impl Into<String>, full: impl Into<String>) {
        let short = short.into();
        let full = full.into();
        self.reverse.insert(full.clone(), short.clone());
        self.terms.insert(short, full);
    }

    /// Full identifier of a vocabulary term.
    pub fn term(&self, short: &str) -> Option<&str> {
        self.terms.get(short).map(String::as_str)
    }

    /// Short name of a full identifier, if it belongs to the vocabulary.
    pub fn shortname(&self, full: &str) -> Option<&str> {
        self.reverse.get(full).map(String::as_str)
    }

    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    /// Canonical name of a mapping key.
    ///
    /// Prefixed keys are expanded and mapped back to their vocabulary short
    /// name when one exists. Keys outside the vocabulary keep their expanded
    /// form, so they still contain a `:`.
    pub fn resolve_field_name(&self, key: &str, namespaces: &IndexMap<String, String>) -> String {
        if !key.contains(':') {
            return key.to_string();
        }
        let expanded = expand_namespace(key, namespaces).unwrap_or_else(|| key.to_string());
        match self.shortname(&expanded) {
            Some(short) => short.to_string(),
            None => expanded,
        }
    }

    /// Canonical short form of an enum symbol or class name.
    ///
    /// Accepts the short name itself, its full identifier, or a prefixed
    /// form that expands to the full identifier.
    pub fn resolve_symbol(&self, value: &str, namespaces: &IndexMap<String, String>) -> String {
        if let Some(short) = self.shortname(value) {
            return short.to_string();
        }
        if let Some(expanded) = expand_namespace(value, namespaces)
            && let Some(short) = self.shortname(&expanded)
        {
            return short.to_string();
        }
        value.to_string()
    }
}

/// Expand `prefix:rest` when `prefix` is a known namespace.
pub fn expand_namespace(value: &str, namespaces: &IndexMap<String, String>) -> Option<String> {
    let (prefix, rest) = value.split_once(':')?;
    // `http://...` style values are never prefixed names
    if rest.starts_with("//") {
        return None;
    }
    namespaces.get(prefix).map(|iri| format!("{iri}{rest}"))
}
