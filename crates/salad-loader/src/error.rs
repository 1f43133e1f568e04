//! Failure model.
//!
//! Two categories of errors:
//! - `LoadError`: a tree of data mismatches produced while decoding. Leaves
//!   are root causes; inner nodes summarize (a record wraps one child per
//!   offending field, a union wraps one child per failed alternative).
//! - `SchemaError`: problems with the loader graph itself, reported when the
//!   registry is built.

use std::fmt::Write as _;

use salad_value::{Path, ValueKind};
use thiserror::Error;

// =============================================================================
// LoadError
// =============================================================================

/// A node of the aggregated failure tree.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct LoadError {
    pub kind: LoadErrorKind,
    /// Where in the current document the failure was found.
    pub path: Path,
    /// Child causes, in field/index/alternative order.
    pub causes: Vec<LoadError>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadErrorKind {
    #[error("expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: ValueKind },

    #[error("expected an integer, found fractional number {value}")]
    FractionalInteger { value: f64 },

    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("field `{field}` is given by both `{first}` and `{second}`")]
    DuplicateField {
        field: String,
        first: String,
        second: String,
    },

    #[error("unknown field `{field}`, expected one of: {}", backticked(expected))]
    UnknownField { field: String, expected: Vec<String> },

    #[error("invalid symbol `{value}`, expected one of: {}", backticked(symbols))]
    InvalidSymbol { value: String, symbols: Vec<String> },

    #[error("expected class `{expected}`, found `{actual}`")]
    ClassMismatch { expected: String, actual: String },

    #[error("`{0}` is abstract and cannot be loaded directly")]
    AbstractType(String),

    #[error("duplicate id `{id}` declared by keys `{first}` and `{second}`")]
    IdCollision {
        id: String,
        first: String,
        second: String,
    },

    #[error("invalid identifier `{value}`: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    #[error("cannot resolve `{uri}`: {reason}")]
    Reference { uri: String, reason: String },

    #[error("malformed shorthand `{input}` near `{offending}`, expected {grammar}")]
    MalformedShorthand {
        input: String,
        offending: String,
        grammar: String,
    },

    #[error("type `{0}` is not bound to a loader")]
    UnboundType(String),

    #[error("nesting deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("`{class}` record has {count} invalid field(s)")]
    InvalidRecord { class: String, count: usize },

    #[error("{count} of {len} element(s) are invalid")]
    InvalidElements { count: usize, len: usize },

    #[error("{count} of {len} entries are invalid")]
    InvalidEntries { count: usize, len: usize },

    #[error("none of the {count} alternatives of `{expected}` matched")]
    NoMatchingAlternative { expected: String, count: usize },

    #[error("alternative `{0}` does not match")]
    AlternativeFailed(String),
}

fn backticked(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("`{item}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl LoadError {
    pub fn new(kind: LoadErrorKind, path: Path) -> Self {
        Self {
            kind,
            path,
            causes: Vec::new(),
        }
    }

    pub fn with_causes(kind: LoadErrorKind, path: Path, causes: Vec<LoadError>) -> Self {
        Self { kind, path, causes }
    }

    pub fn is_leaf(&self) -> bool {
        self.causes.is_empty()
    }

    /// Root causes, depth first, in aggregation order.
    pub fn leaves(&self) -> Vec<&LoadError> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    pub fn leaf_count(&self) -> usize {
        if self.causes.is_empty() {
            1
        } else {
            self.causes.iter().map(LoadError::leaf_count).sum()
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a LoadError>) {
        if self.causes.is_empty() {
            out.push(self);
        }
        for cause in &self.causes {
            cause.collect_leaves(out);
        }
    }

    /// Render the whole tree, one node per line, children indented.
    ///
    /// ```text
    /// `Widget` record has 3 invalid field(s)
    ///   id: missing required field `id`
    ///   weight: expected float, found string
    ///   tags: 1 of 2 element(s) are invalid
    ///     tags[1]: expected string, found integer
    /// ```
    pub fn trace(&self) -> String {
        let mut out = String::new();
        self.write_trace(&mut out, 0);
        out
    }

    fn write_trace(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        if self.path.is_root() {
            let _ = writeln!(out, "{indent}{}", self.kind);
        } else {
            let _ = writeln!(out, "{indent}{}: {}", self.path, self.kind);
        }
        for cause in &self.causes {
            cause.write_trace(out, depth + 1);
        }
    }
}

// =============================================================================
// SchemaError
// =============================================================================

/// Errors in the loader graph detected while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("type `{0}` is referenced but never defined")]
    UndefinedType(String),

    #[error("type `{0}` is defined more than once")]
    DuplicateType(String),

    #[error("record `{record}` extends `{base}`, which is not a record")]
    ExtendsNonRecord { record: String, base: String },

    #[error("inheritance cycle through `{0}`")]
    InheritanceCycle(String),

    #[error("record `{record}` uses `{field}` as its id, but declares no such field")]
    UnknownIdField { record: String, field: String },

    #[error("no root type was declared")]
    NoRootType,

    #[error("malformed type expression `{0}`")]
    MalformedTypeExpression(String),
}
