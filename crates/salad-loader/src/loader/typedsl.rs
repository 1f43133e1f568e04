//! Compact type syntax: `T`, `T?`, `T[]`, `T[]?`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use salad_value::{Map, Value};

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef};
use crate::registry::is_builtin;
use crate::save::SaveContext;

pub const GRAMMAR: &str = "`name`, `name?`, `name[]` or `name[]?`";

static TYPE_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z_][A-Za-z0-9_.:#/-]*)(?P<array>\[\])?(?P<optional>\?)?")
        .expect("invalid type expression regex")
});

/// A parsed compact type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>),
    Optional(Box<TypeExpr>),
}

/// Parse failure: the offending part of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedTypeExpr {
    pub input: String,
    pub offending: String,
}

impl From<MalformedTypeExpr> for LoadErrorKind {
    fn from(error: MalformedTypeExpr) -> Self {
        LoadErrorKind::MalformedShorthand {
            input: error.input,
            offending: error.offending,
            grammar: GRAMMAR.to_string(),
        }
    }
}

impl FromStr for TypeExpr {
    type Err = MalformedTypeExpr;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let malformed = |offending: &str| MalformedTypeExpr {
            input: input.to_string(),
            offending: offending.to_string(),
        };
        let trimmed = input.trim();
        let captures = TYPE_EXPR
            .captures(trimmed)
            .ok_or_else(|| malformed(trimmed))?;
        let end = captures.get(0).map_or(0, |m| m.end());
        if end < trimmed.len() {
            return Err(malformed(&trimmed[end..]));
        }

        let mut expr = TypeExpr::Named(captures["name"].to_string());
        if captures.name("array").is_some() {
            expr = TypeExpr::Array(Box::new(expr));
        }
        if captures.name("optional").is_some() {
            expr = TypeExpr::Optional(Box::new(expr));
        }
        Ok(expr)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::Array(items) => write!(f, "{items}[]"),
            TypeExpr::Optional(inner) => write!(f, "{inner}?"),
        }
    }
}

impl TypeExpr {
    fn try_map_names<E>(self, f: &impl Fn(String) -> Result<String, E>) -> Result<Self, E> {
        Ok(match self {
            TypeExpr::Named(name) => TypeExpr::Named(f(name)?),
            TypeExpr::Array(items) => TypeExpr::Array(Box::new(items.try_map_names(f)?)),
            TypeExpr::Optional(inner) => TypeExpr::Optional(Box::new(inner.try_map_names(f)?)),
        })
    }

    /// The long form of the expression as a generic value.
    ///
    /// `T?` becomes `["null", T]`, `T[]` becomes
    /// `{"type": "array", "items": T}`.
    pub fn to_value(&self) -> Value {
        match self {
            TypeExpr::Named(name) => Value::String(name.clone()),
            TypeExpr::Array(items) => {
                let mut map = Map::default();
                map.insert("type".to_string(), Value::from("array"));
                map.insert("items".to_string(), items.to_value());
                Value::Mapping(map)
            }
            TypeExpr::Optional(inner) => {
                Value::Sequence(vec![Value::from("null"), inner.to_value()])
            }
        }
    }
}

/// Expands compact type strings before handing the value to `inner`.
///
/// In a sequence every string is expanded and optional expansions are
/// spliced in place, keeping the first occurrence of each alternative.
///
/// With a ref scope, names that are neither built-in, registered nor
/// vocabulary terms resolve as identifiers under an ancestor of the base.
pub struct TypeDslLoader {
    inner: LoaderRef,
    ref_scope: Option<usize>,
}

impl TypeDslLoader {
    pub fn new(inner: LoaderRef) -> Self {
        Self {
            inner,
            ref_scope: None,
        }
    }

    pub fn ref_scope(mut self, levels: usize) -> Self {
        self.ref_scope = Some(levels);
        self
    }

    fn expand_text(&self, text: &str, ctx: &LoadContext<'_>) -> Result<Value, LoadErrorKind> {
        let expr = TypeExpr::from_str(text)?;
        let expr = match self.ref_scope {
            Some(levels) => expr.try_map_names(&|name| {
                let known = is_builtin(&name)
                    || ctx.registry().get(&name).is_some()
                    || ctx.vocabulary().term(&name).is_some();
                if known {
                    Ok(name)
                } else {
                    ctx.resolve_ref_scope(&name, levels)
                }
            })?,
            None => expr,
        };
        Ok(expr.to_value())
    }

    pub fn expand(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Value, LoadError> {
        match value {
            Value::String(text) => self.expand_text(text, ctx).map_err(|kind| ctx.error(kind)),
            Value::Sequence(items) => {
                let mut expanded: Vec<Value> = Vec::with_capacity(items.len());
                let mut errors = Vec::new();
                for (index, item) in items.iter().enumerate() {
                    let Value::String(text) = item else {
                        push_unique(&mut expanded, item.clone());
                        continue;
                    };
                    match self.expand_text(text, ctx) {
                        Ok(Value::Sequence(parts)) => {
                            for part in parts {
                                push_unique(&mut expanded, part);
                            }
                        }
                        Ok(single) => push_unique(&mut expanded, single),
                        Err(kind) => errors.push(ctx.index(index).error(kind)),
                    }
                }
                if errors.is_empty() {
                    Ok(Value::Sequence(expanded))
                } else {
                    Err(ctx.error_with(
                        LoadErrorKind::InvalidElements {
                            count: errors.len(),
                            len: items.len(),
                        },
                        errors,
                    ))
                }
            }
            other => Ok(other.clone()),
        }
    }
}

fn push_unique(items: &mut Vec<Value>, item: Value) {
    if !items.contains(&item) {
        items.push(item);
    }
}

impl Loader for TypeDslLoader {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        match value {
            Value::String(text) => self.inner.check_shape(&self.expand_text(text, ctx)?, ctx),
            other => self.inner.check_shape(other, ctx),
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        let expanded = self.expand(value, ctx)?;
        self.inner.load(&expanded, ctx)
    }

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        self.inner.save(loaded, ctx)
    }
}
