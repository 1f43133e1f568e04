use salad_value::Value;

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef};
use crate::resolve::UriScope;
use crate::save::SaveContext;

/// Identifier fields.
///
/// Values are resolved against the context base and namespaces. A linking
/// loader additionally decodes the referenced node with its target loader
/// through the session memo table, producing a [`Loaded::Link`].
pub struct UriLoader {
    scope: UriScope,
    vocab_term: bool,
    target: Option<LoaderRef>,
}

impl UriLoader {
    pub fn identifier() -> Self {
        Self {
            scope: UriScope::Reference,
            vocab_term: false,
            target: None,
        }
    }

    pub fn scoped_id() -> Self {
        Self {
            scope: UriScope::Scoped,
            ..Self::identifier()
        }
    }

    /// A field referencing another document or node decoded as `target`.
    pub fn link(target: LoaderRef) -> Self {
        Self {
            target: Some(target),
            ..Self::identifier()
        }
    }

    /// Resolve bare vocabulary terms to their full identifiers first.
    pub fn vocab_term(mut self) -> Self {
        self.vocab_term = true;
        self
    }

    /// Resolve bare names under an ancestor scope, `levels` fragment
    /// segments above the current base.
    pub fn ref_scope(mut self, levels: usize) -> Self {
        self.scope = UriScope::RefScope(levels);
        self
    }

    fn resolve(&self, raw: &str, ctx: &LoadContext<'_>) -> Result<String, LoadErrorKind> {
        if self.vocab_term
            && let Some(full) = ctx.vocabulary().term(raw)
        {
            return Ok(full.to_string());
        }
        match self.scope {
            UriScope::Reference => ctx.resolve_uri(raw),
            UriScope::Scoped => ctx.resolve_scoped_id(raw),
            UriScope::RefScope(levels) => ctx.resolve_ref_scope(raw, levels),
        }
    }

    fn save_uri(&self, uri: &str, ctx: &SaveContext<'_>) -> Value {
        if self.vocab_term
            && let Some(short) = ctx.vocabulary().shortname(uri)
        {
            return Value::from(short);
        }
        Value::String(ctx.relativize(uri, self.scope))
    }

    fn load_one(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        match (value, &self.target) {
            (Value::String(raw), target) => {
                let uri = self.resolve(raw, ctx).map_err(|kind| ctx.error(kind))?;
                match target {
                    Some(target) if ctx.options().link_documents => {
                        ctx.dereference(&uri, target.as_ref())
                    }
                    _ => Ok(Loaded::Uri(uri)),
                }
            }
            // Linked nodes may also be written inline.
            (Value::Mapping(_), Some(target)) => target.load(value, ctx),
            (other, _) => Err(ctx.error(LoadErrorKind::TypeMismatch {
                expected: self.name(),
                actual: other.kind(),
            })),
        }
    }
}

impl Loader for UriLoader {
    fn name(&self) -> String {
        match &self.target {
            Some(target) => format!("uri<{}>", target.name()),
            None => "uri".to_string(),
        }
    }

    fn check_shape(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        match (value, &self.target) {
            (Value::String(_) | Value::Sequence(_), _) | (Value::Mapping(_), Some(_)) => Ok(()),
            (other, _) => Err(LoadErrorKind::TypeMismatch {
                expected: self.name(),
                actual: other.kind(),
            }),
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        let Value::Sequence(items) = value else {
            return self.load_one(value, ctx);
        };
        let mut loaded = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match self.load_one(item, &ctx.index(index)) {
                Ok(item) => loaded.push(item),
                Err(error) => errors.push(error),
            }
        }
        if errors.is_empty() {
            Ok(Loaded::List(loaded))
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

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        match loaded {
            Loaded::Uri(uri) => self.save_uri(uri, ctx),
            Loaded::Link(link) => self.save_uri(&link.uri, ctx),
            Loaded::List(items) => {
                Value::Sequence(items.iter().map(|item| self.save(item, ctx)).collect())
            }
            inline => match &self.target {
                Some(target) => target.save(inline, ctx),
                None => ctx.save(inline),
            },
        }
    }
}
