use salad_value::{Map, Value};

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef};
use crate::save::SaveContext;

const GRAMMAR: &str = "`pattern`, `pattern?` or a mapping with `pattern`";

/// Expands secondary-file shorthand before handing the value to `inner`.
///
/// `"p"` becomes `{pattern: p}` and `"p?"` becomes
/// `{pattern: p, required: false}`.
pub struct SecondaryDslLoader {
    inner: LoaderRef,
}

impl SecondaryDslLoader {
    pub fn new(inner: LoaderRef) -> Self {
        Self { inner }
    }

    fn expand_one(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Value, LoadError> {
        match value {
            Value::String(text) => expand_str(text).map_err(|kind| ctx.error(kind)),
            Value::Mapping(map) if map.contains_key("pattern") => Ok(value.clone()),
            Value::Mapping(_) => Err(ctx
                .field("pattern")
                .error(LoadErrorKind::MissingField("pattern".to_string()))),
            other => Err(ctx.error(LoadErrorKind::TypeMismatch {
                expected: "secondary file pattern".to_string(),
                actual: other.kind(),
            })),
        }
    }

    pub fn expand(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Value, LoadError> {
        let Value::Sequence(items) = value else {
            return self.expand_one(value, ctx);
        };
        let mut expanded = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match self.expand_one(item, &ctx.index(index)) {
                Ok(item) => expanded.push(item),
                Err(error) => errors.push(error),
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
}

fn expand_str(text: &str) -> Result<Value, LoadErrorKind> {
    let (pattern, required) = match text.strip_suffix('?') {
        Some(pattern) => (pattern, false),
        None => (text, true),
    };
    if pattern.is_empty() || pattern.ends_with('?') {
        return Err(LoadErrorKind::MalformedShorthand {
            input: text.to_string(),
            offending: if pattern.is_empty() { text } else { "?" }.to_string(),
            grammar: GRAMMAR.to_string(),
        });
    }
    let mut map = Map::default();
    map.insert("pattern".to_string(), Value::from(pattern));
    if !required {
        map.insert("required".to_string(), Value::Bool(false));
    }
    Ok(Value::Mapping(map))
}

impl Loader for SecondaryDslLoader {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        let expanded = self.expand(value, ctx)?;
        self.inner.load(&expanded, ctx)
    }

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        self.inner.save(loaded, ctx)
    }
}
