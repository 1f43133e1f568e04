use indexmap::IndexMap;
use salad_value::{Map, Value};

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef};
use crate::save::SaveContext;

/// Accepts either a sequence of records or a mapping `id -> body`.
///
/// The mapping form is rewritten into the sequence form, in mapping order,
/// by injecting each key under `subject`. With a `predicate`, a scalar or
/// sequence body becomes `{subject: key, predicate: body}`.
pub struct IdMapLoader {
    inner: LoaderRef,
    subject: String,
    predicate: Option<String>,
}

impl IdMapLoader {
    pub fn new(inner: LoaderRef, subject: impl Into<String>) -> Self {
        Self {
            inner,
            subject: subject.into(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Rewrite the mapping form into the sequence form.
    pub fn expand(
        &self,
        entries: &Map<String, Value>,
        ctx: &LoadContext<'_>,
    ) -> Result<Vec<Value>, LoadError> {
        let mut items = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        let mut seen: IndexMap<String, &str> = IndexMap::new();

        for (key, body) in entries.iter() {
            let key_ctx = ctx.key(key);
            match ctx.resolve_scoped_id(key) {
                Ok(id) => {
                    if let Some(first) = seen.get(&id) {
                        errors.push(key_ctx.error(LoadErrorKind::IdCollision {
                            id,
                            first: first.to_string(),
                            second: key.clone(),
                        }));
                        continue;
                    }
                    seen.insert(id, key.as_str());
                }
                Err(kind) => {
                    errors.push(key_ctx.error(kind));
                    continue;
                }
            }

            let mut item = match (body, &self.predicate) {
                (Value::Mapping(fields), _) => fields.clone(),
                (other, Some(predicate)) => {
                    let mut fields = Map::default();
                    fields.insert(predicate.clone(), other.clone());
                    fields
                }
                (other, None) => {
                    errors.push(key_ctx.error(LoadErrorKind::TypeMismatch {
                        expected: "mapping".to_string(),
                        actual: other.kind(),
                    }));
                    continue;
                }
            };
            item.insert(self.subject.clone(), Value::String(key.clone()));
            items.push(Value::Mapping(item));
        }

        if errors.is_empty() {
            Ok(items)
        } else {
            Err(ctx.error_with(
                LoadErrorKind::InvalidEntries {
                    count: errors.len(),
                    len: entries.len(),
                },
                errors,
            ))
        }
    }
}

impl Loader for IdMapLoader {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        match value {
            Value::Mapping(_) => Ok(()),
            other => self.inner.check_shape(other, ctx),
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        match value {
            Value::Mapping(entries) => {
                let items = self.expand(entries, ctx)?;
                self.inner.load(&Value::Sequence(items), ctx)
            }
            other => self.inner.load(other, ctx),
        }
    }

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        self.inner.save(loaded, ctx)
    }
}
