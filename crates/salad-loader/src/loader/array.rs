use salad_value::Value;

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef};
use crate::save::SaveContext;

/// Sequence of items, each decoded with the item loader.
///
/// Every element is attempted; failures are collected one child per index.
pub struct ArrayLoader {
    items: LoaderRef,
}

impl ArrayLoader {
    pub fn new(items: LoaderRef) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &LoaderRef {
        &self.items
    }
}

impl Loader for ArrayLoader {
    fn name(&self) -> String {
        format!("array<{}>", self.items.name())
    }

    fn check_shape(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        match value {
            Value::Sequence(_) => Ok(()),
            other => Err(LoadErrorKind::TypeMismatch {
                expected: self.name(),
                actual: other.kind(),
            }),
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        ctx.check_depth()?;
        let Value::Sequence(elements) = value else {
            return Err(ctx.error(LoadErrorKind::TypeMismatch {
                expected: self.name(),
                actual: value.kind(),
            }));
        };

        let mut loaded = Vec::with_capacity(elements.len());
        let mut errors = Vec::new();
        for (index, element) in elements.iter().enumerate() {
            match self.items.load(element, &ctx.index(index)) {
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
                    len: elements.len(),
                },
                errors,
            ))
        }
    }

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        match loaded {
            Loaded::List(items) => {
                Value::Sequence(items.iter().map(|item| self.items.save(item, ctx)).collect())
            }
            other => ctx.save(other),
        }
    }
}
