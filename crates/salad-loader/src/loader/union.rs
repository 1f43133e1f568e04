use salad_value::Value;
use tracing::trace;

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef};

/// Ordered alternatives; the first one that decodes wins.
///
/// Each alternative is first screened with [`Loader::check_shape`]. Only
/// alternatives that pass are fully decoded, in declaration order. When all
/// fail, the error carries one child per alternative.
pub struct UnionLoader {
    name: Option<String>,
    alternatives: Vec<LoaderRef>,
}

impl UnionLoader {
    pub fn new(alternatives: Vec<LoaderRef>) -> Self {
        Self {
            name: None,
            alternatives,
        }
    }

    pub fn named(name: impl Into<String>, alternatives: Vec<LoaderRef>) -> Self {
        Self {
            name: Some(name.into()),
            alternatives,
        }
    }

    pub fn alternatives(&self) -> &[LoaderRef] {
        &self.alternatives
    }
}

impl Loader for UnionLoader {
    fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .alternatives
                .iter()
                .map(|alternative| alternative.name())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    fn id_field(&self) -> Option<String> {
        self.alternatives
            .iter()
            .find_map(|alternative| alternative.id_field())
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        if self
            .alternatives
            .iter()
            .any(|alternative| alternative.check_shape(value, ctx).is_ok())
        {
            Ok(())
        } else {
            Err(LoadErrorKind::TypeMismatch {
                expected: self.name(),
                actual: value.kind(),
            })
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        let mut failures = Vec::with_capacity(self.alternatives.len());
        for alternative in &self.alternatives {
            let name = alternative.name();
            let cause = match alternative.check_shape(value, ctx) {
                Err(reason) => {
                    trace!(alternative = %name, %reason, "rejected by shape");
                    ctx.error(reason)
                }
                Ok(()) => {
                    trace!(alternative = %name, "attempting");
                    match alternative.load(value, ctx) {
                        Ok(loaded) => return Ok(loaded),
                        Err(error) => error,
                    }
                }
            };
            failures.push(ctx.error_with(LoadErrorKind::AlternativeFailed(name), vec![cause]));
        }
        Err(ctx.error_with(
            LoadErrorKind::NoMatchingAlternative {
                expected: self.name(),
                count: self.alternatives.len(),
            },
            failures,
        ))
    }
}
