use salad_value::Value;

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader};

/// String resolved through the vocabulary to one of a fixed set of symbols.
pub struct EnumLoader {
    name: String,
    symbols: Vec<String>,
}

impl EnumLoader {
    pub fn new<S: Into<String>>(name: impl Into<String>, symbols: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn decode(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<String, LoadErrorKind> {
        let Value::String(raw) = value else {
            return Err(LoadErrorKind::TypeMismatch {
                expected: self.name.clone(),
                actual: value.kind(),
            });
        };
        let symbol = ctx.resolve_symbol(raw);
        if self.symbols.contains(&symbol) {
            Ok(symbol)
        } else {
            Err(LoadErrorKind::InvalidSymbol {
                value: raw.clone(),
                symbols: self.symbols.clone(),
            })
        }
    }
}

impl Loader for EnumLoader {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        self.decode(value, ctx).map(|_| ())
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        self.decode(value, ctx)
            .map(Loaded::Symbol)
            .map_err(|kind| ctx.error(kind))
    }
}
