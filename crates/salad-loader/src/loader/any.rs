use salad_value::Value;

use crate::context::LoadContext;
use crate::error::LoadError;
use crate::loader::{Loaded, Loader};

/// Accepts any value unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyLoader;

impl Loader for AnyLoader {
    fn name(&self) -> String {
        "Any".to_string()
    }

    fn load(&self, value: &Value, _ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        Ok(Loaded::Any(value.clone()))
    }
}
