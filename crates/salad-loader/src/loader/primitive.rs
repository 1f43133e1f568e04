use salad_value::{Value, ValueKind};

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader};
use crate::options::IntegerPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Null,
    Bool,
    Integer,
    /// Any number; integers are widened.
    Float,
    String,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Null => "null",
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Float => "float",
            PrimitiveKind::String => "string",
        }
    }
}

/// Accepts exactly one primitive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimitiveLoader {
    kind: PrimitiveKind,
}

impl PrimitiveLoader {
    pub const fn new(kind: PrimitiveKind) -> Self {
        Self { kind }
    }

    pub const fn null() -> Self {
        Self::new(PrimitiveKind::Null)
    }

    pub const fn boolean() -> Self {
        Self::new(PrimitiveKind::Bool)
    }

    pub const fn integer() -> Self {
        Self::new(PrimitiveKind::Integer)
    }

    pub const fn float() -> Self {
        Self::new(PrimitiveKind::Float)
    }

    pub const fn string() -> Self {
        Self::new(PrimitiveKind::String)
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    fn decode(&self, value: &Value, policy: IntegerPolicy) -> Result<Loaded, LoadErrorKind> {
        match (self.kind, value) {
            (PrimitiveKind::Null, Value::Null) => Ok(Loaded::Null),
            (PrimitiveKind::Bool, Value::Bool(b)) => Ok(Loaded::Bool(*b)),
            (PrimitiveKind::Integer, Value::Integer(i)) => Ok(Loaded::Integer(*i)),
            (PrimitiveKind::Integer, Value::Float(f)) => narrow(*f, policy).map(Loaded::Integer),
            (PrimitiveKind::Float, Value::Float(f)) => Ok(Loaded::Float(*f)),
            (PrimitiveKind::Float, Value::Integer(i)) => Ok(Loaded::Float(*i as f64)),
            (PrimitiveKind::String, Value::String(s)) => Ok(Loaded::String(s.clone())),
            (kind, other) => Err(LoadErrorKind::TypeMismatch {
                expected: kind.name().to_string(),
                actual: other.kind(),
            }),
        }
    }
}

fn narrow(value: f64, policy: IntegerPolicy) -> Result<i64, LoadErrorKind> {
    let mismatch = || LoadErrorKind::TypeMismatch {
        expected: PrimitiveKind::Integer.name().to_string(),
        actual: ValueKind::Float,
    };
    if !value.is_finite() || value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(mismatch());
    }
    match policy {
        IntegerPolicy::Strict => Err(mismatch()),
        IntegerPolicy::AcceptWhole if value.fract() != 0.0 => {
            Err(LoadErrorKind::FractionalInteger { value })
        }
        IntegerPolicy::AcceptWhole => Ok(value as i64),
        IntegerPolicy::Floor => Ok(value.floor() as i64),
    }
}

impl Loader for PrimitiveLoader {
    fn name(&self) -> String {
        self.kind.name().to_string()
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        self.decode(value, ctx.options().integer_policy).map(|_| ())
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        self.decode(value, ctx.options().integer_policy)
            .map_err(|kind| ctx.error(kind))
    }
}
