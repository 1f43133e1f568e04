//! Projection of [`Loaded`] values into Rust types.

use std::sync::Arc;

use salad_value::Value;
use thiserror::Error;

use crate::loader::{Link, Loaded, Record};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("expected {expected}, found {actual}")]
    Mismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("record has no field `{0}`")]
    MissingField(String),
    #[error("field `{field}`: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ConvertError>,
    },
    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<ConvertError>,
    },
}

/// Conversion from a decoded value.
pub trait FromLoaded: Sized {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError>;
}

fn mismatch(expected: &'static str, loaded: &Loaded) -> ConvertError {
    ConvertError::Mismatch {
        expected,
        actual: loaded.type_name(),
    }
}

impl FromLoaded for Loaded {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        Ok(loaded.clone())
    }
}

impl FromLoaded for bool {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        match loaded {
            Loaded::Bool(b) => Ok(*b),
            other => Err(mismatch("boolean", other)),
        }
    }
}

impl FromLoaded for i64 {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        match loaded {
            Loaded::Integer(i) => Ok(*i),
            other => Err(mismatch("integer", other)),
        }
    }
}

impl FromLoaded for f64 {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        match loaded {
            Loaded::Float(f) => Ok(*f),
            Loaded::Integer(i) => Ok(*i as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

/// Strings, enum symbols and resolved identifiers.
impl FromLoaded for String {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        loaded
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", loaded))
    }
}

impl<T: FromLoaded> FromLoaded for Option<T> {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        match loaded {
            Loaded::Null => Ok(None),
            other => T::from_loaded(other).map(Some),
        }
    }
}

impl<T: FromLoaded> FromLoaded for Vec<T> {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        let Loaded::List(items) = loaded else {
            return Err(mismatch("list", loaded));
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                T::from_loaded(item).map_err(|source| ConvertError::Element {
                    index,
                    source: Box::new(source),
                })
            })
            .collect()
    }
}

impl FromLoaded for Link {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        loaded
            .as_link()
            .cloned()
            .ok_or_else(|| mismatch("link", loaded))
    }
}

impl FromLoaded for Arc<Record> {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        loaded
            .as_record()
            .cloned()
            .ok_or_else(|| mismatch("record", loaded))
    }
}

impl FromLoaded for Value {
    fn from_loaded(loaded: &Loaded) -> Result<Self, ConvertError> {
        match loaded {
            Loaded::Any(value) => Ok(value.clone()),
            Loaded::Null => Ok(Value::Null),
            Loaded::Bool(b) => Ok(Value::Bool(*b)),
            Loaded::Integer(i) => Ok(Value::Integer(*i)),
            Loaded::Float(f) => Ok(Value::Float(*f)),
            Loaded::String(s) | Loaded::Symbol(s) | Loaded::Uri(s) => Ok(Value::String(s.clone())),
            other => Err(mismatch("plain value", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(bool::from_loaded(&Loaded::Bool(true)), Ok(true));
        assert_eq!(f64::from_loaded(&Loaded::Integer(5)), Ok(5.0));
        assert_eq!(
            String::from_loaded(&Loaded::Symbol("red".to_string())),
            Ok("red".to_string())
        );
        assert_eq!(
            i64::from_loaded(&Loaded::String("5".to_string())),
            Err(ConvertError::Mismatch {
                expected: "integer",
                actual: "string",
            })
        );
    }

    #[test]
    fn test_option_and_vec() {
        assert_eq!(Option::<i64>::from_loaded(&Loaded::Null), Ok(None));
        assert_eq!(
            Vec::<String>::from_loaded(&Loaded::List(vec![
                Loaded::String("x".to_string()),
                Loaded::String("y".to_string()),
            ])),
            Ok(vec!["x".to_string(), "y".to_string()])
        );
        assert!(matches!(
            Vec::<i64>::from_loaded(&Loaded::List(vec![Loaded::Integer(1), Loaded::Null])),
            Err(ConvertError::Element { index: 1, .. })
        ));
    }
}
