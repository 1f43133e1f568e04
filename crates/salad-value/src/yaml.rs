//! YAML ingest.

use serde_yaml::Value as YamlValue;

use crate::{Error, Map, Result, Value};

impl Value {
    /// Parse YAML text into a generic value, keeping key order.
    pub fn from_yaml_str(text: &str) -> Result<Value> {
        let yaml: YamlValue = serde_yaml::from_str(text)?;
        Value::try_from(yaml)
    }
}

impl TryFrom<YamlValue> for Value {
    type Error = Error;

    fn try_from(yaml: YamlValue) -> Result<Self> {
        match yaml {
            YamlValue::Null => Ok(Value::Null),
            YamlValue::Bool(b) => Ok(Value::Bool(b)),
            YamlValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else {
                    Ok(Value::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            YamlValue::String(s) => Ok(Value::String(s)),
            YamlValue::Sequence(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            YamlValue::Mapping(mapping) => {
                let mut map = Map::default();
                for (k, v) in mapping {
                    map.insert(yaml_key(k)?, Value::try_from(v)?);
                }
                Ok(Value::Mapping(map))
            }
            // Tags carry no meaning for loaders
            YamlValue::Tagged(tagged) => Value::try_from(tagged.value),
        }
    }
}

fn yaml_key(key: YamlValue) -> Result<String> {
    match key {
        YamlValue::String(s) => Ok(s),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Ok("null".to_string()),
        other => Err(Error::NonScalarKey(format!("{other:?}"))),
    }
}
