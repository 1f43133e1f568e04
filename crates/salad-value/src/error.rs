use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON parsing error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("mapping keys must be scalars, got {0}")]
    NonScalarKey(String),
}
