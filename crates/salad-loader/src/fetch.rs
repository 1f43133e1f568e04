//! Fetch collaborators: identifier -> parsed generic value.

use std::collections::HashMap;
use std::path::Path;

use salad_value::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("cannot reach {uri}: {reason}")]
    Unreachable { uri: String, reason: String },
    #[error("cannot parse {uri}: {source}")]
    Parse {
        uri: String,
        #[source]
        source: salad_value::Error,
    },
    #[error("unsupported scheme in {0}")]
    UnsupportedScheme(String),
}

/// Retrieves and parses the document named by an absolute identifier
/// (without fragment).
pub trait Fetcher {
    fn fetch(&self, uri: &str) -> Result<Value, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        (**self).fetch(uri)
    }
}

/// In-memory documents.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Value>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: impl Into<String>, document: Value) -> Self {
        self.insert(uri, document);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, document: Value) {
        self.documents.insert(uri.into(), document);
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

/// `file://` documents; `.json` files are parsed as JSON, everything else
/// as YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

impl FsFetcher {
    pub fn parse(uri: &str, path: &Path, text: &str) -> Result<Value, FetchError> {
        let parsed = if path.extension().is_some_and(|ext| ext == "json") {
            Value::from_json_str(text)
        } else {
            Value::from_yaml_str(text)
        };
        parsed.map_err(|source| FetchError::Parse {
            uri: uri.to_string(),
            source,
        })
    }
}

impl Fetcher for FsFetcher {
    fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        let url = Url::parse(uri).map_err(|e| FetchError::Unreachable {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "file" {
            return Err(FetchError::UnsupportedScheme(uri.to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|()| FetchError::UnsupportedScheme(uri.to_string()))?;
        debug!(path = %path.display(), "reading document");
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(uri.to_string()),
            _ => FetchError::Unreachable {
                uri: uri.to_string(),
                reason: e.to_string(),
            },
        })?;
        Self::parse(uri, &path, &text)
    }
}

/// Tries `first`, falling back to `second` when `first` does not have the
/// document or does not handle its scheme.
#[derive(Debug, Clone, Default)]
pub struct ChainFetcher<A, B> {
    first: A,
    second: B,
}

impl<A: Fetcher, B: Fetcher> ChainFetcher<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Fetcher, B: Fetcher> Fetcher for ChainFetcher<A, B> {
    fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
        match self.first.fetch(uri) {
            Err(FetchError::NotFound(_) | FetchError::UnsupportedScheme(_)) => {
                self.second.fetch(uri)
            }
            other => other,
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use salad_value::Value;
    use tracing::debug;
    use url::Url;

    use super::{FetchError, Fetcher, FsFetcher};

    /// `http(s)://` documents via a blocking client.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: Client,
        /// Maximum document size (default: 8 MiB)
        pub max_file_size: u64,
    }

    impl HttpFetcher {
        pub fn new(timeout: Duration) -> Result<Self, FetchError> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| FetchError::Unreachable {
                    uri: String::new(),
                    reason: e.to_string(),
                })?;
            Ok(Self {
                client,
                max_file_size: 8 * 1024 * 1024,
            })
        }
    }

    impl Fetcher for HttpFetcher {
        fn fetch(&self, uri: &str) -> Result<Value, FetchError> {
            let unreachable = |reason: String| FetchError::Unreachable {
                uri: uri.to_string(),
                reason,
            };
            let url = Url::parse(uri).map_err(|e| unreachable(e.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(FetchError::UnsupportedScheme(uri.to_string()));
            }
            debug!(uri, "fetching over http");
            let response = self
                .client
                .get(url.as_str())
                .send()
                .map_err(|e| unreachable(e.to_string()))?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(uri.to_string()));
            }
            if !response.status().is_success() {
                return Err(unreachable(format!("status {}", response.status())));
            }
            if let Some(length) = response.content_length()
                && length > self.max_file_size
            {
                return Err(unreachable(format!(
                    "document is {length} bytes, limit is {}",
                    self.max_file_size
                )));
            }
            let text = response.text().map_err(|e| unreachable(e.to_string()))?;
            FsFetcher::parse(uri, std::path::Path::new(url.path()), &text)
        }
    }
}
