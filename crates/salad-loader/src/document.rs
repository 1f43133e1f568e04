//! Root loader: the entry point of a top-level load.

use std::rc::Rc;

use indexmap::IndexMap;
use salad_value::{Map, Path, Value};
use tracing::debug;

use crate::context::{DocumentGraph, LoadContext, LoadSession, MemoState, NodeId, find_node};
use crate::error::{LoadError, LoadErrorKind, SchemaError};
use crate::fetch::Fetcher;
use crate::loader::{Loaded, LoaderRef};
use crate::options::LoadOptions;
use crate::registry::Registry;
use crate::resolve::split_fragment;
use crate::save::{SaveContext, SaveOptions};
use crate::typed::{ConvertError, FromLoaded};

/// Loads whole documents with a registry's top-level loader.
///
/// The root document accepts these directives:
/// - `$base`: base identifier for the document, instead of its own
/// - `$namespaces`: extra namespace prefixes for the whole load
/// - `$schemas`: kept and written back on save
/// - `$graph`: the value decoded instead of the whole document
///
/// A fragment in the loaded identifier selects the node with that id.
pub struct RootLoader<'r> {
    registry: &'r Registry,
    loader: LoaderRef,
    fetcher: &'r dyn Fetcher,
    options: LoadOptions,
}

impl<'r> RootLoader<'r> {
    /// Use the registry's declared root type.
    pub fn new(registry: &'r Registry, fetcher: &'r dyn Fetcher) -> Result<Self, SchemaError> {
        let loader = registry.root().ok_or(SchemaError::NoRootType)?;
        Ok(Self::with_loader(registry, fetcher, loader.clone()))
    }

    pub fn for_type(
        registry: &'r Registry,
        fetcher: &'r dyn Fetcher,
        name: &str,
    ) -> Result<Self, SchemaError> {
        let loader = registry
            .get(name)
            .ok_or_else(|| SchemaError::UndefinedType(name.to_string()))?;
        Ok(Self::with_loader(registry, fetcher, loader.clone()))
    }

    pub fn with_loader(
        registry: &'r Registry,
        fetcher: &'r dyn Fetcher,
        loader: LoaderRef,
    ) -> Self {
        Self {
            registry,
            loader,
            fetcher,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Fetch and decode the document identified by `uri`.
    pub fn load(&self, uri: &str) -> Result<Document, LoadError> {
        let session = LoadSession::new(self.registry, self.fetcher, &self.options);
        let (document_uri, _) = split_fragment(uri);
        let value = session.document(document_uri).map_err(|e| {
            LoadError::new(
                LoadErrorKind::Reference {
                    uri: uri.to_string(),
                    reason: e.to_string(),
                },
                Path::root(),
            )
        })?;
        self.decode(session, &value, uri)
    }

    /// Decode an already parsed document named `uri`.
    pub fn load_value(&self, value: &Value, uri: &str) -> Result<Document, LoadError> {
        let session = LoadSession::new(self.registry, self.fetcher, &self.options);
        let (document_uri, _) = split_fragment(uri);
        let value = Rc::new(value.clone());
        session.insert_document(document_uri, Rc::clone(&value));
        self.decode(session, &value, uri)
    }

    fn decode(
        &self,
        session: LoadSession<'_>,
        value: &Value,
        uri: &str,
    ) -> Result<Document, LoadError> {
        let type_name = self.loader.name();
        debug!(uri, root = %type_name, "loading document");
        let mut ctx = LoadContext::new(&session, split_fragment(uri).0);
        let mut target = value;
        let mut namespaces = IndexMap::new();
        let mut schemas = None;
        let mut has_graph = false;

        if let Value::Mapping(map) = value {
            if let Some(declared) = map.get("$namespaces") {
                let Value::Mapping(declared) = declared else {
                    return Err(ctx.field("$namespaces").error(LoadErrorKind::TypeMismatch {
                        expected: "mapping".to_string(),
                        actual: declared.kind(),
                    }));
                };
                namespaces = declared
                    .iter()
                    .filter_map(|(prefix, iri)| Some((prefix.clone(), iri.as_str()?.to_string())))
                    .collect();
                ctx = ctx.with_namespaces(
                    namespaces
                        .iter()
                        .map(|(prefix, iri)| (prefix.as_str(), iri.as_str())),
                );
            }
            if let Some(base) = map.get("$base") {
                let Value::String(base) = base else {
                    return Err(ctx.field("$base").error(LoadErrorKind::TypeMismatch {
                        expected: "string".to_string(),
                        actual: base.kind(),
                    }));
                };
                let resolved = ctx
                    .resolve_uri(base)
                    .map_err(|kind| ctx.field("$base").error(kind))?;
                ctx = ctx.with_base(resolved);
            }
            schemas = map.get("$schemas").cloned();
            if let Some(graph) = map.get("$graph") {
                target = graph;
                has_graph = true;
            }
        }

        // A fragment selects one node of the document as the root.
        if split_fragment(uri).1.is_some() {
            let id_key = self.loader.id_field().unwrap_or_else(|| "id".to_string());
            let (node, base) = find_node(target, uri, ctx.base(), ctx.namespaces(), &id_key)
                .ok_or_else(|| {
                    ctx.error(LoadErrorKind::Reference {
                        uri: uri.to_string(),
                        reason: format!("no node with id `{uri}`"),
                    })
                })?;
            target = node;
            ctx = ctx.with_base(base);
        } else if !has_graph {
            let root = ctx.base().to_string();
            ctx = ctx.with_doc_root(root);
        }

        let root_id = match session.begin(uri, &type_name) {
            MemoState::Started(id) => id,
            // A fresh session has no other nodes yet.
            MemoState::InProgress(id) | MemoState::Resolved(id) => id,
            MemoState::Failed(error) => return Err(error),
        };
        let result = self.loader.load(target, &ctx);
        session.finish(root_id, &result);
        let root = result?;
        let base = ctx.base().to_string();
        drop(ctx);
        let graph = session.into_graph();
        debug!(uri, nodes = graph.len(), "document loaded");
        Ok(Document {
            root_id,
            root,
            graph,
            base,
            namespaces,
            schemas,
        })
    }

    /// Write a loaded document back as a generic value.
    ///
    /// Identifiers are shortened against the document base unless
    /// [`SaveOptions::relative_uris`] is off. Namespaces and schemas declared
    /// by the document are written back as directives.
    pub fn save(&self, document: &Document, options: &SaveOptions) -> Value {
        let base = options.base.as_deref().unwrap_or(&document.base);
        let mut namespaces = self.registry.vocabulary().namespaces().clone();
        namespaces.extend(document.namespaces.clone());
        let ctx = SaveContext::new(self.registry, base, namespaces, options.relative_uris);
        let saved = self.loader.save(&document.root, &ctx);
        if document.namespaces.is_empty() && document.schemas.is_none() {
            return saved;
        }

        let mut top = Map::default();
        if !document.namespaces.is_empty() {
            top.insert(
                "$namespaces".to_string(),
                Value::Mapping(
                    document
                        .namespaces
                        .iter()
                        .map(|(prefix, iri)| (prefix.clone(), Value::from(iri.as_str())))
                        .collect(),
                ),
            );
        }
        if let Some(schemas) = &document.schemas {
            top.insert("$schemas".to_string(), schemas.clone());
        }
        match saved {
            Value::Mapping(fields) => {
                for (key, value) in fields {
                    top.insert(key, value);
                }
            }
            other => {
                top.insert("$graph".to_string(), other);
            }
        }
        Value::Mapping(top)
    }
}

/// A successfully loaded document and every node reached from it.
#[derive(Debug, Clone)]
pub struct Document {
    root_id: NodeId,
    root: Loaded,
    graph: DocumentGraph,
    base: String,
    namespaces: IndexMap<String, String>,
    schemas: Option<Value>,
}

impl Document {
    pub fn root(&self) -> &Loaded {
        &self.root
    }

    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    pub fn graph(&self) -> &DocumentGraph {
        &self.graph
    }

    /// Base the root was decoded under.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Prefixes declared by the document's `$namespaces`.
    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    /// Follow a link to the node it points at.
    pub fn resolve<'a>(&'a self, loaded: &'a Loaded) -> Option<&'a Loaded> {
        self.graph.resolve(loaded)
    }

    pub fn root_as<T: FromLoaded>(&self) -> Result<T, ConvertError> {
        T::from_loaded(&self.root)
    }
}
