//! Loading session and per-call loading context.
//!
//! A [`LoadSession`] lives for one top-level load. It owns the memo table
//! (the [`DocumentGraph`]) and the cache of fetched documents. A
//! [`LoadContext`] is the value threaded down the recursive descent: it
//! carries the current base identifier, namespace prefixes and path, and is
//! cloned and extended at each step.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use salad_value::{Path, Value};
use tracing::debug;

use crate::error::{LoadError, LoadErrorKind};
use crate::fetch::{FetchError, Fetcher};
use crate::loader::{Link, Loaded, Loader};
use crate::options::LoadOptions;
use crate::registry::Registry;
use crate::resolve::{resolve_ref_scope, resolve_scoped_id, resolve_uri, split_fragment};
use crate::vocab::Vocabulary;

/// Index of a node in the [`DocumentGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
enum Slot {
    InProgress,
    Resolved(Loaded),
    Failed(LoadError),
}

/// Memo key: a node is decoded once per identifier and target type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NodeKey {
    uri: String,
    type_name: String,
}

/// Append-only memo table: (resolved identifier, type) -> decoded node.
///
/// Each key is written once. References to the same identifier under the
/// same type share its node, so cycles and repeated references are stitched
/// by index.
#[derive(Debug, Clone, Default)]
pub struct DocumentGraph {
    nodes: IndexMap<NodeKey, Slot>,
}

impl DocumentGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn lookup(&self, uri: &str, type_name: &str) -> Option<NodeId> {
        let key = NodeKey {
            uri: uri.to_string(),
            type_name: type_name.to_string(),
        };
        self.nodes.get_index_of(&key).map(NodeId)
    }

    pub fn uri(&self, id: NodeId) -> Option<&str> {
        self.nodes.get_index(id.0).map(|(key, _)| key.uri.as_str())
    }

    /// Name of the type the node was decoded as.
    pub fn type_name(&self, id: NodeId) -> Option<&str> {
        self.nodes
            .get_index(id.0)
            .map(|(key, _)| key.type_name.as_str())
    }

    /// Decoded value of a node, if decoding succeeded.
    pub fn get(&self, id: NodeId) -> Option<&Loaded> {
        match self.nodes.get_index(id.0) {
            Some((_, Slot::Resolved(loaded))) => Some(loaded),
            _ => None,
        }
    }

    /// Failure of a node, if decoding failed.
    pub fn error(&self, id: NodeId) -> Option<&LoadError> {
        match self.nodes.get_index(id.0) {
            Some((_, Slot::Failed(error))) => Some(error),
            _ => None,
        }
    }

    /// Follow links until a non-link value is reached.
    pub fn resolve<'a>(&'a self, loaded: &'a Loaded) -> Option<&'a Loaded> {
        let mut current = loaded;
        // A chain can never be longer than the graph itself.
        for _ in 0..=self.nodes.len() {
            match current {
                Loaded::Link(link) => current = self.get(link.node)?,
                other => return Some(other),
            }
        }
        None
    }

    /// Nodes in registration order with their identifier and decoded value.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &str, Option<&Loaded>)> {
        self.nodes.iter().enumerate().map(|(i, (key, slot))| {
            let loaded = match slot {
                Slot::Resolved(loaded) => Some(loaded),
                _ => None,
            };
            (NodeId(i), key.uri.as_str(), loaded)
        })
    }
}

/// State of an identifier in the memo table.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoState {
    /// Newly registered; the caller must decode it and call `finish`.
    Started(NodeId),
    /// Being decoded further up the stack (a cycle).
    InProgress(NodeId),
    Resolved(NodeId),
    Failed(LoadError),
}

/// State shared by every loader during one top-level load.
pub struct LoadSession<'a> {
    registry: &'a Registry,
    fetcher: &'a dyn Fetcher,
    options: &'a LoadOptions,
    graph: RefCell<DocumentGraph>,
    documents: RefCell<HashMap<String, Rc<Value>>>,
}

impl<'a> LoadSession<'a> {
    pub fn new(registry: &'a Registry, fetcher: &'a dyn Fetcher, options: &'a LoadOptions) -> Self {
        Self {
            registry,
            fetcher,
            options,
            graph: RefCell::new(DocumentGraph::default()),
            documents: RefCell::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn options(&self) -> &'a LoadOptions {
        self.options
    }

    /// Register `uri` decoded as `type_name` as in progress unless it is
    /// already known.
    pub fn begin(&self, uri: &str, type_name: &str) -> MemoState {
        let key = NodeKey {
            uri: uri.to_string(),
            type_name: type_name.to_string(),
        };
        let mut graph = self.graph.borrow_mut();
        if let Some((index, _, slot)) = graph.nodes.get_full(&key) {
            let id = NodeId(index);
            return match slot {
                Slot::InProgress => MemoState::InProgress(id),
                Slot::Resolved(_) => MemoState::Resolved(id),
                Slot::Failed(error) => MemoState::Failed(error.clone()),
            };
        }
        let (index, _) = graph.nodes.insert_full(key, Slot::InProgress);
        MemoState::Started(NodeId(index))
    }

    /// Record the outcome of a node registered with [`LoadSession::begin`].
    pub fn finish(&self, id: NodeId, result: &Result<Loaded, LoadError>) {
        let mut graph = self.graph.borrow_mut();
        if let Some((_, slot)) = graph.nodes.get_index_mut(id.0) {
            *slot = match result {
                Ok(loaded) => Slot::Resolved(loaded.clone()),
                Err(error) => Slot::Failed(error.clone()),
            };
        }
    }

    /// Seed the document cache, used for the root document.
    pub fn insert_document(&self, uri: &str, value: Rc<Value>) {
        self.documents.borrow_mut().insert(uri.to_string(), value);
    }

    /// Raw document, fetched at most once per session.
    pub fn document(&self, uri: &str) -> Result<Rc<Value>, FetchError> {
        if let Some(value) = self.documents.borrow().get(uri) {
            return Ok(Rc::clone(value));
        }
        debug!(uri, "fetching document");
        let value = Rc::new(self.fetcher.fetch(uri)?);
        self.documents
            .borrow_mut()
            .insert(uri.to_string(), Rc::clone(&value));
        Ok(value)
    }

    /// Decode the node identified by `uri` with `loader`, at most once per
    /// target type.
    ///
    /// Returns a link to the node. A reference to a node still being decoded
    /// links to it without recursing.
    pub fn dereference(
        &self,
        uri: &str,
        loader: &dyn Loader,
        ctx: &LoadContext<'_>,
    ) -> Result<Loaded, LoadError> {
        let type_name = loader.name();
        let id = match self.begin(uri, &type_name) {
            MemoState::Started(id) => id,
            MemoState::InProgress(id) => {
                debug!(uri, %type_name, "back-reference to node in progress");
                return Ok(link(uri, id));
            }
            MemoState::Resolved(id) => {
                debug!(uri, %type_name, "memo hit");
                return Ok(link(uri, id));
            }
            MemoState::Failed(error) => {
                return Err(LoadError::with_causes(
                    LoadErrorKind::Reference {
                        uri: uri.to_string(),
                        reason: "referenced node failed to load".to_string(),
                    },
                    ctx.path().clone(),
                    vec![error],
                ));
            }
        };
        let result = self.decode_node(uri, loader, ctx);
        self.finish(id, &result);
        result.map(|_| link(uri, id))
    }

    fn decode_node(
        &self,
        uri: &str,
        loader: &dyn Loader,
        ctx: &LoadContext<'_>,
    ) -> Result<Loaded, LoadError> {
        let reference_error = |reason: String| {
            ctx.error(LoadErrorKind::Reference {
                uri: uri.to_string(),
                reason,
            })
        };
        let (document_uri, fragment) = split_fragment(uri);
        let document = self
            .document(document_uri)
            .map_err(|e| reference_error(e.to_string()))?;
        match fragment {
            Some(_) => {
                let id_key = loader.id_field().unwrap_or_else(|| "id".to_string());
                let (node, base) =
                    find_node(&document, uri, document_uri, ctx.namespaces(), &id_key)
                        .ok_or_else(|| reference_error(format!("no node with id `{uri}`")))?;
                decode_linked(loader, node, &ctx.for_document(base), uri, ctx)
            }
            None => {
                let child = ctx.for_document(document_uri).with_doc_root(document_uri);
                decode_linked(loader, &document, &child, uri, ctx)
            }
        }
    }

    pub fn into_graph(self) -> DocumentGraph {
        self.graph.into_inner()
    }
}

fn link(uri: &str, node: NodeId) -> Loaded {
    Loaded::Link(Link {
        uri: uri.to_string(),
        node,
    })
}

fn decode_linked(
    loader: &dyn Loader,
    node: &Value,
    child: &LoadContext<'_>,
    uri: &str,
    ctx: &LoadContext<'_>,
) -> Result<Loaded, LoadError> {
    loader.load(node, child).map_err(|error| {
        LoadError::with_causes(
            LoadErrorKind::Reference {
                uri: uri.to_string(),
                reason: "referenced document is invalid".to_string(),
            },
            ctx.path().clone(),
            vec![error],
        )
    })
}

/// Find the mapping whose `id_key` resolves to `target`, returning it
/// together with the base it must be decoded under.
pub(crate) fn find_node<'v>(
    value: &'v Value,
    target: &str,
    base: &str,
    namespaces: &IndexMap<String, String>,
    id_key: &str,
) -> Option<(&'v Value, String)> {
    match value {
        Value::Mapping(map) => {
            let mut scope = base.to_string();
            if let Some(id) = map.get(id_key).and_then(Value::as_str)
                && let Ok(resolved) = resolve_scoped_id(id, base, namespaces)
            {
                if resolved == target {
                    return Some((value, base.to_string()));
                }
                scope = resolved;
            }
            map.values()
                .find_map(|child| find_node(child, target, &scope, namespaces, id_key))
        }
        Value::Sequence(items) => items
            .iter()
            .find_map(|child| find_node(child, target, base, namespaces, id_key)),
        _ => None,
    }
}

/// Per-call decoding state. Cheap to clone.
#[derive(Clone)]
pub struct LoadContext<'a> {
    session: &'a LoadSession<'a>,
    base: Rc<str>,
    namespaces: Rc<IndexMap<String, String>>,
    /// Identifier given to an id-less record at the top of a document.
    doc_root: Option<Rc<str>>,
    path: Path,
    depth: usize,
}

impl<'a> LoadContext<'a> {
    pub fn new(session: &'a LoadSession<'a>, base: impl Into<Rc<str>>) -> Self {
        Self {
            session,
            base: base.into(),
            namespaces: Rc::new(session.registry().vocabulary().namespaces().clone()),
            doc_root: None,
            path: Path::root(),
            depth: 0,
        }
    }

    pub fn session(&self) -> &'a LoadSession<'a> {
        self.session
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn namespaces(&self) -> &IndexMap<String, String> {
        &self.namespaces
    }

    pub fn doc_root(&self) -> Option<&str> {
        self.doc_root.as_deref()
    }

    pub fn options(&self) -> &'a LoadOptions {
        self.session.options()
    }

    pub fn registry(&self) -> &'a Registry {
        self.session.registry()
    }

    pub fn vocabulary(&self) -> &'a Vocabulary {
        self.session.registry().vocabulary()
    }

    pub fn with_base(&self, base: impl Into<Rc<str>>) -> Self {
        Self {
            base: base.into(),
            ..self.clone()
        }
    }

    /// Extend the namespace table, later prefixes winning.
    pub fn with_namespaces<'n>(
        &self,
        extra: impl IntoIterator<Item = (&'n str, &'n str)>,
    ) -> Self {
        let mut namespaces = (*self.namespaces).clone();
        for (prefix, iri) in extra {
            namespaces.insert(prefix.to_string(), iri.to_string());
        }
        Self {
            namespaces: Rc::new(namespaces),
            ..self.clone()
        }
    }

    /// Mark this context as the top of a document named `uri`.
    pub fn with_doc_root(&self, uri: impl Into<Rc<str>>) -> Self {
        Self {
            doc_root: Some(uri.into()),
            ..self.clone()
        }
    }

    fn descend(&self, path: Path) -> Self {
        Self {
            doc_root: None,
            path,
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    pub fn field(&self, name: &str) -> Self {
        self.descend(self.path.join_field(name))
    }

    pub fn index(&self, index: usize) -> Self {
        self.descend(self.path.join_index(index))
    }

    pub fn key(&self, key: &str) -> Self {
        self.descend(self.path.join_key(key))
    }

    /// Context for decoding another document: new base, paths restart.
    pub fn for_document(&self, base: impl Into<Rc<str>>) -> Self {
        Self {
            base: base.into(),
            doc_root: None,
            path: Path::root(),
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    pub fn error(&self, kind: LoadErrorKind) -> LoadError {
        LoadError::new(kind, self.path.clone())
    }

    pub fn error_with(&self, kind: LoadErrorKind, causes: Vec<LoadError>) -> LoadError {
        LoadError::with_causes(kind, self.path.clone(), causes)
    }

    pub fn check_depth(&self) -> Result<(), LoadError> {
        let max = self.options().max_depth;
        if self.depth > max {
            return Err(self.error(LoadErrorKind::DepthExceeded(max)));
        }
        Ok(())
    }

    pub fn resolve_uri(&self, value: &str) -> Result<String, LoadErrorKind> {
        resolve_uri(value, &self.base, &self.namespaces).map_err(|reason| {
            LoadErrorKind::InvalidIdentifier {
                value: value.to_string(),
                reason,
            }
        })
    }

    pub fn resolve_scoped_id(&self, value: &str) -> Result<String, LoadErrorKind> {
        resolve_scoped_id(value, &self.base, &self.namespaces).map_err(|reason| {
            LoadErrorKind::InvalidIdentifier {
                value: value.to_string(),
                reason,
            }
        })
    }

    /// Resolve a reference under an ancestor of the current scope, `levels`
    /// fragment segments up.
    pub fn resolve_ref_scope(&self, value: &str, levels: usize) -> Result<String, LoadErrorKind> {
        resolve_ref_scope(value, &self.base, &self.namespaces, levels).map_err(|reason| {
            LoadErrorKind::InvalidIdentifier {
                value: value.to_string(),
                reason,
            }
        })
    }

    pub fn resolve_field_name(&self, key: &str) -> String {
        self.vocabulary().resolve_field_name(key, &self.namespaces)
    }

    pub fn resolve_symbol(&self, value: &str) -> String {
        self.vocabulary().resolve_symbol(value, &self.namespaces)
    }

    /// Decode the node `uri` through the session memo table.
    pub fn dereference(&self, uri: &str, loader: &dyn Loader) -> Result<Loaded, LoadError> {
        self.session.dereference(uri, loader, self)
    }
}
