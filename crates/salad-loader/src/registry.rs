//! Loader registry: one loader per schema type.
//!
//! Types may reference each other before they are defined (and recursively).
//! [`RegistryBuilder::type_ref`] hands out a deferred loader that is bound to
//! the named definition when [`RegistryBuilder::build`] runs.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use salad_value::Value;
use tracing::debug;

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind, SchemaError};
use crate::loader::{
    AnyLoader, ArrayLoader, EnumLoader, Loaded, Loader, LoaderRef, PrimitiveLoader, RecordLoader,
    RecordSchema, TypeExpr, UnionLoader,
};
use crate::save::SaveContext;
use crate::vocab::Vocabulary;

/// Loader standing in for a named type until the registry is built.
///
/// Holds a weak handle so recursive types do not leak.
struct TypeRef {
    name: String,
    target: OnceLock<Weak<dyn Loader>>,
}

impl TypeRef {
    fn target(&self) -> Option<LoaderRef> {
        self.target.get().and_then(Weak::upgrade)
    }
}

impl Loader for TypeRef {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        match self.target() {
            Some(target) => target.check_shape(value, ctx),
            None => Err(LoadErrorKind::UnboundType(self.name.clone())),
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        match self.target() {
            Some(target) => target.load(value, ctx),
            None => Err(ctx.error(LoadErrorKind::UnboundType(self.name.clone()))),
        }
    }

    fn id_field(&self) -> Option<String> {
        self.target().and_then(|target| target.id_field())
    }

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        match self.target() {
            Some(target) => target.save(loaded, ctx),
            None => ctx.save(loaded),
        }
    }
}

enum Definition {
    Record(RecordSchema),
    Loader(LoaderRef),
}

const BUILTINS: [&str; 9] = [
    "null", "boolean", "int", "long", "float", "double", "string", "Any", "integer",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

fn builtin(name: &str) -> Option<LoaderRef> {
    let loader: LoaderRef = match name {
        "null" => Arc::new(PrimitiveLoader::null()),
        "boolean" => Arc::new(PrimitiveLoader::boolean()),
        "int" | "long" | "integer" => Arc::new(PrimitiveLoader::integer()),
        "float" | "double" => Arc::new(PrimitiveLoader::float()),
        "string" => Arc::new(PrimitiveLoader::string()),
        "Any" => Arc::new(AnyLoader),
        _ => return None,
    };
    Some(loader)
}

pub struct RegistryBuilder {
    vocabulary: Vocabulary,
    definitions: IndexMap<String, Definition>,
    refs: Vec<Arc<TypeRef>>,
    duplicates: Vec<String>,
    root: Option<String>,
}

impl RegistryBuilder {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            definitions: IndexMap::new(),
            refs: Vec::new(),
            duplicates: Vec::new(),
            root: None,
        }
    }

    fn define_as(&mut self, name: String, definition: Definition) {
        if self.definitions.contains_key(&name) || BUILTINS.contains(&name.as_str()) {
            self.duplicates.push(name);
            return;
        }
        self.definitions.insert(name, definition);
    }

    /// A loader for `name`, usable before `name` is defined.
    pub fn type_ref(&mut self, name: impl Into<String>) -> LoaderRef {
        let type_ref = Arc::new(TypeRef {
            name: name.into(),
            target: OnceLock::new(),
        });
        self.refs.push(Arc::clone(&type_ref));
        type_ref
    }

    /// A loader for a compact type expression such as `File[]?`.
    pub fn type_expr(&mut self, text: &str) -> Result<LoaderRef, SchemaError> {
        let expr: TypeExpr = text
            .parse()
            .map_err(|_| SchemaError::MalformedTypeExpression(text.to_string()))?;
        Ok(self.expr_loader(&expr))
    }

    fn expr_loader(&mut self, expr: &TypeExpr) -> LoaderRef {
        match expr {
            TypeExpr::Named(name) => self.type_ref(name.as_str()),
            TypeExpr::Array(items) => Arc::new(ArrayLoader::new(self.expr_loader(items))),
            TypeExpr::Optional(inner) => Arc::new(UnionLoader::new(vec![
                Arc::new(PrimitiveLoader::null()),
                self.expr_loader(inner),
            ])),
        }
    }

    pub fn record(&mut self, schema: RecordSchema) -> &mut Self {
        self.define_as(schema.name.clone(), Definition::Record(schema));
        self
    }

    pub fn enumeration<S: Into<String>>(
        &mut self,
        name: impl Into<String>,
        symbols: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let name = name.into();
        let loader = Arc::new(EnumLoader::new(name.clone(), symbols));
        self.define_as(name, Definition::Loader(loader));
        self
    }

    pub fn union(&mut self, name: impl Into<String>, alternatives: Vec<LoaderRef>) -> &mut Self {
        let name = name.into();
        let loader = Arc::new(UnionLoader::named(name.clone(), alternatives));
        self.define_as(name, Definition::Loader(loader));
        self
    }

    /// Register an arbitrary loader under `name`.
    pub fn define(&mut self, name: impl Into<String>, loader: LoaderRef) -> &mut Self {
        self.define_as(name.into(), Definition::Loader(loader));
        self
    }

    pub fn root_type(&mut self, name: impl Into<String>) -> &mut Self {
        self.root = Some(name.into());
        self
    }

    pub fn build(self) -> Result<Registry, SchemaError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(SchemaError::DuplicateType(name));
        }

        let mut records = IndexMap::new();
        for (name, definition) in &self.definitions {
            if let Definition::Record(_) = definition {
                let flattened = flatten(name, &self.definitions, &mut Vec::new())?;
                if let Some(id_field) = &flattened.id_field
                    && flattened.get_field(id_field).is_none()
                {
                    return Err(SchemaError::UnknownIdField {
                        record: name.clone(),
                        field: id_field.clone(),
                    });
                }
                records.insert(name.clone(), flattened);
            }
        }

        let mut loaders: IndexMap<String, LoaderRef> = IndexMap::new();
        for name in BUILTINS {
            if let Some(loader) = builtin(name) {
                loaders.insert(name.to_string(), loader);
            }
        }
        for (name, definition) in self.definitions {
            let loader: LoaderRef = match definition {
                Definition::Record(_) => match records.get(&name) {
                    Some(schema) => Arc::new(RecordLoader::new(schema.clone())),
                    None => continue,
                },
                Definition::Loader(loader) => loader,
            };
            loaders.insert(name, loader);
        }

        for type_ref in &self.refs {
            let target = loaders
                .get(&type_ref.name)
                .ok_or_else(|| SchemaError::UndefinedType(type_ref.name.clone()))?;
            // Each handle is bound exactly once, here.
            let _ = type_ref.target.set(Arc::downgrade(target));
        }

        if let Some(root) = &self.root
            && !loaders.contains_key(root)
        {
            return Err(SchemaError::UndefinedType(root.clone()));
        }

        debug!(
            types = loaders.len(),
            references = self.refs.len(),
            "registry built"
        );
        Ok(Registry {
            vocabulary: Arc::new(self.vocabulary),
            loaders,
            records,
            root: self.root,
        })
    }
}

/// Resolve inheritance: base fields first, overrides replace in place.
fn flatten(
    name: &str,
    definitions: &IndexMap<String, Definition>,
    stack: &mut Vec<String>,
) -> Result<RecordSchema, SchemaError> {
    if stack.iter().any(|seen| seen == name) {
        return Err(SchemaError::InheritanceCycle(name.to_string()));
    }
    let Some(Definition::Record(schema)) = definitions.get(name) else {
        return Err(SchemaError::UndefinedType(name.to_string()));
    };
    stack.push(name.to_string());

    let mut flattened = RecordSchema {
        fields: Vec::new(),
        ..schema.clone()
    };
    let mut inherited_id = None;
    let mut inherited_discriminator = None;
    let mut inherited_policy = None;
    let mut seen_bases = HashSet::new();
    for base in &schema.extends {
        if !seen_bases.insert(base.as_str()) {
            continue;
        }
        match definitions.get(base.as_str()) {
            Some(Definition::Record(_)) => {}
            Some(Definition::Loader(_)) => {
                return Err(SchemaError::ExtendsNonRecord {
                    record: name.to_string(),
                    base: base.clone(),
                });
            }
            None if BUILTINS.contains(&base.as_str()) => {
                return Err(SchemaError::ExtendsNonRecord {
                    record: name.to_string(),
                    base: base.clone(),
                });
            }
            None => return Err(SchemaError::UndefinedType(base.clone())),
        }
        let parent = flatten(base, definitions, stack)?;
        for field in parent.fields {
            flattened.override_field(field);
        }
        inherited_id = inherited_id.or(parent.id_field);
        inherited_discriminator = inherited_discriminator.or(parent.discriminator);
        inherited_policy = inherited_policy.or(parent.unknown_fields);
    }
    for field in &schema.fields {
        flattened.override_field(field.clone());
    }
    flattened.id_field = schema.id_field.clone().or(inherited_id);
    flattened.discriminator = schema.discriminator.clone().or(inherited_discriminator);
    flattened.unknown_fields = schema.unknown_fields.or(inherited_policy);

    stack.pop();
    Ok(flattened)
}

/// Read-only loader graph shared by every load.
pub struct Registry {
    vocabulary: Arc<Vocabulary>,
    loaders: IndexMap<String, LoaderRef>,
    records: IndexMap<String, RecordSchema>,
    root: Option<String>,
}

impl Registry {
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn get(&self, name: &str) -> Option<&LoaderRef> {
        self.loaders.get(name)
    }

    /// Flattened schema of a record type.
    pub fn record(&self, name: &str) -> Option<&RecordSchema> {
        self.records.get(name)
    }

    pub fn root_type(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn root(&self) -> Option<&LoaderRef> {
        self.root.as_deref().and_then(|name| self.get(name))
    }

    /// Compose a loader for a type expression out of registered types.
    pub fn type_expr_loader(&self, expr: &TypeExpr) -> Result<LoaderRef, SchemaError> {
        match expr {
            TypeExpr::Named(name) => self
                .get(name)
                .cloned()
                .ok_or_else(|| SchemaError::UndefinedType(name.clone())),
            TypeExpr::Array(items) => Ok(Arc::new(ArrayLoader::new(self.type_expr_loader(items)?))),
            TypeExpr::Optional(inner) => Ok(Arc::new(UnionLoader::new(vec![
                Arc::new(PrimitiveLoader::null()),
                self.type_expr_loader(inner)?,
            ]))),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.loaders.keys().collect::<Vec<_>>())
            .field("root", &self.root)
            .finish()
    }
}
