use std::sync::Arc;

use indexmap::IndexMap;
use salad_value::{Map, Value};
use uuid::Uuid;

use crate::context::LoadContext;
use crate::error::{LoadError, LoadErrorKind};
use crate::loader::{Loaded, Loader, LoaderRef, Record};
use crate::options::UnknownFieldPolicy;
use crate::save::SaveContext;

/// A declared record field.
#[derive(Clone)]
pub struct FieldDef {
    pub name: String,
    pub loader: LoaderRef,
    pub optional: bool,
    /// Decoded in place of a missing optional field.
    pub default: Option<Value>,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, loader: LoaderRef) -> Self {
        Self {
            name: name.into(),
            loader,
            optional: false,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, loader: LoaderRef) -> Self {
        Self {
            optional: true,
            ..Self::required(name, loader)
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.optional = true;
        self.default = Some(default.into());
        self
    }

    fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

impl std::fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("loader", &self.loader.name())
            .field("optional", &self.optional)
            .field("default", &self.default)
            .finish()
    }
}

/// Declaration of a record type.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    pub name: String,
    pub extends: Vec<String>,
    pub is_abstract: bool,
    pub fields: Vec<FieldDef>,
    /// Field whose value becomes the record identity and nested base.
    pub id_field: Option<String>,
    /// Key naming the record class, e.g. `class`.
    pub discriminator: Option<String>,
    /// Overrides [`LoadOptions::unknown_fields`](crate::LoadOptions).
    pub unknown_fields: Option<UnknownFieldPolicy>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            is_abstract: false,
            fields: Vec::new(),
            id_field: None,
            discriminator: None,
            unknown_fields: None,
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.extends.push(base.into());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = Some(name.into());
        self
    }

    pub fn discriminator(mut self, key: impl Into<String>) -> Self {
        self.discriminator = Some(key.into());
        self
    }

    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = Some(policy);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Add or replace a field, keeping the position of a replaced one.
    pub(crate) fn override_field(&mut self, field: FieldDef) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }
}

/// Decodes mappings into [`Record`]s.
///
/// The schema is already flattened: inherited fields are part of `fields`.
#[derive(Debug)]
pub struct RecordLoader {
    schema: RecordSchema,
}

struct Entry<'v> {
    key: &'v str,
    value: &'v Value,
}

impl RecordLoader {
    pub fn new(schema: RecordSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Mapping entries keyed by canonical field name. Directive keys are
    /// skipped. A key naming a field already given under another spelling
    /// is reported and does not replace the first one.
    fn entries<'v>(
        &self,
        map: &'v Map<String, Value>,
        ctx: &LoadContext<'_>,
    ) -> (IndexMap<String, Entry<'v>>, Vec<LoadError>) {
        let mut entries: IndexMap<String, Entry<'v>> = IndexMap::new();
        let mut duplicates = Vec::new();
        for (key, value) in map.iter().filter(|(key, _)| !key.starts_with('$')) {
            let name = ctx.resolve_field_name(key);
            if let Some(first) = entries.get(&name) {
                duplicates.push(ctx.field(key).error(LoadErrorKind::DuplicateField {
                    field: name,
                    first: first.key.to_string(),
                    second: key.clone(),
                }));
                continue;
            }
            entries.insert(
                name,
                Entry {
                    key: key.as_str(),
                    value,
                },
            );
        }
        (entries, duplicates)
    }

    fn check_class(
        &self,
        entries: &IndexMap<String, Entry<'_>>,
        ctx: &LoadContext<'_>,
    ) -> Result<(), LoadErrorKind> {
        let Some(discriminator) = &self.schema.discriminator else {
            return Ok(());
        };
        match entries.get(discriminator).map(|entry| entry.value) {
            Some(Value::String(class)) => {
                let class = ctx.resolve_symbol(class);
                if class == self.schema.name {
                    Ok(())
                } else {
                    Err(LoadErrorKind::ClassMismatch {
                        expected: self.schema.name.clone(),
                        actual: class,
                    })
                }
            }
            Some(other) => Err(LoadErrorKind::TypeMismatch {
                expected: "class name".to_string(),
                actual: other.kind(),
            }),
            None => Ok(()),
        }
    }

    fn unknown_field_policy(&self, ctx: &LoadContext<'_>) -> UnknownFieldPolicy {
        self.schema
            .unknown_fields
            .unwrap_or(ctx.options().unknown_fields)
    }

    fn is_known(&self, name: &str) -> bool {
        self.schema.get_field(name).is_some()
            || self.schema.discriminator.as_deref() == Some(name)
    }
}

/// Identity for a record without one: the document itself at the top of a
/// document, otherwise a blank node id when the field is optional.
fn generated_id(field: &FieldDef, ctx: &LoadContext<'_>) -> Option<String> {
    match ctx.doc_root() {
        Some(root) => Some(root.to_string()),
        None if field.optional => Some(format!("_:{}", Uuid::new_v4())),
        None => None,
    }
}

impl Loader for RecordLoader {
    fn name(&self) -> String {
        self.schema.name.clone()
    }

    fn id_field(&self) -> Option<String> {
        self.schema.id_field.clone()
    }

    fn save(&self, loaded: &Loaded, ctx: &SaveContext<'_>) -> Value {
        let Loaded::Record(record) = loaded else {
            return ctx.save(loaded);
        };
        let mut map = Map::default();
        if let Some(discriminator) = &self.schema.discriminator {
            let class = ctx
                .vocabulary()
                .shortname(&record.class)
                .unwrap_or(&record.class);
            map.insert(discriminator.clone(), Value::from(class));
        }
        // Fields below the id are written relative to it, as they were read.
        let inner = match record.id() {
            Some(id) if !id.starts_with("_:") => ctx.with_base(id),
            _ => ctx.clone(),
        };
        for field in &self.schema.fields {
            let Some(value) = record.get(&field.name).filter(|value| !value.is_null()) else {
                continue;
            };
            let saved = if self.schema.id_field.as_deref() == Some(field.name.as_str()) {
                field.loader.save(value, ctx)
            } else {
                field.loader.save(value, &inner)
            };
            map.insert(field.name.clone(), saved);
        }
        ctx.save_extensions(record, &mut map);
        Value::Mapping(map)
    }

    fn check_shape(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<(), LoadErrorKind> {
        if self.schema.is_abstract {
            return Err(LoadErrorKind::AbstractType(self.schema.name.clone()));
        }
        let Value::Mapping(map) = value else {
            return Err(LoadErrorKind::TypeMismatch {
                expected: self.schema.name.clone(),
                actual: value.kind(),
            });
        };
        let (entries, duplicates) = self.entries(map, ctx);
        if let Some(duplicate) = duplicates.into_iter().next() {
            return Err(duplicate.kind);
        }
        self.check_class(&entries, ctx)?;
        match self
            .schema
            .fields
            .iter()
            .find(|field| field.is_required() && !entries.contains_key(&field.name))
        {
            Some(missing) => Err(LoadErrorKind::MissingField(missing.name.clone())),
            None => Ok(()),
        }
    }

    fn load(&self, value: &Value, ctx: &LoadContext<'_>) -> Result<Loaded, LoadError> {
        ctx.check_depth()?;
        if self.schema.is_abstract {
            return Err(ctx.error(LoadErrorKind::AbstractType(self.schema.name.clone())));
        }
        let Value::Mapping(map) = value else {
            return Err(ctx.error(LoadErrorKind::TypeMismatch {
                expected: self.schema.name.clone(),
                actual: value.kind(),
            }));
        };
        let (entries, mut errors) = self.entries(map, ctx);
        self.check_class(&entries, ctx)
            .map_err(|kind| ctx.error(kind))?;

        // The id is decoded first, against the incoming base. A generated
        // id names the record but does not change the base.
        let mut id = None;
        let mut loaded_id = None;
        let mut scoped = false;
        if let Some(id_field) = &self.schema.id_field
            && let Some(field) = self.schema.get_field(id_field)
        {
            let raw = entries
                .get(id_field)
                .map(|entry| entry.value)
                .filter(|value| !(field.optional && value.is_null()));
            match raw {
                Some(value) => match field.loader.load(value, &ctx.field(id_field)) {
                    Ok(loaded) => {
                        id = loaded.as_str().map(str::to_string);
                        scoped = id.is_some();
                        loaded_id = Some(loaded);
                    }
                    Err(error) => errors.push(error),
                },
                None => match generated_id(field, ctx) {
                    Some(generated) => {
                        id = Some(generated.clone());
                        loaded_id = Some(Loaded::Uri(generated));
                    }
                    None => errors.push(ctx.field(id_field).error(LoadErrorKind::MissingField(
                        id_field.clone(),
                    ))),
                },
            }
        }
        let inner = match &id {
            Some(id) if scoped => ctx.with_base(id.as_str()),
            _ => ctx.clone(),
        };

        let mut fields = Map::default();
        for field in &self.schema.fields {
            if self.schema.id_field.as_deref() == Some(field.name.as_str()) {
                fields.insert(field.name.clone(), loaded_id.take().unwrap_or(Loaded::Null));
                continue;
            }
            let field_ctx = inner.field(&field.name);
            let raw = entries
                .get(&field.name)
                .map(|entry| entry.value)
                .filter(|value| !(field.optional && value.is_null()));
            let result = match (raw, &field.default) {
                (Some(value), _) => field.loader.load(value, &field_ctx),
                (None, Some(default)) => field.loader.load(default, &field_ctx),
                (None, None) if field.optional => Ok(Loaded::Null),
                (None, None) => {
                    Err(field_ctx.error(LoadErrorKind::MissingField(field.name.clone())))
                }
            };
            match result {
                Ok(loaded) => {
                    fields.insert(field.name.clone(), loaded);
                }
                Err(error) => errors.push(error),
            }
        }

        let mut extensions = Map::default();
        let policy = self.unknown_field_policy(ctx);
        for (name, entry) in &entries {
            if self.is_known(name) {
                continue;
            }
            if name.contains(':') {
                extensions.insert(name.clone(), entry.value.clone());
                continue;
            }
            match policy {
                UnknownFieldPolicy::Reject => {
                    errors.push(ctx.field(entry.key).error(LoadErrorKind::UnknownField {
                        field: entry.key.to_string(),
                        expected: self.schema.fields.iter().map(|f| f.name.clone()).collect(),
                    }));
                }
                UnknownFieldPolicy::Ignore => {}
                UnknownFieldPolicy::Collect => {
                    extensions.insert(name.clone(), entry.value.clone());
                }
            }
        }

        if !errors.is_empty() {
            return Err(ctx.error_with(
                LoadErrorKind::InvalidRecord {
                    class: self.schema.name.clone(),
                    count: errors.len(),
                },
                errors,
            ));
        }

        Ok(Loaded::Record(Arc::new(Record {
            class: self.schema.name.clone(),
            id,
            fields,
            extensions,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{ArrayLoader, PrimitiveLoader, UriLoader};
    use crate::options::LoadOptions;
    use crate::testing::{empty_registry, with_context};

    fn widget() -> RecordLoader {
        RecordLoader::new(
            RecordSchema::new("Widget")
                .field(FieldDef::required("id", Arc::new(PrimitiveLoader::string())))
                .field(FieldDef::required("weight", Arc::new(PrimitiveLoader::float())))
                .field(FieldDef::required(
                    "tags",
                    Arc::new(ArrayLoader::new(Arc::new(PrimitiveLoader::string()))),
                )),
        )
    }

    fn mapping(json: &str) -> Value {
        Value::from_json_str(json).unwrap()
    }

    #[test]
    fn test_missing_and_unknown_fields() {
        let registry = empty_registry();
        with_context(&registry, LoadOptions::default(), |ctx| {
            let error = widget()
                .load(&mapping(r#"{"weight": 1, "tags": [], "color": "red"}"#), ctx)
                .unwrap_err();
            assert_eq!(
                error.kind,
                LoadErrorKind::InvalidRecord {
                    class: "Widget".to_string(),
                    count: 2,
                }
            );
            let leaves: Vec<_> = error.leaves().iter().map(|e| e.path.to_string()).collect();
            assert_eq!(leaves, vec!["id", "color"]);
        });
    }

    #[test]
    fn test_unknown_field_policies() {
        let registry = empty_registry();
        let input = mapping(r#"{"id": "w", "weight": 1, "tags": [], "color": "red"}"#);

        let ignore = LoadOptions {
            unknown_fields: UnknownFieldPolicy::Ignore,
            ..LoadOptions::default()
        };
        with_context(&registry, ignore, |ctx| {
            let loaded = widget().load(&input, ctx).unwrap();
            assert!(loaded.as_record().unwrap().extensions.is_empty());
        });

        let collect = LoadOptions {
            unknown_fields: UnknownFieldPolicy::Collect,
            ..LoadOptions::default()
        };
        with_context(&registry, collect, |ctx| {
            let loaded = widget().load(&input, ctx).unwrap();
            assert_eq!(
                loaded.as_record().unwrap().extension("color"),
                Some(&Value::from("red"))
            );
        });
    }

    #[test]
    fn test_namespaced_keys_are_extensions() {
        let registry = empty_registry();
        with_context(&registry, LoadOptions::default(), |ctx| {
            let loaded = widget()
                .load(
                    &mapping(r#"{"id": "w", "weight": 1, "tags": [], "ex:note": "hi"}"#),
                    ctx,
                )
                .unwrap();
            let record = loaded.as_record().unwrap();
            assert_eq!(record.extension("ex:note"), Some(&Value::from("hi")));
        });
    }

    #[test]
    fn test_optional_fields_and_defaults() {
        let registry = empty_registry();
        let loader = RecordLoader::new(
            RecordSchema::new("Step")
                .field(FieldDef::optional("label", Arc::new(PrimitiveLoader::string())))
                .field(
                    FieldDef::optional("retries", Arc::new(PrimitiveLoader::integer()))
                        .with_default(3i64),
                ),
        );
        with_context(&registry, LoadOptions::default(), |ctx| {
            let loaded = loader.load(&mapping(r#"{"label": null}"#), ctx).unwrap();
            let record = loaded.as_record().unwrap();
            assert_eq!(record.get("label"), Some(&Loaded::Null));
            assert_eq!(record.get("retries"), Some(&Loaded::Integer(3)));
        });
    }

    #[test]
    fn test_id_becomes_base() {
        let registry = empty_registry();
        let loader = RecordLoader::new(
            RecordSchema::new("Step")
                .id_field("id")
                .field(FieldDef::required("id", Arc::new(UriLoader::scoped_id())))
                .field(FieldDef::required("run", Arc::new(UriLoader::identifier()))),
        );
        with_context(&registry, LoadOptions::default(), |ctx| {
            let loaded = loader
                .load(&mapping(r##"{"run": "#tool", "id": "step1"}"##), ctx)
                .unwrap();
            let record = loaded.as_record().unwrap();
            assert_eq!(record.id(), Some("file:///test.yml#step1"));
            assert_eq!(
                record.get("run"),
                Some(&Loaded::Uri("file:///test.yml#tool".to_string()))
            );
            let names: Vec<_> = record.fields.keys().map(String::as_str).collect();
            assert_eq!(names, vec!["id", "run"]);
        });
    }

    #[test]
    fn test_discriminator_and_abstract() {
        let registry = empty_registry();
        let tool = RecordLoader::new(RecordSchema::new("Tool").discriminator("class"));
        with_context(&registry, LoadOptions::default(), |ctx| {
            assert!(tool.load(&mapping(r#"{"class": "Tool"}"#), ctx).is_ok());
            let error = tool
                .load(&mapping(r#"{"class": "Workflow"}"#), ctx)
                .unwrap_err();
            assert_eq!(
                error.kind,
                LoadErrorKind::ClassMismatch {
                    expected: "Tool".to_string(),
                    actual: "Workflow".to_string(),
                }
            );
        });

        let process = RecordLoader::new(RecordSchema::new("Process").abstract_type());
        with_context(&registry, LoadOptions::default(), |ctx| {
            let error = process.load(&mapping("{}"), ctx).unwrap_err();
            assert_eq!(error.kind, LoadErrorKind::AbstractType("Process".to_string()));
        });
    }

    fn labelled() -> RecordLoader {
        RecordLoader::new(
            RecordSchema::new("Step")
                .id_field("id")
                .field(FieldDef::optional("id", Arc::new(UriLoader::scoped_id())))
                .field(FieldDef::optional("label", Arc::new(PrimitiveLoader::string())))
                .field(FieldDef::optional("run", Arc::new(UriLoader::identifier()))),
        )
    }

    #[test]
    fn test_null_optional_id_is_absent() {
        let registry = empty_registry();
        with_context(&registry, LoadOptions::default(), |ctx| {
            let loaded = labelled()
                .load(&mapping(r#"{"id": null, "label": "x", "run": "tool.cwl"}"#), ctx)
                .unwrap();
            let record = loaded.as_record().unwrap();
            assert!(record.id().unwrap().starts_with("_:"));
            // A generated id does not move the base.
            assert_eq!(
                record.get("run"),
                Some(&Loaded::Uri("file:///tool.cwl".to_string()))
            );
        });
    }

    #[test]
    fn test_blank_ids_are_distinct() {
        let registry = empty_registry();
        with_context(&registry, LoadOptions::default(), |ctx| {
            let first = labelled().load(&mapping("{}"), ctx).unwrap();
            let second = labelled().load(&mapping("{}"), ctx).unwrap();
            let first = first.as_record().unwrap().id().unwrap().to_string();
            let second = second.as_record().unwrap().id().unwrap().to_string();
            assert!(first.starts_with("_:"));
            assert_ne!(first, second);
        });
    }

    #[test]
    fn test_document_root_names_idless_record() {
        let registry = empty_registry();
        let required = RecordLoader::new(
            RecordSchema::new("Step")
                .id_field("id")
                .field(FieldDef::required("id", Arc::new(UriLoader::scoped_id()))),
        );
        with_context(&registry, LoadOptions::default(), |ctx| {
            let top = ctx.with_doc_root("file:///test.yml");
            let loaded = required.load(&mapping("{}"), &top).unwrap();
            assert_eq!(loaded.as_record().unwrap().id(), Some("file:///test.yml"));

            let error = required.load(&mapping("{}"), ctx).unwrap_err();
            let leaves: Vec<_> = error.leaves().iter().map(|e| e.kind.clone()).collect();
            assert_eq!(leaves, vec![LoadErrorKind::MissingField("id".to_string())]);
        });
    }

    #[test]
    fn test_duplicate_canonical_keys() {
        let registry = crate::RegistryBuilder::new(
            crate::Vocabulary::new()
                .with_namespace("cwl", "https://w3id.org/cwl/cwl#")
                .with_term("label", "https://w3id.org/cwl/cwl#label"),
        )
        .build()
        .unwrap();
        with_context(&registry, LoadOptions::default(), |ctx| {
            let input = mapping(r#"{"label": "a", "cwl:label": "b"}"#);
            let error = labelled().load(&input, ctx).unwrap_err();
            let leaves: Vec<_> = error
                .leaves()
                .iter()
                .map(|e| (e.path.to_string(), e.kind.clone()))
                .collect();
            assert_eq!(
                leaves,
                vec![(
                    "cwl:label".to_string(),
                    LoadErrorKind::DuplicateField {
                        field: "label".to_string(),
                        first: "label".to_string(),
                        second: "cwl:label".to_string(),
                    }
                )]
            );
            assert!(labelled().check_shape(&input, ctx).is_err());
        });
    }

    #[test]
    fn test_save_relative_to_id() {
        let registry = empty_registry();
        with_context(&registry, LoadOptions::default(), |ctx| {
            let loaded = labelled()
                .load(&mapping(r##"{"id": "step1", "run": "#tool", "label": null}"##), ctx)
                .unwrap();
            let save_ctx = SaveContext::new(&registry, "file:///test.yml", IndexMap::new(), true);
            assert_eq!(
                labelled().save(&loaded, &save_ctx),
                mapping(r##"{"id": "step1", "run": "#tool"}"##)
            );
        });
    }

    #[test]
    fn test_directive_keys_skipped() {
        let registry = empty_registry();
        let loader = RecordLoader::new(RecordSchema::new("Empty"));
        with_context(&registry, LoadOptions::default(), |ctx| {
            assert!(
                loader
                    .load(&mapping(r#"{"$namespaces": {"ex": "http://ex/"}}"#), ctx)
                    .is_ok()
            );
        });
    }
}
