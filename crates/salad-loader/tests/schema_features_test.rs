use std::sync::Arc;

use pretty_assertions::assert_eq;
use salad_loader::loader::{
    ArrayLoader, FieldDef, RecordSchema, SecondaryDslLoader, TypeDslLoader, UriLoader,
};
use salad_loader::{
    LoadError, LoadErrorKind, LoadOptions, Loaded, Registry, RegistryBuilder, RootLoader,
    SaveOptions, StaticFetcher, UnknownFieldPolicy, Value, Vocabulary,
};
use serde_json::json;

const CWL: &str = "https://w3id.org/cwl/cwl#";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// An abstract `Process` with two concrete subclasses and a union of both.
fn process_registry() -> Registry {
    let vocabulary = Vocabulary::new()
        .with_namespace("cwl", CWL)
        .with_term("Tool", format!("{CWL}Tool"))
        .with_term("Workflow", format!("{CWL}Workflow"))
        .with_term("label", format!("{CWL}label"));
    let mut builder = RegistryBuilder::new(vocabulary);

    let label = builder.type_ref("string");
    builder.record(
        RecordSchema::new("Process")
            .abstract_type()
            .discriminator("class")
            .id_field("id")
            .field(FieldDef::optional("id", Arc::new(UriLoader::scoped_id())))
            .field(FieldDef::optional("label", label)),
    );

    let command = builder.type_expr("string[]?").unwrap();
    builder.record(
        RecordSchema::new("Tool")
            .extends("Process")
            .field(FieldDef::optional("command", command)),
    );

    let steps = builder.type_expr("AnyProcess[]").unwrap();
    builder.record(
        RecordSchema::new("Workflow")
            .extends("Process")
            .field(FieldDef::optional("steps", steps)),
    );

    let tool = builder.type_ref("Tool");
    let workflow = builder.type_ref("Workflow");
    builder.union("AnyProcess", vec![tool, workflow]);
    builder.root_type("AnyProcess");
    builder.build().unwrap()
}

fn load(registry: &Registry, value: serde_json::Value) -> Result<Loaded, LoadError> {
    let fetcher = StaticFetcher::new();
    RootLoader::new(registry, &fetcher)
        .unwrap()
        .load_value(&Value::from(value), "file:///doc.cwl")
        .map(|document| document.root().clone())
}

#[test]
fn test_union_dispatches_on_class() {
    init_tracing();
    let registry = process_registry();

    let loaded = load(&registry, json!({"class": "Workflow", "id": "main", "steps": []})).unwrap();
    let record = loaded.as_record().unwrap();
    assert_eq!(record.class(), "Workflow");
    assert_eq!(record.id(), Some("file:///doc.cwl#main"));

    let loaded = load(&registry, json!({"class": "cwl:Tool", "command": ["echo"]})).unwrap();
    assert_eq!(loaded.as_record().unwrap().class(), "Tool");
}

#[test]
fn test_union_is_deterministic_without_class() {
    let registry = process_registry();
    for _ in 0..5 {
        let loaded = load(&registry, json!({"label": "ambiguous"})).unwrap();
        assert_eq!(loaded.as_record().unwrap().class(), "Tool");
    }
}

#[test]
fn test_union_reports_every_alternative() {
    let registry = process_registry();
    let error = load(&registry, json!({"class": "Pipeline"})).unwrap_err();

    assert_eq!(
        error.kind,
        LoadErrorKind::NoMatchingAlternative {
            expected: "AnyProcess".to_string(),
            count: 2,
        }
    );
    let reasons: Vec<_> = error.leaves().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(
        reasons,
        vec![
            LoadErrorKind::ClassMismatch {
                expected: "Tool".to_string(),
                actual: "Pipeline".to_string(),
            },
            LoadErrorKind::ClassMismatch {
                expected: "Workflow".to_string(),
                actual: "Pipeline".to_string(),
            },
        ]
    );
}

#[test]
fn test_abstract_type_cannot_be_loaded() {
    let registry = process_registry();
    let fetcher = StaticFetcher::new();
    let error = RootLoader::for_type(&registry, &fetcher, "Process")
        .unwrap()
        .load_value(&Value::from(json!({"label": "x"})), "file:///doc.cwl")
        .unwrap_err();
    assert_eq!(error.kind, LoadErrorKind::AbstractType("Process".to_string()));
}

#[test]
fn test_nested_steps_use_parent_scope() {
    let registry = process_registry();
    let loaded = load(
        &registry,
        json!({
            "class": "Workflow",
            "id": "main",
            "steps": [
                {"class": "Tool", "id": "echo", "command": ["echo", "hi"]},
                {"class": "Workflow", "id": "sub", "steps": []},
            ],
        }),
    )
    .unwrap();

    let steps = loaded.as_record().unwrap().get("steps").unwrap().as_list().unwrap();
    let ids: Vec<_> = steps
        .iter()
        .map(|step| step.as_record().unwrap().id().unwrap().to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["file:///doc.cwl#main/echo", "file:///doc.cwl#main/sub"]
    );
}

#[test]
fn test_prefixed_field_names_and_extensions() {
    let registry = process_registry();
    let loaded = load(
        &registry,
        json!({
            "$namespaces": {"ex": "http://example.com/"},
            "class": "Tool",
            "cwl:label": "prefixed",
            "ex:note": "kept",
        }),
    )
    .unwrap();

    let record = loaded.as_record().unwrap();
    assert_eq!(record.field::<String>("label").unwrap(), "prefixed");
    assert_eq!(
        record.extension("http://example.com/note"),
        Some(&Value::from("kept"))
    );
}

#[test]
fn test_records_without_ids_are_named() {
    let registry = process_registry();
    let loaded = load(
        &registry,
        json!({
            "class": "Workflow",
            "steps": [{"class": "Tool", "id": null}, {"class": "Tool"}],
        }),
    )
    .unwrap();

    let workflow = loaded.as_record().unwrap();
    assert_eq!(workflow.id(), Some("file:///doc.cwl"));
    let steps: Vec<_> = workflow
        .get("steps")
        .unwrap()
        .as_list()
        .unwrap()
        .iter()
        .map(|step| step.as_record().unwrap().id().unwrap().to_string())
        .collect();
    assert!(steps.iter().all(|id| id.starts_with("_:")));
    assert_ne!(steps[0], steps[1]);
}

#[test]
fn test_duplicate_field_spellings_rejected() {
    let registry = process_registry();
    let error = load(
        &registry,
        json!({"class": "Tool", "label": "plain", "cwl:label": "prefixed"}),
    )
    .unwrap_err();
    assert!(error.leaves().iter().any(|leaf| leaf.kind
        == LoadErrorKind::DuplicateField {
            field: "label".to_string(),
            first: "label".to_string(),
            second: "cwl:label".to_string(),
        }));
}

#[test]
fn test_base_directive() {
    let registry = process_registry();
    let loaded = load(
        &registry,
        json!({"$base": "http://example.com/tools/", "class": "Tool", "id": "echo"}),
    )
    .unwrap();
    assert_eq!(
        loaded.as_record().unwrap().id(),
        Some("http://example.com/tools/#echo")
    );
}

#[test]
fn test_graph_directive() {
    let registry = process_registry();
    let fetcher = StaticFetcher::new();
    let all = Arc::new(ArrayLoader::new(registry.root().unwrap().clone()));
    let root = RootLoader::with_loader(&registry, &fetcher, all);
    let document = root
        .load_value(
            &Value::from(json!({
                "$schemas": ["http://example.com/schema.rdf"],
                "$graph": [
                    {"class": "Tool", "id": "a"},
                    {"class": "Workflow", "id": "b"},
                ],
            })),
            "file:///packed.cwl",
        )
        .unwrap();

    let classes: Vec<_> = document
        .root()
        .as_list()
        .unwrap()
        .iter()
        .map(|item| item.as_record().unwrap().class().to_string())
        .collect();
    assert_eq!(classes, vec!["Tool", "Workflow"]);

    assert_eq!(
        root.save(&document, &SaveOptions::default()),
        Value::from(json!({
            "$schemas": ["http://example.com/schema.rdf"],
            "$graph": [
                {"class": "Tool", "id": "a"},
                {"class": "Workflow", "id": "b"},
            ],
        }))
    );
}

#[test]
fn test_unknown_field_policy_per_record() {
    let mut builder = RegistryBuilder::new(Vocabulary::new());
    let name = builder.type_ref("string");
    builder.record(
        RecordSchema::new("Loose")
            .unknown_fields(UnknownFieldPolicy::Collect)
            .field(FieldDef::required("name", name)),
    );
    builder.root_type("Loose");
    let registry = builder.build().unwrap();

    let record = load(&registry, json!({"name": "n", "extra": 1})).unwrap();
    assert_eq!(
        record.as_record().unwrap().extension("extra"),
        Some(&Value::Integer(1))
    );
}

#[test]
fn test_depth_limit() {
    let mut builder = RegistryBuilder::new(Vocabulary::new());
    let children = builder.type_expr("Tree[]?").unwrap();
    builder.record(RecordSchema::new("Tree").field(FieldDef::optional("children", children)));
    builder.root_type("Tree");
    let registry = builder.build().unwrap();

    let mut value = json!({});
    for _ in 0..20 {
        value = json!({"children": [value]});
    }
    let fetcher = StaticFetcher::new();
    let error = RootLoader::new(&registry, &fetcher)
        .unwrap()
        .with_options(LoadOptions {
            max_depth: 8,
            ..LoadOptions::default()
        })
        .load_value(&Value::from(value), "file:///tree.yml")
        .unwrap_err();
    assert!(
        error
            .leaves()
            .iter()
            .any(|leaf| leaf.kind == LoadErrorKind::DepthExceeded(8))
    );
}

#[test]
fn test_type_and_secondary_shorthand_fields() {
    let mut builder = RegistryBuilder::new(Vocabulary::new());
    builder.enumeration("TypeName", ["null", "string", "int", "File"]);
    builder.enumeration("ArrayType", ["array"]);

    let array_type = builder.type_ref("ArrayType");
    let items = Arc::new(TypeDslLoader::new(builder.type_ref("TypeExpr")));
    builder.record(
        RecordSchema::new("ArraySchema")
            .field(FieldDef::required("type", array_type))
            .field(FieldDef::required("items", items)),
    );
    let type_name = builder.type_ref("TypeName");
    let array_schema = builder.type_ref("ArraySchema");
    let list = Arc::new(ArrayLoader::new(builder.type_ref("TypeExpr")));
    builder.union("TypeExpr", vec![type_name, array_schema, list]);

    let pattern = builder.type_ref("string");
    let required = builder.type_ref("boolean");
    builder.record(
        RecordSchema::new("SecondaryFile")
            .field(FieldDef::required("pattern", pattern))
            .field(FieldDef::optional("required", required).with_default(true)),
    );
    let secondary = builder.type_expr("SecondaryFile[]").unwrap();
    let type_field = Arc::new(TypeDslLoader::new(builder.type_ref("TypeExpr")));
    builder.record(
        RecordSchema::new("Input")
            .field(FieldDef::required("type", type_field))
            .field(FieldDef::optional(
                "secondaryFiles",
                Arc::new(SecondaryDslLoader::new(secondary)),
            )),
    );
    builder.root_type("Input");
    let registry = builder.build().unwrap();

    let loaded = load(
        &registry,
        json!({"type": "File[]?", "secondaryFiles": [".bai?", ".fai"]}),
    )
    .unwrap();
    let input = loaded.as_record().unwrap();

    let types = input.get("type").unwrap().as_list().unwrap();
    assert_eq!(types[0], Loaded::Symbol("null".to_string()));
    let array = types[1].as_record().unwrap();
    assert_eq!(array.class(), "ArraySchema");
    assert_eq!(array.get("items"), Some(&Loaded::Symbol("File".to_string())));

    let secondary = input.get("secondaryFiles").unwrap().as_list().unwrap();
    let required: Vec<_> = secondary
        .iter()
        .map(|file| file.as_record().unwrap().field::<bool>("required").unwrap())
        .collect();
    assert_eq!(required, vec![false, true]);

    let error = load(&registry, json!({"type": "File[[]"})).unwrap_err();
    assert!(matches!(
        &error.leaves()[0].kind,
        LoadErrorKind::MalformedShorthand { offending, .. } if offending == "[[]"
    ));
}
