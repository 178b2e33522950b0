//! OpenAPI discriminators steering `anyOf`.

use serde_json::{json, Value};
use verdict::{CompileError, ExecutionConfig, RegistryConfig, Schema, SchemaRegistry, OPENAPI_31_DIALECT};

fn pets() -> Value {
    json!({
        "$schema": OPENAPI_31_DIALECT,
        "$defs": {
            "Cat": {
                "properties": {"petType": {"type": "string"}, "meow": {"type": "boolean"}},
                "required": ["petType", "meow"]
            },
            "Dog": {
                "properties": {"petType": {"type": "string"}, "bark": {"type": "string"}},
                "required": ["petType", "bark"]
            }
        },
        "anyOf": [{"$ref": "#/$defs/Cat"}, {"$ref": "#/$defs/Dog"}],
        "discriminator": {
            "propertyName": "petType",
            "mapping": {"dog": "#/$defs/Dog"}
        }
    })
}

fn compile(schema: Value) -> Schema {
    SchemaRegistry::new().compile(&schema).unwrap()
}

fn codes(schema: &Schema, instance: Value) -> Vec<String> {
    schema
        .evaluate(&instance, &ExecutionConfig::new())
        .unwrap()
        .errors
        .into_iter()
        .map(|e| e.code)
        .collect()
}

#[test]
fn test_selects_by_schema_name() {
    let schema = compile(pets());
    assert!(schema.is_valid(&json!({"petType": "Cat", "meow": true})).unwrap());
}

#[test]
fn test_selects_by_explicit_mapping() {
    let schema = compile(pets());
    assert!(schema.is_valid(&json!({"petType": "dog", "bark": "woof"})).unwrap());
}

#[test]
fn test_only_selected_alternative_reports_errors() {
    let schema = compile(pets());
    // Valid as a Cat, but the discriminator picks Dog.
    let errors = schema
        .evaluate(&json!({"petType": "dog", "meow": true}), &ExecutionConfig::new())
        .unwrap()
        .errors;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].keyword, "required");
    assert_eq!(errors[0].expected.as_deref(), Some("bark"));
}

#[test]
fn test_unknown_value_is_a_discriminator_error() {
    let schema = compile(pets());
    assert_eq!(codes(&schema, json!({"petType": "Lizard"})), vec!["discriminator"]);
}

#[test]
fn test_missing_property_falls_back_to_any_of() {
    let schema = compile(pets());
    assert!(!schema.is_valid(&json!({"meow": true})).unwrap());
    let errors = codes(&schema, json!({"meow": true}));
    assert_eq!(errors[0], "anyOf");
}

#[test]
fn test_discriminator_ignored_outside_openapi_dialects() {
    let mut schema = pets();
    schema["$schema"] = json!("https://json-schema.org/draft/2020-12/schema");
    let schema = compile(schema);
    // Plain anyOf: the Cat alternative passes.
    assert!(schema.is_valid(&json!({"petType": "dog", "meow": true})).unwrap());
}

#[test]
fn test_discriminator_forced_on_by_config() {
    let mut document = pets();
    document["$schema"] = json!("https://json-schema.org/draft/2020-12/schema");
    let registry = SchemaRegistry::builder()
        .config(RegistryConfig::default().with_discriminator(true))
        .build();
    let schema = registry.compile(&document).unwrap();
    assert!(!schema.is_valid(&json!({"petType": "dog", "meow": true})).unwrap());
}

#[test]
fn test_discriminator_inherited_through_all_of() {
    let schema = compile(json!({
        "$schema": OPENAPI_31_DIALECT,
        "$defs": {
            "Pet": {
                "properties": {"kind": {"type": "string"}},
                "required": ["kind"],
                "discriminator": {"propertyName": "kind"}
            },
            "Fish": {"allOf": [{"$ref": "#/$defs/Pet"}], "required": ["fins"]},
            "Bird": {"allOf": [{"$ref": "#/$defs/Pet"}], "required": ["wings"]}
        },
        "anyOf": [{"$ref": "#/$defs/Fish"}, {"$ref": "#/$defs/Bird"}]
    }));
    assert!(schema.is_valid(&json!({"kind": "Fish", "fins": 2})).unwrap());
    assert!(!schema.is_valid(&json!({"kind": "Fish", "wings": 2})).unwrap());
    assert!(schema.is_valid(&json!({"kind": "Bird", "wings": 2})).unwrap());
}

#[test]
fn test_conflicting_mapping_is_rejected() {
    let schema = compile(json!({
        "$schema": OPENAPI_31_DIALECT,
        "$defs": {
            "A": {
                "discriminator": {"propertyName": "t", "mapping": {"x": "#/$defs/A"}}
            },
            "B": {
                "discriminator": {"propertyName": "t", "mapping": {"x": "#/$defs/B"}}
            }
        },
        "anyOf": [{"$ref": "#/$defs/A"}, {"$ref": "#/$defs/B"}],
        "discriminator": {"propertyName": "t"}
    }));
    let result = schema.validate(&json!({"t": "x"}));
    assert!(matches!(
        result,
        Err(verdict::EvaluationError::Compile(CompileError::Discriminator { .. }))
    ));
}
