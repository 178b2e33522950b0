//! End-to-end evaluation of object schemas and combinators.

use pretty_assertions::assert_eq;
use serde_json::json;
use verdict::{ExecutionConfig, NodePath, Schema, SchemaRegistry};

fn compile(schema: serde_json::Value) -> Schema {
    SchemaRegistry::new().compile(&schema).unwrap()
}

fn error_codes(schema: &Schema, instance: serde_json::Value) -> Vec<String> {
    schema
        .evaluate(&instance, &ExecutionConfig::new())
        .unwrap()
        .errors
        .into_iter()
        .map(|e| e.code)
        .collect()
}

#[test]
fn test_object_with_required_string() {
    let schema = compile(json!({
        "type": "object",
        "properties": {"a": {"type": "string"}},
        "required": ["a"]
    }));

    let evaluation = schema.evaluate(&json!({"a": 1}), &ExecutionConfig::new()).unwrap();
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].keyword, "type");
    assert_eq!(evaluation.errors[0].instance_location, NodePath::root().push_field("a"));

    let evaluation = schema.evaluate(&json!({}), &ExecutionConfig::new()).unwrap();
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].keyword, "required");
    assert_eq!(evaluation.errors[0].expected.as_deref(), Some("a"));

    assert!(schema.evaluate(&json!({"a": "x"}), &ExecutionConfig::new()).unwrap().is_valid());
}

#[test]
fn test_evaluation_is_repeatable() {
    let schema = compile(json!({
        "properties": {"n": {"minimum": 3}, "s": {"maxLength": 1}},
        "title": "repeat"
    }));
    let config = ExecutionConfig::new().with_annotations(true);
    let instance = json!({"n": 1, "s": "long"});
    let first = schema.evaluate(&instance, &config).unwrap();
    let second = schema.evaluate(&instance, &config).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.errors.len(), 2);
}

#[test]
fn test_all_of_requires_every_branch() {
    let schema = compile(json!({
        "allOf": [
            {"properties": {"a": {"type": "integer"}}},
            {"properties": {"b": {"type": "integer"}}}
        ],
        "unevaluatedProperties": false
    }));
    assert!(schema.is_valid(&json!({"a": 1, "b": 2})).unwrap());
    assert!(!schema.is_valid(&json!({"a": 1, "b": "x"})).unwrap());
    assert!(!schema.is_valid(&json!({"a": 1, "c": 2})).unwrap());
}

#[test]
fn test_any_of_reports_umbrella_and_branch_errors() {
    let schema = compile(json!({"anyOf": [{"type": "string"}, {"minimum": 10}]}));
    assert!(schema.is_valid(&json!("x")).unwrap());
    assert!(schema.is_valid(&json!(11)).unwrap());
    assert_eq!(error_codes(&schema, json!(1)), vec!["anyOf", "type", "minimum"]);
}

#[test]
fn test_one_of_rejects_two_matches() {
    let schema = compile(json!({"oneOf": [{"type": "integer"}, {"minimum": 2}]}));
    assert!(schema.is_valid(&json!(1)).unwrap());
    assert!(schema.is_valid(&json!(2.5)).unwrap());
    assert!(!schema.is_valid(&json!(1.5)).unwrap());

    let evaluation = schema.evaluate(&json!(3), &ExecutionConfig::new()).unwrap();
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].keyword, "oneOf");
}

#[test]
fn test_if_then_else() {
    let schema = compile(json!({
        "if": {"properties": {"kind": {"const": "a"}}},
        "then": {"required": ["alpha"]},
        "else": {"required": ["beta"]}
    }));
    assert!(schema.is_valid(&json!({"kind": "a", "alpha": 1})).unwrap());
    assert!(!schema.is_valid(&json!({"kind": "a", "beta": 1})).unwrap());
    assert!(schema.is_valid(&json!({"kind": "b", "beta": 1})).unwrap());
    assert!(!schema.is_valid(&json!({"kind": "b"})).unwrap());
}

#[test]
fn test_unevaluated_properties_reports_only_extra_member() {
    let schema = compile(json!({"properties": {"a": {}}, "unevaluatedProperties": false}));
    let evaluation = schema.evaluate(&json!({"a": 1, "b": 2}), &ExecutionConfig::new()).unwrap();
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].keyword, "unevaluatedProperties");
    assert_eq!(evaluation.errors[0].instance_location, NodePath::root().push_field("b"));
}

#[test]
fn test_unevaluated_properties_sees_passing_any_of_branch_only() {
    let schema = compile(json!({
        "anyOf": [
            {"properties": {"a": {"const": 1}}, "required": ["a"]},
            {"properties": {"b": true}}
        ],
        "unevaluatedProperties": false
    }));
    // The first branch fails, so `a` is not evaluated by it.
    assert!(!schema.is_valid(&json!({"a": 2, "b": 1})).unwrap());
    assert!(schema.is_valid(&json!({"a": 1, "b": 1})).unwrap());
}

#[test]
fn test_fail_fast_stops_at_first_error() {
    let schema = compile(json!({
        "properties": {"a": {"type": "string"}, "b": {"type": "string"}}
    }));
    let instance = json!({"a": 1, "b": 2});
    let all = schema.evaluate(&instance, &ExecutionConfig::new()).unwrap();
    assert_eq!(all.errors.len(), 2);
    let first = schema
        .evaluate(&instance, &ExecutionConfig::new().with_fail_fast(true))
        .unwrap();
    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.errors[0].instance_location, NodePath::root().push_field("a"));
}

#[test]
fn test_fail_fast_inside_any_of_still_tries_later_branches() {
    let schema = compile(json!({"anyOf": [{"type": "string"}, {"type": "integer"}]}));
    let config = ExecutionConfig::new().with_fail_fast(true);
    assert!(schema.evaluate(&json!(1), &config).unwrap().is_valid());
}

#[test]
fn test_annotations_of_failed_subschemas_are_invalid() {
    let schema = compile(json!({
        "anyOf": [
            {"title": "text", "type": "string"},
            {"title": "number", "type": "number"}
        ]
    }));
    let config = ExecutionConfig::new().with_annotations(true);
    let evaluation = schema.evaluate(&json!(5), &config).unwrap();
    let titles: Vec<_> = evaluation
        .annotations
        .for_keyword("title")
        .map(|a| a.value.clone())
        .collect();
    assert_eq!(titles, vec![json!("number")]);
}

#[test]
fn test_failed_if_does_not_count_as_evaluated() {
    let schema = compile(json!({
        "if": {"properties": {"foo": {"const": "then"}}, "required": ["foo"]},
        "then": {"properties": {"bar": {"type": "string"}}, "required": ["bar"]},
        "else": {"properties": {"baz": {"type": "string"}}, "required": ["baz"]},
        "unevaluatedProperties": false
    }));
    assert!(schema.is_valid(&json!({"foo": "then", "bar": "bar"})).unwrap());
    assert!(!schema.is_valid(&json!({"foo": "then", "bar": "bar", "baz": "baz"})).unwrap());
    assert!(schema.is_valid(&json!({"baz": "baz"})).unwrap());
    // `if` evaluated `foo` but failed, so `foo` stays unevaluated.
    let evaluation = schema
        .evaluate(&json!({"foo": "else", "baz": "baz"}), &ExecutionConfig::new())
        .unwrap();
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].keyword, "unevaluatedProperties");
    assert_eq!(evaluation.errors[0].instance_location, NodePath::root().push_field("foo"));
}

#[test]
fn test_one_of_merges_only_the_passing_branch() {
    let schema = compile(json!({
        "type": "object",
        "properties": {"foo": {"type": "string"}},
        "oneOf": [
            {"properties": {"bar": {"const": "bar"}}, "required": ["bar"]},
            {"properties": {"baz": {"const": "baz"}}, "required": ["baz"]}
        ],
        "unevaluatedProperties": false
    }));
    assert!(schema.is_valid(&json!({"foo": "foo", "bar": "bar"})).unwrap());
    assert!(!schema.is_valid(&json!({"foo": "foo", "bar": "bar", "baz": "baz"})).unwrap());

    let evaluation = schema
        .evaluate(&json!({"foo": "foo", "bar": "bar", "baz": "not-baz"}), &ExecutionConfig::new())
        .unwrap();
    assert_eq!(evaluation.errors.len(), 1);
    assert_eq!(evaluation.errors[0].keyword, "unevaluatedProperties");
    assert_eq!(evaluation.errors[0].instance_location, NodePath::root().push_field("baz"));
}
