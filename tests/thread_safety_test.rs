//! Tests for concurrent evaluation of shared schemas.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use verdict::{ExecutionConfig, RegistryConfig, Schema, SchemaRegistry};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_schema_and_registry_are_send_sync() {
    assert_send_sync::<Schema>();
    assert_send_sync::<SchemaRegistry>();
}

#[test]
fn test_concurrent_first_touch_of_lazy_references() {
    let registry = SchemaRegistry::builder()
        .config(RegistryConfig::default().with_preload(false))
        .build();
    let schema = Arc::new(
        registry
            .compile(&json!({
                "$defs": {
                    "node": {
                        "type": "object",
                        "properties": {
                            "value": {"type": "integer"},
                            "next": {"$ref": "#/$defs/node"}
                        }
                    }
                },
                "$ref": "#/$defs/node"
            }))
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let schema = Arc::clone(&schema);
            thread::spawn(move || {
                let valid = json!({"value": i, "next": {"value": i + 1, "next": {"value": i + 2}}});
                let invalid = json!({"value": i, "next": {"value": "x"}});
                assert!(schema.is_valid(&valid).unwrap());
                assert!(!schema.is_valid(&invalid).unwrap());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_compilation_through_shared_registry() {
    let registry = SchemaRegistry::new();
    registry
        .compile_with_iri("https://example.com/id.json", &json!({"type": "integer", "minimum": 1}))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                let schema = registry
                    .compile(&json!({"items": {"$ref": "https://example.com/id.json"}}))
                    .unwrap();
                assert!(schema.is_valid(&json!([1, 2, 3])).unwrap());
                assert!(!schema.is_valid(&json!([0])).unwrap());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_validate_batch_in_parallel() {
    let schema = SchemaRegistry::new()
        .compile(&json!({"type": "string", "minLength": 2}))
        .unwrap();
    let instances: Vec<_> = (0..100)
        .map(|i| if i % 2 == 0 { json!("ok") } else { json!("x") })
        .collect();
    let results = schema.validate_batch(&instances, &ExecutionConfig::new());
    assert_eq!(results.len(), 100);
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap().is_valid(), i % 2 == 0);
    }
}
