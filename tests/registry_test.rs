//! Registry configuration, loaders, dialects and output formats.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use serde_json::json;
use verdict::loader::FileSystem;
use verdict::{
    ChainLoader, CompileError, Dialect, ExecutionConfig, FileResourceLoader, ListFormat,
    MapResourceLoader, RegistryConfig, SchemaRegistry, UnknownKeywordPolicy, ValidationFormat,
};

struct MemoryFs(HashMap<PathBuf, String>);

impl FileSystem for MemoryFs {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

#[test]
fn test_file_loader_serves_file_references() {
    let mut files = HashMap::new();
    files.insert(
        PathBuf::from("/schemas/address.json"),
        r#"{"type": "object", "required": ["city"]}"#.to_string(),
    );
    let registry = SchemaRegistry::builder()
        .loader(FileResourceLoader::with_filesystem(MemoryFs(files)))
        .build();
    let schema = registry
        .compile_with_iri(
            "file:///schemas/person.json",
            &json!({"properties": {"home": {"$ref": "address.json"}}}),
        )
        .unwrap();
    assert!(schema.is_valid(&json!({"home": {"city": "Oslo"}})).unwrap());
    assert!(!schema.is_valid(&json!({"home": {}})).unwrap());
}

#[test]
fn test_malformed_loaded_document_surfaces_at_evaluation() {
    let loader = MapResourceLoader::new().with_text("https://example.com/broken.json", "{not json");
    let registry = SchemaRegistry::builder().loader(loader).build();
    let schema = registry
        .compile(&json!({"$ref": "https://example.com/broken.json"}))
        .unwrap();
    // Preload leaves load failures for evaluation time.
    assert!(matches!(
        schema.validate(&json!(1)),
        Err(verdict::EvaluationError::Compile(CompileError::Load(_)))
    ));
}

#[test]
fn test_chain_loader_order() {
    let chain = ChainLoader::new()
        .with(MapResourceLoader::new().with_document("https://example.com/a.json", json!({"type": "string"})))
        .with(MapResourceLoader::new().with_document("https://example.com/a.json", json!({"type": "integer"})));
    let registry = SchemaRegistry::builder().loader(chain).build();
    let schema = registry.compile(&json!({"$ref": "https://example.com/a.json"})).unwrap();
    assert!(schema.is_valid(&json!("x")).unwrap());
}

#[test]
fn test_unknown_keyword_policies() {
    let document = json!({"frobnicate": 3});

    let annotate = SchemaRegistry::new().compile(&document).unwrap();
    let config = ExecutionConfig::new().with_annotations(true);
    let evaluation = annotate.evaluate(&json!(1), &config).unwrap();
    assert_eq!(evaluation.annotations.for_keyword("frobnicate").count(), 1);

    let reject = SchemaRegistry::builder()
        .config(RegistryConfig::default().with_unknown_keywords(UnknownKeywordPolicy::Reject))
        .build();
    assert!(matches!(
        reject.compile(&document),
        Err(CompileError::UnknownKeyword { .. })
    ));

    let ignore = SchemaRegistry::builder()
        .config(RegistryConfig::default().with_unknown_keywords(UnknownKeywordPolicy::Ignore))
        .build();
    let evaluation = ignore.compile(&document).unwrap().evaluate(&json!(1), &config).unwrap();
    assert!(evaluation.annotations.is_empty());
}

#[test]
fn test_invalid_keyword_value_is_a_compile_error() {
    let result = SchemaRegistry::new().compile(&json!({"prefixItems": {"type": "string"}}));
    assert!(matches!(result, Err(CompileError::InvalidKeyword { .. })));
}

#[test]
fn test_unknown_dialect_rejected_when_configured() {
    let document = json!({"$schema": "https://example.com/unknown", "type": "string"});
    assert!(SchemaRegistry::new().compile(&document).is_ok());
    let strict = SchemaRegistry::builder()
        .config(RegistryConfig::default().with_reject_unknown_dialects(true))
        .build();
    assert!(matches!(
        strict.compile(&document),
        Err(CompileError::UnknownDialect { .. })
    ));
}

#[test]
fn test_default_dialect_controls_format_assertion() {
    let document = json!({"format": "ipv4"});
    let modern = SchemaRegistry::new().compile(&document).unwrap();
    assert!(modern.is_valid(&json!("nope")).unwrap());

    let legacy = SchemaRegistry::builder()
        .default_dialect(Dialect::draft7())
        .build()
        .compile(&document)
        .unwrap();
    assert!(!legacy.is_valid(&json!("nope")).unwrap());
}

#[test]
fn test_openapi_30_nullable() {
    let schema = SchemaRegistry::builder()
        .default_dialect(Dialect::openapi30())
        .build()
        .compile(&json!({"type": "string", "nullable": true}))
        .unwrap();
    assert!(schema.is_valid(&json!(null)).unwrap());
    assert!(schema.is_valid(&json!("x")).unwrap());
    assert!(!schema.is_valid(&json!(1)).unwrap());
}

#[test]
fn test_output_formats() {
    let schema = SchemaRegistry::new()
        .compile(&json!({"properties": {"a": {"type": "string"}}}))
        .unwrap();
    let config = ExecutionConfig::new();

    let list = schema.validate_with(&json!({"a": 1}), &config, &ListFormat).unwrap();
    assert_eq!(list["valid"], json!(false));
    assert_eq!(list["errors"][0]["instanceLocation"], json!("/a"));
    assert_eq!(list["errors"][0]["keywordLocation"], json!("/properties/a/type"));
    assert_eq!(list["errors"][0]["absoluteKeywordLocation"], json!("#/properties/a/type"));

    let validation = schema
        .validate_with(&json!({"a": "x"}), &config, &ValidationFormat)
        .unwrap();
    assert!(validation.is_success());
}
