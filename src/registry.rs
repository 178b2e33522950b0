//! The schema registry: entry point for compiling schema documents.
//!
//! A [`SchemaRegistry`] holds the compile-time configuration, the known
//! dialects, the resource loader and every document registered under an
//! IRI. Each call to [`compile`](SchemaRegistry::compile) produces an
//! independent [`Schema`]; references to registered documents are served
//! to it through the registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use stillwater::Validation;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::dialect::{Dialect, DialectRegistry};
use crate::error::{CompileError, EvaluationError, LoadError, SchemaErrors};
use crate::loader::{NoopLoader, ResourceLoader};
use crate::location::{normalize_iri, SchemaLocation};
use crate::path::NodePath;
use crate::schema::{Schema, SchemaGraph};

type DocumentMap = Arc<RwLock<HashMap<String, Arc<Value>>>>;

/// A thread-safe registry of schema documents.
///
/// Cloning is cheap; clones share their registered documents.
///
/// # Example
///
/// ```rust
/// use verdict::SchemaRegistry;
/// use serde_json::json;
///
/// let registry = SchemaRegistry::new();
///
/// registry
///     .compile_with_iri("https://example.com/email.json", &json!({"type": "string", "format": "email"}))
///     .unwrap();
///
/// let user = registry
///     .compile(&json!({
///         "properties": {"email": {"$ref": "https://example.com/email.json"}}
///     }))
///     .unwrap();
///
/// assert!(!user.is_valid(&json!({"email": 42})).unwrap());
/// ```
#[derive(Clone)]
pub struct SchemaRegistry {
    config: RegistryConfig,
    dialects: DialectRegistry,
    default_dialect: Arc<Dialect>,
    loader: Arc<dyn ResourceLoader>,
    documents: DocumentMap,
    schemas: Arc<RwLock<HashMap<String, Schema>>>,
}

impl SchemaRegistry {
    /// Creates a registry with the default configuration, the 2020-12
    /// default dialect and no external loader.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Compiles a document that has no base IRI.
    ///
    /// Relative references inside it resolve against the document itself;
    /// absolute ones reach registered documents and the loader.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] for malformed keywords, identifiers or
    /// anchors, and for external resources that fail to load.
    pub fn compile(&self, schema: &Value) -> Result<Schema, CompileError> {
        self.compile_document(None, Arc::new(schema.clone()))
    }

    /// Compiles a document under `iri` and registers it, so later
    /// compilations can reference it.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateIri` if a document is already
    /// registered under the same IRI.
    ///
    /// # Example
    ///
    /// ```rust
    /// use verdict::SchemaRegistry;
    /// use serde_json::json;
    ///
    /// let registry = SchemaRegistry::new();
    /// registry.compile_with_iri("https://example.com/a.json", &json!(true)).unwrap();
    ///
    /// assert!(registry.get("https://example.com/a.json").is_some());
    /// assert!(registry.compile_with_iri("https://example.com/a.json", &json!(false)).is_err());
    /// ```
    pub fn compile_with_iri(&self, iri: &str, schema: &Value) -> Result<Schema, RegistryError> {
        let iri = normalize_iri(iri);
        if self.documents.read().contains_key(&iri) {
            return Err(RegistryError::DuplicateIri(iri));
        }
        let document = Arc::new(schema.clone());
        let compiled = self.compile_document(Some(&iri), Arc::clone(&document))?;

        let mut documents = self.documents.write();
        if documents.contains_key(&iri) {
            return Err(RegistryError::DuplicateIri(iri));
        }
        documents.insert(iri.clone(), document);
        self.schemas.write().insert(iri, compiled.clone());
        Ok(compiled)
    }

    /// Returns the schema registered under `iri`.
    pub fn get(&self, iri: &str) -> Option<Schema> {
        self.schemas.read().get(&normalize_iri(iri)).cloned()
    }

    /// IRIs of all registered documents, sorted.
    pub fn iris(&self) -> Vec<String> {
        let mut iris: Vec<String> = self.documents.read().keys().cloned().collect();
        iris.sort();
        iris
    }

    /// Validates `instance` against the document registered under `iri`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use verdict::SchemaRegistry;
    /// use serde_json::json;
    ///
    /// let registry = SchemaRegistry::new();
    /// registry
    ///     .compile_with_iri("https://example.com/age.json", &json!({"type": "integer", "minimum": 0}))
    ///     .unwrap();
    ///
    /// let result = registry.validate("https://example.com/age.json", &json!(30)).unwrap();
    /// assert!(result.is_success());
    /// assert!(registry.validate("https://example.com/missing.json", &json!(30)).is_err());
    /// ```
    pub fn validate(&self, iri: &str, instance: &Value) -> Result<Validation<(), SchemaErrors>, RegistryError> {
        let schema = self
            .get(iri)
            .ok_or_else(|| RegistryError::SchemaNotFound(iri.to_string()))?;
        Ok(schema.validate(instance)?)
    }

    fn compile_document(&self, iri: Option<&str>, schema: Arc<Value>) -> Result<Schema, CompileError> {
        let loader = RegisteredDocuments {
            documents: Arc::clone(&self.documents),
            fallback: Arc::clone(&self.loader),
        };
        let graph = Arc::new(SchemaGraph::new(
            self.config.clone(),
            self.dialects.clone(),
            Arc::clone(&self.default_dialect),
            Arc::new(loader),
        ));
        let root = graph.new_node(
            SchemaLocation::document(iri),
            NodePath::root(),
            schema,
            None,
            None,
        )?;
        if self.config.preload_schema {
            graph.preload(root)?;
        }
        debug!(iri = iri.unwrap_or("(anonymous)"), nodes = graph.len(), "compiled schema document");
        Ok(Schema::new(graph, root))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves registered documents before asking the configured loader.
struct RegisteredDocuments {
    documents: DocumentMap,
    fallback: Arc<dyn ResourceLoader>,
}

impl ResourceLoader for RegisteredDocuments {
    fn load(&self, iri: &str) -> Result<Option<String>, LoadError> {
        if let Some(document) = self.documents.read().get(&normalize_iri(iri)) {
            return Ok(Some(document.to_string()));
        }
        self.fallback.load(iri)
    }

    fn load_value(&self, iri: &str) -> Result<Option<Arc<Value>>, LoadError> {
        if let Some(document) = self.documents.read().get(&normalize_iri(iri)) {
            return Ok(Some(Arc::clone(document)));
        }
        self.fallback.load_value(iri)
    }
}

/// Builder for [`SchemaRegistry`].
///
/// # Example
///
/// ```rust
/// use verdict::{Dialect, RegistryConfig, SchemaRegistry};
///
/// let registry = SchemaRegistry::builder()
///     .config(RegistryConfig::default().with_max_ref_depth(50))
///     .default_dialect(Dialect::draft7())
///     .build();
/// assert_eq!(registry.config().max_ref_depth, 50);
/// ```
pub struct SchemaRegistryBuilder {
    config: RegistryConfig,
    dialects: DialectRegistry,
    default_dialect: Arc<Dialect>,
    loader: Arc<dyn ResourceLoader>,
}

impl Default for SchemaRegistryBuilder {
    fn default() -> Self {
        Self {
            config: RegistryConfig::default(),
            dialects: DialectRegistry::default(),
            default_dialect: Dialect::draft202012(),
            loader: Arc::new(NoopLoader),
        }
    }
}

impl SchemaRegistryBuilder {
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Dialect for documents that declare no `$schema`.
    pub fn default_dialect(mut self, dialect: Arc<Dialect>) -> Self {
        self.default_dialect = dialect;
        self
    }

    /// Makes a custom dialect selectable through `$schema`.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialects.register(Arc::new(dialect));
        self
    }

    /// Loader for resources that are not registered.
    pub fn loader(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            config: self.config,
            dialects: self.dialects,
            default_dialect: self.default_dialect,
            loader: self.loader,
            documents: Arc::new(RwLock::new(HashMap::new())),
            schemas: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A document is already registered under this IRI.
    #[error("schema '{0}' already registered")]
    DuplicateIri(String),

    /// No document is registered under this IRI.
    #[error("schema '{0}' not found")]
    SchemaNotFound(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MapResourceLoader;
    use serde_json::json;

    #[test]
    fn test_compile_independent_anonymous_documents() {
        let registry = SchemaRegistry::new();
        let strings = registry
            .compile(&json!({"$defs": {"t": {"type": "string"}}, "$ref": "#/$defs/t"}))
            .unwrap();
        let numbers = registry
            .compile(&json!({"$defs": {"t": {"type": "number"}}, "$ref": "#/$defs/t"}))
            .unwrap();
        assert!(strings.is_valid(&json!("a")).unwrap());
        assert!(numbers.is_valid(&json!(1)).unwrap());
        assert!(!numbers.is_valid(&json!("a")).unwrap());
    }

    #[test]
    fn test_registered_documents_are_referenceable() {
        let registry = SchemaRegistry::new();
        registry
            .compile_with_iri(
                "https://example.com/defs.json",
                &json!({"$defs": {"id": {"type": "integer", "minimum": 1}}}),
            )
            .unwrap();
        let schema = registry
            .compile(&json!({"$ref": "https://example.com/defs.json#/$defs/id"}))
            .unwrap();
        assert!(schema.is_valid(&json!(3)).unwrap());
        assert!(!schema.is_valid(&json!(0)).unwrap());
        assert_eq!(registry.iris(), vec!["https://example.com/defs.json".to_string()]);
    }

    #[test]
    fn test_duplicate_iri_is_rejected() {
        let registry = SchemaRegistry::new();
        registry.compile_with_iri("https://example.com/a.json", &json!({})).unwrap();
        let err = registry
            .compile_with_iri("https://example.com/a.json#", &json!({}))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateIri(_)));
    }

    #[test]
    fn test_concurrent_registration_of_one_iri_has_one_winner() {
        let registry = SchemaRegistry::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry
                        .compile_with_iri("https://example.com/race.json", &json!({"const": i}))
                        .map(|schema| (i, schema))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, RegistryError::DuplicateIri(_))));

        let (i, _) = winners[0];
        let registered = registry.get("https://example.com/race.json").unwrap();
        assert!(registered.is_valid(&json!(i)).unwrap());
    }

    #[test]
    fn test_registered_document_is_shared_not_reparsed() {
        let registry = SchemaRegistry::new();
        registry
            .compile_with_iri("https://example.com/n.json", &json!({"type": "integer"}))
            .unwrap();
        let loader = RegisteredDocuments {
            documents: Arc::clone(&registry.documents),
            fallback: Arc::new(NoopLoader),
        };
        let first = loader.load_value("https://example.com/n.json").unwrap().unwrap();
        let second = loader.load_value("https://example.com/n.json").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, json!({"type": "integer"}));
    }

    #[test]
    fn test_failed_compile_registers_nothing() {
        let registry = SchemaRegistry::new();
        let result = registry.compile_with_iri("https://example.com/bad.json", &json!({"minLength": -1}));
        assert!(matches!(result, Err(RegistryError::Compile(_))));
        assert!(registry.get("https://example.com/bad.json").is_none());
    }

    #[test]
    fn test_validate_by_iri() {
        let registry = SchemaRegistry::new();
        registry
            .compile_with_iri("https://example.com/s.json", &json!({"type": "string"}))
            .unwrap();
        assert!(registry.validate("https://example.com/s.json", &json!(1)).unwrap().is_failure());
        assert!(matches!(
            registry.validate("https://example.com/none.json", &json!(1)),
            Err(RegistryError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn test_loader_is_consulted_after_registered_documents() {
        let loader = MapResourceLoader::new()
            .with_document("https://example.com/shared.json", json!({"type": "string"}));
        let registry = SchemaRegistry::builder().loader(loader).build();
        registry
            .compile_with_iri("https://example.com/local.json", &json!({"type": "integer"}))
            .unwrap();
        let schema = registry
            .compile(&json!({
                "properties": {
                    "a": {"$ref": "https://example.com/shared.json"},
                    "b": {"$ref": "https://example.com/local.json"}
                }
            }))
            .unwrap();
        assert!(schema.is_valid(&json!({"a": "x", "b": 1})).unwrap());
        assert!(!schema.is_valid(&json!({"a": 1, "b": 1})).unwrap());
    }

    #[test]
    fn test_custom_dialect_selected_by_schema_keyword() {
        let strict = Dialect::draft7().extend("https://example.com/strict");
        let registry = SchemaRegistry::builder().dialect(strict).build();
        let schema = registry
            .compile(&json!({"$schema": "https://example.com/strict", "format": "ipv4"}))
            .unwrap();
        assert!(!schema.is_valid(&json!("not an ip")).unwrap());
    }
}
