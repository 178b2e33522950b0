//! # Verdict
//!
//! A JSON Schema compiler and evaluator that reports ALL assertion errors
//! of an instance, not just the first.
//!
//! ## Overview
//!
//! Schema documents (draft 4, 6, 7, 2019-09, 2020-12 and the OpenAPI 3.0 and
//! 3.1 dialects) compile into a graph of schema nodes. References
//! (`$ref`, `$dynamicRef`, `$recursiveRef`) are resolved lazily across that
//! graph, so self-referential and mutually recursive schemas are fine.
//! Evaluation tracks which instance locations each applicator evaluated,
//! which drives `unevaluatedProperties`, `unevaluatedItems` and OpenAPI
//! discriminators.
//!
//! ## Core Types
//!
//! - [`SchemaRegistry`]: compiles documents and holds the ones registered by IRI
//! - [`Schema`]: a compiled document; evaluates instances
//! - [`SchemaError`]: a single failed assertion with instance and schema locations
//! - [`SchemaErrors`]: a non-empty collection of assertion errors
//! - [`Evaluation`]: errors plus annotations of one run
//!
//! ## Example
//!
//! ```rust
//! use verdict::{NodePath, SchemaRegistry};
//! use serde_json::json;
//!
//! let schema = SchemaRegistry::new()
//!     .compile(&json!({
//!         "type": "object",
//!         "properties": {"a": {"type": "string"}},
//!         "required": ["a", "b"]
//!     }))
//!     .unwrap();
//!
//! let errors = schema
//!     .validate(&json!({"a": 1}))
//!     .unwrap()
//!     .into_result()
//!     .unwrap_err();
//!
//! assert_eq!(errors.len(), 2);
//! assert_eq!(errors.at_path(&NodePath::root().push_field("a")).len(), 1);
//! assert_eq!(errors.with_code("required").len(), 1);
//! ```

pub mod annotation;
pub mod config;
pub mod context;
pub mod dialect;
pub mod discriminator;
pub mod error;
pub mod keywords;
pub mod loader;
pub mod location;
pub mod output;
pub mod path;
pub mod registry;
pub mod resolver;
pub mod resources;
pub mod schema;
pub mod value;

pub use annotation::{Annotation, Annotations};
pub use config::{
    DefaultIdValidator, ExecutionConfig, PermissiveIdValidator, RegistryConfig, SchemaIdValidator,
    UnknownKeywordPolicy,
};
pub use context::{ExecutionContext, Interrupt};
pub use dialect::{Dialect, SpecVersion, OPENAPI_30_DIALECT, OPENAPI_31_DIALECT};
pub use error::{CompileError, EvaluationError, LoadError, SchemaError, SchemaErrors};
pub use keywords::{Keyword, KeywordFactory, KeywordInput, KeywordMeta};
pub use loader::{ChainLoader, FileResourceLoader, MapResourceLoader, ResourceLoader};
pub use location::SchemaLocation;
pub use output::{Evaluation, FlagFormat, ListFormat, OutputFormat, ValidationFormat};
pub use path::{NodePath, PathSegment};
pub use registry::{RegistryError, SchemaRegistry, SchemaRegistryBuilder};
pub use schema::{NodeId, Schema, SchemaGraph, SchemaNode};

/// Type alias for validation results using SchemaErrors
pub type ValidationResult<T> = stillwater::Validation<T, SchemaErrors>;
