//! Compilation and execution settings.
//!
//! [`RegistryConfig`] is fixed for the lifetime of a
//! [`SchemaRegistry`](crate::SchemaRegistry); [`ExecutionConfig`] may differ
//! per evaluation run.

use std::fmt;
use std::sync::Arc;

use crate::location::{is_absolute_iri, SchemaLocation};

/// Checks schema identifiers (`$id` / `id`) during compilation.
pub trait SchemaIdValidator: Send + Sync {
    /// `id` is the raw identifier, `base` the location it is resolved
    /// against and `resolved` the resolved IRI with any fragment removed.
    fn is_valid(&self, id: &str, base: &SchemaLocation, resolved: &str) -> bool;
}

/// Requires identifiers to resolve to absolute IRIs.
///
/// In a document compiled without a base IRI a bare fragment or a path
/// starting with `/` is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIdValidator;

impl SchemaIdValidator for DefaultIdValidator {
    fn is_valid(&self, id: &str, base: &SchemaLocation, resolved: &str) -> bool {
        if base.absolute_iri().is_none() && (id.starts_with('#') || id.starts_with('/')) {
            return true;
        }
        is_absolute_iri(resolved)
    }
}

/// Accepts every identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveIdValidator;

impl SchemaIdValidator for PermissiveIdValidator {
    fn is_valid(&self, _id: &str, _base: &SchemaLocation, _resolved: &str) -> bool {
        true
    }
}

/// What to do with keywords the active dialect does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeywordPolicy {
    /// Fail compilation.
    Reject,
    /// Drop the keyword silently.
    Ignore,
    /// Keep the keyword as an annotation.
    #[default]
    Annotate,
}

/// Settings applied while compiling and resolving schemas.
///
/// # Example
///
/// ```rust
/// use verdict::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_cache_refs(false)
///     .with_max_ref_depth(32);
/// assert_eq!(config.max_ref_depth, 32);
/// ```
#[derive(Clone)]
pub struct RegistryConfig {
    /// Memoize resolved reference targets per reference keyword.
    pub cache_refs: bool,
    /// Resolve references and build their targets right after compiling.
    pub preload_schema: bool,
    /// Maximum reference nesting followed by the preload pass.
    pub preload_max_nesting_depth: usize,
    /// Maximum number of reference hops on an evaluation-parent chain.
    pub max_ref_depth: usize,
    pub unknown_keywords: UnknownKeywordPolicy,
    /// Fail on `$schema` values that name no known dialect.
    pub reject_unknown_dialects: bool,
    /// Force discriminator handling on or off; `None` follows the dialect.
    pub discriminator: Option<bool>,
    pub id_validator: Arc<dyn SchemaIdValidator>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_refs: true,
            preload_schema: true,
            preload_max_nesting_depth: 40,
            max_ref_depth: 100,
            unknown_keywords: UnknownKeywordPolicy::default(),
            reject_unknown_dialects: false,
            discriminator: None,
            id_validator: Arc::new(DefaultIdValidator),
        }
    }
}

impl RegistryConfig {
    pub fn with_cache_refs(mut self, cache_refs: bool) -> Self {
        self.cache_refs = cache_refs;
        self
    }

    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload_schema = preload;
        self
    }

    pub fn with_preload_max_nesting_depth(mut self, depth: usize) -> Self {
        self.preload_max_nesting_depth = depth;
        self
    }

    pub fn with_max_ref_depth(mut self, depth: usize) -> Self {
        self.max_ref_depth = depth;
        self
    }

    pub fn with_unknown_keywords(mut self, policy: UnknownKeywordPolicy) -> Self {
        self.unknown_keywords = policy;
        self
    }

    pub fn with_reject_unknown_dialects(mut self, reject: bool) -> Self {
        self.reject_unknown_dialects = reject;
        self
    }

    pub fn with_discriminator(mut self, enabled: bool) -> Self {
        self.discriminator = Some(enabled);
        self
    }

    pub fn with_id_validator(mut self, validator: impl SchemaIdValidator + 'static) -> Self {
        self.id_validator = Arc::new(validator);
        self
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("cache_refs", &self.cache_refs)
            .field("preload_schema", &self.preload_schema)
            .field("preload_max_nesting_depth", &self.preload_max_nesting_depth)
            .field("max_ref_depth", &self.max_ref_depth)
            .field("unknown_keywords", &self.unknown_keywords)
            .field("reject_unknown_dialects", &self.reject_unknown_dialects)
            .field("discriminator", &self.discriminator)
            .finish_non_exhaustive()
    }
}

type AnnotationFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Settings for one evaluation run.
#[derive(Clone, Default)]
pub struct ExecutionConfig {
    /// Stop at the first assertion error.
    pub fail_fast: bool,
    /// Record annotations.
    pub annotation_collection: bool,
    /// Keyword predicate deciding which annotations are recorded.
    pub annotation_filter: Option<AnnotationFilter>,
    /// Treat `format` as an assertion. `None` asserts for draft 4 to 7 and
    /// annotates for later dialects.
    pub format_assertions: Option<bool>,
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_annotations(mut self, enabled: bool) -> Self {
        self.annotation_collection = enabled;
        self
    }

    /// Enables annotation collection restricted to keywords accepted by
    /// `filter`.
    pub fn with_annotation_filter(
        mut self,
        filter: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.annotation_collection = true;
        self.annotation_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_format_assertions(mut self, enabled: bool) -> Self {
        self.format_assertions = Some(enabled);
        self
    }

    /// Returns true if annotations of `keyword` should be recorded.
    pub fn collects(&self, keyword: &str) -> bool {
        self.annotation_collection
            && self
                .annotation_filter
                .as_ref()
                .map_or(true, |filter| filter(keyword))
    }
}

impl fmt::Debug for ExecutionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionConfig")
            .field("fail_fast", &self.fail_fast)
            .field("annotation_collection", &self.annotation_collection)
            .field("annotation_filter", &self.annotation_filter.is_some())
            .field("format_assertions", &self.format_assertions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_id_validator() {
        let validator = DefaultIdValidator;
        let no_base = SchemaLocation::document(None);
        assert!(validator.is_valid("#root", &no_base, ""));
        assert!(validator.is_valid("/schemas/a", &no_base, "/schemas/a"));
        assert!(!validator.is_valid("a.json", &no_base, "a.json"));

        let base = SchemaLocation::document(Some("https://example.com/root.json"));
        assert!(validator.is_valid("a.json", &base, "https://example.com/a.json"));
    }

    #[test]
    fn test_annotation_filter() {
        let config = ExecutionConfig::new().with_annotation_filter(|k| k == "title");
        assert!(config.collects("title"));
        assert!(!config.collects("description"));
        assert!(!ExecutionConfig::new().collects("title"));
    }

    #[test]
    fn test_registry_defaults() {
        let config = RegistryConfig::default();
        assert!(config.cache_refs);
        assert_eq!(config.max_ref_depth, 100);
        assert_eq!(config.unknown_keywords, UnknownKeywordPolicy::Annotate);
    }
}
