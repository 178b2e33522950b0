//! Dialects: which keywords a schema may use and how identity works.
//!
//! A [`Dialect`] bundles a specification version, the identity keyword
//! (`id` or `$id`), vocabulary flags and a keyword table mapping each
//! keyword name to the factory that compiles it. Built-in dialects cover
//! JSON Schema draft 4 through 2020-12 and OpenAPI 3.0 / 3.1; custom
//! dialects extend a built-in one with extra keywords.

mod vocabulary;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::keywords::KeywordFactory;
use crate::location::normalize_iri;

/// JSON Schema specification versions, in release order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecVersion {
    Draft4,
    Draft6,
    Draft7,
    Draft201909,
    Draft202012,
}

impl SpecVersion {
    /// Canonical meta-schema IRI, without the empty fragment.
    pub fn meta_schema(self) -> &'static str {
        match self {
            SpecVersion::Draft4 => "http://json-schema.org/draft-04/schema",
            SpecVersion::Draft6 => "http://json-schema.org/draft-06/schema",
            SpecVersion::Draft7 => "http://json-schema.org/draft-07/schema",
            SpecVersion::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
            SpecVersion::Draft202012 => "https://json-schema.org/draft/2020-12/schema",
        }
    }
}

pub const OPENAPI_30_DIALECT: &str = "https://spec.openapis.org/oas/3.0/dialect";
pub const OPENAPI_31_DIALECT: &str = "https://spec.openapis.org/oas/3.1/dialect/base";

/// A keyword vocabulary bound to a specification version.
#[derive(Clone)]
pub struct Dialect {
    iri: String,
    version: SpecVersion,
    id_keyword: &'static str,
    discriminator: bool,
    nullable: bool,
    keywords: IndexMap<String, KeywordFactory>,
}

impl Dialect {
    fn builtin(iri: &str, version: SpecVersion) -> Self {
        Self {
            iri: iri.to_string(),
            version,
            id_keyword: if version == SpecVersion::Draft4 { "id" } else { "$id" },
            discriminator: false,
            nullable: false,
            keywords: vocabulary::keywords(version),
        }
    }

    pub fn draft4() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.draft4)
    }

    pub fn draft6() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.draft6)
    }

    pub fn draft7() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.draft7)
    }

    pub fn draft201909() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.draft201909)
    }

    pub fn draft202012() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.draft202012)
    }

    /// OpenAPI 3.0 schema objects: draft 4 plus `nullable` and
    /// `discriminator`.
    pub fn openapi30() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.openapi30)
    }

    /// OpenAPI 3.1 base dialect: 2020-12 plus `discriminator`.
    pub fn openapi31() -> Arc<Dialect> {
        Arc::clone(&BUILTIN.openapi31)
    }

    pub fn for_version(version: SpecVersion) -> Arc<Dialect> {
        match version {
            SpecVersion::Draft4 => Self::draft4(),
            SpecVersion::Draft6 => Self::draft6(),
            SpecVersion::Draft7 => Self::draft7(),
            SpecVersion::Draft201909 => Self::draft201909(),
            SpecVersion::Draft202012 => Self::draft202012(),
        }
    }

    /// Starts a custom dialect identified by `iri` from this one.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use verdict::Dialect;
    ///
    /// let dialect = Dialect::draft202012()
    ///     .extend("https://example.com/dialect")
    ///     .without_keyword("format");
    /// assert!(dialect.keyword("format").is_none());
    /// assert!(dialect.keyword("type").is_some());
    /// ```
    pub fn extend(&self, iri: &str) -> Dialect {
        let mut dialect = self.clone();
        dialect.iri = normalize_iri(iri);
        dialect
    }

    /// Adds or replaces a keyword.
    pub fn with_keyword(mut self, name: impl Into<String>, factory: KeywordFactory) -> Self {
        self.keywords.insert(name.into(), factory);
        self
    }

    pub fn without_keyword(mut self, name: &str) -> Self {
        self.keywords.shift_remove(name);
        self
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn version(&self) -> SpecVersion {
        self.version
    }

    /// `id` for draft 4 and OpenAPI 3.0, `$id` otherwise.
    pub fn id_keyword(&self) -> &'static str {
        self.id_keyword
    }

    pub fn keyword(&self, name: &str) -> Option<&KeywordFactory> {
        self.keywords.get(name)
    }

    pub fn has_discriminator(&self) -> bool {
        self.discriminator
    }

    /// OpenAPI 3.0 `nullable` widens `type` to accept null.
    pub fn has_nullable(&self) -> bool {
        self.nullable
    }

    pub fn supports_anchor(&self) -> bool {
        self.version >= SpecVersion::Draft201909
    }

    pub fn supports_dynamic_anchor(&self) -> bool {
        self.version >= SpecVersion::Draft202012
    }

    pub fn supports_recursive_anchor(&self) -> bool {
        self.version == SpecVersion::Draft201909
    }

    /// Before 2019-09 a `$ref` hides its sibling keywords.
    pub fn ref_overrides_siblings(&self) -> bool {
        self.version < SpecVersion::Draft201909
    }

    /// Whether `format` asserts when the run does not say otherwise.
    pub fn asserts_format(&self) -> bool {
        self.version < SpecVersion::Draft201909
    }

    pub fn supports_unevaluated(&self) -> bool {
        self.version >= SpecVersion::Draft201909
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("iri", &self.iri)
            .field("version", &self.version)
            .field("keywords", &self.keywords.len())
            .finish()
    }
}

impl PartialEq for Dialect {
    fn eq(&self, other: &Self) -> bool {
        self.iri == other.iri
    }
}

struct Builtin {
    draft4: Arc<Dialect>,
    draft6: Arc<Dialect>,
    draft7: Arc<Dialect>,
    draft201909: Arc<Dialect>,
    draft202012: Arc<Dialect>,
    openapi30: Arc<Dialect>,
    openapi31: Arc<Dialect>,
}

static BUILTIN: Lazy<Builtin> = Lazy::new(|| {
    let mut openapi30 = Dialect::builtin(OPENAPI_30_DIALECT, SpecVersion::Draft4);
    openapi30.discriminator = true;
    openapi30.nullable = true;
    vocabulary::add_openapi(&mut openapi30.keywords, true);

    let mut openapi31 = Dialect::builtin(OPENAPI_31_DIALECT, SpecVersion::Draft202012);
    openapi31.discriminator = true;
    vocabulary::add_openapi(&mut openapi31.keywords, false);

    Builtin {
        draft4: Arc::new(Dialect::builtin(SpecVersion::Draft4.meta_schema(), SpecVersion::Draft4)),
        draft6: Arc::new(Dialect::builtin(SpecVersion::Draft6.meta_schema(), SpecVersion::Draft6)),
        draft7: Arc::new(Dialect::builtin(SpecVersion::Draft7.meta_schema(), SpecVersion::Draft7)),
        draft201909: Arc::new(Dialect::builtin(
            SpecVersion::Draft201909.meta_schema(),
            SpecVersion::Draft201909,
        )),
        draft202012: Arc::new(Dialect::builtin(
            SpecVersion::Draft202012.meta_schema(),
            SpecVersion::Draft202012,
        )),
        openapi30: Arc::new(openapi30),
        openapi31: Arc::new(openapi31),
    }
});

/// Dialects known to a registry, keyed by meta-schema IRI.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    dialects: HashMap<String, Arc<Dialect>>,
}

impl Default for DialectRegistry {
    fn default() -> Self {
        let mut registry = Self {
            dialects: HashMap::new(),
        };
        for dialect in [
            Dialect::draft4(),
            Dialect::draft6(),
            Dialect::draft7(),
            Dialect::draft201909(),
            Dialect::draft202012(),
            Dialect::openapi30(),
            Dialect::openapi31(),
        ] {
            registry.register(dialect);
        }
        registry
    }
}

impl DialectRegistry {
    pub fn register(&mut self, dialect: Arc<Dialect>) {
        self.dialects.insert(normalize_iri(dialect.iri()), dialect);
    }

    /// Looks up the dialect named by a `$schema` value.
    pub fn get(&self, iri: &str) -> Option<Arc<Dialect>> {
        self.dialects.get(&normalize_iri(iri)).cloned()
    }

    /// Returns the dialect a schema declares through `$schema`, if any.
    ///
    /// `Ok(None)` means the schema declares no `$schema`; `Err` carries the
    /// unknown IRI.
    pub fn detect(&self, schema: &Value) -> Result<Option<Arc<Dialect>>, String> {
        match schema.get("$schema").and_then(Value::as_str) {
            None => Ok(None),
            Some(iri) => self.get(iri).map(Some).ok_or_else(|| iri.to_string()),
        }
    }
}
