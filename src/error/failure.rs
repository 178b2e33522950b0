//! Errors that abort compilation or evaluation.

use thiserror::Error;

/// Errors raised while loading an external schema resource.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{iri}': {source}")]
    Io {
        iri: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{iri}' as JSON: {source}")]
    Parse {
        iri: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{0}' cannot be mapped to a file path")]
    InvalidPath(String),
}

/// Errors raised while compiling a schema document.
///
/// Each variant names the schema location of the offending keyword.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{location}: '{id}' is not a valid schema identifier")]
    InvalidId { location: String, id: String },

    #[error("{location}: invalid anchor: {reason}")]
    InvalidAnchor { location: String, reason: String },

    #[error("{location}: $recursiveRef must be \"#\", got '{value}'")]
    InvalidRecursiveRef { location: String, value: String },

    #[error("{location}: unknown keyword '{keyword}'")]
    UnknownKeyword { location: String, keyword: String },

    #[error("{location}: invalid value for '{keyword}': {reason}")]
    InvalidKeyword {
        location: String,
        keyword: String,
        reason: String,
    },

    #[error("{location}: unknown dialect '{dialect}'")]
    UnknownDialect { location: String, dialect: String },

    #[error("{location}: discriminator conflict: {reason}")]
    Discriminator { location: String, reason: String },

    #[error("{location}: a schema must be an object or a boolean")]
    NotASchema { location: String },

    #[error("failed to load schema resource")]
    Load(#[from] LoadError),
}

impl CompileError {
    pub fn invalid_keyword(
        location: impl ToString,
        keyword: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CompileError::InvalidKeyword {
            location: location.to_string(),
            keyword: keyword.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort an evaluation run instead of being reported as
/// assertion failures.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{location}: unresolved reference '{reference}'")]
    UnresolvedRef { location: String, reference: String },

    #[error("{location}: reference nesting exceeds the maximum depth of {max_depth}")]
    MaxDepthExceeded { location: String, max_depth: usize },

    #[error(transparent)]
    Compile(#[from] CompileError),
}
