//! Assertion error types.
//!
//! This module provides [`SchemaError`] for a single failed assertion and
//! [`SchemaErrors`] for accumulating several of them.

use std::fmt::{self, Display};

use stillwater::prelude::*;

use crate::location::SchemaLocation;
use crate::path::NodePath;

/// A single failed assertion with full context.
///
/// `SchemaError` captures:
/// - **instance_location**: where in the instance the failure occurred
/// - **evaluation_path**: the keywords traversed to reach the failing
///   keyword, including reference hops
/// - **schema_location**: canonical location of the failing keyword
/// - **keyword**: the keyword that failed
/// - **code**: machine-readable error code, usually the keyword name
/// - **got** / **expected**: optional rendered values
///
/// # Example
///
/// ```rust
/// use verdict::{NodePath, SchemaError};
///
/// let error = SchemaError::new(
///     NodePath::root().push_field("email"),
///     "does not match the email format"
/// )
/// .with_keyword("format")
/// .with_got("\"not-an-email\"")
/// .with_expected("email");
///
/// assert_eq!(error.code, "format");
/// assert_eq!(error.to_string(), "/email: does not match the email format (expected: email) (got: \"not-an-email\")");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// The location in the instance that failed validation.
    pub instance_location: NodePath,
    /// Keywords traversed from the root schema, including `$ref` segments.
    pub evaluation_path: NodePath,
    /// Canonical location of the failing keyword.
    pub schema_location: SchemaLocation,
    /// The keyword that produced the failure.
    pub keyword: String,
    /// Human-readable error message.
    pub message: String,
    /// The actual value that was received (rendered).
    pub got: Option<String>,
    /// Description of what was expected.
    pub expected: Option<String>,
    /// Machine-readable error code.
    pub code: String,
}

impl SchemaError {
    /// Creates a new error at the given instance location.
    ///
    /// The code defaults to "validation_error"; `with_keyword` replaces it
    /// with the keyword name.
    pub fn new(instance_location: NodePath, message: impl Into<String>) -> Self {
        Self {
            instance_location,
            evaluation_path: NodePath::root(),
            schema_location: SchemaLocation::default(),
            keyword: String::new(),
            message: message.into(),
            got: None,
            expected: None,
            code: "validation_error".to_string(),
        }
    }

    /// Sets the keyword, and the code to the same name.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self.code = self.keyword.clone();
        self
    }

    /// Sets the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Sets where in the schema the failing keyword lives.
    pub fn at_schema(mut self, evaluation_path: NodePath, schema_location: SchemaLocation) -> Self {
        self.evaluation_path = evaluation_path;
        self.schema_location = schema_location;
        self
    }

    /// Sets the "got" (actual value) field.
    pub fn with_got(mut self, got: impl Into<String>) -> Self {
        self.got = Some(got.into());
        self
    }

    /// Sets the "expected" field.
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path_str = if self.instance_location.is_root() {
            "(root)".to_string()
        } else {
            self.instance_location.to_string()
        };

        write!(f, "{}: {}", path_str, self.message)?;

        if let Some(ref expected) = self.expected {
            write!(f, " (expected: {})", expected)?;
        }
        if let Some(ref got) = self.got {
            write!(f, " (got: {})", got)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<SchemaError>();
    assert_sync::<SchemaError>();
};

/// A non-empty collection of assertion errors.
///
/// `SchemaErrors` wraps a `NonEmptyVec<SchemaError>` so that a
/// `Validation<T, SchemaErrors>` failure always carries at least one error.
/// It implements `Semigroup`, so results of independent evaluations can be
/// combined:
///
/// ```rust
/// use verdict::{NodePath, SchemaError, SchemaErrors};
/// use stillwater::prelude::*;
///
/// let errors1 = SchemaErrors::single(
///     SchemaError::new(NodePath::root().push_field("name"), "required")
/// );
/// let errors2 = SchemaErrors::single(
///     SchemaError::new(NodePath::root().push_field("email"), "invalid format")
/// );
///
/// let combined = errors1.combine(errors2);
/// assert_eq!(combined.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaErrors(NonEmptyVec<SchemaError>);

impl SchemaErrors {
    pub fn single(error: SchemaError) -> Self {
        Self(NonEmptyVec::singleton(error))
    }

    /// Creates a `SchemaErrors` from a vec, or `None` if it is empty.
    pub fn from_vec(errors: Vec<SchemaError>) -> Option<Self> {
        let mut iter = errors.into_iter();
        let head = iter.next()?;
        Some(iter.fold(Self::single(head), |acc, error| {
            acc.combine(Self::single(error))
        }))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API consistency.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaError> {
        self.0.iter()
    }

    /// Returns all errors at the specified instance location.
    pub fn at_path(&self, path: &NodePath) -> Vec<&SchemaError> {
        self.0
            .iter()
            .filter(|e| &e.instance_location == path)
            .collect()
    }

    /// Returns all errors with the specified code.
    pub fn with_code(&self, code: &str) -> Vec<&SchemaError> {
        self.0.iter().filter(|e| e.code == code).collect()
    }

    pub fn first(&self) -> &SchemaError {
        self.0.head()
    }

    pub fn into_vec(self) -> Vec<SchemaError> {
        self.0.into_vec()
    }
}

impl Semigroup for SchemaErrors {
    fn combine(self, other: Self) -> Self {
        SchemaErrors(self.0.combine(other.0))
    }
}

impl Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} error(s):", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

impl IntoIterator for SchemaErrors {
    type Item = SchemaError;
    type IntoIter = std::vec::IntoIter<SchemaError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}
