//! Error types for compilation, evaluation and assertion failures.
//!
//! Assertion failures ([`SchemaError`]) are collected and reported; the
//! failures in [`failure`] abort the operation that raised them.

mod failure;
mod schema_error;

pub use failure::{CompileError, EvaluationError, LoadError};
pub use schema_error::{SchemaError, SchemaErrors};
