//! Compiled schemas.
//!
//! A [`Schema`] is a handle on the root node of a compiled document. It is
//! cheap to clone and can be shared between threads; every evaluation gets
//! its own [`ExecutionContext`].
//!
//! # Example
//!
//! ```rust
//! use verdict::SchemaRegistry;
//! use serde_json::json;
//!
//! let schema = SchemaRegistry::new()
//!     .compile(&json!({"type": "string", "minLength": 1}))
//!     .unwrap();
//!
//! assert!(schema.is_valid(&json!("hello")).unwrap());
//! assert!(!schema.is_valid(&json!("")).unwrap());
//! ```

mod graph;
mod node;

pub use graph::{EvaluationAncestors, SchemaGraph};
pub use node::{NodeId, SchemaNode};

use std::sync::Arc;

use rayon::prelude::*;
use serde_json::Value;
use stillwater::Validation;
use tracing::trace;

use crate::config::ExecutionConfig;
use crate::context::{ExecutionContext, Interrupt};
use crate::error::{EvaluationError, SchemaErrors};
use crate::location::SchemaLocation;
use crate::output::{Evaluation, OutputFormat};
use crate::path::NodePath;

/// A compiled schema document.
#[derive(Clone)]
pub struct Schema {
    graph: Arc<SchemaGraph>,
    root: NodeId,
}

impl Schema {
    pub(crate) fn new(graph: Arc<SchemaGraph>, root: NodeId) -> Self {
        Self { graph, root }
    }

    /// The graph holding every node of this compilation.
    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn node_id(&self) -> NodeId {
        self.root
    }

    /// Canonical location of the root node.
    pub fn location(&self) -> SchemaLocation {
        self.graph.node(self.root).location().clone()
    }

    /// The document this schema was compiled from.
    pub fn raw(&self) -> Value {
        self.graph.node(self.root).raw().clone()
    }

    /// Evaluates `instance` and returns every error and annotation.
    ///
    /// In fail-fast mode the first error ends the run and is the only
    /// error returned. Unresolvable references and reference chains deeper
    /// than the configured maximum abort with an [`EvaluationError`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use verdict::{ExecutionConfig, SchemaRegistry};
    /// use serde_json::json;
    ///
    /// let schema = SchemaRegistry::new()
    ///     .compile(&json!({"required": ["a", "b"]}))
    ///     .unwrap();
    ///
    /// let all = schema.evaluate(&json!({}), &ExecutionConfig::new()).unwrap();
    /// assert_eq!(all.errors.len(), 2);
    ///
    /// let first = schema
    ///     .evaluate(&json!({}), &ExecutionConfig::new().with_fail_fast(true))
    ///     .unwrap();
    /// assert_eq!(first.errors.len(), 1);
    /// ```
    pub fn evaluate(&self, instance: &Value, config: &ExecutionConfig) -> Result<Evaluation, EvaluationError> {
        let mut ctx = ExecutionContext::new(&self.graph, config);
        let outcome = ctx.evaluate(self.root, instance, &NodePath::root());
        let (mut errors, annotations) = ctx.into_parts();
        match outcome {
            Ok(()) => {}
            Err(Interrupt::FailFast(error)) => {
                trace!(location = %error.instance_location, "fail-fast stopped evaluation");
                errors = vec![error];
            }
            Err(Interrupt::Abort(error)) => return Err(error),
        }
        Ok(Evaluation { errors, annotations })
    }

    /// Validates `instance`, accumulating every error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use verdict::SchemaRegistry;
    /// use serde_json::json;
    ///
    /// let schema = SchemaRegistry::new()
    ///     .compile(&json!({"properties": {"age": {"type": "integer", "minimum": 0}}}))
    ///     .unwrap();
    ///
    /// let result = schema.validate(&json!({"age": -1})).unwrap();
    /// assert!(result.is_failure());
    /// ```
    pub fn validate(&self, instance: &Value) -> Result<Validation<(), SchemaErrors>, EvaluationError> {
        let evaluation = self.evaluate(instance, &ExecutionConfig::default())?;
        Ok(match SchemaErrors::from_vec(evaluation.errors) {
            Some(errors) => Validation::Failure(errors),
            None => Validation::Success(()),
        })
    }

    /// Whether `instance` is valid. Stops at the first error.
    pub fn is_valid(&self, instance: &Value) -> Result<bool, EvaluationError> {
        let config = ExecutionConfig::new().with_fail_fast(true);
        Ok(self.evaluate(instance, &config)?.is_valid())
    }

    /// Evaluates and renders the result through `format`.
    pub fn validate_with<F: OutputFormat>(
        &self,
        instance: &Value,
        config: &ExecutionConfig,
        format: &F,
    ) -> Result<F::Output, EvaluationError> {
        Ok(format.format(self.evaluate(instance, config)?))
    }

    /// Evaluates many instances in parallel. Results keep the input order.
    pub fn validate_batch(
        &self,
        instances: &[Value],
        config: &ExecutionConfig,
    ) -> Vec<Result<Evaluation, EvaluationError>> {
        instances
            .par_iter()
            .map(|instance| self.evaluate(instance, config))
            .collect()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("location", &self.location().to_string())
            .field("nodes", &self.graph.len())
            .finish()
    }
}
