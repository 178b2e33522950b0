//! Per-run evaluation state.
//!
//! An [`ExecutionContext`] is created for every evaluation and owns
//! everything that run accumulates: errors, annotations, the evaluated
//! instance locations and the discriminator stack. Nothing in it is shared
//! between runs.
//!
//! Evaluated locations are kept as a stack of layers, one per schema
//! object under evaluation. Keywords mark locations in the top layer. When
//! a schema object finishes, its layer merges into the enclosing one if it
//! passed and is discarded if it failed, so a failed branch never counts
//! as having evaluated anything.

use std::collections::HashSet;

use serde_json::Value;

use crate::annotation::{Annotation, Annotations};
use crate::config::ExecutionConfig;
use crate::discriminator::DiscriminatorFrame;
use crate::error::{CompileError, EvaluationError, SchemaError};
use crate::keywords::KeywordMeta;
use crate::path::NodePath;
use crate::schema::{NodeId, SchemaGraph};

/// Early exit from an evaluation.
#[derive(Debug)]
pub enum Interrupt {
    /// Fail-fast mode hit its first assertion error.
    FailFast(SchemaError),
    /// Evaluation cannot continue.
    Abort(EvaluationError),
}

impl From<EvaluationError> for Interrupt {
    fn from(error: EvaluationError) -> Self {
        Interrupt::Abort(error)
    }
}

impl From<CompileError> for Interrupt {
    fn from(error: CompileError) -> Self {
        Interrupt::Abort(EvaluationError::Compile(error))
    }
}

/// Mutable state of one evaluation run.
pub struct ExecutionContext<'a> {
    graph: &'a SchemaGraph,
    config: &'a ExecutionConfig,
    errors: Vec<SchemaError>,
    annotations: Vec<Annotation>,
    evaluated: Vec<HashSet<NodePath>>,
    discriminators: Vec<DiscriminatorFrame>,
    fail_fast: bool,
    unevaluated_present: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(graph: &'a SchemaGraph, config: &'a ExecutionConfig) -> Self {
        Self {
            graph,
            config,
            errors: Vec::new(),
            annotations: Vec::new(),
            evaluated: vec![HashSet::new()],
            discriminators: Vec::new(),
            fail_fast: config.fail_fast,
            unevaluated_present: false,
        }
    }

    pub fn graph(&self) -> &'a SchemaGraph {
        self.graph
    }

    pub fn config(&self) -> &'a ExecutionConfig {
        self.config
    }

    /// Evaluates `instance` at `location` against a node.
    ///
    /// Runs the node's validators in order inside a fresh evaluated layer.
    /// If the node reported any error its annotations are marked invalid
    /// and its layer is discarded.
    pub fn evaluate(&mut self, node: NodeId, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let node = self.graph.node(node);
        let validators = self.graph.validators(&node)?;

        let errors_before = self.errors.len();
        let annotations_before = self.annotations.len();
        let unevaluated_before = self.unevaluated_present;
        self.unevaluated_present |= node.has_unevaluated();
        self.evaluated.push(HashSet::new());

        let outcome = validators
            .iter()
            .try_for_each(|validator| validator.validate(self, instance, location));

        self.unevaluated_present = unevaluated_before;
        let failed = outcome.is_err() || self.errors.len() > errors_before;
        if failed {
            for annotation in &mut self.annotations[annotations_before..] {
                annotation.valid = false;
            }
        }
        self.pop_layer(!failed);
        outcome
    }

    /// Evaluates a node and returns its errors instead of reporting them.
    ///
    /// Used by applicators that decide from branch results, such as
    /// `anyOf`. Fail-fast must be suspended by the caller.
    pub fn evaluate_branch(
        &mut self,
        node: NodeId,
        instance: &Value,
        location: &NodePath,
    ) -> Result<Vec<SchemaError>, Interrupt> {
        let mark = self.errors.len();
        self.evaluate(node, instance, location)?;
        Ok(self.take_errors_since(mark))
    }

    /// Removes and returns the errors reported after `mark`, a value of
    /// [`error_count`](Self::error_count).
    pub(crate) fn take_errors_since(&mut self, mark: usize) -> Vec<SchemaError> {
        self.errors.split_off(mark.min(self.errors.len()))
    }

    /// Like [`evaluate_branch`](Self::evaluate_branch), but nothing the node
    /// evaluates is visible to the current schema object. Used by `not` and
    /// `propertyNames`.
    pub fn evaluate_detached(
        &mut self,
        node: NodeId,
        instance: &Value,
        location: &NodePath,
    ) -> Result<Vec<SchemaError>, Interrupt> {
        self.evaluated.push(HashSet::new());
        let result = self.evaluate_branch(node, instance, location);
        self.pop_layer(false);
        result
    }

    /// Reports an assertion error. In fail-fast mode this interrupts the run.
    pub fn report(&mut self, error: SchemaError) -> Result<(), Interrupt> {
        if self.fail_fast {
            return Err(Interrupt::FailFast(error));
        }
        self.errors.push(error);
        Ok(())
    }

    /// Reports several errors, stopping at the first in fail-fast mode.
    pub fn report_all(&mut self, errors: impl IntoIterator<Item = SchemaError>) -> Result<(), Interrupt> {
        errors.into_iter().try_for_each(|error| self.report(error))
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Turns fail-fast off and returns the previous setting.
    pub fn suspend_fail_fast(&mut self) -> bool {
        std::mem::replace(&mut self.fail_fast, false)
    }

    pub fn restore_fail_fast(&mut self, previous: bool) {
        self.fail_fast = previous;
    }

    /// True when `anyOf`/`oneOf` may stop at the first decisive branch:
    /// nothing will read annotations or evaluated locations of the
    /// remaining branches.
    pub fn can_short_circuit(&self) -> bool {
        !self.unevaluated_present && !self.config.annotation_collection
    }

    pub(crate) fn record_annotation(&mut self, meta: &KeywordMeta, location: &NodePath, value: Value) {
        self.annotations.push(Annotation {
            keyword: meta.keyword.clone(),
            instance_location: location.clone(),
            evaluation_path: meta.evaluation_path.clone(),
            schema_location: meta.schema_location.clone(),
            value,
            valid: true,
        });
    }

    /// Marks an instance location as evaluated by the current schema object.
    pub fn mark_evaluated(&mut self, location: NodePath) {
        if let Some(layer) = self.evaluated.last_mut() {
            layer.insert(location);
        }
    }

    /// Whether the current schema object (adjacent keywords and the
    /// in-place subschemas evaluated so far) evaluated `location`.
    pub fn is_evaluated(&self, location: &NodePath) -> bool {
        self.evaluated
            .last()
            .is_some_and(|layer| layer.contains(location))
    }

    fn pop_layer(&mut self, keep: bool) {
        let Some(layer) = self.evaluated.pop() else {
            return;
        };
        if keep {
            if let Some(parent) = self.evaluated.last_mut() {
                parent.extend(layer);
            }
        }
    }

    pub(crate) fn push_discriminator(&mut self, frame: DiscriminatorFrame) {
        self.discriminators.push(frame);
    }

    pub(crate) fn pop_discriminator(&mut self) -> Option<DiscriminatorFrame> {
        self.discriminators.pop()
    }

    /// The innermost active discriminator frame.
    pub fn current_discriminator(&self) -> Option<&DiscriminatorFrame> {
        self.discriminators.last()
    }

    pub(crate) fn into_parts(self) -> (Vec<SchemaError>, Annotations) {
        (self.errors, Annotations::new(self.annotations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_failed_layer_is_discarded() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .compile(&json!({"properties": {"a": true}, "required": ["b"]}))
            .unwrap();
        let config = ExecutionConfig::new();
        let mut ctx = ExecutionContext::new(schema.graph(), &config);
        let instance = json!({"a": 1});
        ctx.evaluate(schema.node_id(), &instance, &NodePath::root()).unwrap();
        assert_eq!(ctx.error_count(), 1);
        assert!(!ctx.is_evaluated(&NodePath::root().push_field("a")));
    }

    #[test]
    fn test_passing_layer_merges_into_parent() {
        let registry = SchemaRegistry::new();
        let schema = registry.compile(&json!({"properties": {"a": true}})).unwrap();
        let config = ExecutionConfig::new();
        let mut ctx = ExecutionContext::new(schema.graph(), &config);
        let instance = json!({"a": 1});
        ctx.evaluate(schema.node_id(), &instance, &NodePath::root()).unwrap();
        assert!(ctx.is_evaluated(&NodePath::root().push_field("a")));
    }

    #[test]
    fn test_fail_fast_interrupts() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .compile(&json!({"required": ["a", "b"]}))
            .unwrap();
        let config = ExecutionConfig::new().with_fail_fast(true);
        let mut ctx = ExecutionContext::new(schema.graph(), &config);
        let outcome = ctx.evaluate(schema.node_id(), &json!({}), &NodePath::root());
        assert!(matches!(outcome, Err(Interrupt::FailFast(_))));
        assert_eq!(ctx.error_count(), 0);
    }

    #[test]
    fn test_suspend_and_restore_fail_fast() {
        let registry = SchemaRegistry::new();
        let schema = registry.compile(&json!(true)).unwrap();
        let config = ExecutionConfig::new().with_fail_fast(true);
        let mut ctx = ExecutionContext::new(schema.graph(), &config);
        let previous = ctx.suspend_fail_fast();
        assert!(previous);
        let error = SchemaError::new(NodePath::root(), "x");
        assert!(ctx.report(error.clone()).is_ok());
        ctx.restore_fail_fast(previous);
        assert!(matches!(ctx.report(error), Err(Interrupt::FailFast(_))));
    }
}
