//! `$ref`, `$dynamicRef` and `$recursiveRef`.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace};

use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::error::{CompileError, EvaluationError};
use crate::path::NodePath;
use crate::resolver::{chain_depth, is_cycle, materialize, resolve_dynamic, resolve_recursive, resolve_static};
use crate::schema::{NodeId, SchemaGraph};

enum RefKind {
    Static,
    Dynamic,
    Recursive,
}

/// A reference keyword: `$ref`, `$dynamicRef` or `$recursiveRef`.
///
/// Following a reference evaluates a copy of the located node whose
/// evaluation parent is the node holding the keyword. With reference
/// caching on, the first resolution is kept in `target` for good. With
/// caching off the reference is located again on every evaluation, but
/// each located node is copied only once and the copy is reused from
/// `copies`.
pub struct RefKeyword {
    meta: KeywordMeta,
    reference: String,
    kind: RefKind,
    target: OnceCell<NodeId>,
    copies: RwLock<HashMap<NodeId, NodeId>>,
}

fn compile(input: &KeywordInput<'_>, kind: RefKind) -> CompileResult {
    let reference = input
        .value
        .as_str()
        .ok_or_else(|| input.invalid("expected a string"))?
        .to_string();
    Ok(Some(Box::new(RefKeyword {
        meta: input.meta(),
        reference,
        kind,
        target: OnceCell::new(),
        copies: RwLock::new(HashMap::new()),
    })))
}

pub fn compile_ref(input: &KeywordInput<'_>) -> CompileResult {
    compile(input, RefKind::Static)
}

pub fn compile_dynamic_ref(input: &KeywordInput<'_>) -> CompileResult {
    compile(input, RefKind::Dynamic)
}

pub fn compile_recursive_ref(input: &KeywordInput<'_>) -> CompileResult {
    if input.value != &Value::String("#".to_string()) {
        return Err(CompileError::InvalidRecursiveRef {
            location: input.meta().schema_location.to_string(),
            value: input.value.to_string(),
        });
    }
    compile(input, RefKind::Recursive)
}

impl RefKeyword {
    fn locate(&self, graph: &SchemaGraph) -> Result<Option<NodeId>, CompileError> {
        match self.kind {
            RefKind::Static => resolve_static(graph, self.meta.node, &self.reference),
            RefKind::Dynamic => resolve_dynamic(graph, self.meta.node, &self.reference),
            RefKind::Recursive => Ok(Some(resolve_recursive(graph, self.meta.node))),
        }
    }

    fn located(&self, graph: &SchemaGraph) -> Result<NodeId, EvaluationError> {
        self.locate(graph)?.ok_or_else(|| EvaluationError::UnresolvedRef {
            location: self.meta.schema_location.to_string(),
            reference: self.reference.clone(),
        })
    }

    /// The copy of `located` this keyword hops to, created on first use.
    fn copy_of(&self, graph: &SchemaGraph, located: NodeId) -> Result<NodeId, EvaluationError> {
        if let Some(copy) = self.copies.read().get(&located) {
            return Ok(*copy);
        }
        let mut copies = self.copies.write();
        if let Some(copy) = copies.get(&located) {
            return Ok(*copy);
        }
        let copy = materialize(graph, located, self.meta.node, self.meta.evaluation_path.clone())?;
        copies.insert(located, copy);
        Ok(copy)
    }

    fn target(&self, graph: &SchemaGraph) -> Result<NodeId, EvaluationError> {
        if graph.config().cache_refs {
            return self
                .target
                .get_or_try_init(|| {
                    let located = self.located(graph)?;
                    self.copy_of(graph, located)
                })
                .copied();
        }
        let located = self.located(graph)?;
        self.copy_of(graph, located)
    }
}

impl Keyword for RefKeyword {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let target = self.target(ctx.graph())?;
        ctx.evaluate(target, instance, location)
    }

    fn subschemas(&self) -> Vec<NodeId> {
        let mut copies: Vec<NodeId> = self.copies.read().values().copied().collect();
        copies.sort();
        copies
    }

    /// Resolves the reference and builds its target, unless the target is
    /// already on the evaluation-parent chain or the chain is too long.
    /// Resolution failures are left for evaluation time.
    fn preload(&self, graph: &SchemaGraph) -> Result<(), CompileError> {
        let max_depth = graph.config().preload_max_nesting_depth;
        if chain_depth(graph, self.meta.node) >= max_depth {
            debug!(reference = %self.reference, max_depth, "preload stopped at nesting limit");
            return Ok(());
        }
        let located = match self.locate(graph) {
            Ok(Some(located)) => located,
            Ok(None) | Err(_) => {
                trace!(reference = %self.reference, "reference left unresolved during preload");
                return Ok(());
            }
        };
        if is_cycle(graph, self.meta.node, graph.node(located).location()) {
            debug!(reference = %self.reference, "preload stopped at cycle");
            return Ok(());
        }
        match self.target(graph) {
            Ok(copy) => graph.preload(copy),
            Err(_) => Ok(()),
        }
    }
}
