//! Reference resolution for `$ref`, `$dynamicRef` and `$recursiveRef`.
//!
//! Static resolution returns the lexical target node. [`materialize`] then
//! copies it as the destination of a reference hop, so the copy's
//! evaluation parent is the referencing node. Dynamic and recursive
//! resolution walk that evaluation-parent chain outward.

use std::sync::Arc;

use tracing::trace;

use crate::error::{CompileError, EvaluationError};
use crate::location::{is_anchor_fragment, percent_decode, resolve_iri, split_fragment, SchemaLocation};
use crate::path::NodePath;
use crate::resources::Keyspace;
use crate::schema::{NodeId, SchemaGraph};

/// Base IRI for references made by `referrer`.
///
/// Before 2019-09 a `$ref` ignores its siblings, so a sibling identifier
/// does not change the base: the lexical parent's location is used.
fn base_iri(graph: &SchemaGraph, referrer: NodeId) -> Option<String> {
    let node = graph.node(referrer);
    let declares_id = node.raw().get(node.dialect().id_keyword()).is_some();
    let base = match node.lexical_parent() {
        Some(parent) if declares_id && node.dialect().ref_overrides_siblings() => graph.node(parent),
        _ => node,
    };
    base.location().absolute_iri().map(str::to_string)
}

/// Resolves a `$ref` value to its lexical target node.
///
/// Returns `Ok(None)` when nothing matches; loading or compiling an
/// external resource may fail with a [`CompileError`].
pub fn resolve_static(
    graph: &SchemaGraph,
    referrer: NodeId,
    reference: &str,
) -> Result<Option<NodeId>, CompileError> {
    trace!(reference, "resolving reference");
    if reference == "#" {
        return Ok(Some(graph.resource_root(referrer)));
    }
    let base = base_iri(graph, referrer);
    let (document, fragment) = split_fragment(reference);
    let fragment = fragment.map(percent_decode).filter(|f| !f.is_empty());

    if document.is_empty() {
        return match fragment {
            Some(name) if is_anchor_fragment(&name) => Ok(lookup_anchor(graph, &resolve_iri(base.as_deref(), reference))),
            Some(pointer) => {
                let root = graph.resource_root(referrer);
                walk_pointer(graph, root, &pointer)
            }
            None => Ok(Some(graph.resource_root(referrer))),
        };
    }

    let target_iri = resolve_iri(base.as_deref(), document);
    let dialect = Arc::clone(graph.node(referrer).dialect_arc());
    let Some(resource) = graph.load_document(&target_iri, &dialect)? else {
        return Ok(None);
    };
    match fragment {
        None => Ok(Some(resource)),
        Some(name) if is_anchor_fragment(&name) => {
            Ok(lookup_anchor(graph, &format!("{}#{}", target_iri, name)))
        }
        Some(pointer) => walk_pointer(graph, resource, &pointer),
    }
}

fn lookup_anchor(graph: &SchemaGraph, key: &str) -> Option<NodeId> {
    let resources = graph.resources();
    resources
        .lookup(Keyspace::Resources, key)
        .or_else(|| resources.lookup(Keyspace::DynamicAnchors, key))
}

fn walk_pointer(graph: &SchemaGraph, root: NodeId, pointer: &str) -> Result<Option<NodeId>, CompileError> {
    match NodePath::parse_pointer(pointer) {
        Some(path) => graph.sub_schema(root, &path),
        None => Ok(None),
    }
}

/// Resolves a `$dynamicRef` value.
///
/// Without a matching dynamic anchor at the statically resolved target this
/// behaves like `$ref`. Otherwise the evaluation-parent chain is walked
/// outward and, at every change of resource IRI, a dynamic anchor of the
/// same name in that resource replaces the candidate. The outermost match
/// wins.
pub fn resolve_dynamic(
    graph: &SchemaGraph,
    referrer: NodeId,
    reference: &str,
) -> Result<Option<NodeId>, CompileError> {
    let base = base_iri(graph, referrer);
    let resolved = resolve_iri(base.as_deref(), reference);
    let (document, fragment) = split_fragment(&resolved);
    let anchor = match fragment {
        Some(name) if is_anchor_fragment(name) => name,
        _ => return resolve_static(graph, referrer, reference),
    };
    if !document.is_empty() {
        // Make sure the referenced resource is compiled before consulting
        // the dynamic anchor table.
        let dialect = Arc::clone(graph.node(referrer).dialect_arc());
        graph.load_document(document, &dialect)?;
    }
    let resources = graph.resources();
    let Some(mut found) = resources.lookup(Keyspace::DynamicAnchors, &resolved) else {
        return resolve_static(graph, referrer, reference);
    };

    let mut current_iri = document.to_string();
    for ancestor in graph.evaluation_ancestors(referrer) {
        let ancestor_iri = ancestor.location().absolute_iri().unwrap_or("");
        if ancestor_iri != current_iri {
            current_iri = ancestor_iri.to_string();
            let key = resolve_iri(ancestor.location().absolute_iri(), &format!("#{}", anchor));
            if let Some(candidate) = resources.lookup(Keyspace::DynamicAnchors, &key) {
                found = candidate;
            }
        }
    }
    trace!(reference, target = %graph.node(found).location(), "resolved dynamic reference");
    Ok(Some(found))
}

/// Resolves `$recursiveRef: "#"`.
///
/// Starts at the enclosing resource root. When that root sets
/// `$recursiveAnchor: true`, every resource root further out on the
/// evaluation-parent chain that also sets it replaces the target.
pub fn resolve_recursive(graph: &SchemaGraph, referrer: NodeId) -> NodeId {
    let root = graph.resource_root(referrer);
    let root_node = graph.node(root);
    if !root_node.is_recursive_anchor() {
        return root;
    }
    let mut found = root;
    let mut current_iri = root_node.location().absolute_iri().unwrap_or("").to_string();
    for ancestor in graph.evaluation_ancestors(root) {
        let ancestor_iri = ancestor.location().absolute_iri().unwrap_or("");
        if ancestor_iri != current_iri {
            current_iri = ancestor_iri.to_string();
            let candidate = graph.resource_root(ancestor.id());
            if graph.node(candidate).is_recursive_anchor() {
                found = candidate;
            }
        }
    }
    found
}

/// Copies `target` as the destination of a reference hop from `referrer`,
/// enforcing the configured maximum reference depth.
pub fn materialize(
    graph: &SchemaGraph,
    target: NodeId,
    referrer: NodeId,
    evaluation_path: NodePath,
) -> Result<NodeId, EvaluationError> {
    let referrer_node = graph.node(referrer);
    let max_depth = graph.config().max_ref_depth;
    if referrer_node.ref_depth() >= max_depth {
        return Err(EvaluationError::MaxDepthExceeded {
            location: evaluation_path.to_string(),
            max_depth,
        });
    }
    Ok(graph.from_ref(target, referrer, evaluation_path))
}

/// True if `location` already appears on the evaluation-parent chain of
/// `referrer` (the referrer included), which makes following it a cycle.
pub fn is_cycle(graph: &SchemaGraph, referrer: NodeId, location: &SchemaLocation) -> bool {
    graph.node(referrer).location() == location
        || graph
            .evaluation_ancestors(referrer)
            .any(|ancestor| ancestor.location() == location)
}

/// Length of the evaluation-parent chain of `id`.
pub fn chain_depth(graph: &SchemaGraph, id: NodeId) -> usize {
    graph.evaluation_ancestors(id).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_resolve_pointer_and_anchor() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .compile_with_iri(
                "https://example.com/root.json",
                &json!({
                    "$defs": {
                        "a": {"$anchor": "alpha", "type": "string"},
                        "b": {"type": "integer"}
                    }
                }),
            )
            .unwrap();
        let graph = schema.graph();
        let by_anchor = resolve_static(graph, schema.node_id(), "#alpha").unwrap().unwrap();
        assert_eq!(
            graph.node(by_anchor).location().to_string(),
            "https://example.com/root.json#/$defs/a"
        );
        let by_pointer = resolve_static(graph, schema.node_id(), "#/$defs/b").unwrap().unwrap();
        assert_eq!(graph.node(by_pointer).raw(), &json!({"type": "integer"}));
        assert!(resolve_static(graph, schema.node_id(), "#/$defs/missing").unwrap().is_none());
        assert!(resolve_static(graph, schema.node_id(), "#nope").unwrap().is_none());
    }

    #[test]
    fn test_resolve_embedded_resource() {
        let registry = SchemaRegistry::new();
        let schema = registry
            .compile_with_iri(
                "https://example.com/root.json",
                &json!({
                    "$defs": {
                        "inner": {"$id": "inner.json", "$defs": {"x": {"const": 1}}}
                    }
                }),
            )
            .unwrap();
        let graph = schema.graph();
        let inner = resolve_static(graph, schema.node_id(), "inner.json").unwrap().unwrap();
        assert_eq!(graph.node(inner).location().to_string(), "https://example.com/inner.json");
        let x = resolve_static(graph, schema.node_id(), "inner.json#/$defs/x").unwrap().unwrap();
        assert_eq!(graph.node(x).raw(), &json!({"const": 1}));
    }

    #[test]
    fn test_materialize_sets_evaluation_parent() {
        let registry = SchemaRegistry::new();
        let schema = registry.compile(&json!({"$defs": {"a": true}})).unwrap();
        let graph = schema.graph();
        let target = resolve_static(graph, schema.node_id(), "#/$defs/a").unwrap().unwrap();
        let path = NodePath::root().push_field("$ref");
        let copy = materialize(graph, target, schema.node_id(), path.clone()).unwrap();
        let copy_node = graph.node(copy);
        assert_eq!(copy_node.evaluation_parent(), Some(schema.node_id()));
        assert_eq!(copy_node.evaluation_path(), &path);
        assert_eq!(copy_node.location(), graph.node(target).location());
        assert_eq!(chain_depth(graph, copy), 1);
    }

    #[test]
    fn test_materialize_respects_max_depth() {
        let registry = SchemaRegistry::builder()
            .config(crate::RegistryConfig::default().with_max_ref_depth(1))
            .build();
        let schema = registry.compile(&json!({"$defs": {"a": true}})).unwrap();
        let graph = schema.graph();
        let target = resolve_static(graph, schema.node_id(), "#/$defs/a").unwrap().unwrap();
        let first = materialize(graph, target, schema.node_id(), NodePath::root()).unwrap();
        let second = materialize(graph, target, first, NodePath::root());
        assert!(matches!(second, Err(EvaluationError::MaxDepthExceeded { max_depth: 1, .. })));
    }

    #[test]
    fn test_is_cycle() {
        let registry = SchemaRegistry::new();
        let schema = registry.compile(&json!({"properties": {"a": {"$ref": "#"}}})).unwrap();
        let graph = schema.graph();
        let root_location = graph.node(schema.node_id()).location().clone();
        let child = resolve_static(graph, schema.node_id(), "#/properties/a").unwrap().unwrap();
        assert!(is_cycle(graph, child, &root_location));
    }
}
