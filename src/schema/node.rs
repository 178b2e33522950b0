//! Schema nodes.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::dialect::Dialect;
use crate::keywords::Keyword;
use crate::location::SchemaLocation;
use crate::path::NodePath;
use crate::value::TypeSet;

/// Index of a node in its [`SchemaGraph`](super::SchemaGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// One compiled schema object or boolean schema.
///
/// A node reached through a reference hop is a separate node sharing the
/// target's location and raw value, whose `evaluation_parent` is the
/// referencing node. Its validators are built on first evaluation.
pub struct SchemaNode {
    pub(crate) id: NodeId,
    pub(crate) location: SchemaLocation,
    pub(crate) evaluation_path: NodePath,
    pub(crate) raw: Arc<Value>,
    pub(crate) dialect: Arc<Dialect>,
    pub(crate) lexical_parent: Option<NodeId>,
    pub(crate) evaluation_parent: Option<NodeId>,
    pub(crate) resource_id: Option<String>,
    pub(crate) recursive_anchor: bool,
    pub(crate) declared_type: Option<TypeSet>,
    pub(crate) has_unevaluated: bool,
    pub(crate) ref_depth: usize,
    pub(crate) validators: OnceCell<Vec<Box<dyn Keyword>>>,
    pub(crate) preloaded: AtomicBool,
}

impl SchemaNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.location
    }

    pub fn evaluation_path(&self) -> &NodePath {
        &self.evaluation_path
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub(crate) fn dialect_arc(&self) -> &Arc<Dialect> {
        &self.dialect
    }

    pub fn lexical_parent(&self) -> Option<NodeId> {
        self.lexical_parent
    }

    /// The node this one was reached from: the referencing node after a
    /// reference hop, the lexical parent otherwise.
    pub fn evaluation_parent(&self) -> Option<NodeId> {
        self.evaluation_parent.or(self.lexical_parent)
    }

    /// Canonical IRI of the resource this node identifies, if it declares
    /// one or is a document root.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    pub fn is_recursive_anchor(&self) -> bool {
        self.recursive_anchor
    }

    /// The `type` keyword, when it is well formed.
    pub fn declared_type(&self) -> Option<&TypeSet> {
        self.declared_type.as_ref()
    }

    pub fn has_unevaluated(&self) -> bool {
        self.has_unevaluated
    }

    /// Number of reference hops on this node's evaluation-parent chain.
    pub fn ref_depth(&self) -> usize {
        self.ref_depth
    }

    /// True once the validators have been built.
    pub fn is_loaded(&self) -> bool {
        self.validators.get().is_some()
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaNode")
            .field("id", &self.id)
            .field("location", &self.location.to_string())
            .field("evaluation_path", &self.evaluation_path.to_string())
            .field("dialect", &self.dialect.iri())
            .field("lexical_parent", &self.lexical_parent)
            .field("evaluation_parent", &self.evaluation_parent)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
