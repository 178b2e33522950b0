//! The schema graph: an arena of nodes plus the compiler that fills it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::node::{NodeId, SchemaNode};
use crate::config::{RegistryConfig, UnknownKeywordPolicy};
use crate::dialect::{Dialect, DialectRegistry};
use crate::error::CompileError;
use crate::keywords::value::{compile_annotation, BooleanSchema};
use crate::keywords::{evaluation_rank, CompileResult, Keyword, KeywordInput};
use crate::loader::ResourceLoader;
use crate::location::{resolve_iri, split_fragment, SchemaLocation};
use crate::path::{step, NodePath};
use crate::resources::{Keyspace, ResourceRegistry};
use crate::value::TypeSet;

/// All nodes of one compilation unit together with its resource tables.
///
/// Nodes are only ever appended. Lookups clone the node's `Arc`, so no lock
/// is held while a node is compiled or evaluated.
pub struct SchemaGraph {
    nodes: RwLock<Vec<Arc<SchemaNode>>>,
    resources: ResourceRegistry,
    config: RegistryConfig,
    dialects: DialectRegistry,
    default_dialect: Arc<Dialect>,
    loader: Arc<dyn ResourceLoader>,
}

struct Identity {
    location: SchemaLocation,
    resource_id: Option<String>,
    anchor_key: Option<String>,
}

impl SchemaGraph {
    pub(crate) fn new(
        config: RegistryConfig,
        dialects: DialectRegistry,
        default_dialect: Arc<Dialect>,
        loader: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            resources: ResourceRegistry::new(),
            config,
            dialects,
            default_dialect,
            loader,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn default_dialect(&self) -> &Arc<Dialect> {
        &self.default_dialect
    }

    pub fn node(&self, id: NodeId) -> Arc<SchemaNode> {
        Arc::clone(&self.nodes.read()[id.0])
    }

    /// Number of nodes created so far, reference copies included.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    fn push(&self, build: impl FnOnce(NodeId) -> SchemaNode) -> NodeId {
        let mut nodes = self.nodes.write();
        let id = NodeId(nodes.len());
        nodes.push(Arc::new(build(id)));
        id
    }

    /// Compiles a schema value into a new node and, eagerly, its lexical
    /// subtree.
    ///
    /// The node is registered before its validators are built, so lookups
    /// made while compiling the subtree can already find it.
    pub(crate) fn new_node(
        &self,
        location: SchemaLocation,
        evaluation_path: NodePath,
        raw: Arc<Value>,
        parent: Option<NodeId>,
        dialect: Option<Arc<Dialect>>,
    ) -> Result<NodeId, CompileError> {
        if !raw.is_object() && !raw.is_boolean() {
            return Err(CompileError::NotASchema {
                location: location.to_string(),
            });
        }
        let parent_node = parent.map(|p| self.node(p));
        let inherited = dialect
            .or_else(|| parent_node.as_ref().map(|p| Arc::clone(&p.dialect)))
            .unwrap_or_else(|| Arc::clone(&self.default_dialect));
        let dialect = self.detect_dialect(&raw, inherited, &location)?;
        let identity = self.identity(&raw, &dialect, location)?;
        let recursive_anchor = read_recursive_anchor(&raw, &dialect, &identity.location)?;
        let nullable = dialect.has_nullable()
            && raw.get("nullable").and_then(Value::as_bool) == Some(true);
        let declared_type = raw
            .get("type")
            .and_then(TypeSet::from_value)
            .filter(|_| !nullable);
        let has_unevaluated = dialect.supports_unevaluated()
            && (raw.get("unevaluatedProperties").is_some() || raw.get("unevaluatedItems").is_some());

        let Identity {
            location,
            resource_id,
            anchor_key,
        } = identity;
        let is_root = parent.is_none();
        let ref_depth = parent_node.as_ref().map_or(0, |p| p.ref_depth);

        let id = self.push(|id| SchemaNode {
            id,
            location,
            evaluation_path,
            raw,
            dialect,
            lexical_parent: parent,
            evaluation_parent: None,
            resource_id,
            recursive_anchor,
            declared_type,
            has_unevaluated,
            ref_depth,
            validators: OnceCell::new(),
            preloaded: AtomicBool::new(false),
        });

        let node = self.node(id);
        self.resources
            .register(Keyspace::References, node.location.key(), id);
        if node.resource_id.is_some() || is_root {
            self.resources
                .register(Keyspace::Resources, node.location.key(), id);
        }
        if let Some(key) = anchor_key {
            self.resources.register(Keyspace::Resources, key, id);
        }
        self.register_anchors(&node)?;

        self.validators(&node)?;
        Ok(id)
    }

    /// Copies `target` as the destination of a reference hop from
    /// `referrer`. The copy starts without validators.
    pub(crate) fn from_ref(&self, target: NodeId, referrer: NodeId, evaluation_path: NodePath) -> NodeId {
        let target = self.node(target);
        let ref_depth = self.node(referrer).ref_depth + 1;
        self.push(|id| SchemaNode {
            id,
            location: target.location.clone(),
            evaluation_path,
            raw: Arc::clone(&target.raw),
            dialect: Arc::clone(&target.dialect),
            lexical_parent: target.lexical_parent,
            evaluation_parent: Some(referrer),
            resource_id: target.resource_id.clone(),
            recursive_anchor: target.recursive_anchor,
            declared_type: target.declared_type.clone(),
            has_unevaluated: target.has_unevaluated,
            ref_depth,
            validators: OnceCell::new(),
            preloaded: AtomicBool::new(false),
        })
    }

    fn detect_dialect(
        &self,
        raw: &Value,
        inherited: Arc<Dialect>,
        location: &SchemaLocation,
    ) -> Result<Arc<Dialect>, CompileError> {
        match self.dialects.detect(raw) {
            Ok(None) => Ok(inherited),
            Ok(Some(dialect)) => {
                if dialect.iri() != inherited.iri() {
                    debug!(location = %location, dialect = dialect.iri(), "switching dialect");
                }
                Ok(dialect)
            }
            Err(unknown) if self.config.reject_unknown_dialects => {
                Err(CompileError::UnknownDialect {
                    location: location.to_string(),
                    dialect: unknown,
                })
            }
            Err(unknown) => {
                warn!(location = %location, dialect = %unknown, "unknown $schema, keeping the enclosing dialect");
                Ok(inherited)
            }
        }
    }

    fn identity(
        &self,
        raw: &Value,
        dialect: &Dialect,
        location: SchemaLocation,
    ) -> Result<Identity, CompileError> {
        let Some(id_value) = raw.get(dialect.id_keyword()) else {
            return Ok(Identity {
                location,
                resource_id: None,
                anchor_key: None,
            });
        };
        let invalid = |id: &str| CompileError::InvalidId {
            location: location.to_string(),
            id: id.to_string(),
        };
        let id = id_value.as_str().ok_or_else(|| invalid(&id_value.to_string()))?;
        let (without_fragment, fragment) = split_fragment(id);
        let fragment = fragment.filter(|f| !f.is_empty());
        if fragment.is_some_and(|f| f.starts_with('/')) {
            return Err(invalid(id));
        }
        let resolved = if without_fragment.is_empty() {
            location.clone()
        } else {
            location.resolve_resource(without_fragment)
        };
        let resolved_iri = resolved.absolute_iri().unwrap_or("").to_string();
        if !self.config.id_validator.is_valid(id, &location, &resolved_iri) {
            return Err(invalid(id));
        }
        Ok(match fragment {
            Some(anchor) => Identity {
                anchor_key: Some(anchor_key(resolved.absolute_iri(), anchor)),
                location: if without_fragment.is_empty() { location } else { resolved },
                resource_id: None,
            },
            None => Identity {
                location: resolved,
                resource_id: Some(resolved_iri),
                anchor_key: None,
            },
        })
    }

    fn register_anchors(&self, node: &SchemaNode) -> Result<(), CompileError> {
        let raw = node.raw();
        let dialect = node.dialect();
        let base = node.location.absolute_iri();
        if dialect.supports_anchor() {
            if let Some(value) = raw.get("$anchor") {
                let name = anchor_name(value, "$anchor", &node.location)?;
                self.resources
                    .register(Keyspace::Resources, anchor_key(base, name), node.id);
            }
        }
        if dialect.supports_dynamic_anchor() {
            if let Some(value) = raw.get("$dynamicAnchor") {
                let name = anchor_name(value, "$dynamicAnchor", &node.location)?;
                let key = anchor_key(base, name);
                self.resources
                    .register(Keyspace::DynamicAnchors, key.clone(), node.id);
                self.resources.register(Keyspace::Resources, key, node.id);
            }
        }
        Ok(())
    }

    /// Returns the node's validators, building them on first access.
    pub(crate) fn validators<'n>(
        &self,
        node: &'n SchemaNode,
    ) -> Result<&'n [Box<dyn Keyword>], CompileError> {
        node.validators
            .get_or_try_init(|| self.read_validators(node))
            .map(Vec::as_slice)
    }

    fn read_validators(&self, node: &SchemaNode) -> Result<Vec<Box<dyn Keyword>>, CompileError> {
        let map = match node.raw() {
            Value::Bool(valid) => {
                let boolean: Box<dyn Keyword> = Box::new(BooleanSchema::new(node, *valid));
                return Ok(vec![boolean]);
            }
            Value::Object(map) => map,
            _ => {
                return Err(CompileError::NotASchema {
                    location: node.location.to_string(),
                })
            }
        };

        let mut validators: Vec<Box<dyn Keyword>> = Vec::with_capacity(map.len());
        for (name, value) in map {
            let input = KeywordInput {
                graph: self,
                node,
                keyword: name,
                value,
            };
            let compiled = match node.dialect().keyword(name) {
                Some(factory) => factory(&input)?,
                None => self.unknown_keyword(&input)?,
            };
            validators.extend(compiled);
        }

        // Siblings were still compiled above so their identifiers register.
        if node.dialect().ref_overrides_siblings() && map.contains_key("$ref") {
            validators.retain(|v| v.meta().keyword == "$ref");
        }
        validators.sort_by_key(|v| evaluation_rank(&v.meta().keyword));
        Ok(validators)
    }

    fn unknown_keyword(&self, input: &KeywordInput<'_>) -> CompileResult {
        match self.config.unknown_keywords {
            UnknownKeywordPolicy::Reject => Err(CompileError::UnknownKeyword {
                location: input.meta().schema_location.to_string(),
                keyword: input.keyword.to_string(),
            }),
            UnknownKeywordPolicy::Ignore => Ok(None),
            UnknownKeywordPolicy::Annotate => compile_annotation(input),
        }
    }

    /// The innermost enclosing node that is a schema resource root.
    pub fn resource_root(&self, id: NodeId) -> NodeId {
        let mut current = self.node(id);
        loop {
            let Some(parent_id) = current.lexical_parent else {
                return current.id;
            };
            if current.resource_id.is_some() {
                return current.id;
            }
            let parent = self.node(parent_id);
            if parent.location.absolute_iri() != current.location.absolute_iri() {
                return current.id;
            }
            current = parent;
        }
    }

    /// Iterates the evaluation parents of `id`, innermost first.
    pub fn evaluation_ancestors(&self, id: NodeId) -> EvaluationAncestors<'_> {
        EvaluationAncestors {
            graph: self,
            next: self.node(id).evaluation_parent(),
        }
    }

    /// Walks a JSON Pointer from a resource root.
    ///
    /// Nodes are only created where the walk crosses a resource boundary
    /// and at the final segment, so each created node keeps the correct
    /// base IRI. Results are cached in the reference table.
    pub(crate) fn sub_schema(&self, root: NodeId, pointer: &NodePath) -> Result<Option<NodeId>, CompileError> {
        let root_node = self.node(root);
        let cache_key = root_node.location.append_pointer(pointer).key();
        if let Some(cached) = self.resources.lookup(Keyspace::References, &cache_key) {
            return Ok(Some(cached));
        }

        let mut parent = root;
        let mut value: Arc<Value> = Arc::clone(&root_node.raw);
        let mut location = root_node.location.clone();
        let mut evaluation_path = root_node.evaluation_path.clone();
        let total = pointer.len();
        let mut offset = 0usize;
        let mut relative = Vec::new();

        for (i, segment) in pointer.segments().enumerate() {
            relative.push(segment.clone());
            let Some(next) = relative_lookup(&value, &relative[offset..]) else {
                trace!(pointer = %pointer, "pointer segment not found");
                return Ok(None);
            };
            location = location.append(segment.clone());
            evaluation_path = evaluation_path.push(segment.clone());
            let is_last = i + 1 == total;
            let declares_id = next
                .get(self.node(parent).dialect().id_keyword())
                .is_some_and(Value::is_string);
            if is_last || declares_id {
                let key = location.key();
                let node = match self.resources.lookup(Keyspace::References, &key) {
                    Some(existing) => existing,
                    None => {
                        let created = self.new_node(
                            location.clone(),
                            evaluation_path.clone(),
                            Arc::new(next.clone()),
                            Some(parent),
                            None,
                        )?;
                        self.resources.register(Keyspace::References, key, created)
                    }
                };
                let materialized = self.node(node);
                location = materialized.location.clone();
                value = Arc::clone(&materialized.raw);
                parent = node;
                offset = relative.len();
            }
        }

        if total == 0 {
            return Ok(Some(root));
        }
        Ok(Some(
            self.resources
                .register(Keyspace::References, cache_key, parent),
        ))
    }

    /// Returns the root node of the resource `iri`, loading and compiling
    /// it through the resource loader on first use.
    pub(crate) fn load_document(
        &self,
        iri: &str,
        dialect: &Arc<Dialect>,
    ) -> Result<Option<NodeId>, CompileError> {
        if let Some(found) = self.resources.lookup(Keyspace::Resources, iri) {
            return Ok(Some(found));
        }
        let Some(value) = self.loader.load_value(iri)? else {
            return Ok(None);
        };
        debug!(iri, "compiling external schema resource");
        let root = self.new_node(
            SchemaLocation::document(Some(iri)),
            NodePath::root(),
            value,
            None,
            Some(Arc::clone(dialect)),
        )?;
        Ok(Some(self.resources.register(Keyspace::Resources, iri, root)))
    }

    /// Builds the validators of `id` and, through its keywords, of every
    /// reachable reference target, stopping at cycles.
    pub fn preload(&self, id: NodeId) -> Result<(), CompileError> {
        let node = self.node(id);
        if node.preloaded.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self
            .validators(&node)
            .and_then(|validators| validators.iter().try_for_each(|v| v.preload(self)));
        if result.is_err() {
            node.preloaded.store(false, Ordering::SeqCst);
        }
        result
    }

    /// Whether discriminators steer `anyOf` for nodes of `dialect`.
    pub fn discriminator_enabled(&self, dialect: &Dialect) -> bool {
        self.config
            .discriminator
            .unwrap_or_else(|| dialect.has_discriminator())
    }
}

/// Iterator over evaluation parents. See [`SchemaGraph::evaluation_ancestors`].
pub struct EvaluationAncestors<'g> {
    graph: &'g SchemaGraph,
    next: Option<NodeId>,
}

impl Iterator for EvaluationAncestors<'_> {
    type Item = Arc<SchemaNode>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let node = self.graph.node(id);
        self.next = node.evaluation_parent();
        Some(node)
    }
}

fn relative_lookup<'v>(value: &'v Value, segments: &[crate::path::PathSegment]) -> Option<&'v Value> {
    segments
        .iter()
        .try_fold(value, |current, segment| step(current, segment))
}

pub(crate) fn anchor_key(base: Option<&str>, name: &str) -> String {
    resolve_iri(base, &format!("#{}", name))
}

fn anchor_name<'v>(value: &'v Value, keyword: &str, location: &SchemaLocation) -> Result<&'v str, CompileError> {
    let invalid = |reason: String| CompileError::InvalidAnchor {
        location: location.append_field(keyword).to_string(),
        reason,
    };
    let name = value
        .as_str()
        .ok_or_else(|| invalid(format!("{} must be a string", keyword)))?;
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid_start || !valid_rest {
        return Err(invalid(format!("'{}' is not a valid anchor name", name)));
    }
    Ok(name)
}

fn read_recursive_anchor(raw: &Value, dialect: &Dialect, location: &SchemaLocation) -> Result<bool, CompileError> {
    if !dialect.supports_recursive_anchor() {
        return Ok(false);
    }
    match raw.get("$recursiveAnchor") {
        None => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(CompileError::InvalidAnchor {
            location: location.append_field("$recursiveAnchor").to_string(),
            reason: format!("$recursiveAnchor must be a boolean, got {}", other),
        }),
    }
}
