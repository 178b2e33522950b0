//! Keyword validators.
//!
//! Every keyword of a schema object compiles into a [`Keyword`]. A
//! dialect's keyword table maps names to [`KeywordFactory`] closures that
//! receive a [`KeywordInput`] (the keyword value, its node and the graph)
//! and may create subschema nodes through [`KeywordInput::subschema`].

pub mod array;
pub mod combinators;
pub mod discriminator;
pub mod numeric;
pub mod object;
pub mod refs;
pub mod string;
pub mod unevaluated;
pub mod value;

use std::sync::Arc;

use serde_json::Value;

use crate::context::{ExecutionContext, Interrupt};
use crate::dialect::Dialect;
use crate::error::{CompileError, SchemaError};
use crate::location::SchemaLocation;
use crate::path::{NodePath, PathSegment};
use crate::schema::{NodeId, SchemaGraph, SchemaNode};

pub type CompileResult = Result<Option<Box<dyn Keyword>>, CompileError>;

/// Compiles one keyword. Returning `Ok(None)` means the keyword has no
/// runtime behaviour (identity keywords, `then` read by `if`, ...).
pub type KeywordFactory = Arc<dyn Fn(&KeywordInput<'_>) -> CompileResult + Send + Sync>;

/// A compiled keyword of a schema node.
pub trait Keyword: Send + Sync {
    fn meta(&self) -> &KeywordMeta;

    /// Checks `instance` at `location`, reporting failures through `ctx`.
    fn validate(
        &self,
        ctx: &mut ExecutionContext<'_>,
        instance: &Value,
        location: &NodePath,
    ) -> Result<(), Interrupt>;

    /// Subschema nodes owned by this keyword.
    fn subschemas(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Builds everything this keyword will need at evaluation time.
    fn preload(&self, graph: &SchemaGraph) -> Result<(), CompileError> {
        for node in self.subschemas() {
            graph.preload(node)?;
        }
        Ok(())
    }
}

/// Where a keyword lives: its name, canonical location, evaluation path
/// and owning node.
#[derive(Debug, Clone)]
pub struct KeywordMeta {
    pub keyword: String,
    pub schema_location: SchemaLocation,
    pub evaluation_path: NodePath,
    pub node: NodeId,
}

impl KeywordMeta {
    pub fn for_node(node: &SchemaNode, keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            schema_location: node.location().append_field(keyword),
            evaluation_path: node.evaluation_path().push_field(keyword),
            node: node.id(),
        }
    }

    /// Creates an assertion error for this keyword.
    pub fn error(&self, location: &NodePath, message: impl Into<String>) -> SchemaError {
        SchemaError::new(location.clone(), message)
            .with_keyword(self.keyword.clone())
            .at_schema(self.evaluation_path.clone(), self.schema_location.clone())
    }

    /// Records an annotation if the run collects this keyword.
    pub fn annotate(
        &self,
        ctx: &mut ExecutionContext<'_>,
        location: &NodePath,
        value: impl FnOnce() -> Value,
    ) {
        if ctx.config().collects(&self.keyword) {
            ctx.record_annotation(self, location, value());
        }
    }
}

/// Everything a factory needs to compile a keyword.
pub struct KeywordInput<'a> {
    pub graph: &'a SchemaGraph,
    pub node: &'a SchemaNode,
    pub keyword: &'a str,
    pub value: &'a Value,
}

impl<'a> KeywordInput<'a> {
    pub fn meta(&self) -> KeywordMeta {
        KeywordMeta::for_node(self.node, self.keyword)
    }

    pub fn dialect(&self) -> &Dialect {
        self.node.dialect()
    }

    /// Another keyword of the same schema object.
    pub fn sibling(&self, name: &str) -> Option<&'a Value> {
        self.node.raw().get(name)
    }

    /// Compiles a subschema found at `segments` below this keyword.
    pub fn subschema(&self, value: &Value, segments: &[PathSegment]) -> Result<NodeId, CompileError> {
        let mut location = self.node.location().append_field(self.keyword);
        let mut evaluation_path = self.node.evaluation_path().push_field(self.keyword);
        for segment in segments {
            location = location.append(segment.clone());
            evaluation_path = evaluation_path.push(segment.clone());
        }
        self.graph.new_node(
            location,
            evaluation_path,
            Arc::new(value.clone()),
            Some(self.node.id()),
            None,
        )
    }

    /// Compiles another keyword of the same object (`then`, `additionalItems`)
    /// as a subschema at its own location.
    pub fn sibling_subschema(&self, name: &str) -> Result<Option<NodeId>, CompileError> {
        let Some(value) = self.sibling(name) else {
            return Ok(None);
        };
        self.graph
            .new_node(
                self.node.location().append_field(name),
                self.node.evaluation_path().push_field(name),
                Arc::new(value.clone()),
                Some(self.node.id()),
                None,
            )
            .map(Some)
    }

    /// Compiles this keyword's own value as a subschema.
    pub fn own_subschema(&self) -> Result<NodeId, CompileError> {
        self.subschema(self.value, &[])
    }

    /// Compiles each element of an array of subschemas.
    pub fn subschema_array(&self) -> Result<Vec<NodeId>, CompileError> {
        let items = self
            .value
            .as_array()
            .ok_or_else(|| self.invalid("expected an array of schemas"))?;
        if items.is_empty() {
            return Err(self.invalid("expected a non-empty array of schemas"));
        }
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.subschema(item, &[PathSegment::Index(i)]))
            .collect()
    }

    pub fn invalid(&self, reason: impl Into<String>) -> CompileError {
        CompileError::invalid_keyword(self.meta().schema_location, self.keyword, reason)
    }

    /// Reads a non-negative integer such as `minLength` (`2.0` is accepted).
    pub fn non_negative(&self) -> Result<u64, CompileError> {
        read_non_negative(self.value).ok_or_else(|| self.invalid("expected a non-negative integer"))
    }

    pub fn string_array(&self) -> Result<Vec<String>, CompileError> {
        read_string_array(self.value).ok_or_else(|| self.invalid("expected an array of strings"))
    }
}

pub(crate) fn read_non_negative(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        _ => None,
    }
}

pub(crate) fn read_string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Position of a keyword in a node's validator list. Lower runs first;
/// ties keep document order.
pub(crate) fn evaluation_rank(keyword: &str) -> u8 {
    match keyword {
        "discriminator" => 0,
        "type" => 1,
        "properties" => 2,
        "patternProperties" => 3,
        "unevaluatedItems" | "unevaluatedProperties" => 5,
        _ => 4,
    }
}
