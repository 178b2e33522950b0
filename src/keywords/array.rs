//! Array keywords.

use serde_json::Value;

use super::{read_non_negative, CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::dialect::SpecVersion;
use crate::path::{NodePath, PathSegment};
use crate::schema::NodeId;
use crate::value::values_equal;

fn apply(
    ctx: &mut ExecutionContext<'_>,
    node: NodeId,
    items: &[Value],
    start: usize,
    location: &NodePath,
) -> Result<(), Interrupt> {
    for (index, item) in items.iter().enumerate().skip(start) {
        let child = location.push_index(index);
        ctx.evaluate(node, item, &child)?;
        ctx.mark_evaluated(child);
    }
    Ok(())
}

/// Annotation shared by the positional keywords: `true` when every item was
/// covered, otherwise the largest index covered.
fn coverage(covered: usize, total: usize) -> Option<Value> {
    match covered {
        0 => None,
        n if n >= total => Some(Value::Bool(true)),
        n => Some(Value::from(n - 1)),
    }
}

enum ItemsMode {
    /// One schema for items from `start` on: `items` alone, or after
    /// `prefixItems` in 2020-12.
    From { node: NodeId, start: usize },
    /// Array-form `items` with an optional `additionalItems`.
    Tuple { nodes: Vec<NodeId>, additional: Option<NodeId> },
}

/// `items`.
///
/// In 2020-12 a single schema applies to every item after the
/// `prefixItems`. Before 2020-12 an array of schemas validates items by
/// position, and `additionalItems` covers the rest.
///
/// # Example
///
/// ```rust
/// use verdict::SchemaRegistry;
/// use serde_json::json;
///
/// let schema = SchemaRegistry::new()
///     .compile(&json!({"prefixItems": [{"type": "string"}], "items": {"type": "integer"}}))
///     .unwrap();
///
/// assert!(schema.is_valid(&json!(["id", 1, 2])).unwrap());
/// assert!(!schema.is_valid(&json!(["id", "two"])).unwrap());
/// ```
pub struct Items {
    meta: KeywordMeta,
    mode: ItemsMode,
}

pub fn compile_items(input: &KeywordInput<'_>) -> CompileResult {
    let modern = input.dialect().version() >= SpecVersion::Draft202012;
    let mode = match input.value {
        Value::Array(entries) if !modern => {
            let nodes = entries
                .iter()
                .enumerate()
                .map(|(i, entry)| input.subschema(entry, &[PathSegment::Index(i)]))
                .collect::<Result<_, _>>()?;
            ItemsMode::Tuple {
                nodes,
                additional: input.sibling_subschema("additionalItems")?,
            }
        }
        Value::Array(_) => return Err(input.invalid("expected a schema")),
        _ => {
            let start = if modern {
                input.sibling("prefixItems").and_then(Value::as_array).map_or(0, Vec::len)
            } else {
                0
            };
            ItemsMode::From {
                node: input.own_subschema()?,
                start,
            }
        }
    };
    Ok(Some(Box::new(Items {
        meta: input.meta(),
        mode,
    })))
}

impl Keyword for Items {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Array(items) = instance else {
            return Ok(());
        };
        match &self.mode {
            ItemsMode::From { node, start } => {
                apply(ctx, *node, items, *start, location)?;
                if items.len() > *start {
                    self.meta.annotate(ctx, location, || Value::Bool(true));
                }
            }
            ItemsMode::Tuple { nodes, additional } => {
                for (index, (node, item)) in nodes.iter().zip(items).enumerate() {
                    let child = location.push_index(index);
                    ctx.evaluate(*node, item, &child)?;
                    ctx.mark_evaluated(child);
                }
                let covered = match additional {
                    Some(extra) => {
                        apply(ctx, *extra, items, nodes.len(), location)?;
                        items.len()
                    }
                    None => nodes.len().min(items.len()),
                };
                if let Some(value) = coverage(covered, items.len()) {
                    self.meta.annotate(ctx, location, || value);
                }
            }
        }
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        match &self.mode {
            ItemsMode::From { node, .. } => vec![*node],
            ItemsMode::Tuple { nodes, additional } => nodes.iter().copied().chain(*additional).collect(),
        }
    }
}

/// `prefixItems`: validates items by position. Shorter arrays are fine.
pub struct PrefixItems {
    meta: KeywordMeta,
    nodes: Vec<NodeId>,
}

pub fn compile_prefix_items(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(PrefixItems {
        meta: input.meta(),
        nodes: input.subschema_array()?,
    })))
}

impl Keyword for PrefixItems {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Array(items) = instance else {
            return Ok(());
        };
        for (index, (node, item)) in self.nodes.iter().zip(items).enumerate() {
            let child = location.push_index(index);
            ctx.evaluate(*node, item, &child)?;
            ctx.mark_evaluated(child);
        }
        if let Some(value) = coverage(self.nodes.len().min(items.len()), items.len()) {
            self.meta.annotate(ctx, location, || value);
        }
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.nodes.clone()
    }
}

/// `contains` with its `minContains` / `maxContains` siblings.
pub struct Contains {
    meta: KeywordMeta,
    node: NodeId,
    min: u64,
    max: Option<u64>,
    marks_evaluated: bool,
}

pub fn compile_contains(input: &KeywordInput<'_>) -> CompileResult {
    let version = input.dialect().version();
    let bound = |name: &str| -> Result<Option<u64>, crate::error::CompileError> {
        if version < SpecVersion::Draft201909 {
            return Ok(None);
        }
        match input.sibling(name) {
            None => Ok(None),
            Some(value) => read_non_negative(value)
                .map(Some)
                .ok_or_else(|| input.invalid(format!("{} must be a non-negative integer", name))),
        }
    };
    Ok(Some(Box::new(Contains {
        meta: input.meta(),
        node: input.own_subschema()?,
        min: bound("minContains")?.unwrap_or(1),
        max: bound("maxContains")?,
        marks_evaluated: version >= SpecVersion::Draft202012,
    })))
}

impl Keyword for Contains {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Array(items) = instance else {
            return Ok(());
        };
        let previous = ctx.suspend_fail_fast();
        let mut matched = Vec::new();
        let mut outcome = Ok(());
        for (index, item) in items.iter().enumerate() {
            let child = location.push_index(index);
            match ctx.evaluate_branch(self.node, item, &child) {
                Ok(errors) if errors.is_empty() => matched.push(index),
                Ok(_) => {}
                Err(interrupt) => {
                    outcome = Err(interrupt);
                    break;
                }
            }
        }
        ctx.restore_fail_fast(previous);
        outcome?;

        if self.marks_evaluated {
            for index in &matched {
                ctx.mark_evaluated(location.push_index(*index));
            }
        }
        let count = matched.len() as u64;
        if count < self.min {
            let message = if self.min == 1 {
                "Array does not contain a matching item".to_string()
            } else {
                format!("Array contains fewer than {} matching items", self.min)
            };
            return ctx.report(
                self.meta
                    .error(location, message)
                    .with_expected(self.min.to_string())
                    .with_got(count.to_string()),
            );
        }
        if let Some(max) = self.max.filter(|max| count > *max) {
            return ctx.report(
                self.meta
                    .error(location, format!("Array contains more than {} matching items", max))
                    .with_expected(max.to_string())
                    .with_got(count.to_string()),
            );
        }
        self.meta.annotate(ctx, location, || {
            Value::Array(matched.iter().map(|i| Value::from(*i)).collect())
        });
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        vec![self.node]
    }
}

/// `minItems` / `maxItems`.
pub struct ItemCount {
    meta: KeywordMeta,
    limit: u64,
    maximum: bool,
}

pub fn compile_item_count(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(ItemCount {
        meta: input.meta(),
        limit: input.non_negative()?,
        maximum: input.keyword == "maxItems",
    })))
}

impl Keyword for ItemCount {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Array(items) = instance else {
            return Ok(());
        };
        let count = items.len() as u64;
        let message = if self.maximum && count > self.limit {
            format!("Array has more than {} items", self.limit)
        } else if !self.maximum && count < self.limit {
            format!("Array has fewer than {} items", self.limit)
        } else {
            return Ok(());
        };
        ctx.report(
            self.meta
                .error(location, message)
                .with_expected(self.limit.to_string())
                .with_got(count.to_string()),
        )
    }
}

/// `uniqueItems`: with `true`, no two items may be equal. Numbers compare
/// by value, so `1` and `1.0` are duplicates.
pub struct UniqueItems {
    meta: KeywordMeta,
}

pub fn compile_unique_items(input: &KeywordInput<'_>) -> CompileResult {
    match input.value {
        Value::Bool(true) => Ok(Some(Box::new(UniqueItems { meta: input.meta() }))),
        Value::Bool(false) => Ok(None),
        _ => Err(input.invalid("expected a boolean")),
    }
}

impl Keyword for UniqueItems {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Array(items) = instance else {
            return Ok(());
        };
        for (i, first) in items.iter().enumerate() {
            if let Some(offset) = items[i + 1..].iter().position(|other| values_equal(first, other)) {
                let j = i + 1 + offset;
                return ctx.report(
                    self.meta
                        .error(location, format!("Array items at {} and {} are equal", i, j))
                        .with_got(format!("[{}, {}]", i, j)),
                );
            }
        }
        Ok(())
    }
}
