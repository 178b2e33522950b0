//! `unevaluatedProperties` and `unevaluatedItems`.
//!
//! Both run after every other keyword of their schema object and consult
//! the evaluated locations recorded in the current layer: members covered
//! by adjacent keywords or by in-place subschemas that passed.

use serde_json::Value;

use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::path::NodePath;
use crate::schema::NodeId;

#[derive(Clone, Copy)]
enum Member {
    Property,
    Item,
}

/// `unevaluatedProperties` or `unevaluatedItems`.
///
/// Applies its subschema to every member of the instance that no adjacent
/// keyword or passing in-place subschema evaluated. Members that pass are
/// marked evaluated in turn, so an enclosing schema object sees them as
/// covered. `false` rejects each leftover member with its own error.
///
/// # Example
///
/// ```rust
/// use verdict::SchemaRegistry;
/// use serde_json::json;
///
/// let schema = SchemaRegistry::new()
///     .compile(&json!({
///         "allOf": [{"properties": {"name": {"type": "string"}}}],
///         "unevaluatedProperties": false
///     }))
///     .unwrap();
///
/// assert!(schema.is_valid(&json!({"name": "Ada"})).unwrap());
/// assert!(!schema.is_valid(&json!({"name": "Ada", "age": 36})).unwrap());
/// ```
pub struct Unevaluated {
    meta: KeywordMeta,
    node: NodeId,
    raw: Option<bool>,
    member: Member,
}

fn compile(input: &KeywordInput<'_>, member: Member) -> CompileResult {
    Ok(Some(Box::new(Unevaluated {
        meta: input.meta(),
        node: input.own_subschema()?,
        raw: input.value.as_bool(),
        member,
    })))
}

/// Compiles `unevaluatedProperties`.
pub fn compile_unevaluated_properties(input: &KeywordInput<'_>) -> CompileResult {
    compile(input, Member::Property)
}

/// Compiles `unevaluatedItems`. Items past the coverage of `prefixItems`,
/// `items` and `contains` count as unevaluated.
pub fn compile_unevaluated_items(input: &KeywordInput<'_>) -> CompileResult {
    compile(input, Member::Item)
}

impl Unevaluated {
    fn members<'v>(&self, instance: &'v Value, location: &NodePath) -> Vec<(NodePath, &'v Value)> {
        match (self.member, instance) {
            (Member::Property, Value::Object(object)) => object
                .iter()
                .map(|(name, value)| (location.push_field(name.as_str()), value))
                .collect(),
            (Member::Item, Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, value)| (location.push_index(index), value))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn describe(&self, child: &NodePath) -> String {
        let name = child.last().map(|segment| segment.as_text()).unwrap_or_default();
        match self.member {
            Member::Property => format!("property '{}'", name),
            Member::Item => format!("item {}", name),
        }
    }
}

impl Keyword for Unevaluated {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let remaining: Vec<(NodePath, &Value)> = self
            .members(instance, location)
            .into_iter()
            .filter(|(child, _)| !ctx.is_evaluated(child))
            .collect();
        if remaining.is_empty() {
            return Ok(());
        }

        let mut evaluated = Vec::new();
        for (child, value) in remaining {
            if self.raw == Some(true) {
                evaluated.push(child);
                continue;
            }
            if self.raw == Some(false) {
                ctx.report(
                    self.meta
                        .error(&child, format!("Unevaluated {} is not allowed", self.describe(&child))),
                )?;
                continue;
            }
            let errors = ctx.evaluate_branch(self.node, value, &child)?;
            if errors.is_empty() {
                evaluated.push(child);
            } else {
                ctx.report(
                    self.meta
                        .error(&child, format!("Unevaluated {} does not match the schema", self.describe(&child))),
                )?;
                ctx.report_all(errors)?;
            }
        }

        let names: Vec<Value> = evaluated
            .iter()
            .filter_map(|child| child.last())
            .map(|segment| Value::String(segment.as_text()))
            .collect();
        for child in evaluated {
            ctx.mark_evaluated(child);
        }
        self.meta.annotate(ctx, location, || Value::Array(names));
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        vec![self.node]
    }
}
