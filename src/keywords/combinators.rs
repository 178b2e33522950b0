//! Schema combinators: `allOf`, `anyOf`, `oneOf`, `not` and
//! `if` / `then` / `else`.
//!
//! Branch results are collected with fail-fast suspended, since a failing
//! branch does not make the combinator fail on its own.

use once_cell::sync::OnceCell;
use serde_json::Value;

use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::discriminator::{DiscriminatorFrame, DiscriminatorPlan};
use crate::error::{CompileError, SchemaError};
use crate::path::NodePath;
use crate::schema::{NodeId, SchemaGraph};
use crate::value::preview;

fn suspended<T>(
    ctx: &mut ExecutionContext<'_>,
    run: impl FnOnce(&mut ExecutionContext<'_>) -> Result<T, Interrupt>,
) -> Result<T, Interrupt> {
    let previous = ctx.suspend_fail_fast();
    let result = run(ctx);
    ctx.restore_fail_fast(previous);
    result
}

/// Runs only the `type` keyword of `branch` when its declared type rejects
/// the instance, returning that keyword's errors. `None` means the branch
/// needs a full evaluation.
fn type_mismatch(
    ctx: &mut ExecutionContext<'_>,
    branch: NodeId,
    instance: &Value,
    location: &NodePath,
) -> Result<Option<Vec<SchemaError>>, Interrupt> {
    let graph = ctx.graph();
    let node = graph.node(branch);
    if node.declared_type().map_or(true, |types| types.matches(instance)) {
        return Ok(None);
    }
    let mark = ctx.error_count();
    for validator in graph.validators(&node)?.iter().filter(|v| v.meta().keyword == "type") {
        validator.validate(ctx, instance, location)?;
    }
    let errors = ctx.take_errors_since(mark);
    Ok(if errors.is_empty() { None } else { Some(errors) })
}

/// `allOf`: every branch must pass, and every branch's evaluated
/// locations count for the enclosing schema.
pub struct AllOf {
    meta: KeywordMeta,
    branches: Vec<NodeId>,
}

pub fn compile_all_of(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(AllOf {
        meta: input.meta(),
        branches: input.subschema_array()?,
    })))
}

impl Keyword for AllOf {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        for &branch in &self.branches {
            ctx.evaluate(branch, instance, location)?;
        }
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.branches.clone()
    }
}

/// `anyOf`, optionally steered by a discriminator.
///
/// Without a discriminator each branch is evaluated in turn; passing
/// branches merge their evaluated locations, failing ones are dropped. A
/// branch whose declared `type` does not match the instance fails with the
/// `type` error alone. With a discriminator only the selected branch runs.
pub struct AnyOf {
    meta: KeywordMeta,
    branches: Vec<NodeId>,
    discriminated: bool,
    plan: OnceCell<Option<DiscriminatorPlan>>,
}

pub fn compile_any_of(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(AnyOf {
        meta: input.meta(),
        branches: input.subschema_array()?,
        discriminated: input.graph.discriminator_enabled(input.dialect()),
        plan: OnceCell::new(),
    })))
}

impl AnyOf {
    fn plan(&self, graph: &SchemaGraph) -> Result<Option<&DiscriminatorPlan>, CompileError> {
        if !self.discriminated {
            return Ok(None);
        }
        self.plan
            .get_or_try_init(|| DiscriminatorPlan::build(graph, self.meta.node, &self.branches))
            .map(Option::as_ref)
    }

    fn validate_any(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let short_circuit = ctx.can_short_circuit();
        let (passed, errors) = suspended(ctx, |ctx| {
            let mut passed = false;
            let mut errors = Vec::new();
            for &branch in &self.branches {
                let branch_errors = match type_mismatch(ctx, branch, instance, location)? {
                    Some(type_errors) => type_errors,
                    None => ctx.evaluate_branch(branch, instance, location)?,
                };
                if branch_errors.is_empty() {
                    passed = true;
                    if short_circuit {
                        break;
                    }
                } else {
                    errors.extend(branch_errors);
                }
            }
            Ok((passed, errors))
        })?;
        if passed {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, "Value does not match any of the alternatives")
                .with_got(preview(instance)),
        )?;
        ctx.report_all(errors)
    }

    fn validate_discriminated(
        &self,
        ctx: &mut ExecutionContext<'_>,
        plan: &DiscriminatorPlan,
        instance: &Value,
        location: &NodePath,
    ) -> Result<(), Interrupt> {
        let property = plan.property_name();
        let Some(raw) = instance.as_object().and_then(|object| object.get(property)) else {
            return self.validate_any(ctx, instance, location);
        };
        let value = match raw {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        // Reached again through an alternative's `allOf` back to this schema.
        if let Some(frame) = ctx.current_discriminator() {
            if &frame.instance_location == location
                && frame.property_name == property
                && frame.selected.is_some()
            {
                return Ok(());
            }
        }

        let selected = plan.select(&value);
        ctx.push_discriminator(DiscriminatorFrame {
            property_name: property.to_string(),
            value: Some(value.clone()),
            instance_location: location.clone(),
            selected,
        });
        let result = match selected {
            Some(index) => ctx.evaluate(self.branches[index], instance, location),
            None => ctx.report(
                self.meta
                    .error(
                        location,
                        format!(
                            "No alternative could be chosen based on the discriminator property '{}'",
                            property
                        ),
                    )
                    .with_code("discriminator")
                    .with_got(value),
            ),
        };
        ctx.pop_discriminator();
        result
    }
}

impl Keyword for AnyOf {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        match self.plan(ctx.graph())? {
            Some(plan) => self.validate_discriminated(ctx, plan, instance, location),
            None => self.validate_any(ctx, instance, location),
        }
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.branches.clone()
    }
}

/// `oneOf`: exactly one branch must pass. Only that branch's evaluated
/// locations reach the enclosing schema.
pub struct OneOf {
    meta: KeywordMeta,
    branches: Vec<NodeId>,
}

pub fn compile_one_of(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(OneOf {
        meta: input.meta(),
        branches: input.subschema_array()?,
    })))
}

impl Keyword for OneOf {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let short_circuit = ctx.can_short_circuit();
        let (valid, errors) = suspended(ctx, |ctx| {
            let mut valid = Vec::new();
            let mut errors: Vec<SchemaError> = Vec::new();
            for (index, &branch) in self.branches.iter().enumerate() {
                let branch_errors = ctx.evaluate_branch(branch, instance, location)?;
                if branch_errors.is_empty() {
                    valid.push(index);
                    if short_circuit && valid.len() > 1 {
                        break;
                    }
                } else {
                    errors.extend(branch_errors);
                }
            }
            Ok((valid, errors))
        })?;
        match valid.len() {
            1 => Ok(()),
            0 => {
                ctx.report(
                    self.meta
                        .error(location, "Value does not match any of the oneOf alternatives")
                        .with_got(preview(instance)),
                )?;
                ctx.report_all(errors)
            }
            _ => {
                let indexes: Vec<String> = valid.iter().map(usize::to_string).collect();
                ctx.report(
                    self.meta
                        .error(location, "Value matches more than one oneOf alternative")
                        .with_expected("exactly one match")
                        .with_got(format!("matches at {}", indexes.join(", "))),
                )
            }
        }
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.branches.clone()
    }
}

/// `not`: passes when the subschema fails. Evaluates detached, so nothing
/// inside it counts as evaluated.
pub struct Not {
    meta: KeywordMeta,
    node: NodeId,
}

pub fn compile_not(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(Not {
        meta: input.meta(),
        node: input.own_subschema()?,
    })))
}

impl Keyword for Not {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let errors = suspended(ctx, |ctx| ctx.evaluate_detached(self.node, instance, location))?;
        if !errors.is_empty() {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, "Value must not match the schema")
                .with_got(preview(instance)),
        )
    }

    fn subschemas(&self) -> Vec<NodeId> {
        vec![self.node]
    }
}

/// `if` together with its `then` / `else` siblings.
pub struct Conditional {
    meta: KeywordMeta,
    condition: NodeId,
    then: Option<NodeId>,
    otherwise: Option<NodeId>,
}

pub fn compile_if(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(Conditional {
        meta: input.meta(),
        condition: input.own_subschema()?,
        then: input.sibling_subschema("then")?,
        otherwise: input.sibling_subschema("else")?,
    })))
}

impl Keyword for Conditional {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let errors = suspended(ctx, |ctx| ctx.evaluate_branch(self.condition, instance, location))?;
        let next = if errors.is_empty() { self.then } else { self.otherwise };
        match next {
            Some(node) => ctx.evaluate(node, instance, location),
            None => Ok(()),
        }
    }

    fn subschemas(&self) -> Vec<NodeId> {
        std::iter::once(self.condition)
            .chain(self.then)
            .chain(self.otherwise)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ExecutionConfig;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_any_of_reports_umbrella_and_branch_errors() {
        let schema = SchemaRegistry::new()
            .compile(&json!({"anyOf": [{"type": "string"}, {"minimum": 10}]}))
            .unwrap();
        assert!(schema.is_valid(&json!("x")).unwrap());
        assert!(schema.is_valid(&json!(12)).unwrap());
        let errors = schema.validate(&json!(3)).unwrap().into_result().unwrap_err();
        let keywords: Vec<&str> = errors.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["anyOf", "type", "minimum"]);
    }

    #[test]
    fn test_one_of_requires_exactly_one_match() {
        let schema = SchemaRegistry::new()
            .compile(&json!({"oneOf": [{"type": "integer"}, {"minimum": 2}]}))
            .unwrap();
        assert!(schema.is_valid(&json!(1)).unwrap());
        assert!(schema.is_valid(&json!(2.5)).unwrap());
        let errors = schema.validate(&json!(3)).unwrap().into_result().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().got.as_deref(), Some("matches at 0, 1"));
    }

    #[test]
    fn test_any_of_branch_with_wrong_type_reports_type_only() {
        let schema = SchemaRegistry::new()
            .compile(&json!({"anyOf": [{"type": "string", "const": "x"}, {"type": "integer"}]}))
            .unwrap();
        assert!(schema.is_valid(&json!("x")).unwrap());
        assert!(schema.is_valid(&json!(4)).unwrap());
        let errors = schema.validate(&json!(1.5)).unwrap().into_result().unwrap_err();
        let keywords: Vec<&str> = errors.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["anyOf", "type", "type"]);
        let errors = schema.validate(&json!("y")).unwrap().into_result().unwrap_err();
        let keywords: Vec<&str> = errors.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["anyOf", "const", "type"]);
    }

    #[test]
    fn test_any_of_type_check_respects_ref_override() {
        let schema = SchemaRegistry::new()
            .compile(&json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {"any": {}},
                "anyOf": [{"$ref": "#/definitions/any", "type": "string"}]
            }))
            .unwrap();
        assert!(schema.is_valid(&json!(1)).unwrap());
    }

    #[test]
    fn test_not() {
        let schema = SchemaRegistry::new().compile(&json!({"not": {"type": "null"}})).unwrap();
        assert!(schema.is_valid(&json!(0)).unwrap());
        assert!(!schema.is_valid(&json!(null)).unwrap());
    }

    #[test]
    fn test_if_then_else() {
        let schema = SchemaRegistry::new()
            .compile(&json!({
                "if": {"properties": {"kind": {"const": "a"}}},
                "then": {"required": ["alpha"]},
                "else": {"required": ["beta"]}
            }))
            .unwrap();
        assert!(schema.is_valid(&json!({"kind": "a", "alpha": 1})).unwrap());
        assert!(schema.is_valid(&json!({"kind": "b", "beta": 1})).unwrap());
        let errors = schema
            .validate(&json!({"kind": "a", "beta": 1}))
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().evaluation_path.to_string(), "/then/required");
    }

    #[test]
    fn test_any_of_fail_fast_reports_umbrella_only() {
        let schema = SchemaRegistry::new()
            .compile(&json!({"anyOf": [{"type": "string"}, {"type": "boolean"}]}))
            .unwrap();
        let config = ExecutionConfig::new().with_fail_fast(true);
        let evaluation = schema.evaluate(&json!(1), &config).unwrap();
        assert_eq!(evaluation.errors.len(), 1);
        assert_eq!(evaluation.errors[0].keyword, "anyOf");
    }
}
