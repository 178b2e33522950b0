//! Object keywords.
//!
//! `properties`, `patternProperties` and `additionalProperties` mark every
//! member they apply to as evaluated, which `unevaluatedProperties` reads.

use regex::Regex;
use serde_json::{Map, Value};

use super::{read_string_array, CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::path::{NodePath, PathSegment};
use crate::schema::NodeId;

pub(crate) fn compile_regex(input: &KeywordInput<'_>, pattern: &str) -> Result<Regex, crate::error::CompileError> {
    Regex::new(pattern).map_err(|e| input.invalid(format!("invalid regular expression '{}': {}", pattern, e)))
}

fn schema_map(input: &KeywordInput<'_>) -> Result<Vec<(String, NodeId)>, crate::error::CompileError> {
    input
        .value
        .as_object()
        .ok_or_else(|| input.invalid("expected an object of schemas"))?
        .iter()
        .map(|(name, schema)| {
            input
                .subschema(schema, &[PathSegment::field(name.as_str())])
                .map(|node| (name.clone(), node))
        })
        .collect()
}

fn annotate_names(meta: &KeywordMeta, ctx: &mut ExecutionContext<'_>, location: &NodePath, names: Vec<String>) {
    meta.annotate(ctx, location, || {
        Value::Array(names.into_iter().map(Value::String).collect())
    });
}

/// `properties`: validates each named member that is present.
///
/// Absent members are not an error; `required` handles those.
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
/// assert!(schema.is_valid(&json!({"age": 30})).unwrap());
/// assert!(schema.is_valid(&json!({})).unwrap());
/// assert!(!schema.is_valid(&json!({"age": -1})).unwrap());
/// ```
pub struct Properties {
    meta: KeywordMeta,
    properties: Vec<(String, NodeId)>,
}

pub fn compile_properties(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(Properties {
        meta: input.meta(),
        properties: schema_map(input)?,
    })))
}

impl Keyword for Properties {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        let mut matched = Vec::new();
        for (name, node) in &self.properties {
            let Some(value) = object.get(name) else {
                continue;
            };
            let child = location.push_field(name.as_str());
            ctx.evaluate(*node, value, &child)?;
            ctx.mark_evaluated(child);
            matched.push(name.clone());
        }
        annotate_names(&self.meta, ctx, location, matched);
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.properties.iter().map(|(_, node)| *node).collect()
    }
}

/// `patternProperties`: validates every member whose name matches a
/// pattern. A member matching several patterns is checked against each.
pub struct PatternProperties {
    meta: KeywordMeta,
    patterns: Vec<(Regex, NodeId)>,
}

pub fn compile_pattern_properties(input: &KeywordInput<'_>) -> CompileResult {
    let patterns = schema_map(input)?
        .into_iter()
        .map(|(pattern, node)| compile_regex(input, &pattern).map(|regex| (regex, node)))
        .collect::<Result<_, _>>()?;
    Ok(Some(Box::new(PatternProperties {
        meta: input.meta(),
        patterns,
    })))
}

impl Keyword for PatternProperties {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        let mut matched = Vec::new();
        for (name, value) in object {
            let child = location.push_field(name.as_str());
            let mut hit = false;
            for (regex, node) in &self.patterns {
                if regex.is_match(name) {
                    ctx.evaluate(*node, value, &child)?;
                    hit = true;
                }
            }
            if hit {
                ctx.mark_evaluated(child);
                matched.push(name.clone());
            }
        }
        annotate_names(&self.meta, ctx, location, matched);
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.patterns.iter().map(|(_, node)| *node).collect()
    }
}

/// `additionalProperties`: members matched by neither the sibling
/// `properties` nor `patternProperties`.
pub struct AdditionalProperties {
    meta: KeywordMeta,
    node: NodeId,
    forbidden: bool,
    known: Vec<String>,
    patterns: Vec<Regex>,
}

pub fn compile_additional_properties(input: &KeywordInput<'_>) -> CompileResult {
    let node = input.own_subschema()?;
    let known = input
        .sibling("properties")
        .and_then(Value::as_object)
        .map(|properties| properties.keys().cloned().collect())
        .unwrap_or_default();
    let patterns = match input.sibling("patternProperties").and_then(Value::as_object) {
        Some(patterns) => patterns
            .keys()
            .map(|pattern| compile_regex(input, pattern))
            .collect::<Result<_, _>>()?,
        None => Vec::new(),
    };
    Ok(Some(Box::new(AdditionalProperties {
        meta: input.meta(),
        node,
        forbidden: input.value == &Value::Bool(false),
        known,
        patterns,
    })))
}

impl AdditionalProperties {
    fn is_additional(&self, name: &str) -> bool {
        !self.known.iter().any(|known| known == name) && !self.patterns.iter().any(|p| p.is_match(name))
    }
}

impl Keyword for AdditionalProperties {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        let mut matched = Vec::new();
        for (name, value) in object.iter().filter(|(name, _)| self.is_additional(name)) {
            let child = location.push_field(name.as_str());
            if self.forbidden {
                ctx.report(
                    self.meta
                        .error(&child, format!("Additional property '{}' is not allowed", name)),
                )?;
                continue;
            }
            ctx.evaluate(self.node, value, &child)?;
            ctx.mark_evaluated(child);
            matched.push(name.clone());
        }
        annotate_names(&self.meta, ctx, location, matched);
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        vec![self.node]
    }
}

/// `propertyNames`: validates each member name as a string instance.
///
/// Names are checked detached, so they never count as evaluated members.
pub struct PropertyNames {
    meta: KeywordMeta,
    node: NodeId,
}

pub fn compile_property_names(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(PropertyNames {
        meta: input.meta(),
        node: input.own_subschema()?,
    })))
}

impl Keyword for PropertyNames {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        for name in object.keys() {
            let child = location.push_field(name.as_str());
            let errors = ctx.evaluate_detached(self.node, &Value::String(name.clone()), &child)?;
            if !errors.is_empty() {
                ctx.report(
                    self.meta
                        .error(&child, format!("Property name '{}' is not valid", name))
                        .with_got(name.clone()),
                )?;
                ctx.report_all(errors)?;
            }
        }
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        vec![self.node]
    }
}

fn report_missing(
    meta: &KeywordMeta,
    ctx: &mut ExecutionContext<'_>,
    object: &Map<String, Value>,
    location: &NodePath,
    names: &[String],
    message: impl Fn(&str) -> String,
) -> Result<(), Interrupt> {
    for name in names.iter().filter(|name| !object.contains_key(name.as_str())) {
        ctx.report(meta.error(location, message(name.as_str())).with_expected(name.as_str()))?;
    }
    Ok(())
}

/// `required`: one error per missing member, with the member name as the
/// expected value.
pub struct Required {
    meta: KeywordMeta,
    names: Vec<String>,
}

pub fn compile_required(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(Required {
        meta: input.meta(),
        names: input.string_array()?,
    })))
}

impl Keyword for Required {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        report_missing(&self.meta, ctx, object, location, &self.names, |name| {
            format!("Required property '{}' is missing", name)
        })
    }
}

/// `dependentRequired`: when a trigger member is present, its listed
/// members must be present too.
pub struct DependentRequired {
    meta: KeywordMeta,
    dependencies: Vec<(String, Vec<String>)>,
}

pub fn compile_dependent_required(input: &KeywordInput<'_>) -> CompileResult {
    let dependencies = input
        .value
        .as_object()
        .ok_or_else(|| input.invalid("expected an object"))?
        .iter()
        .map(|(name, names)| {
            read_string_array(names)
                .map(|names| (name.clone(), names))
                .ok_or_else(|| input.invalid(format!("'{}' must be an array of strings", name)))
        })
        .collect::<Result<_, _>>()?;
    Ok(Some(Box::new(DependentRequired {
        meta: input.meta(),
        dependencies,
    })))
}

impl Keyword for DependentRequired {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        for (trigger, names) in self.dependencies.iter().filter(|(t, _)| object.contains_key(t)) {
            report_missing(&self.meta, ctx, object, location, names, |name| {
                format!("Property '{}' is required when '{}' is present", name, trigger)
            })?;
        }
        Ok(())
    }
}

/// `dependentSchemas`: when a trigger member is present, the whole object
/// must match the associated subschema.
pub struct DependentSchemas {
    meta: KeywordMeta,
    schemas: Vec<(String, NodeId)>,
}

pub fn compile_dependent_schemas(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(DependentSchemas {
        meta: input.meta(),
        schemas: schema_map(input)?,
    })))
}

impl Keyword for DependentSchemas {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        for (trigger, node) in &self.schemas {
            if object.contains_key(trigger) {
                ctx.evaluate(*node, instance, location)?;
            }
        }
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.schemas.iter().map(|(_, node)| *node).collect()
    }
}

enum Dependency {
    Properties(Vec<String>),
    Schema(NodeId),
}

/// Pre-2019 `dependencies`, mixing the two forms.
pub struct Dependencies {
    meta: KeywordMeta,
    dependencies: Vec<(String, Dependency)>,
}

pub fn compile_dependencies(input: &KeywordInput<'_>) -> CompileResult {
    let entries = input
        .value
        .as_object()
        .ok_or_else(|| input.invalid("expected an object"))?;
    let mut dependencies = Vec::with_capacity(entries.len());
    for (name, entry) in entries {
        let dependency = match entry {
            Value::Array(_) => read_string_array(entry)
                .map(Dependency::Properties)
                .ok_or_else(|| input.invalid(format!("'{}' must be an array of strings", name)))?,
            _ => Dependency::Schema(input.subschema(entry, &[PathSegment::field(name.as_str())])?),
        };
        dependencies.push((name.clone(), dependency));
    }
    Ok(Some(Box::new(Dependencies {
        meta: input.meta(),
        dependencies,
    })))
}

impl Keyword for Dependencies {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        for (trigger, dependency) in self.dependencies.iter().filter(|(t, _)| object.contains_key(t)) {
            match dependency {
                Dependency::Properties(names) => {
                    report_missing(&self.meta, ctx, object, location, names, |name| {
                        format!("Property '{}' is required when '{}' is present", name, trigger)
                    })?;
                }
                Dependency::Schema(node) => ctx.evaluate(*node, instance, location)?,
            }
        }
        Ok(())
    }

    fn subschemas(&self) -> Vec<NodeId> {
        self.dependencies
            .iter()
            .filter_map(|(_, dependency)| match dependency {
                Dependency::Schema(node) => Some(*node),
                Dependency::Properties(_) => None,
            })
            .collect()
    }
}

/// `minProperties` / `maxProperties`.
pub struct PropertyCount {
    meta: KeywordMeta,
    limit: u64,
    maximum: bool,
}

pub fn compile_property_count(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(PropertyCount {
        meta: input.meta(),
        limit: input.non_negative()?,
        maximum: input.keyword == "maxProperties",
    })))
}

impl Keyword for PropertyCount {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        let count = object.len() as u64;
        let message = if self.maximum && count > self.limit {
            format!("Object has more than {} properties", self.limit)
        } else if !self.maximum && count < self.limit {
            format!("Object has fewer than {} properties", self.limit)
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
