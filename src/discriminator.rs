//! OpenAPI discriminators.
//!
//! A discriminator names an instance property whose value picks one
//! alternative of an `anyOf`. The choice uses the explicit `mapping`
//! (value to schema reference) and falls back to the alternative's schema
//! name. Discriminators declared by alternatives, directly or through their
//! `allOf` ancestry, are merged into the one declared next to the `anyOf`.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CompileError;
use crate::location::{resolve_iri, SchemaLocation};
use crate::path::NodePath;
use crate::resolver::resolve_static;
use crate::schema::{NodeId, SchemaGraph};

const MAX_INHERITANCE_DEPTH: usize = 64;

/// A parsed `discriminator` object.
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
    pub property_name: String,
    pub mapping: IndexMap<String, String>,
}

impl Discriminator {
    pub fn from_value(value: &Value, location: &SchemaLocation) -> Result<Self, CompileError> {
        let invalid = |reason: &str| CompileError::invalid_keyword(location, "discriminator", reason);
        let object = value.as_object().ok_or_else(|| invalid("expected an object"))?;
        let property_name = object
            .get("propertyName")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("propertyName must be a string"))?
            .to_string();
        let mut mapping = IndexMap::new();
        if let Some(entries) = object.get("mapping") {
            let entries = entries
                .as_object()
                .ok_or_else(|| invalid("mapping must be an object"))?;
            for (key, target) in entries {
                let target = target
                    .as_str()
                    .ok_or_else(|| invalid("mapping values must be strings"))?;
                mapping.insert(key.clone(), target.to_string());
            }
        }
        Ok(Self {
            property_name,
            mapping,
        })
    }

    /// Merges another discriminator into this one.
    ///
    /// A different `propertyName` or a mapping key bound to a different
    /// target is a conflict.
    pub fn merge(&mut self, other: &Discriminator, location: &SchemaLocation) -> Result<(), CompileError> {
        let conflict = |reason: String| CompileError::Discriminator {
            location: location.to_string(),
            reason,
        };
        if other.property_name != self.property_name {
            return Err(conflict(format!(
                "propertyName '{}' cannot be redefined as '{}'",
                self.property_name, other.property_name
            )));
        }
        for (key, target) in &other.mapping {
            match self.mapping.get(key) {
                Some(existing) if existing != target => {
                    return Err(conflict(format!(
                        "mapping '{}' points to both '{}' and '{}'",
                        key, existing, target
                    )));
                }
                Some(_) => {}
                None => {
                    self.mapping.insert(key.clone(), target.clone());
                }
            }
        }
        Ok(())
    }
}

/// An active discriminator on the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorFrame {
    pub property_name: String,
    /// The discriminating value, or `None` when the property is absent.
    pub value: Option<String>,
    pub instance_location: NodePath,
    /// Index of the alternative chosen for `value`.
    pub selected: Option<usize>,
}

#[derive(Debug)]
enum MappingTarget {
    Location(String),
    Name(String),
}

impl MappingTarget {
    fn matches(&self, candidate: &Candidate) -> bool {
        match self {
            MappingTarget::Location(location) => *location == candidate.location,
            MappingTarget::Name(name) => *name == candidate.name,
        }
    }
}

#[derive(Debug)]
struct Candidate {
    location: String,
    name: String,
}

/// How an `anyOf` picks its alternative, computed once per keyword.
#[derive(Debug)]
pub struct DiscriminatorPlan {
    discriminator: Discriminator,
    targets: IndexMap<String, MappingTarget>,
    candidates: Vec<Candidate>,
}

impl DiscriminatorPlan {
    /// Builds the plan for the alternatives `branches` of an `anyOf`
    /// owned by `owner`. Returns `None` when neither `owner` nor its `allOf`
    /// ancestry declares a discriminator.
    pub fn build(graph: &SchemaGraph, owner: NodeId, branches: &[NodeId]) -> Result<Option<Self>, CompileError> {
        let owner_node = graph.node(owner);
        let location = owner_node.location().append_field("discriminator");
        let mut declared = None;
        inherit(graph, owner, &mut declared, &mut HashSet::new(), &location)?;
        if declared.is_none() {
            return Ok(None);
        }

        let mut candidates = Vec::with_capacity(branches.len());
        for &branch in branches {
            let reference = graph
                .node(branch)
                .raw()
                .get("$ref")
                .and_then(Value::as_str)
                .map(str::to_string);
            let target = match reference {
                Some(reference) => resolve_static(graph, branch, &reference)?.unwrap_or(branch),
                None => branch,
            };
            inherit(graph, target, &mut declared, &mut HashSet::new(), &location)?;
            let target_location = graph.node(target).location().clone();
            candidates.push(Candidate {
                name: local_name(&target_location),
                location: target_location.to_string(),
            });
        }
        let Some(discriminator) = declared else {
            return Ok(None);
        };

        let base = owner_node.location().absolute_iri();
        let targets = discriminator
            .mapping
            .iter()
            .map(|(key, target)| (key.clone(), mapping_target(base, target)))
            .collect();
        Ok(Some(Self {
            discriminator,
            targets,
            candidates,
        }))
    }

    pub fn property_name(&self) -> &str {
        &self.discriminator.property_name
    }

    pub fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    /// Picks the alternative for a discriminating value.
    ///
    /// An alternative matches when the mapping sends `value` to it, or when
    /// no mapping entry targets it and its schema name equals `value`.
    pub fn select(&self, value: &str) -> Option<usize> {
        let explicit = self.targets.get(value);
        self.candidates.iter().position(|candidate| {
            if explicit.is_some_and(|target| target.matches(candidate)) {
                return true;
            }
            let targeted = self.targets.values().any(|target| target.matches(candidate));
            !targeted && candidate.name == value
        })
    }
}

fn inherit(
    graph: &SchemaGraph,
    node_id: NodeId,
    discriminator: &mut Option<Discriminator>,
    visited: &mut HashSet<String>,
    location: &SchemaLocation,
) -> Result<(), CompileError> {
    let node = graph.node(node_id);
    if visited.len() >= MAX_INHERITANCE_DEPTH || !visited.insert(node.location().to_string()) {
        return Ok(());
    }
    if let Some(raw) = node.raw().get("discriminator") {
        let nested = Discriminator::from_value(raw, &node.location().append_field("discriminator"))?;
        match discriminator {
            Some(existing) => existing.merge(&nested, location)?,
            None => *discriminator = Some(nested),
        }
    }
    if let Some(Value::Array(entries)) = node.raw().get("allOf") {
        for entry in entries {
            let Some(reference) = entry.get("$ref").and_then(Value::as_str) else {
                continue;
            };
            if let Some(parent) = resolve_static(graph, node_id, reference)? {
                inherit(graph, parent, discriminator, visited, location)?;
            }
        }
    }
    Ok(())
}

/// The name an alternative answers to without a mapping entry: the last
/// pointer segment, or the file stem of its resource IRI.
fn local_name(location: &SchemaLocation) -> String {
    if let Some(segment) = location.fragment().last() {
        return segment.as_text();
    }
    let iri = location.absolute_iri().unwrap_or("");
    let file = iri.rsplit('/').next().unwrap_or(iri);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}

fn mapping_target(base: Option<&str>, target: &str) -> MappingTarget {
    if !target.contains('#') && !target.contains('/') && !target.contains('.') {
        return MappingTarget::Name(target.to_string());
    }
    let resolved = resolve_iri(base, target);
    match SchemaLocation::parse(&resolved) {
        Some(location) => MappingTarget::Location(location.to_string()),
        None => MappingTarget::Location(resolved),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn location() -> SchemaLocation {
        SchemaLocation::document(None).append_field("discriminator")
    }

    #[test]
    fn test_parse_discriminator() {
        let parsed = Discriminator::from_value(
            &json!({"propertyName": "kind", "mapping": {"c": "#/$defs/Cat"}}),
            &location(),
        )
        .unwrap();
        assert_eq!(parsed.property_name, "kind");
        assert_eq!(parsed.mapping.get("c").map(String::as_str), Some("#/$defs/Cat"));
        assert!(Discriminator::from_value(&json!({"mapping": {}}), &location()).is_err());
    }

    #[test]
    fn test_merge_equal_mappings() {
        let mut a = Discriminator::from_value(
            &json!({"propertyName": "kind", "mapping": {"c": "#/$defs/Cat"}}),
            &location(),
        )
        .unwrap();
        let b = Discriminator::from_value(
            &json!({"propertyName": "kind", "mapping": {"c": "#/$defs/Cat", "d": "#/$defs/Dog"}}),
            &location(),
        )
        .unwrap();
        a.merge(&b, &location()).unwrap();
        assert_eq!(a.mapping.len(), 2);
    }

    #[test]
    fn test_merge_conflicts() {
        let mut a = Discriminator::from_value(
            &json!({"propertyName": "kind", "mapping": {"c": "#/$defs/Cat"}}),
            &location(),
        )
        .unwrap();
        let other_target = Discriminator::from_value(
            &json!({"propertyName": "kind", "mapping": {"c": "#/$defs/Lion"}}),
            &location(),
        )
        .unwrap();
        assert!(matches!(
            a.merge(&other_target, &location()),
            Err(CompileError::Discriminator { .. })
        ));
        let other_property = Discriminator::from_value(&json!({"propertyName": "type"}), &location()).unwrap();
        assert!(a.merge(&other_property, &location()).is_err());
    }

    #[test]
    fn test_local_name() {
        let location = SchemaLocation::document(Some("https://example.com/pets/Cat.json"));
        assert_eq!(local_name(&location), "Cat");
        assert_eq!(local_name(&location.append_field("$defs").append_field("Dog")), "Dog");
    }

    #[test]
    fn test_mapping_target_kinds() {
        assert!(matches!(mapping_target(None, "Cat"), MappingTarget::Name(_)));
        match mapping_target(Some("https://example.com/api.json"), "#/components/schemas/Cat") {
            MappingTarget::Location(location) => {
                assert_eq!(location, "https://example.com/api.json#/components/schemas/Cat")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
