//! Keyword tables of the built-in dialects.

use std::sync::Arc;

use indexmap::IndexMap;

use super::SpecVersion;
use crate::keywords::{
    array, combinators, discriminator, numeric, object, refs, string, unevaluated, value,
    CompileResult, KeywordFactory, KeywordInput,
};

type Table = IndexMap<String, KeywordFactory>;

fn add(table: &mut Table, name: &str, factory: fn(&KeywordInput<'_>) -> CompileResult) {
    table.insert(name.to_string(), Arc::new(factory));
}

fn add_all(table: &mut Table, names: &[&str], factory: fn(&KeywordInput<'_>) -> CompileResult) {
    for name in names {
        add(table, name, factory);
    }
}

pub(super) fn keywords(version: SpecVersion) -> Table {
    let mut table = Table::new();

    // Identity and structure.
    add_all(&mut table, &["$schema", "id", "$id"], value::compile_ignored);
    add(&mut table, "definitions", value::compile_definitions);
    add(&mut table, "$ref", refs::compile_ref);

    // Applicators.
    add(&mut table, "allOf", combinators::compile_all_of);
    add(&mut table, "anyOf", combinators::compile_any_of);
    add(&mut table, "oneOf", combinators::compile_one_of);
    add(&mut table, "not", combinators::compile_not);
    add(&mut table, "properties", object::compile_properties);
    add(&mut table, "patternProperties", object::compile_pattern_properties);
    add(&mut table, "additionalProperties", object::compile_additional_properties);
    add(&mut table, "items", array::compile_items);

    // Assertions.
    add(&mut table, "type", value::compile_type);
    add(&mut table, "enum", value::compile_enum);
    add(&mut table, "required", object::compile_required);
    add_all(&mut table, &["minProperties", "maxProperties"], object::compile_property_count);
    add_all(&mut table, &["minLength", "maxLength"], string::compile_length);
    add(&mut table, "pattern", string::compile_pattern);
    add(&mut table, "format", string::compile_format);
    add_all(&mut table, &["minimum", "maximum"], numeric::compile_bound);
    add_all(&mut table, &["exclusiveMinimum", "exclusiveMaximum"], numeric::compile_exclusive_bound);
    add(&mut table, "multipleOf", numeric::compile_multiple_of);
    add_all(&mut table, &["minItems", "maxItems"], array::compile_item_count);
    add(&mut table, "uniqueItems", array::compile_unique_items);

    add_all(&mut table, &["title", "description", "default"], value::compile_annotation);

    if version < SpecVersion::Draft202012 {
        add(&mut table, "additionalItems", value::compile_ignored);
    }
    if version < SpecVersion::Draft201909 {
        add(&mut table, "dependencies", object::compile_dependencies);
    }
    if version >= SpecVersion::Draft6 {
        add(&mut table, "const", value::compile_const);
        add(&mut table, "contains", array::compile_contains);
        add(&mut table, "propertyNames", object::compile_property_names);
        add(&mut table, "examples", value::compile_annotation);
    }
    if version >= SpecVersion::Draft7 {
        add(&mut table, "if", combinators::compile_if);
        add_all(&mut table, &["then", "else"], value::compile_ignored);
        add_all(
            &mut table,
            &["readOnly", "writeOnly", "$comment", "contentEncoding", "contentMediaType"],
            value::compile_annotation,
        );
    }
    if version >= SpecVersion::Draft201909 {
        add_all(&mut table, &["$anchor", "$vocabulary"], value::compile_ignored);
        add(&mut table, "$defs", value::compile_definitions);
        add(&mut table, "dependentSchemas", object::compile_dependent_schemas);
        add(&mut table, "dependentRequired", object::compile_dependent_required);
        add_all(&mut table, &["minContains", "maxContains"], value::compile_ignored);
        add(&mut table, "unevaluatedProperties", unevaluated::compile_unevaluated_properties);
        add(&mut table, "unevaluatedItems", unevaluated::compile_unevaluated_items);
        add_all(&mut table, &["deprecated", "contentSchema"], value::compile_annotation);
    }
    if version == SpecVersion::Draft201909 {
        add(&mut table, "$recursiveRef", refs::compile_recursive_ref);
        add(&mut table, "$recursiveAnchor", value::compile_ignored);
    }
    if version >= SpecVersion::Draft202012 {
        add(&mut table, "prefixItems", array::compile_prefix_items);
        add(&mut table, "$dynamicRef", refs::compile_dynamic_ref);
        add(&mut table, "$dynamicAnchor", value::compile_ignored);
    }

    table
}

/// OpenAPI additions. `legacy` selects the 3.0 flavour with `nullable`.
pub(super) fn add_openapi(table: &mut Table, legacy: bool) {
    add(table, "discriminator", discriminator::compile_discriminator);
    add_all(table, &["example", "xml", "externalDocs"], value::compile_annotation);
    if legacy {
        add(table, "nullable", value::compile_ignored);
        add_all(table, &["readOnly", "writeOnly", "deprecated"], value::compile_annotation);
    }
}
