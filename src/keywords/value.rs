//! Keywords that apply to any instance type: boolean schemas, `type`,
//! `enum`, `const`, annotation-only keywords and keywords with no runtime
//! behaviour.

use serde_json::Value;

use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::path::{NodePath, PathSegment};
use crate::schema::SchemaNode;
use crate::value::{preview, value_type_name, values_equal, TypeSet};

/// The `true` / `false` schema.
pub struct BooleanSchema {
    meta: KeywordMeta,
    valid: bool,
}

impl BooleanSchema {
    pub fn new(node: &SchemaNode, valid: bool) -> Self {
        let meta = KeywordMeta {
            keyword: valid.to_string(),
            schema_location: node.location().clone(),
            evaluation_path: node.evaluation_path().clone(),
            node: node.id(),
        };
        Self { meta, valid }
    }
}

impl Keyword for BooleanSchema {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        if self.valid {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, "False schema does not allow this value")
                .with_got(preview(instance)),
        )
    }
}

pub struct TypeKeyword {
    meta: KeywordMeta,
    types: TypeSet,
    nullable: bool,
}

pub fn compile_type(input: &KeywordInput<'_>) -> CompileResult {
    let types = TypeSet::from_value(input.value)
        .ok_or_else(|| input.invalid("expected a type name or an array of type names"))?;
    let nullable = input.dialect().has_nullable()
        && input.sibling("nullable").and_then(Value::as_bool) == Some(true);
    Ok(Some(Box::new(TypeKeyword {
        meta: input.meta(),
        types,
        nullable,
    })))
}

impl Keyword for TypeKeyword {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        if self.types.matches(instance) || (self.nullable && instance.is_null()) {
            return Ok(());
        }
        let expected = if self.nullable {
            format!("{}, null", self.types)
        } else {
            self.types.to_string()
        };
        ctx.report(
            self.meta
                .error(
                    location,
                    format!("Value is {} but should be {}", value_type_name(instance), expected),
                )
                .with_expected(expected)
                .with_got(value_type_name(instance)),
        )
    }
}

pub struct EnumKeyword {
    meta: KeywordMeta,
    values: Vec<Value>,
}

pub fn compile_enum(input: &KeywordInput<'_>) -> CompileResult {
    let values = input
        .value
        .as_array()
        .ok_or_else(|| input.invalid("expected an array"))?
        .clone();
    Ok(Some(Box::new(EnumKeyword {
        meta: input.meta(),
        values,
    })))
}

impl Keyword for EnumKeyword {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        if self.values.iter().any(|v| values_equal(v, instance)) {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, "Value is not one of the allowed values")
                .with_expected(preview(&Value::Array(self.values.clone())))
                .with_got(preview(instance)),
        )
    }
}

pub struct ConstKeyword {
    meta: KeywordMeta,
    value: Value,
}

pub fn compile_const(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(ConstKeyword {
        meta: input.meta(),
        value: input.value.clone(),
    })))
}

impl Keyword for ConstKeyword {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        if values_equal(&self.value, instance) {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, "Value does not equal the constant")
                .with_expected(preview(&self.value))
                .with_got(preview(instance)),
        )
    }
}

/// Emits its value as an annotation and never fails.
pub struct AnnotationKeyword {
    meta: KeywordMeta,
    value: Value,
}

pub fn compile_annotation(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(AnnotationKeyword {
        meta: input.meta(),
        value: input.value.clone(),
    })))
}

impl Keyword for AnnotationKeyword {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, _instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        self.meta.annotate(ctx, location, || self.value.clone());
        Ok(())
    }
}

/// Keywords read by the compiler or by a sibling keyword.
pub fn compile_ignored(_input: &KeywordInput<'_>) -> CompileResult {
    Ok(None)
}

/// `$defs` / `definitions`: compiles every entry so identifiers and anchors
/// inside them are registered. Nothing runs at evaluation time.
pub fn compile_definitions(input: &KeywordInput<'_>) -> CompileResult {
    let entries = input
        .value
        .as_object()
        .ok_or_else(|| input.invalid("expected an object of schemas"))?;
    for (name, schema) in entries {
        input.subschema(schema, &[PathSegment::field(name.as_str())])?;
    }
    Ok(None)
}
