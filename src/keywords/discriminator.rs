//! The standalone `discriminator` keyword.
//!
//! Branch selection happens in `anyOf`; this keyword validates the
//! discriminator object, annotates the discriminating value and rejects a
//! nested discriminator that redefines the property on the same instance
//! location.

use serde_json::Value;

use super::value::compile_annotation;
use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::discriminator::Discriminator;
use crate::path::NodePath;

/// The `discriminator` object of an OpenAPI schema.
///
/// Records the discriminating value as an annotation. When an `anyOf`
/// higher up already dispatched on a different property name at the same
/// instance location, the redefinition is reported as an error.
pub struct DiscriminatorKeyword {
    meta: KeywordMeta,
    discriminator: Discriminator,
}

/// Compiles `discriminator`. Where discriminators are disabled the value
/// is kept as a plain annotation.
pub fn compile_discriminator(input: &KeywordInput<'_>) -> CompileResult {
    if !input.graph.discriminator_enabled(input.dialect()) {
        return compile_annotation(input);
    }
    let meta = input.meta();
    let discriminator = Discriminator::from_value(input.value, &meta.schema_location)?;
    Ok(Some(Box::new(DiscriminatorKeyword {
        meta,
        discriminator,
    })))
}

impl Keyword for DiscriminatorKeyword {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Object(object) = instance else {
            return Ok(());
        };
        let property = &self.discriminator.property_name;
        if let Some(frame) = ctx.current_discriminator() {
            if &frame.instance_location == location && &frame.property_name != property {
                let message = format!(
                    "Discriminator property '{}' cannot be redefined as '{}'",
                    frame.property_name, property
                );
                return ctx.report(self.meta.error(location, message));
            }
        }
        if let Some(value) = object.get(property) {
            self.meta.annotate(ctx, location, || value.clone());
        }
        Ok(())
    }
}
