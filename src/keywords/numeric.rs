//! Numeric keywords.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::dialect::SpecVersion;
use crate::path::NodePath;

/// Orders two numbers, exactly when both are integers.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

/// `minimum`, `maximum`, `exclusiveMinimum` and `exclusiveMaximum`.
pub struct Bound {
    meta: KeywordMeta,
    limit: Number,
    maximum: bool,
    exclusive: bool,
}

fn read_limit(input: &KeywordInput<'_>) -> Result<Number, crate::error::CompileError> {
    match input.value {
        Value::Number(limit) => Ok(limit.clone()),
        _ => Err(input.invalid("expected a number")),
    }
}

/// `minimum` / `maximum`. In draft 4 a sibling `exclusiveMinimum: true`
/// (or `exclusiveMaximum`) makes the bound exclusive.
pub fn compile_bound(input: &KeywordInput<'_>) -> CompileResult {
    let maximum = input.keyword == "maximum";
    let exclusive = input.dialect().version() == SpecVersion::Draft4 && {
        let flag = if maximum { "exclusiveMaximum" } else { "exclusiveMinimum" };
        input.sibling(flag).and_then(Value::as_bool) == Some(true)
    };
    Ok(Some(Box::new(Bound {
        meta: input.meta(),
        limit: read_limit(input)?,
        maximum,
        exclusive,
    })))
}

pub fn compile_exclusive_bound(input: &KeywordInput<'_>) -> CompileResult {
    if input.dialect().version() == SpecVersion::Draft4 {
        return match input.value {
            Value::Bool(_) => Ok(None),
            _ => Err(input.invalid("expected a boolean")),
        };
    }
    Ok(Some(Box::new(Bound {
        meta: input.meta(),
        limit: read_limit(input)?,
        maximum: input.keyword == "exclusiveMaximum",
        exclusive: true,
    })))
}

impl Keyword for Bound {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Number(value) = instance else {
            return Ok(());
        };
        let Some(ordering) = compare_numbers(value, &self.limit) else {
            return Ok(());
        };
        let valid = match (self.maximum, self.exclusive) {
            (false, false) => ordering != Ordering::Less,
            (false, true) => ordering == Ordering::Greater,
            (true, false) => ordering != Ordering::Greater,
            (true, true) => ordering == Ordering::Less,
        };
        if valid {
            return Ok(());
        }
        let relation = match (self.maximum, self.exclusive) {
            (false, false) => "less than the minimum of",
            (false, true) => "less than or equal to the exclusive minimum of",
            (true, false) => "greater than the maximum of",
            (true, true) => "greater than or equal to the exclusive maximum of",
        };
        ctx.report(
            self.meta
                .error(location, format!("{} is {} {}", value, relation, self.limit))
                .with_expected(self.limit.to_string())
                .with_got(value.to_string()),
        )
    }
}

pub struct MultipleOf {
    meta: KeywordMeta,
    divisor: Number,
}

pub fn compile_multiple_of(input: &KeywordInput<'_>) -> CompileResult {
    let divisor = read_limit(input)?;
    if divisor.as_f64().map_or(true, |d| d <= 0.0) {
        return Err(input.invalid("expected a number greater than 0"));
    }
    Ok(Some(Box::new(MultipleOf {
        meta: input.meta(),
        divisor,
    })))
}

fn is_multiple(value: &Number, divisor: &Number) -> bool {
    if let (Some(v), Some(d)) = (value.as_i64(), divisor.as_i64()) {
        return v % d == 0;
    }
    let (Some(v), Some(d)) = (value.as_f64(), divisor.as_f64()) else {
        return false;
    };
    let quotient = v / d;
    quotient.is_finite() && (quotient - quotient.round()).abs() < 1e-9
}

impl Keyword for MultipleOf {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::Number(value) = instance else {
            return Ok(());
        };
        if is_multiple(value, &self.divisor) {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, format!("{} is not a multiple of {}", value, self.divisor))
                .with_expected(self.divisor.to_string())
                .with_got(value.to_string()),
        )
    }
}
