//! String keywords: `minLength`, `maxLength`, `pattern` and `format`.

use std::net::{Ipv4Addr, Ipv6Addr};

use regex::Regex;
use serde_json::Value;
use url::Url;

use super::object::compile_regex;
use super::{CompileResult, Keyword, KeywordInput, KeywordMeta};
use crate::context::{ExecutionContext, Interrupt};
use crate::path::NodePath;
use crate::value::preview;

/// `minLength` / `maxLength`, counted in Unicode scalar values.
pub struct Length {
    meta: KeywordMeta,
    limit: u64,
    maximum: bool,
}

pub fn compile_length(input: &KeywordInput<'_>) -> CompileResult {
    Ok(Some(Box::new(Length {
        meta: input.meta(),
        limit: input.non_negative()?,
        maximum: input.keyword == "maxLength",
    })))
}

impl Keyword for Length {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::String(text) = instance else {
            return Ok(());
        };
        let length = text.chars().count() as u64;
        let message = if self.maximum && length > self.limit {
            format!("String is longer than {} characters", self.limit)
        } else if !self.maximum && length < self.limit {
            format!("String is shorter than {} characters", self.limit)
        } else {
            return Ok(());
        };
        ctx.report(
            self.meta
                .error(location, message)
                .with_expected(self.limit.to_string())
                .with_got(length.to_string()),
        )
    }
}

pub struct Pattern {
    meta: KeywordMeta,
    regex: Regex,
}

pub fn compile_pattern(input: &KeywordInput<'_>) -> CompileResult {
    let pattern = input
        .value
        .as_str()
        .ok_or_else(|| input.invalid("expected a string"))?;
    Ok(Some(Box::new(Pattern {
        meta: input.meta(),
        regex: compile_regex(input, pattern)?,
    })))
}

impl Keyword for Pattern {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        let Value::String(text) = instance else {
            return Ok(());
        };
        if self.regex.is_match(text) {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, format!("String does not match pattern '{}'", self.regex.as_str()))
                .with_expected(self.regex.as_str())
                .with_got(preview(instance)),
        )
    }
}

/// `format`: always an annotation, and an assertion when the run or the
/// dialect asks for one. Unknown formats never fail.
pub struct Format {
    meta: KeywordMeta,
    format: String,
    dialect_asserts: bool,
}

pub fn compile_format(input: &KeywordInput<'_>) -> CompileResult {
    let format = input
        .value
        .as_str()
        .ok_or_else(|| input.invalid("expected a string"))?;
    Ok(Some(Box::new(Format {
        meta: input.meta(),
        format: format.to_string(),
        dialect_asserts: input.dialect().asserts_format(),
    })))
}

impl Keyword for Format {
    fn meta(&self) -> &KeywordMeta {
        &self.meta
    }

    fn validate(&self, ctx: &mut ExecutionContext<'_>, instance: &Value, location: &NodePath) -> Result<(), Interrupt> {
        self.meta
            .annotate(ctx, location, || Value::String(self.format.clone()));
        let asserts = ctx.config().format_assertions.unwrap_or(self.dialect_asserts);
        let Value::String(text) = instance else {
            return Ok(());
        };
        if !asserts || check_format(&self.format, text) != Some(false) {
            return Ok(());
        }
        ctx.report(
            self.meta
                .error(location, format!("Value is not a valid {}", self.format))
                .with_expected(self.format.clone())
                .with_got(preview(instance)),
        )
    }
}

/// Checks `text` against a known format; `None` for unknown formats.
pub fn check_format(format: &str, text: &str) -> Option<bool> {
    let valid = match format {
        "email" => is_email(text),
        "ipv4" => text.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => text.parse::<Ipv6Addr>().is_ok(),
        "uuid" => is_uuid(text),
        "date" => is_date(text),
        "date-time" => is_date_time(text),
        "uri" => Url::parse(text).is_ok(),
        "regex" => Regex::new(text).is_ok(),
        _ => return None,
    };
    Some(valid)
}

fn is_email(text: &str) -> bool {
    match text.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !text.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn is_uuid(text: &str) -> bool {
    let groups: Vec<&str> = text.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(group, len)| group.len() == len && group.chars().all(|c| c.is_ascii_hexdigit()))
}

fn digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn is_date(text: &str) -> bool {
    let parts: Vec<&str> = text.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return false;
    };
    if year.len() != 4 || month.len() != 2 || day.len() != 2 {
        return false;
    }
    let (Some(year), Some(month), Some(day)) = (digits(year), digits(month), digits(day)) else {
        return false;
    };
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

fn is_time(text: &str) -> bool {
    let (clock, offset) = match text.find(['Z', 'z', '+', '-']) {
        Some(index) => text.split_at(index),
        None => return false,
    };
    let offset_valid = match offset {
        "Z" | "z" => true,
        _ => {
            let sign_free = &offset[1..];
            match sign_free.split_once(':') {
                Some((hours, minutes)) => {
                    hours.len() == 2
                        && minutes.len() == 2
                        && digits(hours).is_some_and(|h| h < 24)
                        && digits(minutes).is_some_and(|m| m < 60)
                }
                None => false,
            }
        }
    };
    let (clock, fraction) = match clock.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (clock, None),
    };
    if fraction.is_some_and(|f| f.is_empty() || !f.chars().all(|c| c.is_ascii_digit())) {
        return false;
    }
    let parts: Vec<&str> = clock.split(':').collect();
    let [hour, minute, second] = parts.as_slice() else {
        return false;
    };
    let two = |p: &str| if p.len() == 2 { digits(p) } else { None };
    match (two(*hour), two(*minute), two(*second)) {
        (Some(h), Some(m), Some(s)) => offset_valid && h < 24 && m < 60 && s <= 60,
        _ => false,
    }
}

fn is_date_time(text: &str) -> bool {
    match text.find(['T', 't']) {
        Some(index) => is_date(&text[..index]) && is_time(&text[index + 1..]),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::registry::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_length_counts_characters() {
        let schema = SchemaRegistry::new()
            .compile(&json!({"minLength": 2, "maxLength": 3}))
            .unwrap();
        assert!(schema.is_valid(&json!("éé")).unwrap());
        assert!(!schema.is_valid(&json!("é")).unwrap());
        assert!(!schema.is_valid(&json!("abcd")).unwrap());
        assert!(schema.is_valid(&json!(12345)).unwrap());
    }

    #[test]
    fn test_pattern_is_unanchored() {
        let schema = SchemaRegistry::new().compile(&json!({"pattern": "b+"})).unwrap();
        assert!(schema.is_valid(&json!("abbc")).unwrap());
        assert!(!schema.is_valid(&json!("ac")).unwrap());
    }

    #[test]
    fn test_format_annotates_by_default_in_2020_12() {
        let schema = SchemaRegistry::new().compile(&json!({"format": "email"})).unwrap();
        assert!(schema.is_valid(&json!("nope")).unwrap());
        let config = ExecutionConfig::new().with_format_assertions(true);
        let evaluation = schema.evaluate(&json!("nope"), &config).unwrap();
        assert_eq!(evaluation.errors.len(), 1);
        assert_eq!(evaluation.errors[0].keyword, "format");
    }

    #[test]
    fn test_format_asserts_in_draft7() {
        let schema = SchemaRegistry::new()
            .compile(&json!({"$schema": "http://json-schema.org/draft-07/schema#", "format": "ipv4"}))
            .unwrap();
        assert!(schema.is_valid(&json!("192.168.0.1")).unwrap());
        assert!(!schema.is_valid(&json!("300.1.1.1")).unwrap());
    }

    #[test]
    fn test_format_checkers() {
        assert_eq!(check_format("email", "joe@example.com"), Some(true));
        assert_eq!(check_format("email", "joe"), Some(false));
        assert_eq!(check_format("ipv6", "::1"), Some(true));
        assert_eq!(check_format("uuid", "123e4567-e89b-12d3-a456-426614174000"), Some(true));
        assert_eq!(check_format("uuid", "123e4567e89b12d3a456426614174000"), Some(false));
        assert_eq!(check_format("date", "2024-02-29"), Some(true));
        assert_eq!(check_format("date", "2023-02-29"), Some(false));
        assert_eq!(check_format("date-time", "2024-01-01T10:20:30Z"), Some(true));
        assert_eq!(check_format("date-time", "2024-01-01T10:20:30.5+01:00"), Some(true));
        assert_eq!(check_format("date-time", "2024-01-01 10:20:30Z"), Some(false));
        assert_eq!(check_format("uri", "https://example.com/a"), Some(true));
        assert_eq!(check_format("uri", "relative/path"), Some(false));
        assert_eq!(check_format("regex", "("), Some(false));
        assert_eq!(check_format("unknown", "anything"), None);
    }
}
