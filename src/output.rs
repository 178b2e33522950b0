//! Evaluation results and output formats.

use serde_json::{json, Value};
use stillwater::Validation;

use crate::annotation::{Annotation, Annotations};
use crate::error::{SchemaError, SchemaErrors};

/// Everything one evaluation run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Assertion errors in reporting order.
    pub errors: Vec<SchemaError>,
    pub annotations: Annotations,
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Renders the run through an output format.
    pub fn format<F: OutputFormat>(self, format: &F) -> F::Output {
        format.format(self)
    }
}

/// Turns an [`Evaluation`] into a caller-facing result.
pub trait OutputFormat {
    type Output;

    fn format(&self, evaluation: Evaluation) -> Self::Output;
}

/// Just the verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagFormat;

impl OutputFormat for FlagFormat {
    type Output = bool;

    fn format(&self, evaluation: Evaluation) -> bool {
        evaluation.is_valid()
    }
}

/// A flat JSON list of errors and valid annotations, shaped like the
/// JSON Schema "basic" output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFormat;

impl OutputFormat for ListFormat {
    type Output = Value;

    fn format(&self, evaluation: Evaluation) -> Value {
        let errors: Vec<Value> = evaluation.errors.iter().map(error_unit).collect();
        let annotations: Vec<Value> = evaluation.annotations.valid().map(annotation_unit).collect();
        json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "annotations": annotations,
        })
    }
}

fn error_unit(error: &SchemaError) -> Value {
    let mut unit = json!({
        "instanceLocation": error.instance_location.to_string(),
        "keywordLocation": error.evaluation_path.to_string(),
        "absoluteKeywordLocation": error.schema_location.to_string(),
        "keyword": error.keyword,
        "code": error.code,
        "error": error.message,
    });
    if let Some(expected) = &error.expected {
        unit["expected"] = Value::String(expected.clone());
    }
    if let Some(got) = &error.got {
        unit["got"] = Value::String(got.clone());
    }
    unit
}

fn annotation_unit(annotation: &Annotation) -> Value {
    json!({
        "instanceLocation": annotation.instance_location.to_string(),
        "keywordLocation": annotation.evaluation_path.to_string(),
        "absoluteKeywordLocation": annotation.schema_location.to_string(),
        "keyword": annotation.keyword,
        "annotation": annotation.value,
    })
}

/// Accumulated errors as a `stillwater` validation; the success value
/// carries the annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationFormat;

impl OutputFormat for ValidationFormat {
    type Output = Validation<Annotations, SchemaErrors>;

    fn format(&self, evaluation: Evaluation) -> Self::Output {
        match SchemaErrors::from_vec(evaluation.errors) {
            Some(errors) => Validation::Failure(errors),
            None => Validation::Success(evaluation.annotations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::NodePath;
    use pretty_assertions::assert_eq;

    fn failed() -> Evaluation {
        Evaluation {
            errors: vec![SchemaError::new(NodePath::root().push_field("a"), "Value is not a string")
                .with_keyword("type")
                .with_expected("string")],
            annotations: Annotations::default(),
        }
    }

    #[test]
    fn test_flag_format() {
        assert!(Evaluation::default().format(&FlagFormat));
        assert!(!failed().format(&FlagFormat));
    }

    #[test]
    fn test_list_format_units() {
        let output = failed().format(&ListFormat);
        assert_eq!(output["valid"], json!(false));
        assert_eq!(
            output["errors"][0],
            json!({
                "instanceLocation": "/a",
                "keywordLocation": "",
                "absoluteKeywordLocation": "#",
                "keyword": "type",
                "code": "type",
                "error": "Value is not a string",
                "expected": "string"
            })
        );
        assert_eq!(output["annotations"], json!([]));
    }

    #[test]
    fn test_validation_format() {
        assert!(Evaluation::default().format(&ValidationFormat).is_success());
        let errors = failed().format(&ValidationFormat).into_result().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.first().code, "type");
    }
}
