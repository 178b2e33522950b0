//! Annotations collected during evaluation.

use serde_json::Value;

use crate::location::SchemaLocation;
use crate::path::NodePath;

/// A value attached to an instance location by a keyword.
///
/// `valid` turns false when the schema object that produced the annotation
/// fails; output formats drop invalid annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub keyword: String,
    pub instance_location: NodePath,
    pub evaluation_path: NodePath,
    pub schema_location: SchemaLocation,
    pub value: Value,
    pub valid: bool,
}

/// The annotations of one evaluation run, in recording order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub(crate) fn new(annotations: Vec<Annotation>) -> Self {
        Self(annotations)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All annotations, including those of failed schema objects.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    /// Annotations whose producing schema objects passed.
    pub fn valid(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter().filter(|a| a.valid)
    }

    pub fn for_location<'a>(&'a self, location: &'a NodePath) -> impl Iterator<Item = &'a Annotation> {
        self.valid().filter(move |a| &a.instance_location == location)
    }

    pub fn for_keyword<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Annotation> {
        self.valid().filter(move |a| a.keyword == keyword)
    }

    pub fn into_vec(self) -> Vec<Annotation> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotation(keyword: &str, location: NodePath, valid: bool) -> Annotation {
        Annotation {
            keyword: keyword.to_string(),
            instance_location: location,
            evaluation_path: NodePath::root().push_field(keyword),
            schema_location: SchemaLocation::default(),
            value: json!("x"),
            valid,
        }
    }

    #[test]
    fn test_invalid_annotations_are_filtered() {
        let root = NodePath::root();
        let annotations = Annotations::new(vec![
            annotation("title", root.clone(), true),
            annotation("title", root.push_field("a"), false),
            annotation("description", root.clone(), true),
        ]);
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations.valid().count(), 2);
        assert_eq!(annotations.for_keyword("title").count(), 1);
        assert_eq!(annotations.for_location(&root).count(), 2);
    }
}
