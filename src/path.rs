//! Paths into JSON documents.
//!
//! [`NodePath`] is used for instance locations, evaluation paths and schema
//! location fragments. It renders as a JSON Pointer (RFC 6901), so the
//! property `a/b` inside array element 0 is `/0/a~1b`.

use std::fmt::{self, Display};

use serde_json::Value;

/// A segment of a node path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// An object member name (e.g., `properties`, `email`)
    Field(String),
    /// An array index (e.g., `0`, `42`)
    Index(usize),
}

impl PathSegment {
    pub fn field(name: impl Into<String>) -> Self {
        PathSegment::Field(name.into())
    }

    pub fn index(idx: usize) -> Self {
        PathSegment::Index(idx)
    }

    /// Returns the unescaped text of the segment.
    pub fn as_text(&self) -> String {
        match self {
            PathSegment::Field(name) => name.clone(),
            PathSegment::Index(idx) => idx.to_string(),
        }
    }
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(&escape_token(name)),
            PathSegment::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// A path to a value in a JSON document.
///
/// # Example
///
/// ```rust
/// use verdict::NodePath;
///
/// let path = NodePath::root()
///     .push_field("users")
///     .push_index(0)
///     .push_field("email");
///
/// assert_eq!(path.to_string(), "/users/0/email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

impl NodePath {
    /// Creates an empty path representing the document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a JSON Pointer such as `/properties/a~1b/0`.
    ///
    /// Tokens made only of digits (without a leading zero) become index
    /// segments. Returns `None` when the text is neither empty nor starts
    /// with `/`.
    pub fn parse_pointer(pointer: &str) -> Option<Self> {
        if pointer.is_empty() {
            return Some(Self::root());
        }
        let rest = pointer.strip_prefix('/')?;
        let segments = rest
            .split('/')
            .map(|token| {
                let token = unescape_token(token);
                match token.parse::<usize>() {
                    Ok(idx) if token == idx.to_string() => PathSegment::Index(idx),
                    _ => PathSegment::Field(token),
                }
            })
            .collect();
        Some(Self { segments })
    }

    /// Returns a new path with a field segment appended.
    pub fn push_field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name.into()));
        Self { segments }
    }

    /// Returns a new path with an index segment appended.
    pub fn push_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Returns a new path with a segment appended.
    pub fn push(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    /// Returns the parent path, or None if this is root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Returns true if `self` is a direct child of `parent`.
    pub fn is_child_of(&self, parent: &NodePath) -> bool {
        self.segments.len() == parent.segments.len() + 1
            && self.segments[..parent.segments.len()] == parent.segments[..]
    }

    /// Looks up the value this path points to inside `document`.
    pub fn resolve<'v>(&self, document: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(document, |current, segment| step(current, segment))
    }
}

/// Moves one segment into a value, treating index and field tokens alike.
pub(crate) fn step<'v>(value: &'v Value, segment: &PathSegment) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), segment) => map.get(&segment.as_text()),
        (Value::Array(items), PathSegment::Index(idx)) => items.get(*idx),
        _ => None,
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_path_is_empty() {
        let path = NodePath::root();
        assert!(path.is_root());
        assert_eq!(path.len(), 0);
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn test_pointer_display() {
        let path = NodePath::root().push_field("users").push_index(0).push_field("email");
        assert_eq!(path.to_string(), "/users/0/email");
    }

    #[test]
    fn test_escaping() {
        let path = NodePath::root().push_field("a/b").push_field("m~n");
        assert_eq!(path.to_string(), "/a~1b/m~0n");
        assert_eq!(NodePath::parse_pointer("/a~1b/m~0n"), Some(path));
    }

    #[test]
    fn test_parse_pointer_indices() {
        let path = NodePath::parse_pointer("/allOf/0/items/01").unwrap();
        let segments: Vec<_> = path.segments().cloned().collect();
        assert_eq!(
            segments,
            vec![
                PathSegment::field("allOf"),
                PathSegment::index(0),
                PathSegment::field("items"),
                PathSegment::field("01"),
            ]
        );
        assert!(NodePath::parse_pointer("no-slash").is_none());
    }

    #[test]
    fn test_parent_and_child() {
        let parent = NodePath::root().push_field("a");
        let child = parent.push_index(3);
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_child_of(&child));
        assert_eq!(child.parent(), Some(parent));
    }

    #[test]
    fn test_resolve_in_document() {
        let doc = json!({"$defs": {"0": {"type": "string"}}, "items": [true, {"minimum": 1}]});
        let numeric_key = NodePath::parse_pointer("/$defs/0").unwrap();
        assert_eq!(numeric_key.resolve(&doc), Some(&json!({"type": "string"})));
        let item = NodePath::parse_pointer("/items/1/minimum").unwrap();
        assert_eq!(item.resolve(&doc), Some(&json!(1)));
        assert!(NodePath::parse_pointer("/missing").unwrap().resolve(&doc).is_none());
    }
}
