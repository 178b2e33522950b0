//! Schema locations and IRI resolution.
//!
//! A [`SchemaLocation`] is the canonical address of a schema node: the
//! absolute IRI of its enclosing resource plus a JSON Pointer fragment. A
//! document compiled without a base IRI has no absolute IRI, and references
//! inside it stay relative.

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};

use url::Url;

use crate::path::{NodePath, PathSegment};

#[derive(Debug, Clone, Default)]
pub struct SchemaLocation {
    absolute_iri: Option<String>,
    fragment: NodePath,
}

impl SchemaLocation {
    /// Location of a document root. The IRI is normalized and any trailing
    /// empty fragment is dropped.
    pub fn document(iri: Option<&str>) -> Self {
        Self {
            absolute_iri: iri.map(normalize_iri).filter(|iri| !iri.is_empty()),
            fragment: NodePath::root(),
        }
    }

    /// Parses `iri#/pointer`. Anchor fragments are not locations and yield
    /// `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (iri, fragment) = split_fragment(text);
        let pointer = NodePath::parse_pointer(&percent_decode(fragment.unwrap_or("")))?;
        let mut location = Self::document(Some(iri));
        location.fragment = pointer;
        Some(location)
    }

    pub fn absolute_iri(&self) -> Option<&str> {
        self.absolute_iri.as_deref()
    }

    pub fn fragment(&self) -> &NodePath {
        &self.fragment
    }

    pub fn has_fragment(&self) -> bool {
        !self.fragment.is_root()
    }

    pub fn append_field(&self, name: impl Into<String>) -> Self {
        Self {
            absolute_iri: self.absolute_iri.clone(),
            fragment: self.fragment.push_field(name),
        }
    }

    pub fn append_index(&self, index: usize) -> Self {
        Self {
            absolute_iri: self.absolute_iri.clone(),
            fragment: self.fragment.push_index(index),
        }
    }

    pub fn append(&self, segment: PathSegment) -> Self {
        Self {
            absolute_iri: self.absolute_iri.clone(),
            fragment: self.fragment.push(segment),
        }
    }

    pub fn append_pointer(&self, pointer: &NodePath) -> Self {
        let mut location = self.clone();
        for segment in pointer.segments() {
            location.fragment = location.fragment.push(segment.clone());
        }
        location
    }

    /// Resolves an identifier without fragment against this location,
    /// producing the root location of a new resource.
    pub fn resolve_resource(&self, reference: &str) -> Self {
        let resolved = resolve_iri(self.absolute_iri(), reference);
        Self::document(Some(&resolved))
    }

    /// Key used for the resource registry: the absolute IRI, followed by
    /// `#pointer` when the fragment is not empty.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(iri) = &self.absolute_iri {
            f.write_str(iri)?;
        }
        if self.has_fragment() || self.absolute_iri.is_none() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

// Index and field segments spelled alike ("0") denote the same location.
impl PartialEq for SchemaLocation {
    fn eq(&self, other: &Self) -> bool {
        self.absolute_iri == other.absolute_iri
            && self.fragment.to_string() == other.fragment.to_string()
    }
}

impl Eq for SchemaLocation {}

impl Hash for SchemaLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.absolute_iri.hash(state);
        self.fragment.to_string().hash(state);
    }
}

/// Splits `iri#fragment` at the first `#`.
pub fn split_fragment(text: &str) -> (&str, Option<&str>) {
    match text.find('#') {
        Some(idx) => (&text[..idx], Some(&text[idx + 1..])),
        None => (text, None),
    }
}

/// Returns true for a plain-name fragment such as `foo` (not a pointer).
pub fn is_anchor_fragment(fragment: &str) -> bool {
    !fragment.is_empty() && !fragment.starts_with('/')
}

/// Returns true if the text parses as an absolute IRI with a scheme.
pub fn is_absolute_iri(text: &str) -> bool {
    text.contains(':') && Url::parse(text).is_ok()
}

/// Normalizes an IRI: parses it when possible and drops an empty trailing
/// fragment. Unparsable text (relative paths, URNs with odd syntax) is kept.
pub fn normalize_iri(iri: &str) -> String {
    let normalized = match Url::parse(iri) {
        Ok(url) => url.to_string(),
        Err(_) => iri.to_string(),
    };
    match normalized.strip_suffix('#') {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}

/// Resolves `reference` against an optional base IRI (RFC 3986).
///
/// Without a base, or with a base the `url` crate cannot use as one, the
/// reference is returned unchanged unless it is a bare fragment, which is
/// then attached to the base.
pub fn resolve_iri(base: Option<&str>, reference: &str) -> String {
    let base = match base {
        Some(base) if !base.is_empty() => base,
        _ => return normalize_iri(reference),
    };
    if reference.is_empty() {
        return normalize_iri(base);
    }
    if let Some(fragment) = reference.strip_prefix('#') {
        let (document, _) = split_fragment(base);
        return if fragment.is_empty() {
            document.to_string()
        } else {
            format!("{}#{}", document, fragment)
        };
    }
    match Url::parse(base).and_then(|url| url.join(reference)) {
        Ok(url) => normalize_iri(url.as_str()),
        Err(_) => normalize_iri(reference),
    }
}

/// Decodes `%XX` escapes in a fragment. Invalid escapes are kept verbatim.
pub fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_location_display() {
        let location = SchemaLocation::document(Some("https://example.com/root.json"));
        assert_eq!(location.to_string(), "https://example.com/root.json");
        let child = location.append_field("properties").append_field("a");
        assert_eq!(child.to_string(), "https://example.com/root.json#/properties/a");
    }

    #[test]
    fn test_location_without_base() {
        let location = SchemaLocation::document(None);
        assert_eq!(location.to_string(), "#");
        assert_eq!(location.append_field("items").to_string(), "#/items");
    }

    #[test]
    fn test_resolve_relative_reference() {
        let base = Some("https://example.com/schemas/root.json");
        assert_eq!(resolve_iri(base, "item.json"), "https://example.com/schemas/item.json");
        assert_eq!(resolve_iri(base, "#foo"), "https://example.com/schemas/root.json#foo");
        assert_eq!(resolve_iri(base, "#"), "https://example.com/schemas/root.json");
        assert_eq!(
            resolve_iri(base, "https://other.org/x.json#/a"),
            "https://other.org/x.json#/a"
        );
    }

    #[test]
    fn test_resolve_without_base() {
        assert_eq!(resolve_iri(None, "#n"), "#n");
        assert_eq!(resolve_iri(None, "item.json"), "item.json");
    }

    #[test]
    fn test_urn_base() {
        let base = Some("urn:example:root");
        assert_eq!(resolve_iri(base, "#/$defs/a"), "urn:example:root#/$defs/a");
    }

    #[test]
    fn test_parse_location() {
        let location = SchemaLocation::parse("https://example.com/a.json#/$defs/x%20y").unwrap();
        assert_eq!(location.absolute_iri(), Some("https://example.com/a.json"));
        assert_eq!(location.fragment().to_string(), "/$defs/x y");
        assert!(SchemaLocation::parse("https://example.com/a.json#anchor").is_none());
    }

    #[test]
    fn test_location_equality_ignores_segment_kind() {
        let base = SchemaLocation::document(Some("https://example.com/a.json"));
        assert_eq!(base.append_index(0), base.append_field("0"));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%25b%7E"), "a%b~");
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
    }
}
