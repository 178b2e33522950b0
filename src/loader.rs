//! Loading external schema resources.
//!
//! When a reference names a resource the registry has not compiled, the
//! graph asks its [`ResourceLoader`] for the document text. Loaders return
//! `Ok(None)` for resources they do not know, so they can be chained.
//!
//! # Example
//!
//! ```rust
//! use verdict::loader::MapResourceLoader;
//! use verdict::SchemaRegistry;
//! use serde_json::json;
//!
//! let loader = MapResourceLoader::new()
//!     .with_document("https://example.com/name.json", json!({"type": "string"}));
//! let registry = SchemaRegistry::builder().loader(loader).build();
//!
//! let schema = registry
//!     .compile(&json!({"properties": {"name": {"$ref": "https://example.com/name.json"}}}))
//!     .unwrap();
//! assert!(!schema.is_valid(&json!({"name": 1})).unwrap());
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::LoadError;
use crate::location::normalize_iri;

/// Supplies the text of schema resources by IRI.
pub trait ResourceLoader: Send + Sync {
    /// Returns the document for `iri`, or `Ok(None)` when this loader does
    /// not know it.
    fn load(&self, iri: &str) -> Result<Option<String>, LoadError>;

    /// Returns the parsed document for `iri`.
    ///
    /// The default parses the text returned by [`load`](Self::load).
    /// Loaders that already hold parsed documents override it.
    fn load_value(&self, iri: &str) -> Result<Option<Arc<Value>>, LoadError> {
        let Some(text) = self.load(iri)? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&text).map_err(|source| LoadError::Parse {
            iri: iri.to_string(),
            source,
        })?;
        Ok(Some(Arc::new(value)))
    }
}

/// Knows no resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoader;

impl ResourceLoader for NoopLoader {
    fn load(&self, _iri: &str) -> Result<Option<String>, LoadError> {
        Ok(None)
    }
}

/// Serves documents from memory.
#[derive(Debug, Clone, Default)]
pub struct MapResourceLoader {
    documents: HashMap<String, String>,
}

impl MapResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document under `iri`.
    pub fn with_document(mut self, iri: &str, document: Value) -> Self {
        self.documents.insert(normalize_iri(iri), document.to_string());
        self
    }

    /// Adds raw document text under `iri`. The text is parsed when the
    /// document is first referenced.
    pub fn with_text(mut self, iri: &str, text: impl Into<String>) -> Self {
        self.documents.insert(normalize_iri(iri), text.into());
        self
    }
}

impl ResourceLoader for MapResourceLoader {
    fn load(&self, iri: &str) -> Result<Option<String>, LoadError> {
        Ok(self.documents.get(&normalize_iri(iri)).cloned())
    }
}

/// File access used by [`FileResourceLoader`].
pub trait FileSystem: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<String>;
}

/// The process file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn read_file(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Loads `file:` IRIs. Other schemes are left to the next loader.
pub struct FileResourceLoader<F = StdFileSystem> {
    fs: F,
    root: Option<PathBuf>,
}

impl FileResourceLoader<StdFileSystem> {
    pub fn new() -> Self {
        Self::with_filesystem(StdFileSystem)
    }
}

impl Default for FileResourceLoader<StdFileSystem> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileSystem> FileResourceLoader<F> {
    pub fn with_filesystem(fs: F) -> Self {
        Self { fs, root: None }
    }

    /// Only serves files below `root`.
    pub fn restricted_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn path_for(&self, iri: &str) -> Result<Option<PathBuf>, LoadError> {
        let Ok(url) = Url::parse(iri) else {
            return Ok(None);
        };
        if url.scheme() != "file" {
            return Ok(None);
        }
        let path = url
            .to_file_path()
            .map_err(|_| LoadError::InvalidPath(iri.to_string()))?;
        match &self.root {
            Some(root) if !path.starts_with(root) => Err(LoadError::InvalidPath(iri.to_string())),
            _ => Ok(Some(path)),
        }
    }
}

impl<F: FileSystem> ResourceLoader for FileResourceLoader<F> {
    fn load(&self, iri: &str) -> Result<Option<String>, LoadError> {
        let Some(path) = self.path_for(iri)? else {
            return Ok(None);
        };
        debug!(path = %path.display(), "reading schema file");
        match self.fs.read_file(&path) {
            Ok(text) => Ok(Some(text)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(LoadError::Io {
                iri: iri.to_string(),
                source,
            }),
        }
    }
}

/// Asks each loader in turn; the first that knows the resource wins.
#[derive(Clone, Default)]
pub struct ChainLoader {
    loaders: Vec<Arc<dyn ResourceLoader>>,
}

impl ChainLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, loader: impl ResourceLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }
}

impl ResourceLoader for ChainLoader {
    fn load(&self, iri: &str) -> Result<Option<String>, LoadError> {
        for loader in &self.loaders {
            if let Some(text) = loader.load(iri)? {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }

    fn load_value(&self, iri: &str) -> Result<Option<Arc<Value>>, LoadError> {
        for loader in &self.loaders {
            if let Some(value) = loader.load_value(iri)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}
