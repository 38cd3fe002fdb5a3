//! Registry of formats.

use crate::error::KgxError;
use crate::format::{Format, FormatDecl};
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// Registry of available formats.
///
/// Holds format declarations and their implementations, and resolves
/// format tags, aliases and file extensions to a format. Only file formats
/// are registered; database-backed sources and sinks are passed to
/// [`Transformer::transform_source`](crate::Transformer::transform_source)
/// and [`Transformer::save_to_sink`](crate::Transformer::save_to_sink).
#[derive(Clone)]
pub struct Registry {
    /// Format declarations indexed by ID.
    declarations: IndexMap<String, FormatDecl>,
    /// Format implementations indexed by ID.
    implementations: IndexMap<String, Arc<dyn Format>>,
    /// Alias or extension to format ID.
    lookup: IndexMap<String, String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            declarations: IndexMap::new(),
            implementations: IndexMap::new(),
            lookup: IndexMap::new(),
        }
    }

    /// Register a format with its implementation.
    pub fn register(&mut self, format: impl Format + 'static) {
        let decl = format.decl().clone();
        let id = decl.id.clone();
        for key in decl.aliases.iter().chain(&decl.extensions) {
            self.lookup
                .entry(key.to_lowercase())
                .or_insert_with(|| id.clone());
        }
        self.declarations.insert(id.clone(), decl);
        self.implementations.insert(id, Arc::new(format));
    }

    /// Get a format declaration by ID.
    pub fn get_decl(&self, id: &str) -> Option<&FormatDecl> {
        self.declarations.get(id)
    }

    /// Get a format by ID or alias.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Format>> {
        let tag = tag.to_lowercase();
        let id = self.lookup.get(&tag).unwrap_or(&tag);
        self.implementations.get(id).cloned()
    }

    /// Like [`get`](Self::get), but an unknown tag is an error.
    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn Format>, KgxError> {
        self.get(tag)
            .ok_or_else(|| KgxError::UnsupportedFormat(tag.to_string()))
    }

    /// Detect a format ID from a file name (`.gz` is looked through).
    pub fn detect(&self, path: &Path) -> Option<&str> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let ext = Path::new(name).extension()?.to_str()?;
        self.lookup
            .get(ext)
            .map(String::as_str)
            .or_else(|| self.declarations.get_key_value(ext).map(|(k, _)| k.as_str()))
    }

    /// Iterate over all declarations.
    pub fn declarations(&self) -> impl Iterator<Item = &FormatDecl> {
        self.declarations.values()
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}
