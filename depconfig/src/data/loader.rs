//! Schema document loaders.
//!
//! Ingestion asks a [`DocumentLoader`] for every root document and every
//! `include` target. The loader decides what a reference means and returns a
//! stable key for the document, used to detect include cycles.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use indexmap::IndexMap;
use serde_json::Value;

/// Source of schema documents.
pub trait DocumentLoader {
    /// Load the document named by `reference`.
    ///
    /// # Arguments
    ///
    /// * `reference` - Root document name or `include` entry
    /// * `from` - Key of the including document, `None` for roots
    ///
    /// # Returns
    ///
    /// The document key and its parsed content.
    fn load(&mut self, reference: &str, from: Option<&str>) -> anyhow::Result<(String, Value)>;
}

/// Loads JSON schema files, resolving includes relative to the including file.
#[derive(Debug, Clone)]
pub struct FsLoader {
    base: PathBuf,
}

impl FsLoader {
    /// Root references are resolved against `base`.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    pub fn current_dir() -> anyhow::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }
}

impl DocumentLoader for FsLoader {
    fn load(&mut self, reference: &str, from: Option<&str>) -> anyhow::Result<(String, Value)> {
        let dir = from
            .and_then(|key| Path::new(key).parent())
            .unwrap_or(&self.base);
        let path = dir.join(reference);
        let canonical = fs::canonicalize(&path)
            .with_context(|| format!("Schema file does not exist: {}", path.display()))?;
        let content = fs::read_to_string(&canonical)
            .with_context(|| format!("Failed to read {}", canonical.display()))?;
        let json: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", canonical.display()))?;
        Ok((canonical.display().to_string(), json))
    }
}

/// In-memory documents addressed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    documents: IndexMap<String, Value>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register documents under their `name` field.
    ///
    /// Unnamed documents, or names already taken, get `document-<n>`.
    pub fn from_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let mut loader = Self::new();
        for (i, doc) in documents.into_iter().enumerate() {
            let name = doc
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !loader.documents.contains_key(*name))
                .map(str::to_string)
                .unwrap_or_else(|| format!("document-{i}"));
            loader.insert(name, doc);
        }
        loader
    }

    pub fn insert(&mut self, name: impl Into<String>, document: Value) {
        self.documents.insert(name.into(), document);
    }

    /// Registered names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&mut self, reference: &str, _from: Option<&str>) -> anyhow::Result<(String, Value)> {
        match self.documents.get(reference) {
            Some(doc) => Ok((reference.to_string(), doc.clone())),
            None => bail!("no document named `{reference}`"),
        }
    }
}
