//! XML sources for the async loader.
//!
//! This module is available with the `async` feature.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::OsisError;

/// Provider of raw OSIS XML for one version's books and fallback document
pub trait BookSource: Send + Sync + 'static {
    /// XML text of a single book
    fn fetch_book(
        &self,
        version: &str,
        book_id: &str,
    ) -> impl Future<Output = Result<String, OsisError>> + Send;

    /// XML text of the monolithic whole-Bible document
    fn fetch_fallback(
        &self,
        version: &str,
    ) -> impl Future<Output = Result<String, OsisError>> + Send;
}

/// In-memory source keyed by version and book id
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    books: HashMap<(String, String), String>,
    fallbacks: HashMap<String, String>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one book's XML
    pub fn with_book(
        mut self,
        version: impl Into<String>,
        book_id: impl Into<String>,
        xml: impl Into<String>,
    ) -> Self {
        self.books
            .insert((version.into(), book_id.into()), xml.into());
        self
    }

    /// Register a version's fallback document
    pub fn with_fallback(mut self, version: impl Into<String>, xml: impl Into<String>) -> Self {
        self.fallbacks.insert(version.into(), xml.into());
        self
    }
}

impl BookSource for MemorySource {
    async fn fetch_book(&self, version: &str, book_id: &str) -> Result<String, OsisError> {
        self.books
            .get(&(version.to_string(), book_id.to_string()))
            .cloned()
            .ok_or_else(|| OsisError::NotFound {
                resource: format!("{}/{}", version, book_id),
            })
    }

    async fn fetch_fallback(&self, version: &str) -> Result<String, OsisError> {
        self.fallbacks
            .get(version)
            .cloned()
            .ok_or_else(|| OsisError::NotFound {
                resource: format!("{} fallback", version),
            })
    }
}

/// Filesystem source.
///
/// Layout under the root directory:
///
/// ```text
/// <root>/<version>/<BookId>.xml   per-book files
/// <root>/<version>.xml            monolithic fallback
/// ```
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Source rooted at a directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of one book's file
    pub fn book_path(&self, version: &str, book_id: &str) -> PathBuf {
        self.root.join(version).join(format!("{}.xml", book_id))
    }

    /// Path of a version's fallback document
    pub fn fallback_path(&self, version: &str) -> PathBuf {
        self.root.join(format!("{}.xml", version))
    }
}

async fn read_xml_file(path: PathBuf) -> Result<String, OsisError> {
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OsisError::NotFound {
                resource: path.display().to_string(),
            }
        } else {
            OsisError::Io(format!("{}: {}", path.display(), e))
        }
    })?;
    String::from_utf8(bytes)
        .map_err(|e| OsisError::Xml(format!("{} is not valid UTF-8: {}", path.display(), e)))
}

impl BookSource for DirectorySource {
    async fn fetch_book(&self, version: &str, book_id: &str) -> Result<String, OsisError> {
        read_xml_file(self.book_path(version, book_id)).await
    }

    async fn fetch_fallback(&self, version: &str) -> Result<String, OsisError> {
        read_xml_file(self.fallback_path(version)).await
    }
}
