//! Retrieval of the raw text an embed refers to.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mdtree::Embed;

use crate::error::SourceError;

/// Supplies the raw text behind an embed. Implementations may suspend.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn read(&self, embed: &Embed) -> Result<String, SourceError>;
}

/// Any synchronous closure over the embed node works as a source.
#[async_trait]
impl<F> ContentSource for F
where
    F: Fn(&Embed) -> Result<String, SourceError> + Send + Sync,
{
    async fn read(&self, embed: &Embed) -> Result<String, SourceError> {
        self(embed)
    }
}

fn target_of(embed: &Embed) -> Result<&str, SourceError> {
    embed
        .target
        .as_deref()
        .ok_or_else(|| SourceError::Other(format!("embed has no target: {}", embed.raw)))
}

// ---------------------------------------------------------------------------
// In-memory documents
// ---------------------------------------------------------------------------

/// Documents held in memory, keyed by embed target.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    pub fn insert(&mut self, target: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.documents.insert(target.into(), text.into());
        self
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MemorySource {
            documents: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn read(&self, embed: &Embed) -> Result<String, SourceError> {
        let target = target_of(embed)?;
        self.documents
            .get(target)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(target.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Filesystem vault
// ---------------------------------------------------------------------------

/// Documents read from a directory. Targets without an extension get `.md`.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSource { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a target onto a path below the root. Absolute targets and `..`
    /// components are refused.
    pub fn resolve(&self, target: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(target);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(SourceError::Escapes(target.to_string()));
        }

        let resolved = self.root.join(relative);
        Ok(if resolved.extension().is_none() {
            resolved.with_extension("md")
        } else {
            resolved
        })
    }
}

#[async_trait]
impl ContentSource for FsSource {
    async fn read(&self, embed: &Embed) -> Result<String, SourceError> {
        let target = target_of(embed)?;
        let path = self.resolve(target)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => SourceError::NotFound(target.to_string()),
                _ => SourceError::Io {
                    target: target.to_string(),
                    source,
                },
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_appends_markdown_extension() {
        let source = FsSource::new("/vault");
        assert_eq!(source.resolve("notes/a").unwrap(), PathBuf::from("/vault/notes/a.md"));
        assert_eq!(source.resolve("pic.png").unwrap(), PathBuf::from("/vault/pic.png"));
        assert_eq!(source.resolve("./b.md").unwrap(), PathBuf::from("/vault/./b.md"));
    }

    #[test]
    fn resolve_refuses_escaping_targets() {
        let source = FsSource::new("/vault");
        assert!(matches!(source.resolve("../secret.md"), Err(SourceError::Escapes(_))));
        assert!(matches!(source.resolve("/etc/passwd"), Err(SourceError::Escapes(_))));
        assert!(matches!(source.resolve("a/../../b"), Err(SourceError::Escapes(_))));
    }

    #[test]
    fn memory_source_collects_pairs() {
        let source: MemorySource = [("a.md", "# A"), ("b.md", "")].into_iter().collect();
        assert_eq!(source.len(), 2);
        assert!(!source.is_empty());
    }
}
